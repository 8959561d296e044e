//! Command-line demo for the filter engine
//!
//! Loads an image, runs an ordered list of filters on the GPU, and writes the
//! PNG result plus telemetry to stdout.
//!
//! # Usage
//! ```bash
//! cargo run --example cli -- input.png output.png \
//!     --filter brightness:value=20 --filter blur:radius=3
//! ```

use std::path::PathBuf;

use clap::Parser;
use imgfx_wgpu::{FilterEngine, FilterSpec, PipelineDescriptor, SourceImage};

/// Command-line arguments for the filter demo
#[derive(Parser)]
#[command(version, about = "Apply a GPU filter pipeline to an image")]
struct Args {
    /// Input image file path
    input: PathBuf,

    /// Output PNG file path
    output: PathBuf,

    /// Filter to apply, in order: `kind` or `kind:name=value,name=value`
    /// (e.g. `brightness:value=20`, `bilateral:sigma_space=3,sigma_color=0.2`)
    #[arg(long, short, value_parser = parse_filter)]
    filter: Vec<FilterSpec>,
}

/// Parses `kind[:name=value[,name=value...]]` into a filter spec.
fn parse_filter(arg: &str) -> Result<FilterSpec, String> {
    let (kind, params) = match arg.split_once(':') {
        Some((kind, params)) => (kind, Some(params)),
        None => (arg, None),
    };

    let mut spec = FilterSpec::new(kind);
    if let Some(params) = params {
        for pair in params.split(',') {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected name=value, got `{pair}`"))?;
            let value: f32 = value
                .parse()
                .map_err(|_| format!("invalid numeric value `{value}`"))?;
            spec = spec.with_parameter(name, value);
        }
    }
    Ok(spec)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    println!("Loading image from: {}", args.input.display());
    let input_image = image::open(&args.input)?.to_rgba8();
    let (width, height) = input_image.dimensions();
    println!("Input image: {width}x{height}");

    let source = SourceImage::from_rgba8(input_image.into_raw(), width, height)?;
    let pipeline: PipelineDescriptor = args.filter.into_iter().collect();

    println!("Initializing GPU...");
    let mut engine = FilterEngine::new()?;

    let result = engine.process(&source, &pipeline, width, height);
    if !result.success {
        return Err(result
            .error_message
            .unwrap_or_else(|| "processing failed".into())
            .into());
    }

    let encoded = result
        .encoded_image
        .ok_or("successful run returned no image")?;
    std::fs::write(&args.output, &encoded)?;

    println!("Saved result to: {}", args.output.display());
    println!(
        "Device time: {:.3} ms, total time: {:.3} ms, estimated memory: {:.2} MiB",
        result.device_time_ms, result.total_time_ms, result.estimated_memory_mib
    );

    Ok(())
}
