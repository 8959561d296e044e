//! End-to-end engine tests
//!
//! These tests need a working graphics adapter; they skip themselves when
//! none is available (e.g. headless CI without a software rasterizer).

use imgfx_wgpu::{
    EngineError, FilterEngine, FilterSpec, GpuContext, PipelineDescriptor, ProgramCache,
    ResourceManager, SourceImage, registry,
};

fn engine() -> Option<FilterEngine> {
    match FilterEngine::new() {
        Ok(engine) => Some(engine),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn context() -> Option<GpuContext> {
    match GpuContext::new() {
        Ok(context) => Some(context),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn solid_image(width: u32, height: u32, rgba: [u8; 4]) -> SourceImage {
    let pixels = rgba.repeat((width * height) as usize);
    SourceImage::from_rgba8(pixels, width, height).unwrap()
}

/// A non-uniform image: gradients plus a coarse checker so neighborhood
/// filters actually have edges to work on.
fn gradient_image(width: u32, height: u32) -> SourceImage {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 255 / (width - 1)) as u8);
            pixels.push((y * 255 / (height - 1)) as u8);
            pixels.push((((x / 8 + y / 8) % 2) * 255) as u8);
            pixels.push(255);
        }
    }
    SourceImage::from_rgba8(pixels, width, height).unwrap()
}

fn decode(result: &imgfx_wgpu::ProcessingResult) -> image::RgbaImage {
    let encoded = result.encoded_image.as_ref().expect("missing image");
    image::load_from_memory(encoded).expect("invalid PNG").to_rgba8()
}

#[test]
fn empty_pipeline_reproduces_source_exactly() {
    let Some(mut engine) = engine() else { return };

    let source = solid_image(4, 4, [255, 0, 0, 255]);
    let result = engine.process(&source, &PipelineDescriptor::new(), 4, 4);

    assert!(result.success, "{:?}", result.error_message);
    let decoded = decode(&result);
    assert_eq!(decoded.dimensions(), (4, 4));
    assert_eq!(decoded.as_raw().as_slice(), source.pixels());
    assert!(engine.allocation_ledger().is_balanced());
}

#[test]
fn brightness_scenario_reports_telemetry() {
    let Some(mut engine) = engine() else { return };

    let source = solid_image(100, 100, [128, 128, 128, 255]);
    let pipeline: PipelineDescriptor =
        vec![FilterSpec::new("brightness").with_parameter("value", 10.0)].into();

    let result = engine.process(&source, &pipeline, 100, 100);

    assert!(result.success, "{:?}", result.error_message);
    assert!(result.device_time_ms > 0.0);
    assert!(result.total_time_ms >= result.device_time_ms);

    let decoded = decode(&result);
    assert_eq!(decoded.dimensions(), (100, 100));
    // 128 + round(10/255 * 255) = 138, give or take format rounding.
    let red = decoded.get_pixel(50, 50)[0];
    assert!((136..=140).contains(&red), "unexpected brightness: {red}");

    assert!(engine.allocation_ledger().is_balanced());
}

#[test]
fn filter_order_is_significant() {
    let Some(mut engine) = engine() else { return };

    let source = gradient_image(64, 64);
    let blur = FilterSpec::new("blur").with_parameter("radius", 4.0);
    let sharpen = FilterSpec::new("sharpen").with_parameter("strength", 2.0);

    let blur_then_sharpen: PipelineDescriptor = vec![blur.clone(), sharpen.clone()].into();
    let sharpen_then_blur: PipelineDescriptor = vec![sharpen, blur].into();

    let first = engine.process(&source, &blur_then_sharpen, 64, 64);
    let second = engine.process(&source, &sharpen_then_blur, 64, 64);
    assert!(first.success && second.success);

    assert_ne!(
        decode(&first).as_raw(),
        decode(&second).as_raw(),
        "blur/sharpen should not commute on a non-uniform image"
    );
}

#[test]
fn disabled_filters_match_the_empty_pipeline() {
    let Some(mut engine) = engine() else { return };

    let source = gradient_image(32, 32);
    let all_disabled: PipelineDescriptor = vec![
        FilterSpec::new("blur").with_parameter("radius", 5.0).disabled(),
        FilterSpec::new("edge-detection").disabled(),
    ]
    .into();

    let baseline = engine.process(&source, &PipelineDescriptor::new(), 32, 32);
    let disabled = engine.process(&source, &all_disabled, 32, 32);
    assert!(baseline.success && disabled.success);

    assert_eq!(decode(&baseline).as_raw(), decode(&disabled).as_raw());
}

#[test]
fn unknown_kind_degrades_to_passthrough() {
    let Some(mut engine) = engine() else { return };

    let source = solid_image(8, 8, [10, 200, 30, 255]);
    let pipeline: PipelineDescriptor = vec![FilterSpec::new("sparkle-99")].into();

    let result = engine.process(&source, &pipeline, 8, 8);
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(decode(&result).as_raw().as_slice(), source.pixels());
}

#[test]
fn sequential_runs_do_not_bleed_state() {
    let Some(mut engine) = engine() else { return };

    let pipeline: PipelineDescriptor =
        vec![FilterSpec::new("saturation").with_parameter("value", 0.0)].into();

    let red = solid_image(16, 16, [255, 0, 0, 255]);
    let blue = solid_image(16, 16, [0, 0, 255, 255]);

    let first = engine.process(&red, &pipeline, 16, 16);
    let second = engine.process(&blue, &pipeline, 16, 16);
    assert!(first.success && second.success);

    let second_pixel = *decode(&second).get_pixel(8, 8);
    assert!(second_pixel[0] < 10, "stale red from the prior run: {second_pixel:?}");
    assert!(second_pixel[2] > 200, "expected blue output: {second_pixel:?}");

    assert!(engine.allocation_ledger().is_balanced());
}

#[test]
fn render_target_count_is_independent_of_pipeline_length() {
    let Some(mut engine) = engine() else { return };

    let source = gradient_image(16, 16);

    let before = engine.allocation_ledger().allocated();
    assert!(engine.process(&source, &PipelineDescriptor::new(), 16, 16).success);
    let empty_run = engine.allocation_ledger().allocated() - before;

    let long: PipelineDescriptor = vec![
        FilterSpec::new("blur"),
        FilterSpec::new("sharpen"),
        FilterSpec::new("contrast"),
    ]
    .into();
    let before = engine.allocation_ledger().allocated();
    assert!(engine.process(&source, &long, 16, 16).success);
    let long_run = engine.allocation_ledger().allocated() - before;

    // Only per-pass uniform buffers scale with pipeline length (one pass for
    // the empty pipeline's identity draw versus three here); the texture
    // budget, two ping-pong targets included, is fixed.
    assert_eq!(long_run - empty_run, 2);
    assert!(engine.allocation_ledger().is_balanced());
}

#[test]
fn compile_failure_is_fatal_and_leaves_nothing_behind() {
    let Some(context) = context() else { return };

    let mut cache = ProgramCache::new(&context.device).expect("vertex stage should compile");

    let err = cache
        .get(&context.device, "@fragment fn fs_main( broken")
        .expect_err("broken WGSL must not compile");
    match err {
        EngineError::ShaderCompile { diagnostic } => {
            assert!(!diagnostic.is_empty(), "diagnostic text must be preserved")
        }
        other => panic!("expected ShaderCompile, got {other:?}"),
    }
    assert!(cache.is_empty(), "failed program must not be cached");

    // A failed run still releases everything it allocated.
    let mut resources = ResourceManager::new();
    let source = solid_image(4, 4, [1, 2, 3, 255]);
    let run = resources
        .begin_run(&context.device, &context.queue, &source, 4, 4)
        .expect("allocation should succeed");
    resources.end_run(run);
    assert!(resources.ledger().is_balanced());
    assert_eq!(resources.ledger().outstanding(), 0);
}

#[test]
fn program_cache_compiles_each_source_once() {
    let Some(context) = context() else { return };

    let mut cache = ProgramCache::new(&context.device).unwrap();
    let entry = registry::resolve("blur");

    cache.get(&context.device, entry.fragment_source).unwrap();
    cache.get(&context.device, entry.fragment_source).unwrap();
    assert_eq!(cache.len(), 1);

    cache
        .get(&context.device, registry::resolve("sharpen").fragment_source)
        .unwrap();
    assert_eq!(cache.len(), 2);
}
