//! Static shader registry: filter kind to fragment source and parameter schema
//!
//! The registry is a closed, process-wide immutable table built from WGSL
//! sources embedded at compile time. Extending the filter set means adding
//! one table entry and one shader file; there is no runtime reflection or
//! string-based code generation.
//!
//! Naming contract between filter parameters and the shader layer: the
//! sampled input is `u_image` (with `u_sampler`), the resolution vector is
//! `u_resolution`, and parameter `X` binds to the uniform field `u_X`.
//! Uniform data is packed as `vec2f` resolution followed by one `f32` per
//! schema parameter, in schema order, zero-padded to a 16-byte multiple.

use std::collections::BTreeMap;

use crate::filter::FilterKind;

/// Shared vertex stage: full-screen quad as two triangles
pub const FULLSCREEN_VERTEX: &str = include_str!("shaders/fullscreen.wgsl");

/// One uniform parameter expected by a filter's fragment stage
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Parameter name on the wire; binds to uniform field `u_<name>`
    pub name: &'static str,
    /// Value substituted when the caller omits the parameter
    pub default: f32,
}

/// Immutable registry entry for one filter kind
#[derive(Debug)]
pub struct ShaderEntry {
    /// The kind this entry implements
    pub kind: FilterKind,
    /// Fragment-stage WGSL source; also the program cache key
    pub fragment_source: &'static str,
    /// Uniform parameter schema, in packing order
    pub params: &'static [ParamSpec],
}

static IDENTITY: ShaderEntry = ShaderEntry {
    kind: FilterKind::Identity,
    fragment_source: include_str!("shaders/identity.wgsl"),
    params: &[],
};

static DEBUG_TINT: ShaderEntry = ShaderEntry {
    kind: FilterKind::DebugTint,
    fragment_source: include_str!("shaders/debug_tint.wgsl"),
    params: &[],
};

static BRIGHTNESS: ShaderEntry = ShaderEntry {
    kind: FilterKind::Brightness,
    fragment_source: include_str!("shaders/brightness.wgsl"),
    params: &[ParamSpec {
        name: "value",
        default: 0.0,
    }],
};

static CONTRAST: ShaderEntry = ShaderEntry {
    kind: FilterKind::Contrast,
    fragment_source: include_str!("shaders/contrast.wgsl"),
    params: &[ParamSpec {
        name: "value",
        default: 0.0,
    }],
};

static SATURATION: ShaderEntry = ShaderEntry {
    kind: FilterKind::Saturation,
    fragment_source: include_str!("shaders/saturation.wgsl"),
    params: &[ParamSpec {
        name: "value",
        default: 0.0,
    }],
};

static BLUR: ShaderEntry = ShaderEntry {
    kind: FilterKind::Blur,
    fragment_source: include_str!("shaders/blur.wgsl"),
    params: &[ParamSpec {
        name: "radius",
        default: 2.0,
    }],
};

static SHARPEN: ShaderEntry = ShaderEntry {
    kind: FilterKind::Sharpen,
    fragment_source: include_str!("shaders/sharpen.wgsl"),
    params: &[ParamSpec {
        name: "strength",
        default: 1.0,
    }],
};

static EDGE_DETECTION: ShaderEntry = ShaderEntry {
    kind: FilterKind::EdgeDetection,
    fragment_source: include_str!("shaders/edge_detection.wgsl"),
    params: &[],
};

static NOISE_REDUCTION: ShaderEntry = ShaderEntry {
    kind: FilterKind::NoiseReduction,
    fragment_source: include_str!("shaders/noise_reduction.wgsl"),
    params: &[ParamSpec {
        name: "strength",
        default: 0.5,
    }],
};

static BILATERAL: ShaderEntry = ShaderEntry {
    kind: FilterKind::Bilateral,
    fragment_source: include_str!("shaders/bilateral.wgsl"),
    params: &[
        ParamSpec {
            name: "sigma_space",
            default: 2.0,
        },
        ParamSpec {
            name: "sigma_color",
            default: 0.1,
        },
    ],
};

/// All registered entries
pub const ALL_KINDS: [FilterKind; 10] = [
    FilterKind::Identity,
    FilterKind::DebugTint,
    FilterKind::Brightness,
    FilterKind::Contrast,
    FilterKind::Saturation,
    FilterKind::Blur,
    FilterKind::Sharpen,
    FilterKind::EdgeDetection,
    FilterKind::NoiseReduction,
    FilterKind::Bilateral,
];

/// Returns the registry entry for a kind
pub fn entry(kind: FilterKind) -> &'static ShaderEntry {
    match kind {
        FilterKind::Identity => &IDENTITY,
        FilterKind::DebugTint => &DEBUG_TINT,
        FilterKind::Brightness => &BRIGHTNESS,
        FilterKind::Contrast => &CONTRAST,
        FilterKind::Saturation => &SATURATION,
        FilterKind::Blur => &BLUR,
        FilterKind::Sharpen => &SHARPEN,
        FilterKind::EdgeDetection => &EDGE_DETECTION,
        FilterKind::NoiseReduction => &NOISE_REDUCTION,
        FilterKind::Bilateral => &BILATERAL,
    }
}

/// Resolves a wire identifier to a registry entry.
///
/// Unregistered kinds degrade to the identity entry; the engine never fails
/// solely because of an unrecognized kind.
pub fn resolve(identifier: &str) -> &'static ShaderEntry {
    match FilterKind::parse(identifier) {
        Some(kind) => entry(kind),
        None => {
            tracing::warn!(identifier, "unknown filter kind, substituting identity");
            &IDENTITY
        }
    }
}

/// Packs the resolution and schema-ordered parameters into uniform bytes.
///
/// Parameters missing from `values` take the schema default. The payload is
/// zero-padded to a 16-byte multiple to satisfy uniform buffer layout rules.
pub fn pack_uniforms(
    entry: &ShaderEntry,
    width: u32,
    height: u32,
    values: &BTreeMap<String, f32>,
) -> Vec<u8> {
    let mut data = vec![width as f32, height as f32];
    for param in entry.params {
        data.push(values.get(param.name).copied().unwrap_or(param.default));
    }
    while data.len() % 4 != 0 {
        data.push(0.0);
    }
    bytemuck::cast_slice(&data).to_vec()
}
