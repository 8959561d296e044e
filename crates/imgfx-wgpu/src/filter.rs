//! Filter specifications and pipeline descriptors
//!
//! A [`PipelineDescriptor`] is an ordered sequence of [`FilterSpec`]s. The
//! executor only ever sees the enabled subset, in original relative order;
//! filters are not generally commutative, so order is significant and
//! preserved end to end.

use std::collections::BTreeMap;

/// The closed set of filter kinds known to the shader registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Passthrough; also the fallback for unrecognized kinds
    Identity,
    /// Fixed magenta overlay for visually verifying pass wiring
    DebugTint,
    Brightness,
    Contrast,
    Saturation,
    Blur,
    Sharpen,
    EdgeDetection,
    NoiseReduction,
    Bilateral,
}

impl FilterKind {
    /// Resolves a caller-supplied filter identifier to its base kind.
    ///
    /// Wire identifiers may carry an instance-disambiguating numeric suffix
    /// (`blur-2`, `edge-detection-17`); the suffix is stripped before lookup.
    /// Returns `None` for identifiers outside the registered set.
    pub fn parse(identifier: &str) -> Option<Self> {
        match strip_instance_suffix(identifier) {
            "identity" => Some(Self::Identity),
            "debug-tint" => Some(Self::DebugTint),
            "brightness" => Some(Self::Brightness),
            "contrast" => Some(Self::Contrast),
            "saturation" => Some(Self::Saturation),
            "blur" => Some(Self::Blur),
            "sharpen" => Some(Self::Sharpen),
            "edge-detection" => Some(Self::EdgeDetection),
            "noise-reduction" => Some(Self::NoiseReduction),
            "bilateral" => Some(Self::Bilateral),
            _ => None,
        }
    }

    /// Returns the canonical wire identifier of this kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::DebugTint => "debug-tint",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::Blur => "blur",
            Self::Sharpen => "sharpen",
            Self::EdgeDetection => "edge-detection",
            Self::NoiseReduction => "noise-reduction",
            Self::Bilateral => "bilateral",
        }
    }
}

/// Strips a trailing `-<digits>` instance suffix, if present.
fn strip_instance_suffix(identifier: &str) -> &str {
    match identifier.rsplit_once('-') {
        Some((base, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => identifier,
    }
}

/// One filter in a pipeline: a wire-level kind identifier, its numeric
/// parameters, and an enabled flag
///
/// Identity is independent of position; parameters are assumed to be
/// range-validated by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Caller-supplied kind identifier, possibly suffixed (`blur-2`)
    pub kind: String,
    /// Parameter name to numeric value; binds to uniform `u_<name>`
    pub parameters: BTreeMap<String, f32>,
    /// Disabled filters are skipped without affecting the order of the rest
    pub enabled: bool,
}

impl FilterSpec {
    /// Creates an enabled filter with no parameters
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            parameters: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Adds one named parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: f32) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Marks the filter disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Ordered sequence of filters; the unit of work handed to the executor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineDescriptor {
    filters: Vec<FilterSpec>,
}

impl PipelineDescriptor {
    /// Creates an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter, preserving insertion order
    pub fn push(&mut self, filter: FilterSpec) {
        self.filters.push(filter);
    }

    /// Returns the enabled subset in original relative order
    pub fn enabled_filters(&self) -> Vec<&FilterSpec> {
        self.filters.iter().filter(|f| f.enabled).collect()
    }

    /// All filters, enabled or not
    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }
}

impl From<Vec<FilterSpec>> for PipelineDescriptor {
    fn from(filters: Vec<FilterSpec>) -> Self {
        Self { filters }
    }
}

impl FromIterator<FilterSpec> for PipelineDescriptor {
    fn from_iter<T: IntoIterator<Item = FilterSpec>>(iter: T) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_identifiers() {
        assert_eq!(FilterKind::parse("blur"), Some(FilterKind::Blur));
        assert_eq!(
            FilterKind::parse("edge-detection"),
            Some(FilterKind::EdgeDetection)
        );
        assert_eq!(FilterKind::parse("identity"), Some(FilterKind::Identity));
    }

    #[test]
    fn strips_instance_suffixes() {
        assert_eq!(FilterKind::parse("blur-2"), Some(FilterKind::Blur));
        assert_eq!(
            FilterKind::parse("edge-detection-17"),
            Some(FilterKind::EdgeDetection)
        );
        assert_eq!(
            FilterKind::parse("noise-reduction-0"),
            Some(FilterKind::NoiseReduction)
        );
    }

    #[test]
    fn rejects_unknown_identifiers() {
        assert_eq!(FilterKind::parse("swirl"), None);
        assert_eq!(FilterKind::parse("blur-"), None);
        assert_eq!(FilterKind::parse("blur-2x"), None);
        assert_eq!(FilterKind::parse(""), None);
    }

    #[test]
    fn enabled_subset_preserves_order() {
        let pipeline: PipelineDescriptor = vec![
            FilterSpec::new("blur"),
            FilterSpec::new("sharpen").disabled(),
            FilterSpec::new("contrast"),
            FilterSpec::new("brightness").disabled(),
            FilterSpec::new("saturation"),
        ]
        .into();

        let enabled = pipeline.enabled_filters();
        let kinds: Vec<&str> = enabled.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(kinds, ["blur", "contrast", "saturation"]);
    }

    #[test]
    fn all_disabled_is_empty_subset() {
        let pipeline: PipelineDescriptor = vec![
            FilterSpec::new("blur").disabled(),
            FilterSpec::new("sharpen").disabled(),
        ]
        .into();
        assert!(pipeline.enabled_filters().is_empty());
        assert_eq!(pipeline.filters().len(), 2);
    }
}
