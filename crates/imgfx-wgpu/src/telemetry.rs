//! Run telemetry: the result record and the memory estimate

use bytes::Bytes;

use crate::error::EngineError;

/// Conservative upper bound on device memory for a run, in MiB.
///
/// Counts the input, the two ping-pong targets, and one unit per enabled
/// filter at 4 bytes per pixel. Deliberately not an exact resident-set size.
pub fn estimated_memory_mib(width: u32, height: u32, enabled_count: usize) -> f64 {
    width as f64 * height as f64 * 4.0 * (enabled_count as f64 + 2.0) / (1024.0 * 1024.0)
}

/// Terminal record of one run. Success is all-or-nothing: a failed run never
/// carries a partial image.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    /// Summed per-pass device time, from elapsed-time queries when the device
    /// supports them, otherwise wall-clock around the device flush
    pub device_time_ms: f64,
    /// Wall-clock time for the whole run
    pub total_time_ms: f64,
    /// See [`estimated_memory_mib`]
    pub estimated_memory_mib: f64,
    /// PNG-encoded output; present iff `success`
    pub encoded_image: Option<Bytes>,
    /// Present iff the run failed
    pub error_message: Option<String>,
}

impl ProcessingResult {
    pub(crate) fn completed(
        encoded_image: Bytes,
        device_time_ms: f64,
        total_time_ms: f64,
        estimated_memory_mib: f64,
    ) -> Self {
        Self {
            success: true,
            device_time_ms,
            total_time_ms,
            estimated_memory_mib,
            encoded_image: Some(encoded_image),
            error_message: None,
        }
    }

    pub(crate) fn failed(
        error: &EngineError,
        total_time_ms: f64,
        estimated_memory_mib: f64,
    ) -> Self {
        Self {
            success: false,
            device_time_ms: 0.0,
            total_time_ms,
            estimated_memory_mib,
            encoded_image: None,
            error_message: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_estimate_matches_formula() {
        // 1024x1024 RGBA with an empty pipeline: input + two targets = 8 MiB.
        assert_eq!(estimated_memory_mib(1024, 1024, 0), 8.0);
    }

    #[test]
    fn memory_estimate_scales_linearly_with_area() {
        let base = estimated_memory_mib(640, 480, 3);
        assert_eq!(estimated_memory_mib(1280, 480, 3), base * 2.0);
        assert_eq!(estimated_memory_mib(640, 960, 3), base * 2.0);
    }

    #[test]
    fn memory_estimate_scales_linearly_with_pass_count() {
        let base = estimated_memory_mib(800, 600, 0);
        let with_three = estimated_memory_mib(800, 600, 3);
        assert_eq!(with_three / base, 5.0 / 2.0);
    }

    #[test]
    fn failed_result_carries_no_image() {
        let err = EngineError::ImageDecode("truncated".into());
        let result = ProcessingResult::failed(&err, 1.5, 8.0);
        assert!(!result.success);
        assert!(result.encoded_image.is_none());
        assert!(result.error_message.unwrap().contains("truncated"));
    }
}
