//! Configuration types for the extraction pipeline.
//!
//! All tunables live here so a pipeline is fully described by one
//! [`PipelineConfig`] value, constructed once and owned by the orchestrator.

pub mod parallel;

pub use parallel::ParallelPolicy;

use crate::core::errors::OcrError;
use crate::processors::box_fit::BoxFitStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for detection post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Threshold for binarizing the probability map (default: 0.3).
    pub threshold: f32,
    /// Minimum connected-component area in map cells (default: 10).
    pub min_region_area: usize,
    /// Ratio for expanding fitted boxes (default: 1.7, must be >= 1).
    pub unclip_ratio: f32,
    /// Minimum shorter side of a fitted box in map pixels (default: 3.0).
    pub min_box_size: f32,
    /// Box fitting strategy, resolved once at pipeline start.
    pub strategy: BoxFitStrategy,
    /// Side length of the square detection model input (default: 640).
    pub input_size: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_region_area: 10,
            unclip_ratio: 1.7,
            min_box_size: 3.0,
            strategy: BoxFitStrategy::Rotated,
            input_size: 640,
        }
    }
}

/// Configuration for row/column grid reconstruction.
///
/// Tolerances left as `None` are derived from the source image dimensions
/// (row: height / 120, column gap: width / 180), which compensates for
/// different photo resolutions without retuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridConfig {
    /// Vertical distance within which a box joins an existing row.
    pub row_tolerance: Option<f32>,
    /// Maximum horizontal gap merged into a single cell.
    pub col_tolerance: Option<f32>,
}

/// Configuration for the recognition stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Height the cell crops are resized to before inference (default: 48).
    pub input_height: u32,
    /// Width the resized crops are padded to (default: 320).
    pub input_width: u32,
    /// Optional per-call inference timeout in milliseconds.
    ///
    /// Forwarded to the engine boundary; an engine may ignore it.
    pub timeout_ms: Option<u64>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            input_height: 48,
            input_width: 320,
            timeout_ms: None,
        }
    }
}

impl RecognitionConfig {
    /// Timeout as a [`Duration`], when configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Detection post-processing tunables.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Grid assembly tolerances.
    #[serde(default)]
    pub grid: GridConfig,
    /// Recognition stage tunables.
    #[serde(default)]
    pub recognition: RecognitionConfig,
    /// Parallelism policy for per-cell recognition.
    #[serde(default)]
    pub parallel: ParallelPolicy,
}

impl PipelineConfig {
    /// Validates the configuration, returning a descriptive error on the
    /// first violated constraint.
    pub fn validate(&self) -> Result<(), OcrError> {
        let det = &self.detection;
        if !(det.threshold > 0.0 && det.threshold < 1.0) {
            return Err(OcrError::config(format!(
                "detection.threshold must be in (0, 1), got {}",
                det.threshold
            )));
        }
        if det.unclip_ratio < 1.0 || !det.unclip_ratio.is_finite() {
            return Err(OcrError::config(format!(
                "detection.unclip_ratio must be >= 1, got {}",
                det.unclip_ratio
            )));
        }
        if det.min_box_size <= 0.0 {
            return Err(OcrError::config(format!(
                "detection.min_box_size must be positive, got {}",
                det.min_box_size
            )));
        }
        if det.input_size == 0 {
            return Err(OcrError::config("detection.input_size must be positive"));
        }
        if let Some(t) = self.grid.row_tolerance {
            if t < 0.0 || !t.is_finite() {
                return Err(OcrError::config(format!(
                    "grid.row_tolerance must be non-negative, got {t}"
                )));
            }
        }
        if let Some(t) = self.grid.col_tolerance {
            if t < 0.0 || !t.is_finite() {
                return Err(OcrError::config(format!(
                    "grid.col_tolerance must be non-negative, got {t}"
                )));
            }
        }
        let rec = &self.recognition;
        if rec.input_height == 0 || rec.input_width == 0 {
            return Err(OcrError::config(
                "recognition input dimensions must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds_are_enforced() {
        let mut cfg = PipelineConfig::default();
        cfg.detection.threshold = 0.0;
        assert!(cfg.validate().is_err());
        cfg.detection.threshold = 1.0;
        assert!(cfg.validate().is_err());
        cfg.detection.threshold = 0.5;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unclip_ratio_below_one_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.detection.unclip_ratio = 0.9;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unclip_ratio"));
    }

    #[test]
    fn test_negative_grid_tolerance_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.grid.row_tolerance = Some(-1.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_timeout_conversion() {
        let mut rec = RecognitionConfig::default();
        assert!(rec.timeout().is_none());
        rec.timeout_ms = Some(1500);
        assert_eq!(rec.timeout(), Some(Duration::from_millis(1500)));
    }
}
