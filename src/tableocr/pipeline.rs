//! The pipeline orchestrator.
//!
//! [`TableOcr`] owns the end-to-end run state: the engines, the dictionary,
//! and the configuration, built once through [`TableOcrBuilder`]. A run
//! drives detection post-processing, grid assembly, per-cell cropping,
//! recognition and decoding, applying the retry ladder and the abort policy.
//!
//! Error behavior: geometry- and per-cell-level failures are absorbed and
//! degrade to empty cells; total detection failure and model/dictionary
//! mismatch surface as named terminal conditions.

use crate::core::config::PipelineConfig;
use crate::core::errors::OcrError;
use crate::core::inference::{squeeze_to_2d, InferenceEngine, NamedTensors, Tensor4D};
use crate::processors::box_fit::{fit_boxes, BoxFitStrategy};
use crate::processors::decode::{decode, resolve_layout, DecodedSequence};
use crate::processors::geometry::OrientedBox;
use crate::processors::grid;
use crate::processors::region_extract::{self, ProbabilityMap};
use crate::tableocr::result::{GridCell, TableGrid};
use crate::utils::crop::crop_oriented;
use crate::utils::dict::Dictionary;
use crate::utils::transform::{crop_to_tensor, letterbox_to_tensor};
use image::{imageops, Rgb, RgbImage};
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// Threshold/unclip relaxation steps of the retry ladder.
const RELAXATIONS: [(f32, f32); 3] = [(1.0, 1.0), (0.75, 1.15), (0.5, 1.3)];

/// An engine treated as a serialized resource: at most one in-flight call.
struct SerializedEngine {
    engine: Arc<dyn InferenceEngine>,
    lock: Mutex<()>,
}

impl SerializedEngine {
    fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            lock: Mutex::new(()),
        }
    }

    fn infer(
        &self,
        model: &str,
        input: &Tensor4D,
        timeout: Option<Duration>,
    ) -> Result<NamedTensors, OcrError> {
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.engine
            .infer_with_timeout(input, timeout)
            .map_err(|err| match err {
                already @ OcrError::Inference { .. } => already,
                other => OcrError::inference(model, "engine call failed", other),
            })
    }
}

/// Builder for a [`TableOcr`] pipeline.
pub struct TableOcrBuilder {
    detection: Arc<dyn InferenceEngine>,
    recognition: Arc<dyn InferenceEngine>,
    orientation: Option<Arc<dyn InferenceEngine>>,
    dictionary: Dictionary,
    config: PipelineConfig,
}

impl TableOcrBuilder {
    /// Creates a builder from the required collaborators.
    pub fn new(
        detection: Arc<dyn InferenceEngine>,
        recognition: Arc<dyn InferenceEngine>,
        dictionary: Dictionary,
    ) -> Self {
        Self {
            detection,
            recognition,
            orientation: None,
            dictionary,
            config: PipelineConfig::default(),
        }
    }

    /// Adds the optional two-class orientation engine.
    ///
    /// When its second score exceeds the first, a crop is rotated 180
    /// degrees before recognition. Leaving it out skips orientation
    /// correction entirely.
    pub fn with_orientation(mut self, engine: Arc<dyn InferenceEngine>) -> Self {
        self.orientation = Some(engine);
        self
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the probability binarization threshold.
    pub fn detection_threshold(mut self, threshold: f32) -> Self {
        self.config.detection.threshold = threshold;
        self
    }

    /// Sets the box expansion ratio.
    pub fn unclip_ratio(mut self, ratio: f32) -> Self {
        self.config.detection.unclip_ratio = ratio;
        self
    }

    /// Sets the box fitting strategy.
    pub fn box_strategy(mut self, strategy: BoxFitStrategy) -> Self {
        self.config.detection.strategy = strategy;
        self
    }

    /// Overrides the derived row clustering tolerance.
    pub fn row_tolerance(mut self, tolerance: f32) -> Self {
        self.config.grid.row_tolerance = Some(tolerance);
        self
    }

    /// Overrides the derived column merge tolerance.
    pub fn col_tolerance(mut self, tolerance: f32) -> Self {
        self.config.grid.col_tolerance = Some(tolerance);
        self
    }

    /// Sets the per-call inference timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.recognition.timeout_ms = Some(timeout_ms);
        self
    }

    /// Validates the configuration and builds the pipeline.
    pub fn build(self) -> Result<TableOcr, OcrError> {
        self.config.validate()?;
        Ok(TableOcr {
            detection: SerializedEngine::new(self.detection),
            recognition: SerializedEngine::new(self.recognition),
            orientation: self.orientation.map(SerializedEngine::new),
            dictionary: self.dictionary,
            config: self.config,
            generation: AtomicU64::new(0),
            verified_classes: OnceLock::new(),
        })
    }
}

/// The table extraction pipeline.
///
/// Construct once with [`TableOcr::builder`], then call
/// [`extract_table`](TableOcr::extract_table) per image. Submitting a new
/// image while a run is in flight supersedes the older run: it stops
/// scheduling further cells and reports [`OcrError::Superseded`] so its
/// output is never merged into the newer run's grid.
pub struct TableOcr {
    detection: SerializedEngine,
    recognition: SerializedEngine,
    orientation: Option<SerializedEngine>,
    dictionary: Dictionary,
    config: PipelineConfig,
    generation: AtomicU64,
    verified_classes: OnceLock<usize>,
}

impl fmt::Debug for TableOcr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableOcr")
            .field("dictionary_len", &self.dictionary.len())
            .field("has_orientation", &self.orientation.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl TableOcr {
    /// Starts a pipeline builder.
    pub fn builder(
        detection: Arc<dyn InferenceEngine>,
        recognition: Arc<dyn InferenceEngine>,
        dictionary: Dictionary,
    ) -> TableOcrBuilder {
        TableOcrBuilder::new(detection, recognition, dictionary)
    }

    /// The dictionary this pipeline decodes against.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline on one image, producing the text grid.
    pub fn extract_table(&self, image: &RgbImage) -> Result<TableGrid, OcrError> {
        let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let timeout = self.config.recognition.timeout();

        let (input, transform) =
            letterbox_to_tensor(image, self.config.detection.input_size)?;
        let outputs = self.detection.infer("detection", &input, timeout)?;
        let (name, heatmap) = outputs.first().ok_or_else(|| {
            OcrError::inference_msg("detection", "engine returned no outputs")
        })?;
        tracing::debug!(
            target: "pipeline",
            output = name,
            shape = ?heatmap.shape(),
            "Detection inference complete"
        );
        let map = ProbabilityMap::new(squeeze_to_2d(heatmap)?, transform);
        self.bail_if_stale(run)?;

        let (model_boxes, attempts) = self.detect_boxes_with_fallback(&map);
        let source_boxes: Vec<OrientedBox> = model_boxes
            .iter()
            .map(|bx| transform.to_source_space(bx))
            .filter(|bx| !bx.is_degenerate())
            .collect();
        if source_boxes.is_empty() {
            return Err(OcrError::NoRegionsDetected { attempts });
        }

        let row_tol = self
            .config
            .grid
            .row_tolerance
            .unwrap_or_else(|| (image.height() as f32 / 120.0).max(1.0));
        let col_tol = self
            .config
            .grid
            .col_tolerance
            .unwrap_or_else(|| (image.width() as f32 / 180.0).max(1.0));
        let rows = grid::assemble(&source_boxes, row_tol, col_tol);

        self.ensure_model_compatible(timeout)?;
        self.bail_if_stale(run)?;

        let cells = self.recognize_cells(image, &rows, run, timeout)?;

        tracing::info!(
            target: "pipeline",
            rows = cells.len(),
            cells = cells.iter().map(Vec::len).sum::<usize>(),
            "Table extraction complete"
        );
        Ok(TableGrid::new(cells))
    }

    fn bail_if_stale(&self, run: u64) -> Result<(), OcrError> {
        if self.generation.load(Ordering::SeqCst) != run {
            Err(OcrError::Superseded)
        } else {
            Ok(())
        }
    }

    /// Runs region extraction and box fitting with the retry ladder.
    ///
    /// Each strategy is tried at progressively looser threshold/unclip
    /// settings; when the configured strategy is Rotated, a final axis
    /// aligned pass backs it up. Returns the first non-empty result along
    /// with the number of attempts made.
    fn detect_boxes_with_fallback(&self, map: &ProbabilityMap) -> (Vec<OrientedBox>, usize) {
        let det = &self.config.detection;
        let mut strategies = vec![det.strategy];
        if det.strategy == BoxFitStrategy::Rotated {
            strategies.push(BoxFitStrategy::AxisAligned);
        }

        let mut attempts = 0;
        for strategy in strategies {
            for (thresh_mult, unclip_mult) in RELAXATIONS {
                attempts += 1;
                let threshold = det.threshold * thresh_mult;
                let unclip_ratio = det.unclip_ratio * unclip_mult;
                let regions = region_extract::extract(map, threshold, det.min_region_area);
                let boxes = fit_boxes(&regions, strategy, unclip_ratio, det.min_box_size);
                if !boxes.is_empty() {
                    if attempts > 1 {
                        tracing::info!(
                            target: "pipeline",
                            attempts,
                            strategy = ?strategy,
                            threshold,
                            unclip_ratio,
                            "Detection succeeded after relaxation"
                        );
                    }
                    return (boxes, attempts);
                }
                tracing::debug!(
                    target: "pipeline",
                    attempt = attempts,
                    strategy = ?strategy,
                    threshold,
                    "No usable boxes at this setting"
                );
            }
        }
        (Vec::new(), attempts)
    }

    /// One-shot recognition model / dictionary compatibility check.
    ///
    /// Runs recognition on a trivial blank crop and inspects the reported
    /// class count. A mismatched pairing fails fast before any real cell is
    /// processed, instead of silently producing garbled text. The verdict is
    /// cached for the pipeline's lifetime.
    fn ensure_model_compatible(&self, timeout: Option<Duration>) -> Result<(), OcrError> {
        if self.verified_classes.get().is_some() {
            return Ok(());
        }

        let rec = &self.config.recognition;
        let blank = RgbImage::from_pixel(rec.input_width, rec.input_height, Rgb([255, 255, 255]));
        let input = crop_to_tensor(&blank, rec.input_height, rec.input_width)?;
        let outputs = self.recognition.infer("recognition", &input, timeout)?;
        let (_, logits) = outputs.first().ok_or_else(|| {
            OcrError::inference_msg("recognition", "engine returned no outputs")
        })?;
        let layout = resolve_layout(logits.shape())?;

        let dictionary_len = self.dictionary.len();
        if layout.classes != dictionary_len && layout.classes != dictionary_len + 1 {
            return Err(OcrError::IncompatibleModel {
                class_count: layout.classes,
                dictionary_len,
            });
        }

        let _ = self.verified_classes.set(layout.classes);
        tracing::debug!(
            target: "pipeline",
            classes = layout.classes,
            dictionary_len,
            "Recognition model accepted"
        );
        Ok(())
    }

    /// Recognizes every grid cell, reassembling results in row-major order.
    ///
    /// Cells are independent; above the configured threshold they are
    /// dispatched through rayon, and the engines serialize access
    /// themselves. Completion order never affects the output order.
    fn recognize_cells(
        &self,
        image: &RgbImage,
        rows: &[Vec<OrientedBox>],
        run: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<Vec<GridCell>>, OcrError> {
        let flat: Vec<(usize, usize, OrientedBox)> = rows
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(move |(col, bx)| (row, col, *bx))
            })
            .collect();

        let parallel = flat.len() > self.config.parallel.cell_threshold;
        let results: Vec<Option<GridCell>> = if parallel {
            flat.par_iter()
                .map(|&(row, col, bx)| {
                    if self.generation.load(Ordering::SeqCst) != run {
                        return None;
                    }
                    Some(self.recognize_cell(image, row, col, bx, timeout))
                })
                .collect()
        } else {
            flat.iter()
                .map(|&(row, col, bx)| {
                    if self.generation.load(Ordering::SeqCst) != run {
                        return None;
                    }
                    Some(self.recognize_cell(image, row, col, bx, timeout))
                })
                .collect()
        };

        if results.iter().any(Option::is_none) {
            return Err(OcrError::Superseded);
        }

        let mut grid: Vec<Vec<GridCell>> = rows.iter().map(|_| Vec::new()).collect();
        for cell in results.into_iter().flatten() {
            grid[cell.row].push(cell);
        }
        Ok(grid)
    }

    /// Processes one cell, absorbing failures into an empty result.
    ///
    /// A single bad crop or failed inference call must not abort the whole
    /// table.
    fn recognize_cell(
        &self,
        image: &RgbImage,
        row: usize,
        col: usize,
        bx: OrientedBox,
        timeout: Option<Duration>,
    ) -> GridCell {
        let decoded = match self.recognize_cell_inner(image, &bx, timeout) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(
                    target: "pipeline",
                    row,
                    col,
                    error = %err,
                    "Cell recognition failed; recording empty text"
                );
                DecodedSequence::empty()
            }
        };
        GridCell {
            bbox: bx,
            row,
            col,
            text: decoded.text,
            indices: decoded.indices,
            confidence: decoded.confidence,
        }
    }

    fn recognize_cell_inner(
        &self,
        image: &RgbImage,
        bx: &OrientedBox,
        timeout: Option<Duration>,
    ) -> Result<DecodedSequence, OcrError> {
        let rec = &self.config.recognition;
        let crop = crop_oriented(image, bx)?;
        let crop = self.correct_orientation(crop, timeout);
        let input = crop_to_tensor(&crop, rec.input_height, rec.input_width)?;
        let outputs = self.recognition.infer("recognition", &input, timeout)?;
        let (_, logits) = outputs.first().ok_or_else(|| {
            OcrError::inference_msg("recognition", "engine returned no outputs")
        })?;
        decode(logits, &self.dictionary)
    }

    /// Applies the optional orientation classifier to a crop.
    ///
    /// Classifier failures keep the crop as-is; orientation correction is
    /// an improvement, never a requirement.
    fn correct_orientation(&self, crop: RgbImage, timeout: Option<Duration>) -> RgbImage {
        let Some(orientation) = &self.orientation else {
            return crop;
        };
        let rec = &self.config.recognition;
        let input = match crop_to_tensor(&crop, rec.input_height, rec.input_width) {
            Ok(tensor) => tensor,
            Err(err) => {
                tracing::warn!(target: "pipeline", error = %err, "Orientation input failed");
                return crop;
            }
        };
        match orientation.infer("orientation", &input, timeout) {
            Ok(outputs) => {
                let Some((_, scores)) = outputs.first() else {
                    return crop;
                };
                let scores: Vec<f32> = scores.iter().copied().collect();
                if scores.len() >= 2 && scores[1] > scores[0] {
                    tracing::debug!(target: "pipeline", "Flipping crop 180 degrees");
                    imageops::rotate180(&crop)
                } else {
                    crop
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "pipeline",
                    error = %err,
                    "Orientation classification failed; keeping crop"
                );
                crop
            }
        }
    }
}
