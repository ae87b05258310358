//! Greedy CTC-style decoding of recognition model output.
//!
//! The recognition model emits a (time steps × class scores) tensor, but the
//! axis order is not guaranteed by the export toolchain. This module first
//! disambiguates the layout, then applies greedy argmax decoding with
//! blank/repeat collapse and maps the surviving indices through the label
//! dictionary.

use crate::core::errors::OcrError;
use crate::core::Tensor2D;
use crate::utils::dict::Dictionary;
use ndarray::{ArrayD, Axis};

/// Resolved layout of a recognition output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorLayout {
    /// Number of time steps (T).
    pub time_steps: usize,
    /// Number of classes per step (C).
    pub classes: usize,
    /// True when the tensor is laid out `[T, C]`, false for `[C, T]`.
    pub time_major: bool,
}

/// A decoded recognition result for one crop.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSequence {
    /// Decoded text.
    pub text: String,
    /// Label indices that survived the collapse, in order.
    pub indices: Vec<usize>,
    /// Mean score of the surviving steps, 0.0 when nothing survived.
    pub confidence: f32,
}

impl DecodedSequence {
    /// An empty result, used when a cell's recognition fails.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            indices: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Disambiguates the (T, C) layout of a 2-D recognition output shape.
///
/// Heuristic: the larger axis is taken as time and the smaller as classes.
/// Glyph strips produce many more steps than a handful of characters, and
/// far fewer classes than steps only holds the other way for very short
/// strips against very large alphabets. This is a working heuristic, not a
/// proof; it can misclassify when T and C are close in magnitude, and no
/// stronger signal is available from the model output alone. Ties resolve
/// to time-major.
pub fn resolve_layout(shape: &[usize]) -> Result<TensorLayout, OcrError> {
    let dims: &[usize] = match shape {
        [1, d0, d1] => &[*d0, *d1],
        [d0, d1] => &[*d0, *d1],
        other => {
            return Err(OcrError::invalid_input(format!(
                "recognition output must be 2-D or [1, d0, d1], got shape {other:?}"
            )));
        }
    };
    let (d0, d1) = (dims[0], dims[1]);
    if d0 == 0 || d1 == 0 {
        return Err(OcrError::invalid_input(format!(
            "recognition output has an empty axis: {shape:?}"
        )));
    }

    let time_major = d0 >= d1;
    Ok(TensorLayout {
        time_steps: d0.max(d1),
        classes: d0.min(d1),
        time_major,
    })
}

/// Infers the blank class index from class count and dictionary length.
///
/// A model exporting one extra class relative to the dictionary puts the
/// blank last; otherwise the blank sits at index 0.
pub fn blank_index(classes: usize, dictionary_len: usize) -> usize {
    if classes == dictionary_len + 1 {
        classes - 1
    } else {
        0
    }
}

/// Decodes a recognition output tensor against a dictionary.
///
/// Applies greedy argmax per time step, collapses CTC-style (a step is
/// dropped when its index repeats the previous step's index, and blank
/// steps are dropped), then maps surviving indices through the dictionary.
/// An index outside the dictionary yields an empty glyph, never an error.
pub fn decode(logits: &ArrayD<f32>, dictionary: &Dictionary) -> Result<DecodedSequence, OcrError> {
    let matrix = to_matrix(logits)?;
    let layout = resolve_layout(&[matrix.shape()[0], matrix.shape()[1]])?;
    let blank = blank_index(layout.classes, dictionary.len());

    let mut indices = Vec::new();
    let mut kept_scores = Vec::new();
    let mut prev_step: Option<usize> = None;

    for t in 0..layout.time_steps {
        let (idx, score) = argmax_step(&matrix, layout.time_major, t);
        let repeat = prev_step == Some(idx);
        prev_step = Some(idx);
        if repeat || idx == blank {
            continue;
        }
        indices.push(idx);
        kept_scores.push(score);
    }

    let text: String = indices
        .iter()
        .map(|&idx| dictionary.get(idx).unwrap_or(""))
        .collect();

    let confidence = if kept_scores.is_empty() {
        0.0
    } else {
        kept_scores.iter().sum::<f32>() / kept_scores.len() as f32
    };

    Ok(DecodedSequence {
        text,
        indices,
        confidence,
    })
}

/// Reduces the raw output to a 2-D matrix, dropping a unit batch axis.
fn to_matrix(logits: &ArrayD<f32>) -> Result<Tensor2D, OcrError> {
    let view = match logits.ndim() {
        2 => logits.view(),
        3 if logits.shape()[0] == 1 => logits.index_axis(Axis(0), 0),
        _ => {
            return Err(OcrError::invalid_input(format!(
                "recognition output must be 2-D or [1, d0, d1], got shape {:?}",
                logits.shape()
            )));
        }
    };
    Ok(view.to_owned().into_dimensionality::<ndarray::Ix2>()?)
}

/// Argmax over the class axis for one time step.
fn argmax_step(matrix: &Tensor2D, time_major: bool, t: usize) -> (usize, f32) {
    let classes = if time_major {
        matrix.shape()[1]
    } else {
        matrix.shape()[0]
    };
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for c in 0..classes {
        let v = if time_major {
            matrix[[t, c]]
        } else {
            matrix[[c, t]]
        };
        if v > best {
            best = v;
            best_idx = c;
        }
    }
    (best_idx, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn dict(labels: &[&str]) -> Dictionary {
        Dictionary::from_labels(labels.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    /// Builds a [T, C] logits tensor whose argmax sequence is `steps`.
    fn logits_for(steps: &[usize], classes: usize) -> ArrayD<f32> {
        let mut arr = ArrayD::<f32>::zeros(ndarray::IxDyn(&[steps.len(), classes]));
        for (t, &idx) in steps.iter().enumerate() {
            arr[[t, idx]] = 1.0;
        }
        arr
    }

    #[test]
    fn test_ctc_collapse_with_blank_zero() {
        // Six classes against a six-entry dictionary: blank stays at 0.
        let d = dict(&["a", "b", "c", "d", "e", "f"]);
        let logits = logits_for(&[2, 2, 0, 3, 3, 3, 0, 5], 6);
        let out = decode(&logits, &d).unwrap();
        assert_eq!(out.indices, vec![2, 3, 5]);
        assert_eq!(out.text, "cdf");
    }

    #[test]
    fn test_blank_last_when_one_extra_class() {
        let d = dict(&["x", "y", "z"]);
        // Four classes for a three-entry dictionary: blank is index 3.
        let logits = logits_for(&[0, 3, 0, 1, 3, 3, 2], 4);
        let out = decode(&logits, &d).unwrap();
        assert_eq!(out.indices, vec![0, 0, 1, 2]);
        assert_eq!(out.text, "xxyz");
    }

    #[test]
    fn test_repeat_separated_by_blank_is_kept_twice() {
        let d = dict(&["a", "b"]);
        // Blank last (3 classes): a, blank, a, blank collapses to "aa".
        let logits = logits_for(&[0, 2, 0, 2], 3);
        let out = decode(&logits, &d).unwrap();
        assert_eq!(out.text, "aa");
    }

    #[test]
    fn test_out_of_range_index_yields_empty_glyph() {
        // Five classes against a three-entry dictionary: blank at 0, and
        // index 4 has no label.
        let d = dict(&["a", "b", "c"]);
        let logits = logits_for(&[1, 1, 4, 4, 2, 2], 5);
        let out = decode(&logits, &d).unwrap();
        assert_eq!(out.indices, vec![1, 4, 2]);
        assert_eq!(out.text, "bc");
    }

    #[test]
    fn test_unit_batch_axis_is_dropped() {
        let d = dict(&["a", "b", "c", "d", "e", "f"]);
        let flat = logits_for(&[2, 2, 0, 3, 3, 0, 0], 6);
        let batched = flat.insert_axis(Axis(0));
        let out = decode(&batched, &d).unwrap();
        assert_eq!(out.indices, vec![2, 3]);
    }

    #[test]
    fn test_layout_heuristic_prefers_larger_axis_as_time() {
        let layout = resolve_layout(&[40, 7]).unwrap();
        assert_eq!(layout.time_steps, 40);
        assert_eq!(layout.classes, 7);
        assert!(layout.time_major);

        let layout = resolve_layout(&[7, 40]).unwrap();
        assert_eq!(layout.time_steps, 40);
        assert_eq!(layout.classes, 7);
        assert!(!layout.time_major);

        // Ties resolve to time-major.
        let layout = resolve_layout(&[5, 5]).unwrap();
        assert!(layout.time_major);
    }

    #[test]
    fn test_class_major_tensor_decodes_identically() {
        let d = dict(&["a", "b", "c", "d", "e", "f"]);
        let tm = logits_for(&[2, 2, 0, 3, 3, 3, 0, 5], 6);
        let cm = tm
            .view()
            .into_dimensionality::<ndarray::Ix2>()
            .unwrap()
            .t()
            .to_owned()
            .into_dyn();
        assert_eq!(decode(&tm, &d).unwrap(), decode(&cm, &d).unwrap());
    }

    #[test]
    fn test_all_blank_input_decodes_to_empty() {
        let d = dict(&["a", "b"]);
        let logits = logits_for(&[0, 0, 0, 0], 2);
        let out = decode(&logits, &d).unwrap();
        assert!(out.text.is_empty());
        assert!(out.indices.is_empty());
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        let d = dict(&["a"]);
        let t = ArrayD::<f32>::zeros(ndarray::IxDyn(&[2, 3, 4]));
        assert!(decode(&t, &d).is_err());
        assert!(resolve_layout(&[0, 5]).is_err());
        assert!(resolve_layout(&[1, 2, 3, 4]).is_err());
    }
}
