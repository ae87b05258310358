//! The inference boundary of the pipeline.
//!
//! The numeric models are opaque collaborators: the pipeline hands an engine a
//! tensor and receives a set of named output tensors back. Engines are free to
//! wrap ONNX Runtime sessions, remote services, or plain closures in tests;
//! the pipeline never looks past this trait.

use crate::core::errors::OcrError;
use ndarray::{Array2, Array3, Array4, ArrayD, Axis};
use std::time::Duration;

/// A 2-dimensional tensor of f32 values.
pub type Tensor2D = Array2<f32>;
/// A 3-dimensional tensor of f32 values.
pub type Tensor3D = Array3<f32>;
/// A 4-dimensional tensor of f32 values (NCHW).
pub type Tensor4D = Array4<f32>;

/// Named output tensors produced by one inference call.
///
/// Insertion order is preserved, and [`NamedTensors::first`] is the
/// deterministic selection rule used when no output name has been pre-agreed
/// with the model provider.
#[derive(Debug, Clone, Default)]
pub struct NamedTensors {
    entries: Vec<(String, ArrayD<f32>)>,
}

impl NamedTensors {
    /// Creates an empty output set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an output set holding a single named tensor.
    pub fn single(name: impl Into<String>, tensor: ArrayD<f32>) -> Self {
        let mut out = Self::new();
        out.push(name, tensor);
        out
    }

    /// Appends a named tensor, keeping insertion order.
    pub fn push(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        self.entries.push((name.into(), tensor));
    }

    /// Returns the first entry in insertion order, if any.
    pub fn first(&self) -> Option<(&str, &ArrayD<f32>)> {
        self.entries.first().map(|(n, t)| (n.as_str(), t))
    }

    /// Looks a tensor up by output name.
    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Number of output tensors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the engine produced no outputs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An opaque numeric model invoked by the pipeline.
///
/// One engine instance is treated as a serialized resource: the orchestrator
/// never issues more than one in-flight call to the same instance, so
/// implementations do not need internal locking to satisfy the pipeline.
pub trait InferenceEngine: Send + Sync {
    /// Runs the model on the given input tensor.
    fn infer(&self, input: &Tensor4D) -> Result<NamedTensors, OcrError>;

    /// Runs the model with a caller-supplied timeout.
    ///
    /// The default implementation ignores the timeout; engines backed by a
    /// transport that supports deadlines may honor it.
    fn infer_with_timeout(
        &self,
        input: &Tensor4D,
        timeout: Option<Duration>,
    ) -> Result<NamedTensors, OcrError> {
        let _ = timeout;
        self.infer(input)
    }
}

impl<F> InferenceEngine for F
where
    F: Fn(&Tensor4D) -> Result<NamedTensors, OcrError> + Send + Sync,
{
    fn infer(&self, input: &Tensor4D) -> Result<NamedTensors, OcrError> {
        self(input)
    }
}

/// Reduces a tensor to 2-D by stripping leading unit axes.
///
/// Detection heatmaps arrive as `[H, W]`, `[1, H, W]` or `[1, 1, H, W]`
/// depending on the exporting toolchain; all collapse to the same map.
pub fn squeeze_to_2d(tensor: &ArrayD<f32>) -> Result<Tensor2D, OcrError> {
    let mut view = tensor.view();
    while view.ndim() > 2 && view.shape()[0] == 1 {
        view = view.index_axis_move(Axis(0), 0);
    }
    if view.ndim() != 2 {
        return Err(OcrError::invalid_input(format!(
            "cannot reduce tensor of shape {:?} to 2-D",
            tensor.shape()
        )));
    }
    let owned = view.to_owned().into_dimensionality::<ndarray::Ix2>()?;
    Ok(owned)
}
