//! Configuration types for the model runtime.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, InferenceError};

/// Tolerance allowed when checking that class scores sum to one.
pub const NORMALISATION_TOLERANCE: f32 = 1e-3;

/// Names and element type of the ONNX graph's inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelIo {
    /// Ordered input names: the token sequence, then optionally the gender
    /// index, then optionally the age-group index.
    pub input_names: Vec<String>,
    /// Output holding one score per diagnosis class.
    pub output_name: String,
    /// Element type used for every input tensor.
    pub element: TensorElement,
}

impl Default for ModelIo {
    fn default() -> Self {
        Self {
            input_names: vec!["symptoms".to_owned()],
            output_name: "diagnoses".to_owned(),
            element: TensorElement::default(),
        }
    }
}

impl ModelIo {
    /// Ensures between one and three inputs are declared.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ModelInputCount`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.input_names.len() {
            1..=3 => Ok(()),
            count => Err(ConfigError::ModelInputCount(count)),
        }
    }
}

/// Element type of the model's input tensors.
///
/// Keras exports usually take `float32` token ids; graphs with explicit
/// embedding lookups take `int64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorElement {
    #[default]
    Int64,
    Float32,
}

/// How raw model outputs become a probability distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputActivation {
    /// The graph already ends in a softmax; scores are used as-is.
    #[default]
    Probabilities,
    /// The graph emits logits; a numerically stable softmax is applied.
    Softmax,
}

impl FromStr for OutputActivation {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "probabilities" => Ok(Self::Probabilities),
            "softmax" => Ok(Self::Softmax),
            _ => Err(ConfigError::UnknownActivation(value.to_owned())),
        }
    }
}

impl OutputActivation {
    /// Converts raw scores into a validated probability distribution.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] when scores are empty, non-finite,
    /// negative, or do not sum to one within [`NORMALISATION_TOLERANCE`].
    pub fn apply(self, mut scores: Vec<f32>) -> Result<Vec<f32>, InferenceError> {
        if scores.is_empty() {
            return Err(InferenceError::EmptyDistribution);
        }
        if let Some((index, value)) = scores
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(InferenceError::InvalidScore { index, value });
        }
        if self == Self::Softmax {
            softmax_in_place(&mut scores);
        }
        if let Some((index, value)) = scores
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| *value < 0.0)
        {
            return Err(InferenceError::InvalidScore { index, value });
        }
        for score in &mut scores {
            if *score == 0.0 {
                *score = 0.0;
            }
        }
        let sum = scores.iter().copied().sum::<f32>();
        #[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
        let off_by = (sum - 1.0).abs();
        if off_by > NORMALISATION_TOLERANCE {
            return Err(InferenceError::NotNormalised { sum });
        }
        Ok(scores)
    }
}

#[expect(clippy::float_arithmetic, reason = "softmax requires float operations")]
fn softmax_in_place(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    for score in scores.iter_mut() {
        *score = (*score - max).exp();
    }
    let total = scores.iter().copied().sum::<f32>();
    for score in scores.iter_mut() {
        *score /= total;
    }
}
