//! Validated inference over a pluggable backend.

use std::fmt;

use crate::{
    api::Age,
    encoder::TokenSequence,
    errors::{InvalidFeatureError, PredictError},
};

use super::{backend::InferenceBackend, config::OutputActivation, features::FeatureSchema};

/// Scores over diagnosis classes, aligned with diagnosis vocabulary ids.
///
/// Scores are finite, non-negative and sum to one within
/// [`NORMALISATION_TOLERANCE`](super::NORMALISATION_TOLERANCE).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionDistribution {
    scores: Box<[f32]>,
}

impl PredictionDistribution {
    /// Wraps raw scores without validation.
    ///
    /// Use [`OutputActivation::apply`] first when the scores come from an
    /// untrusted source; the ranker only checks the class count.
    #[must_use]
    pub fn from_scores(scores: Vec<f32>) -> Self {
        Self {
            scores: scores.into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Number of diagnosis classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Loaded model plus the input contract it was trained with.
pub struct ModelRuntime {
    backend: Box<dyn InferenceBackend>,
    schema: FeatureSchema,
    max_len: usize,
    activation: OutputActivation,
}

impl fmt::Debug for ModelRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRuntime")
            .field("schema", &self.schema)
            .field("max_len", &self.max_len)
            .field("activation", &self.activation)
            .finish_non_exhaustive()
    }
}

impl ModelRuntime {
    #[must_use]
    pub fn new(
        backend: impl InferenceBackend + 'static,
        schema: FeatureSchema,
        max_len: usize,
        activation: OutputActivation,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            schema,
            max_len,
            activation,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Produces a probability distribution over diagnosis classes.
    ///
    /// Pure and deterministic for a given backend: no state changes between
    /// calls.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::InvalidFeature`] when the sequence length is
    /// not `max_len` or gender/age are not in the reference lists, and
    /// [`PredictError::Inference`] when the backend fails or emits an
    /// invalid distribution.
    pub fn infer(
        &self,
        tokens: &TokenSequence,
        gender: &str,
        age: &Age,
    ) -> Result<PredictionDistribution, PredictError> {
        if tokens.len() != self.max_len {
            return Err(InvalidFeatureError::SequenceLength {
                expected: self.max_len,
                actual: tokens.len(),
            }
            .into());
        }
        let features = self.schema.resolve(gender, age)?;
        let raw = self.backend.run(tokens, &features)?;
        let scores = self.activation.apply(raw)?;
        Ok(PredictionDistribution::from_scores(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::InferenceError, model::AuxFeatures};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["female", "male"], ["0-40", "40+"])
            .unwrap_or_else(|e| panic!("schema: {e}"))
    }

    fn echo_features(_: &TokenSequence, features: &AuxFeatures) -> Result<Vec<f32>, InferenceError> {
        if features.gender == 1 && features.age_group == 1 {
            Ok(vec![0.0, 1.0])
        } else {
            Ok(vec![1.0, 0.0])
        }
    }

    #[test]
    fn forwards_resolved_features() {
        let runtime = ModelRuntime::new(echo_features, schema(), 3, OutputActivation::Probabilities);
        let tokens = TokenSequence::from(vec![1, 2, 0]);
        let distribution = runtime
            .infer(&tokens, "male", &Age::Years(52.0))
            .unwrap_or_else(|e| panic!("infer: {e}"));
        assert_eq!(distribution.scores(), &[0.0, 1.0]);
    }

    #[test]
    fn rejects_wrong_sequence_length_before_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        let counting = move |_: &TokenSequence, _: &AuxFeatures| -> Result<Vec<f32>, InferenceError> {
            observed.fetch_add(1, Ordering::Relaxed);
            Ok(vec![1.0])
        };
        let runtime = ModelRuntime::new(counting, schema(), 4, OutputActivation::Probabilities);
        let result = runtime.infer(&TokenSequence::from(vec![1, 2]), "female", &Age::Years(30.0));
        assert!(matches!(
            result,
            Err(PredictError::InvalidFeature(InvalidFeatureError::SequenceLength {
                expected: 4,
                actual: 2,
            }))
        ));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn rejects_unknown_gender_without_coercion() {
        let runtime = ModelRuntime::new(echo_features, schema(), 1, OutputActivation::Probabilities);
        let result = runtime.infer(&TokenSequence::from(vec![0]), "unknown", &Age::Years(30.0));
        assert!(matches!(
            result,
            Err(PredictError::InvalidFeature(InvalidFeatureError::UnknownGender { .. }))
        ));
    }

    #[test]
    fn surfaces_invalid_backend_output() {
        let broken = |_: &TokenSequence, _: &AuxFeatures| -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.7, 0.7])
        };
        let runtime = ModelRuntime::new(broken, schema(), 1, OutputActivation::Probabilities);
        let result = runtime.infer(&TokenSequence::from(vec![0]), "female", &Age::Years(30.0));
        assert!(matches!(
            result,
            Err(PredictError::Inference(InferenceError::NotNormalised { .. }))
        ));
    }
}
