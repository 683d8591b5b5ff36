use crate::{encoder::TokenSequence, errors::InferenceError};

use super::features::AuxFeatures;

/// Executes a trained classifier over one encoded input.
///
/// Implementations return one raw score per diagnosis class, in diagnosis
/// vocabulary id order. They must be deterministic and free of side effects
/// so that concurrent callers observe identical results for identical
/// inputs.
///
/// Closures with the matching signature implement the trait, which keeps
/// test doubles short:
///
/// ```
/// use provisional_dx::{InferenceBackend, InferenceError, TokenSequence, model::AuxFeatures};
///
/// let uniform = |_: &TokenSequence, _: &AuxFeatures| -> Result<Vec<f32>, InferenceError> {
///     Ok(vec![0.5, 0.5])
/// };
/// let sequence = TokenSequence::from(vec![0, 0]);
/// let features = AuxFeatures { gender: 0, age_group: 0 };
/// assert_eq!(uniform.run(&sequence, &features).unwrap(), vec![0.5, 0.5]);
/// ```
pub trait InferenceBackend: Send + Sync {
    /// Run the model.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] when the underlying runtime fails.
    fn run(&self, tokens: &TokenSequence, features: &AuxFeatures)
    -> Result<Vec<f32>, InferenceError>;
}

impl<F> InferenceBackend for F
where
    F: Fn(&TokenSequence, &AuxFeatures) -> Result<Vec<f32>, InferenceError> + Send + Sync,
{
    fn run(
        &self,
        tokens: &TokenSequence,
        features: &AuxFeatures,
    ) -> Result<Vec<f32>, InferenceError> {
        self(tokens, features)
    }
}
