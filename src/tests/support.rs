//! Deterministic stand-ins for trained artefacts.

use crate::{
    encoder::TokenSequence,
    errors::InferenceError,
    model::{AuxFeatures, InferenceBackend},
    vocab::{PADDING_TOKEN, Vocabulary},
};

/// Unknown token used by [`vocabulary`].
pub const UNKNOWN_TOKEN: &str = "<unk>";

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

/// Builds a vocabulary of `<pad>` (id 0), `<unk>` (id 1) and then `tokens`
/// in order.
///
/// # Panics
///
/// Panics if `tokens` repeats a value or a reserved token.
#[must_use]
pub fn vocabulary(tokens: &[&str]) -> Vocabulary {
    let table = [PADDING_TOKEN, UNKNOWN_TOKEN]
        .iter()
        .chain(tokens)
        .map(|token| (*token).to_owned())
        .collect();
    Vocabulary::new(table, 0, 1).unwrap_or_else(|e| panic!("test vocabulary: {e}"))
}

/// Toy classifier over `classes` classes.
///
/// Every class starts with a score of one; each non-padding token id `t`
/// adds one to class `t % classes`. Scores are then normalised. Inputs with
/// no real tokens yield the uniform distribution. Padding must use id `0`.
#[must_use]
pub fn affinity_backend(classes: usize) -> impl InferenceBackend {
    move |tokens: &TokenSequence, _: &AuxFeatures| -> Result<Vec<f32>, InferenceError> {
        if classes == 0 {
            return Err(InferenceError::EmptyDistribution);
        }
        let mut counts = vec![1_u32; classes];
        for id in tokens.ids().iter().filter(|id| **id != 0) {
            if let Some(count) = counts.get_mut(*id as usize % classes) {
                *count += 1;
            }
        }
        let total = counts.iter().sum::<u32>();
        #[expect(
            clippy::float_arithmetic,
            clippy::cast_precision_loss,
            reason = "normalising small integer counts"
        )]
        let scores = counts
            .iter()
            .map(|count| *count as f32 / total as f32)
            .collect();
        Ok(scores)
    }
}
