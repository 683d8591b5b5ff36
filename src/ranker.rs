//! Turns a class distribution into labelled diagnoses ordered by confidence.

use tracing::debug;

use crate::{
    api::RankedDiagnosis,
    errors::{DistributionMismatchError, PredictError},
    model::PredictionDistribution,
    vocab::Vocabulary,
};

/// Ranks every class of `distribution` by descending confidence.
///
/// Classes with identical confidence keep ascending index order. With
/// `top_k` set, only the first `top_k` entries are returned (or every class
/// when fewer exist).
///
/// # Errors
///
/// Returns [`PredictError::DistributionMismatch`] when the distribution
/// length differs from the vocabulary size. The distribution is never
/// padded or truncated to fit.
///
/// # Examples
///
/// ```
/// use provisional_dx::{PredictionDistribution, Vocabulary, rank};
///
/// let labels = ["<pad>", "<unk>", "asthma", "influenza"].map(String::from).to_vec();
/// let vocabulary = Vocabulary::new(labels, 0, 1).expect("vocabulary");
/// let distribution = PredictionDistribution::from_scores(vec![0.0, 0.1, 0.3, 0.6]);
/// let ranked = rank(&distribution, &vocabulary, Some(2)).expect("rank");
/// assert_eq!(ranked[0].label, "influenza");
/// assert_eq!(ranked[1].label, "asthma");
/// ```
pub fn rank(
    distribution: &PredictionDistribution,
    vocabulary: &Vocabulary,
    top_k: Option<usize>,
) -> Result<Vec<RankedDiagnosis>, PredictError> {
    if distribution.len() != vocabulary.len() {
        return Err(DistributionMismatchError {
            expected: vocabulary.len(),
            actual: distribution.len(),
            origin: vocabulary.origin().to_owned(),
        }
        .into());
    }

    let scores = distribution.scores();
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // Stable sort keeps ascending index order among equal scores. Signed
    // zeros compare equal.
    let score = |index: usize| match scores.get(index).copied() {
        Some(value) if value == 0.0 => 0.0,
        Some(value) => value,
        None => f32::NEG_INFINITY,
    };
    order.sort_by(|a, b| score(*b).total_cmp(&score(*a)));

    let limit = top_k.map_or(order.len(), |k| k.min(order.len()));
    let ranked = order
        .into_iter()
        .take(limit)
        .map(|index| {
            let confidence = scores.get(index).copied().unwrap_or_default();
            vocabulary.decode(index).map(|label| RankedDiagnosis {
                label: label.to_owned(),
                confidence,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(top) = ranked.first() {
        debug!(
            label = %top.label,
            confidence = top.confidence,
            returned = ranked.len(),
            "ranked diagnoses"
        );
    }
    Ok(ranked)
}
