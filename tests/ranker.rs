//! Ranking distributions against the fixture diagnosis vocabulary.

mod support;

use proptest::prelude::*;
use provisional_dx::{PredictError, PredictionDistribution, Vocabulary, rank};
use rstest::rstest;
use support::{approx_eq, fixture_vocabulary};

fn causes() -> Vocabulary {
    fixture_vocabulary("causes_tokenizer.json")
}

#[rstest]
fn labels_follow_descending_confidence() {
    let distribution =
        PredictionDistribution::from_scores(vec![0.0, 0.05, 0.15, 0.5, 0.1, 0.2]);
    let ranked = rank(&distribution, &causes(), Some(3)).unwrap_or_else(|e| panic!("rank: {e}"));
    let labels: Vec<&str> = ranked.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, ["influenza", "gastritis", "pneumonia"]);
    assert!(approx_eq(ranked[0].confidence, 0.5, 1e-6));
}

#[rstest]
#[case(5)]
#[case(7)]
fn class_count_mismatch_is_reported(#[case] classes: usize) {
    let distribution = PredictionDistribution::from_scores(vec![1.0 / 8.0; classes]);
    match rank(&distribution, &causes(), None) {
        Err(PredictError::DistributionMismatch(error)) => {
            assert_eq!(error.expected, 6);
            assert_eq!(error.actual, classes);
        }
        other => panic!("expected a mismatch, got {other:?}"),
    }
}

fn distribution() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(0_u16..1000, 6).prop_map(|weights| {
        let total = f32::from(weights.iter().sum::<u16>().max(1));
        weights.iter().map(|w| f32::from(*w) / total).collect()
    })
}

proptest! {
    #[test]
    fn ranking_is_a_sorted_permutation(scores in distribution()) {
        let vocabulary = causes();
        let ranked = rank(&PredictionDistribution::from_scores(scores.clone()), &vocabulary, None)
            .unwrap_or_else(|e| panic!("rank: {e}"));
        prop_assert_eq!(ranked.len(), scores.len());
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
        let mut labels: Vec<&str> = ranked.iter().map(|d| d.label.as_str()).collect();
        labels.sort_unstable();
        let mut expected: Vec<&str> = (0..vocabulary.len())
            .map(|id| vocabulary.decode(id).unwrap_or_else(|e| panic!("decode: {e}")))
            .collect();
        expected.sort_unstable();
        prop_assert_eq!(labels, expected);
    }

    #[test]
    fn top_k_is_a_prefix_of_the_full_ranking(scores in distribution(), k in 0_usize..10) {
        let vocabulary = causes();
        let distribution = PredictionDistribution::from_scores(scores);
        let full = rank(&distribution, &vocabulary, None).unwrap_or_else(|e| panic!("rank: {e}"));
        let top = rank(&distribution, &vocabulary, Some(k)).unwrap_or_else(|e| panic!("rank: {e}"));
        prop_assert_eq!(top.len(), k.min(full.len()));
        prop_assert_eq!(top.as_slice(), &full[..top.len()]);
    }
}
