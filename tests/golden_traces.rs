mod support;

use provisional_dx::{DiagnosisPredictor, PaddingType, PredictionTrace, SymptomInput};
use serde::Deserialize;
use serde_json::from_str;
use std::error::Error;
use support::{approx_eq, fixture_config, fixture_engine};

const TRACES_JSONL: &str = include_str!("golden/traces.jsonl");

#[derive(Deserialize)]
struct GoldenTrace {
    id: u32,
    input: SymptomInput,
    trace: PredictionTrace,
}

#[test]
fn golden_traces() -> Result<(), Box<dyn Error>> {
    let engine = fixture_engine(fixture_config(10, PaddingType::Pre));
    for line in TRACES_JSONL.lines() {
        let expected: GoldenTrace = from_str(line)?;
        let actual = engine.trace(&expected.input)?;
        assert_eq!(actual.tokens, expected.trace.tokens, "tokens for id {}", expected.id);
        assert_eq!(
            actual.sequence, expected.trace.sequence,
            "sequence for id {}",
            expected.id
        );
        let labels = |trace: &PredictionTrace| {
            trace
                .diagnoses
                .iter()
                .map(|d| d.label.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(labels(&actual), labels(&expected.trace), "labels for id {}", expected.id);
        for (got, want) in actual.diagnoses.iter().zip(&expected.trace.diagnoses) {
            assert!(
                approx_eq(got.confidence, want.confidence, 1e-6),
                "confidence of {} for id {}: {} != {}",
                got.label,
                expected.id,
                got.confidence,
                want.confidence,
            );
        }
    }
    Ok(())
}
