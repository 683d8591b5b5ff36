//! Regenerates `tests/golden/traces.jsonl` from the fixture artefacts.

use provisional_dx::{
    DiagnosisEngine, DiagnosisPredictor, EngineConfig, PaddingType, PredictionTrace,
    ReferenceCatalog, SymptomInput, Vocabulary, model::Artefact,
    tests::support::affinity_backend,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const FIXTURES: &str = "tests/fixtures";
const MAX_LEN: usize = 10;

#[derive(Deserialize, Serialize)]
struct GoldenTrace {
    id: u32,
    input: SymptomInput,
    trace: PredictionTrace,
}

fn fixture_engine() -> Result<DiagnosisEngine, Box<dyn std::error::Error>> {
    let fixtures = Path::new(FIXTURES);
    let mut config = EngineConfig::new(
        Artefact::new(fixtures.join("model.onnx")),
        Artefact::new(fixtures.join("symptoms_tokenizer.json")),
        Artefact::new(fixtures.join("causes_tokenizer.json")),
        MAX_LEN,
    );
    config.padding_type = PaddingType::Pre;
    let symptoms = Vocabulary::load(&config.symptoms_tokeniser.path)?;
    let causes = Vocabulary::load(&config.causes_tokeniser.path)?;
    let schema = ReferenceCatalog::load(&fixtures.join("catalog.json"))?.feature_schema()?;
    let classes = causes.len();
    Ok(DiagnosisEngine::from_parts(
        config,
        symptoms,
        causes,
        affinity_backend(classes),
        schema,
    )?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = PathBuf::from("tests/golden/traces.jsonl");
    let engine = fixture_engine()?;
    let reader = BufReader::new(File::open(&path)?);
    let mut traces = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let gt: GoldenTrace = serde_json::from_str(&line)?;
        let trace = engine.trace(&gt.input)?;
        traces.push(GoldenTrace {
            id: gt.id,
            input: gt.input,
            trace,
        });
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    for t in traces {
        serde_json::to_writer(&mut writer, &t)?;
        writeln!(&mut writer)?;
    }
    Ok(())
}
