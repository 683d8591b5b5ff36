//! Helpers shared by the integration test crates.
#![allow(dead_code, reason = "each test crate uses a different subset")]

use std::path::PathBuf;

use provisional_dx::{
    DiagnosisEngine, EngineConfig, PaddingType, ReferenceCatalog, Vocabulary, model::Artefact,
    tests::support::affinity_backend,
};

/// Number of classes in `causes_tokenizer.json`, reserved ids included.
pub const DIAGNOSIS_CLASSES: usize = 6;

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[must_use]
pub fn fixture_vocabulary(name: &str) -> Vocabulary {
    Vocabulary::load(&fixture_path(name)).unwrap_or_else(|e| panic!("load {name}: {e}"))
}

#[must_use]
pub fn fixture_catalog() -> ReferenceCatalog {
    ReferenceCatalog::load(&fixture_path("catalog.json"))
        .unwrap_or_else(|e| panic!("load catalog: {e}"))
}

#[must_use]
pub fn fixture_config(max_len: usize, padding: PaddingType) -> EngineConfig {
    let mut config = EngineConfig::new(
        Artefact::new(fixture_path("model.onnx")),
        Artefact::new(fixture_path("symptoms_tokenizer.json")),
        Artefact::new(fixture_path("causes_tokenizer.json")),
        max_len,
    );
    config.padding_type = padding;
    config
}

/// Engine over the fixture vocabularies and catalog with a deterministic
/// stand-in model.
#[must_use]
pub fn fixture_engine(config: EngineConfig) -> DiagnosisEngine {
    let schema = fixture_catalog()
        .feature_schema()
        .unwrap_or_else(|e| panic!("schema: {e}"));
    DiagnosisEngine::from_parts(
        config,
        fixture_vocabulary("symptoms_tokenizer.json"),
        fixture_vocabulary("causes_tokenizer.json"),
        affinity_backend(DIAGNOSIS_CLASSES),
        schema,
    )
    .unwrap_or_else(|e| panic!("engine: {e}"))
}
