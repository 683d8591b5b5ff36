//! Core library entry point.
//! Re-exports public types and traits.
//!
//! Predicts provisional diagnoses from structured symptom descriptions:
//! symptom fields are encoded into a fixed-length token sequence, scored by
//! a pre-trained classifier, and ranked into labelled diagnoses.

pub mod api;
pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod errors;
pub mod model;
pub mod ranker;
pub mod vocab;

pub use api::{Age, DiagnosisPredictor, PredictionTrace, RankedDiagnosis, SymptomInput};
pub use catalog::ReferenceCatalog;
#[cfg(feature = "cli")]
pub use cli::PdxArgs;
pub use config::EngineConfig;
pub use encoder::{PaddingType, SequenceEncoder, TokenSequence};
pub use engine::{DiagnosisEngine, EngineSlot};
pub use errors::{
    ArtefactLoadError, ConfigError, DistributionMismatchError, InferenceError,
    InvalidFeatureError, PredictError, UnknownIndexError,
};
pub use model::{InferenceBackend, PredictionDistribution};
pub use ranker::rank;
pub use vocab::Vocabulary;

pub mod tests;
