//! Model runtime: artefacts, auxiliary features and inference backends.
mod artefact;
mod backend;
mod config;
mod features;
#[cfg(feature = "onnx")]
mod onnx;
mod runtime;

pub use artefact::{Artefact, compute_sha256};
pub use backend::InferenceBackend;
pub use config::{ModelIo, NORMALISATION_TOLERANCE, OutputActivation, TensorElement};
pub use features::{AgeGroup, AuxFeatures, FeatureSchema};
#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;
pub use runtime::{ModelRuntime, PredictionDistribution};
