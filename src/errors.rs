//! Error taxonomy for artefact loading, configuration and prediction.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load one of the engine's on-disk artefacts.
///
/// Always fatal at start-up: the engine must not serve predictions without
/// valid artefacts.
#[derive(Debug, Error)]
pub enum ArtefactLoadError {
    #[error("failed to read artefact at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artefact at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artefact at {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("artefact at {path} expected SHA-256 {expected} but found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[cfg(feature = "onnx")]
    #[error("failed to load tokenizer from {path}: {source}")]
    Tokenizer {
        path: PathBuf,
        #[source]
        source: tokenizers::Error,
    },
    #[cfg(feature = "onnx")]
    #[error("failed to create ONNX session from {path}: {source}")]
    Session {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },
    #[error("invalid configuration for {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// A token id with no entry in the vocabulary.
///
/// Signals that the vocabulary and model artefacts are out of sync.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("index {index} is outside vocabulary {origin} of {size} tokens")]
pub struct UnknownIndexError {
    pub index: usize,
    pub size: usize,
    pub origin: String,
}

/// The model emitted a different number of classes than the diagnosis
/// vocabulary holds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("distribution has {actual} classes but vocabulary {origin} holds {expected} labels")]
pub struct DistributionMismatchError {
    pub expected: usize,
    pub actual: usize,
    pub origin: String,
}

/// Caller-supplied auxiliary features the model cannot accept.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidFeatureError {
    #[error("gender \"{gender}\" is not one of {known:?}")]
    UnknownGender { gender: String, known: Vec<String> },
    #[error("age \"{age}\" does not map to a known age group")]
    UnknownAgeGroup { age: String },
    #[error("age {age} is not a valid number of years")]
    InvalidAge { age: f32 },
    #[error("token sequence has length {actual} but the model expects {expected}")]
    SequenceLength { expected: usize, actual: usize },
}

/// Failures raised while running the model or validating its output.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[cfg(feature = "onnx")]
    #[error("failed to convert model input \"{name}\" into a tensor: {source}")]
    Tensor {
        name: String,
        #[source]
        source: ort::Error,
    },
    #[cfg(feature = "onnx")]
    #[error("failed to run inference: {0}")]
    Run(#[source] ort::Error),
    #[error("model output \"{name}\" missing from session results")]
    OutputMissing { name: String },
    #[error("inference session was poisoned by a previous panic")]
    SessionPoisoned,
    #[error("model produced an empty distribution")]
    EmptyDistribution,
    #[error("class {index} has invalid score {value}")]
    InvalidScore { index: usize, value: f32 },
    #[error("class scores sum to {sum} instead of 1")]
    NotNormalised { sum: f32 },
}

/// Errors returned by a single prediction call.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    InvalidFeature(#[from] InvalidFeatureError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    UnknownIndex(#[from] UnknownIndexError),
    #[error(transparent)]
    DistributionMismatch(#[from] DistributionMismatchError),
}

impl PredictError {
    /// Whether the error indicates broken artefacts rather than a bad request.
    ///
    /// Only [`PredictError::InvalidFeature`] is recoverable: the caller may
    /// correct the request. Every other variant means the deployment is
    /// inconsistent and the host should stop serving predictions.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidFeature(_))
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_len must be greater than 0")]
    ZeroMaxLen,
    #[error("separator must not be blank")]
    EmptySeparator,
    #[error("top_k must be greater than 0 when set")]
    ZeroTopK,
    #[error("unknown padding type \"{0}\" (expected \"pre\" or \"post\")")]
    UnknownPaddingType(String),
    #[error("unknown activation \"{0}\" (expected \"probabilities\" or \"softmax\")")]
    UnknownActivation(String),
    #[error("model must declare between 1 and 3 input names but found {0}")]
    ModelInputCount(usize),
    #[error("reference list {list} is empty")]
    EmptyReferenceList { list: &'static str },
    #[error("reference list {list} contains \"{value}\" more than once")]
    DuplicateReference { list: &'static str, value: String },
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PredictError::from(InvalidFeatureError::InvalidAge { age: -1.0 }), false)]
    #[case(PredictError::from(InferenceError::EmptyDistribution), true)]
    #[case(
        PredictError::from(UnknownIndexError { index: 9, size: 3, origin: "causes".into() }),
        true
    )]
    #[case(
        PredictError::from(DistributionMismatchError { expected: 5, actual: 6, origin: "causes".into() }),
        true
    )]
    fn fatality_follows_taxonomy(#[case] error: PredictError, #[case] fatal: bool) {
        assert_eq!(error.is_fatal(), fatal);
    }

    #[test]
    fn unknown_index_names_origin() {
        let error = UnknownIndexError {
            index: 7,
            size: 5,
            origin: "/models/causes.json".into(),
        };
        assert_eq!(
            error.to_string(),
            "index 7 is outside vocabulary /models/causes.json of 5 tokens"
        );
    }
}
