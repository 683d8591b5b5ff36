//! Engine configuration and its serialisation.
//!
//! An [`EngineConfig`] is resolved once before the engine is built and is
//! never mutated afterwards. Several engines with different configurations
//! may coexist in one process.

use serde::{Deserialize, Serialize};

use crate::{
    encoder::{PaddingType, SequenceEncoder},
    errors::ConfigError,
    model::{Artefact, ModelIo, OutputActivation},
};

/// Separator token inserted between symptom fields unless configured.
pub const DEFAULT_SEPARATOR: &str = "|";

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_owned()
}

/// Immutable configuration for a [`crate::DiagnosisEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Trained classifier graph.
    pub model: Artefact,
    /// Tokenizer for symptom and investigation tokens.
    pub symptoms_tokeniser: Artefact,
    /// Tokenizer whose ids label the model's output classes.
    pub causes_tokeniser: Artefact,
    /// Token marking the boundary between symptom fields.
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub padding_type: PaddingType,
    /// Model input length; must be greater than zero.
    pub max_len: usize,
    /// Number of diagnoses to return; all classes when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub model_io: ModelIo,
    #[serde(default)]
    pub activation: OutputActivation,
}

impl EngineConfig {
    /// Creates a configuration with default separator, padding, model IO
    /// and activation.
    #[must_use]
    pub fn new(
        model: Artefact,
        symptoms_tokeniser: Artefact,
        causes_tokeniser: Artefact,
        max_len: usize,
    ) -> Self {
        Self {
            model,
            symptoms_tokeniser,
            causes_tokeniser,
            separator: default_separator(),
            padding_type: PaddingType::default(),
            max_len,
            top_k: None,
            model_io: ModelIo::default(),
            activation: OutputActivation::default(),
        }
    }

    /// Ensure the configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_len` or `top_k` is zero, the
    /// separator is blank, or the model IO layout is unsupported.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, ConfigError> {
        self.encoder()?;
        if self.top_k == Some(0) {
            return Err(ConfigError::ZeroTopK);
        }
        self.model_io.validate()?;
        Ok(self)
    }

    /// Builds the sequence encoder described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_len` is zero or the separator is
    /// blank.
    pub fn encoder(&self) -> Result<SequenceEncoder, ConfigError> {
        SequenceEncoder::new(self.separator.clone(), self.padding_type, self.max_len)
    }
}
