//! CLI argument types and layered configuration for the `pdx` binary.
//! Loads from CLI args, environment (prefix `PDX_`), and optional config
//! files.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::path::PathBuf;

use crate::{
    config::EngineConfig,
    errors::ConfigError,
    model::{Artefact, TensorElement},
};

/// Command-line arguments for the `pdx` binary.
///
/// Every engine setting may also come from a `PDX_`-prefixed environment
/// variable (`PDX_MODEL_FILE`, `PDX_SYMPTOMS_SEQUENCE_MAXLEN`, ...) or a
/// TOML configuration file. Artefact settings are optional here so that
/// partial sources can be layered; [`PdxArgs::engine_config`] reports any
/// that remain unset.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use provisional_dx::cli::PdxArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = PdxArgs::load_from_iter(["pdx", "--dry-run=true"])
///     .expect("load args from CLI iterator");
/// assert!(args.dry_run);
/// ```
///
/// Load from a configuration file:
/// ```
/// use provisional_dx::cli::PdxArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "symptoms_sequence_maxlen = 24").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = PdxArgs::load_from_iter(["pdx", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.symptoms_sequence_maxlen, Some(24));
/// ```
#[derive(Debug, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "PDX")]
pub struct PdxArgs {
    /// Trained classifier graph (ONNX).
    pub model_file: Option<PathBuf>,
    /// Expected SHA-256 of the model file.
    pub model_sha256: Option<String>,
    /// Tokenizer for symptom and investigation tokens.
    pub symptoms_tokeniser_file: Option<PathBuf>,
    pub symptoms_tokeniser_sha256: Option<String>,
    /// Tokenizer labelling the diagnosis classes.
    pub causes_tokeniser_file: Option<PathBuf>,
    pub causes_tokeniser_sha256: Option<String>,
    /// JSON reference catalog with genders, age groups and advice.
    pub reference_file: Option<PathBuf>,
    /// Token inserted between symptom fields.
    pub symptoms_separator: Option<String>,
    /// `pre` or `post`.
    pub symptoms_sequence_padding_type: Option<String>,
    /// Model input length.
    pub symptoms_sequence_maxlen: Option<usize>,
    /// Number of diagnoses to report.
    pub top_k: Option<usize>,
    /// Comma-separated ONNX input names: tokens, then gender, then age.
    pub model_inputs: Option<String>,
    /// ONNX output holding the class scores.
    pub model_output: Option<String>,
    /// `probabilities` or `softmax`.
    pub activation: Option<String>,

    /// Feed float32 tensors instead of int64.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub model_float_inputs: bool,

    /// Log at debug level.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub debug_mode: bool,

    /// Load and verify artefacts without predicting.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub dry_run: bool,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl PdxArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed("PDX_"))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PDX_"))
            .extract()
            .map_err(Into::into)
    }

    /// Resolves the arguments into a validated engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required artefact path or the
    /// sequence length is unset, or any value is invalid.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let artefact = |path: &Option<PathBuf>, sha256: &Option<String>, name| {
            path.clone()
                .map(|path| Artefact {
                    path,
                    sha256: sha256.clone(),
                })
                .ok_or(ConfigError::Missing(name))
        };
        let max_len = self
            .symptoms_sequence_maxlen
            .ok_or(ConfigError::Missing("symptoms_sequence_maxlen"))?;
        let mut config = EngineConfig::new(
            artefact(&self.model_file, &self.model_sha256, "model_file")?,
            artefact(
                &self.symptoms_tokeniser_file,
                &self.symptoms_tokeniser_sha256,
                "symptoms_tokeniser_file",
            )?,
            artefact(
                &self.causes_tokeniser_file,
                &self.causes_tokeniser_sha256,
                "causes_tokeniser_file",
            )?,
            max_len,
        );
        if let Some(separator) = &self.symptoms_separator {
            config.separator.clone_from(separator);
        }
        if let Some(padding) = &self.symptoms_sequence_padding_type {
            config.padding_type = padding.parse()?;
        }
        config.top_k = self.top_k;
        if let Some(inputs) = &self.model_inputs {
            config.model_io.input_names = inputs
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(output) = &self.model_output {
            config.model_io.output_name.clone_from(output);
        }
        if self.model_float_inputs {
            config.model_io.element = TensorElement::Float32;
        }
        if let Some(activation) = &self.activation {
            config.activation = activation.parse()?;
        }
        config.validate()
    }
}
