//! Token vocabularies loaded from serialised tokenizer artefacts.
//!
//! A [`Vocabulary`] is a dense, bidirectional mapping between token strings
//! and ids. Two reserved ids exist: the padding id fills sequences up to a
//! fixed length and the unknown id stands in for tokens the vocabulary has
//! never seen. Vocabularies are immutable after construction.
//!
//! Two artefact formats are understood:
//! - Keras `Tokenizer.to_json()` documents. Id `0` is reserved for padding,
//!   `oov_token` names the unknown token and `num_words` caps usable ids.
//! - Hugging Face `tokenizer.json` documents with a `WordLevel` model
//!   (requires the `onnx` feature).

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    errors::{ArtefactLoadError, UnknownIndexError},
    model::Artefact,
};

/// Token placed at id `0` of Keras vocabularies, which reserve that id for
/// padding without naming it.
pub const PADDING_TOKEN: &str = "<pad>";

/// Origin reported for vocabularies built in memory.
const IN_MEMORY: &str = "<in-memory>";

/// Structural problems with a token table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("vocabulary holds no tokens")]
    Empty,
    #[error("token \"{token}\" appears at both id {first} and id {second}")]
    DuplicateToken { token: String, first: u32, second: u32 },
    #[error("id {id} is assigned to both \"{first}\" and \"{second}\"")]
    DuplicateId { id: u32, first: String, second: String },
    #[error("ids are not contiguous: id {missing} has no token")]
    Gap { missing: usize },
    #[error("{name} id {id} is outside a vocabulary of {size} tokens")]
    ReservedOutOfRange {
        name: &'static str,
        id: u32,
        size: usize,
    },
    #[error("{name} token \"{token}\" is not in the vocabulary")]
    MissingReserved { name: &'static str, token: String },
    #[error("vocabulary of {0} tokens does not fit in u32 ids")]
    TooLarge(usize),
}

/// Immutable token/id mapping with reserved padding and unknown ids.
///
/// # Examples
///
/// ```
/// use provisional_dx::Vocabulary;
///
/// let tokens = ["<pad>", "<unk>", "fever", "cough"].map(String::from).to_vec();
/// let vocabulary = Vocabulary::new(tokens, 0, 1).expect("valid vocabulary");
/// assert_eq!(vocabulary.encode("cough"), 3);
/// assert_eq!(vocabulary.encode("rash"), vocabulary.unknown_id());
/// assert_eq!(vocabulary.decode(2).expect("id in range"), "fever");
/// ```
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
    padding_id: u32,
    unknown_id: u32,
    lowercase: bool,
    origin: String,
}

impl Vocabulary {
    /// Builds a vocabulary where each token's id is its position in `tokens`.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError`] when `tokens` is empty, contains
    /// duplicates, or either reserved id is out of range.
    pub fn new(
        tokens: Vec<String>,
        padding_id: u32,
        unknown_id: u32,
    ) -> Result<Self, VocabularyError> {
        if tokens.is_empty() {
            return Err(VocabularyError::Empty);
        }
        let size = tokens.len();
        if u32::try_from(size).is_err() {
            return Err(VocabularyError::TooLarge(size));
        }
        for (name, id) in [("padding", padding_id), ("unknown", unknown_id)] {
            if id as usize >= size {
                return Err(VocabularyError::ReservedOutOfRange { name, id, size });
            }
        }

        let mut ids = HashMap::with_capacity(size);
        for (position, token) in (0_u32..).zip(&tokens) {
            if let Some(first) = ids.insert(token.clone(), position) {
                return Err(VocabularyError::DuplicateToken {
                    token: token.clone(),
                    first,
                    second: position,
                });
            }
        }

        Ok(Self {
            tokens,
            ids,
            padding_id,
            unknown_id,
            lowercase: false,
            origin: IN_MEMORY.to_owned(),
        })
    }

    /// Folds tokens to lowercase before lookup.
    #[must_use]
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    /// Records where the vocabulary came from for error reporting.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Loads a vocabulary from a tokenizer artefact on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactLoadError`] when the file is missing, unreadable,
    /// not JSON, or not a recognised token/id mapping.
    pub fn load(path: &Path) -> Result<Self, ArtefactLoadError> {
        let text = fs::read_to_string(path).map_err(|source| ArtefactLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| ArtefactLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let vocabulary = if document.get("class_name").is_some() {
            from_keras(path, document)?
        } else if document.get("model").is_some() {
            from_hugging_face(path, &text)?
        } else {
            return Err(malformed(path, "unrecognised tokenizer format"));
        };

        info!(
            path = %path.display(),
            tokens = vocabulary.len(),
            lowercase = vocabulary.lowercase,
            "loaded vocabulary"
        );
        Ok(vocabulary.with_origin(path.display().to_string()))
    }

    /// Verifies the artefact checksum, when one is pinned, then loads it.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactLoadError`] on checksum mismatch or any failure
    /// reported by [`Vocabulary::load`].
    pub fn load_artefact(artefact: &Artefact) -> Result<Self, ArtefactLoadError> {
        artefact.verify()?;
        Self::load(&artefact.path)
    }

    /// Returns the id of `token`, or the unknown id when it is absent.
    ///
    /// Surrounding whitespace is ignored.
    #[must_use]
    pub fn encode(&self, token: &str) -> u32 {
        let key = self.normalise(token);
        self.ids.get(key.as_ref()).copied().unwrap_or(self.unknown_id)
    }

    /// Lookup key for `token`: trimmed, and lowercased when the vocabulary
    /// folds case. Tokens with equal keys encode to the same id.
    #[must_use]
    pub fn normalise<'a>(&self, token: &'a str) -> Cow<'a, str> {
        let trimmed = token.trim();
        if self.lowercase {
            Cow::Owned(trimmed.to_lowercase())
        } else {
            Cow::Borrowed(trimmed)
        }
    }

    /// Returns the token stored at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownIndexError`] when `id` is outside the vocabulary.
    pub fn decode(&self, id: usize) -> Result<&str, UnknownIndexError> {
        self.tokens
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| UnknownIndexError {
                index: id,
                size: self.tokens.len(),
                origin: self.origin.clone(),
            })
    }

    /// Number of ids, reserved ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn padding_id(&self) -> u32 {
        self.padding_id
    }

    #[must_use]
    pub fn unknown_id(&self) -> u32 {
        self.unknown_id
    }

    /// Whether `label` names the padding or unknown token.
    #[must_use]
    pub fn is_reserved(&self, label: &str) -> bool {
        [self.padding_id, self.unknown_id]
            .iter()
            .any(|id| self.tokens.get(*id as usize).is_some_and(|token| token == label))
    }

    /// Path or label identifying where the vocabulary was loaded from.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[derive(Deserialize)]
struct KerasTokenizer {
    class_name: String,
    config: KerasConfig,
}

#[derive(Deserialize)]
struct KerasConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "keras_lower_default")]
    lower: bool,
    #[serde(default)]
    oov_token: Option<String>,
    word_index: Embedded<BTreeMap<String, u32>>,
}

fn keras_lower_default() -> bool {
    true
}

/// Keras stores nested maps as JSON-encoded strings; hand-written files
/// often inline them instead.
#[derive(Deserialize)]
#[serde(untagged)]
enum Embedded<T> {
    Text(String),
    Value(T),
}

fn from_keras(path: &Path, document: serde_json::Value) -> Result<Vocabulary, ArtefactLoadError> {
    let tokenizer: KerasTokenizer =
        serde_json::from_value(document).map_err(|source| ArtefactLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if tokenizer.class_name != "Tokenizer" {
        return Err(malformed(
            path,
            &format!("unsupported class_name \"{}\"", tokenizer.class_name),
        ));
    }
    let config = tokenizer.config;
    let mut word_index = match config.word_index {
        Embedded::Value(index) => index,
        Embedded::Text(text) => {
            serde_json::from_str(&text).map_err(|source| ArtefactLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    let Some(oov_token) = config.oov_token else {
        return Err(malformed(path, "tokenizer defines no oov_token"));
    };
    if let Some(limit) = config.num_words {
        word_index.retain(|_, id| (*id as usize) < limit);
    }
    if word_index.insert(PADDING_TOKEN.to_owned(), 0).is_some() {
        return Err(malformed(
            path,
            &format!("token \"{PADDING_TOKEN}\" clashes with the reserved padding id"),
        ));
    }

    let tokens = dense_table(word_index).map_err(|error| malformed(path, &error.to_string()))?;
    let unknown_id = position_of(&tokens, &oov_token, "unknown")
        .map_err(|error| malformed(path, &error.to_string()))?;
    Vocabulary::new(tokens, 0, unknown_id)
        .map(|vocabulary| vocabulary.with_lowercase(config.lower))
        .map_err(|error| malformed(path, &error.to_string()))
}

#[cfg(feature = "onnx")]
fn from_hugging_face(path: &Path, text: &str) -> Result<Vocabulary, ArtefactLoadError> {
    use std::str::FromStr;
    use tokenizers::{Tokenizer, models::ModelWrapper, normalizers::NormalizerWrapper};

    let tokenizer = Tokenizer::from_str(text).map_err(|source| ArtefactLoadError::Tokenizer {
        path: path.to_path_buf(),
        source,
    })?;
    let ModelWrapper::WordLevel(model) = tokenizer.get_model() else {
        return Err(malformed(path, "only WordLevel tokenizer models are supported"));
    };
    let Some(padding) = tokenizer.get_padding() else {
        return Err(malformed(path, "tokenizer does not configure padding"));
    };
    let lowercase = matches!(
        tokenizer.get_normalizer(),
        Some(NormalizerWrapper::Lowercase(_))
    );

    let tokens = dense_table(tokenizer.get_vocab(true))
        .map_err(|error| malformed(path, &error.to_string()))?;
    let unknown_id = position_of(&tokens, &model.unk_token, "unknown")
        .map_err(|error| malformed(path, &error.to_string()))?;
    Vocabulary::new(tokens, padding.pad_id, unknown_id)
        .map(|vocabulary| vocabulary.with_lowercase(lowercase))
        .map_err(|error| malformed(path, &error.to_string()))
}

#[cfg(not(feature = "onnx"))]
fn from_hugging_face(path: &Path, _text: &str) -> Result<Vocabulary, ArtefactLoadError> {
    Err(malformed(
        path,
        "Hugging Face tokenizers require the `onnx` feature",
    ))
}

/// Lays out a token index as an id-ordered table, rejecting gaps and
/// shared ids.
fn dense_table(
    index: impl IntoIterator<Item = (String, u32)>,
) -> Result<Vec<String>, VocabularyError> {
    let mut by_id: BTreeMap<u32, String> = BTreeMap::new();
    for (token, id) in index {
        if let Some(first) = by_id.insert(id, token.clone()) {
            return Err(VocabularyError::DuplicateId {
                id,
                first,
                second: token,
            });
        }
    }
    let mut tokens = Vec::with_capacity(by_id.len());
    for (expected, (id, token)) in by_id.into_iter().enumerate() {
        if id as usize != expected {
            return Err(VocabularyError::Gap { missing: expected });
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn position_of(tokens: &[String], token: &str, name: &'static str) -> Result<u32, VocabularyError> {
    tokens
        .iter()
        .position(|candidate| candidate == token)
        .and_then(|position| u32::try_from(position).ok())
        .ok_or_else(|| VocabularyError::MissingReserved {
            name,
            token: token.to_owned(),
        })
}

fn malformed(path: &Path, reason: &str) -> ArtefactLoadError {
    ArtefactLoadError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    }
}
