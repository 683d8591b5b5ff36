//! Fixed-length token sequences built from symptom inputs.
//!
//! The three textual fields are concatenated in a fixed order (subjective
//! symptoms, associated symptoms, investigations) because the model was
//! trained on that ordering. A separator token marks each boundary between
//! non-empty fields. Ids are then padded or truncated to exactly `max_len`
//! on the side named by the [`PaddingType`].

use std::{collections::HashSet, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{api::SymptomInput, errors::ConfigError, vocab::Vocabulary};

/// Side on which padding is inserted and from which overflow is dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingType {
    /// Pad before the real tokens; drop the earliest tokens on overflow.
    #[default]
    Pre,
    /// Pad after the real tokens; drop the latest tokens on overflow.
    Post,
}

impl FromStr for PaddingType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            _ => Err(ConfigError::UnknownPaddingType(value.to_owned())),
        }
    }
}

/// Token ids of exactly the configured model input length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSequence {
    ids: Vec<u32>,
}

impl TokenSequence {
    #[must_use]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<u32>> for TokenSequence {
    fn from(ids: Vec<u32>) -> Self {
        Self { ids }
    }
}

impl From<TokenSequence> for Vec<u32> {
    fn from(sequence: TokenSequence) -> Self {
        sequence.ids
    }
}

/// Encodes symptom inputs into model-ready token sequences.
///
/// # Examples
///
/// ```
/// use provisional_dx::{Age, PaddingType, SequenceEncoder, SymptomInput, Vocabulary};
///
/// let tokens = ["<pad>", "<unk>", "fever", "cough", "|", "chest x-ray"]
///     .map(String::from)
///     .to_vec();
/// let vocabulary = Vocabulary::new(tokens, 0, 1).expect("vocabulary");
/// let encoder = SequenceEncoder::new("|", PaddingType::Post, 6).expect("encoder");
/// let input = SymptomInput::new("female", Age::Group("30-40".into()))
///     .with_subjective_symptoms(["fever", "cough"])
///     .with_investigations_done(["chest x-ray"]);
/// assert_eq!(encoder.encode(&input, &vocabulary).ids(), &[2, 3, 4, 5, 0, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEncoder {
    separator: String,
    padding: PaddingType,
    max_len: usize,
}

impl SequenceEncoder {
    /// Creates an encoder.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `max_len` is zero or the separator is
    /// blank.
    pub fn new(
        separator: impl Into<String>,
        padding: PaddingType,
        max_len: usize,
    ) -> Result<Self, ConfigError> {
        let separator = separator.into();
        if separator.trim().is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        if max_len == 0 {
            return Err(ConfigError::ZeroMaxLen);
        }
        Ok(Self {
            separator,
            padding,
            max_len,
        })
    }

    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    #[must_use]
    pub fn padding(&self) -> PaddingType {
        self.padding
    }

    /// Concatenates the textual fields into the ordered token list.
    ///
    /// Entries are trimmed; blank entries and repeats within a field are
    /// skipped. Two entries repeat when `vocabulary` maps them to the same
    /// lookup key, so `"Fever"` and `"fever"` collapse under a case-folding
    /// vocabulary. The separator sits between consecutive non-empty fields.
    #[must_use]
    pub fn tokens<'a>(
        &'a self,
        input: &'a SymptomInput,
        vocabulary: &Vocabulary,
    ) -> Vec<&'a str> {
        let fields = [
            &input.subjective_symptoms,
            &input.associated_symptoms,
            &input.investigations_done,
        ];
        let mut tokens = Vec::new();
        for field in fields {
            let mut seen = HashSet::new();
            let entries: Vec<&str> = field
                .iter()
                .map(|entry| entry.trim())
                .filter(|entry| !entry.is_empty() && seen.insert(vocabulary.normalise(*entry)))
                .collect();
            if entries.is_empty() {
                continue;
            }
            if !tokens.is_empty() {
                tokens.push(self.separator.as_str());
            }
            tokens.extend(entries);
        }
        tokens
    }

    /// Encodes `input` into exactly `max_len` ids.
    ///
    /// Unknown tokens become the vocabulary's unknown id; an input with no
    /// tokens yields a sequence made entirely of padding ids.
    #[must_use]
    pub fn encode(&self, input: &SymptomInput, vocabulary: &Vocabulary) -> TokenSequence {
        let ids: Vec<u32> = self
            .tokens(input, vocabulary)
            .into_iter()
            .map(|token| vocabulary.encode(token))
            .collect();
        let unknown = ids
            .iter()
            .filter(|id| **id == vocabulary.unknown_id())
            .count();
        debug!(tokens = ids.len(), unknown, "encoded symptom input");
        self.fit(ids, vocabulary.padding_id())
    }

    /// Pads or truncates `ids` to `max_len` on the configured side.
    #[must_use]
    pub fn fit(&self, mut ids: Vec<u32>, padding_id: u32) -> TokenSequence {
        let count = ids.len();
        if count > self.max_len {
            let dropped = count - self.max_len;
            warn!(
                tokens = count,
                max_len = self.max_len,
                dropped,
                padding = ?self.padding,
                "truncating token sequence"
            );
            match self.padding {
                PaddingType::Pre => {
                    ids.drain(..dropped);
                }
                PaddingType::Post => ids.truncate(self.max_len),
            }
            return TokenSequence::from(ids);
        }

        let pads = std::iter::repeat_n(padding_id, self.max_len - count);
        let fitted = match self.padding {
            PaddingType::Pre => pads.chain(ids).collect(),
            PaddingType::Post => ids.into_iter().chain(pads).collect(),
        };
        TokenSequence { ids: fitted }
    }
}
