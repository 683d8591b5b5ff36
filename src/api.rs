use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoder::TokenSequence;

/// Patient age, either in years or as an age-group label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Years(f32),
    Group(String),
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Years(years) => write!(f, "{years}"),
            Self::Group(label) => f.write_str(label),
        }
    }
}

/// Structured symptom description for one prediction.
///
/// # Examples
///
/// ```
/// use provisional_dx::{Age, SymptomInput};
///
/// let input: SymptomInput = serde_json::from_str(
///     r#"{"subjective_symptoms": ["fever"], "gender": "female", "age": "30-40"}"#,
/// )
/// .expect("valid request");
/// assert_eq!(input.age, Age::Group("30-40".into()));
/// assert!(input.investigations_done.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymptomInput {
    #[serde(default)]
    pub subjective_symptoms: Vec<String>,
    #[serde(default)]
    pub associated_symptoms: Vec<String>,
    #[serde(default)]
    pub investigations_done: Vec<String>,
    pub gender: String,
    pub age: Age,
}

impl SymptomInput {
    /// Creates an input with no symptoms or investigations.
    #[must_use]
    pub fn new(gender: impl Into<String>, age: Age) -> Self {
        Self {
            subjective_symptoms: Vec::new(),
            associated_symptoms: Vec::new(),
            investigations_done: Vec::new(),
            gender: gender.into(),
            age,
        }
    }

    #[must_use]
    pub fn with_subjective_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjective_symptoms = symptoms.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_associated_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associated_symptoms = symptoms.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_investigations_done<I, S>(mut self, investigations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.investigations_done = investigations.into_iter().map(Into::into).collect();
        self
    }
}

/// A candidate diagnosis and the model's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDiagnosis {
    pub label: String,
    /// Probability in `[0, 1]`.
    pub confidence: f32,
}

/// Diagnostic record of one prediction: the tokens fed to the model and
/// the resulting ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTrace {
    pub tokens: Vec<String>,
    pub sequence: TokenSequence,
    pub diagnoses: Vec<RankedDiagnosis>,
}

/// Predicts provisional diagnoses from symptom inputs.
pub trait DiagnosisPredictor {
    /// Error type returned when prediction fails.
    type Error: std::error::Error + Send + Sync;

    /// Rank candidate diagnoses for `input`, most confident first.
    ///
    /// # Errors
    ///
    /// Returns an error if prediction fails.
    fn predict(&self, input: &SymptomInput) -> Result<Vec<RankedDiagnosis>, Self::Error>;

    /// Produce a diagnostic trace for `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if prediction fails.
    fn trace(&self, input: &SymptomInput) -> Result<PredictionTrace, Self::Error>;
}
