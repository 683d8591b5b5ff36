//! End-to-end prediction: encode, infer, rank.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::{
    api::{Age, DiagnosisPredictor, PredictionTrace, RankedDiagnosis, SymptomInput},
    config::EngineConfig,
    encoder::{SequenceEncoder, TokenSequence},
    errors::{ConfigError, PredictError},
    model::{FeatureSchema, InferenceBackend, ModelRuntime},
    ranker::rank,
    vocab::Vocabulary,
};

/// Prediction engine over immutable, loaded artefacts.
///
/// Every call is pure computation over shared read-only state, so one
/// engine can serve any number of threads once built.
#[derive(Debug)]
pub struct DiagnosisEngine {
    encoder: SequenceEncoder,
    symptoms: Vocabulary,
    causes: Vocabulary,
    runtime: ModelRuntime,
    top_k: Option<usize>,
}

impl DiagnosisEngine {
    /// Assembles an engine from already-loaded components.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn from_parts(
        config: EngineConfig,
        symptoms: Vocabulary,
        causes: Vocabulary,
        backend: impl InferenceBackend + 'static,
        schema: FeatureSchema,
    ) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let encoder = config.encoder()?;
        let runtime = ModelRuntime::new(backend, schema, config.max_len, config.activation);
        Ok(Self {
            encoder,
            symptoms,
            causes,
            runtime,
            top_k: config.top_k,
        })
    }

    /// Loads every artefact named by `config` and builds an ONNX-backed
    /// engine.
    ///
    /// Blocking, one-time initialisation. Hosts that build the engine from
    /// several threads should go through an [`EngineSlot`].
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactLoadError`](crate::ArtefactLoadError) when the
    /// configuration is invalid or any artefact is missing, corrupt, or
    /// fails checksum verification.
    #[cfg(feature = "onnx")]
    pub fn load(
        config: EngineConfig,
        schema: FeatureSchema,
    ) -> Result<Self, crate::errors::ArtefactLoadError> {
        use crate::{errors::ArtefactLoadError, model::OnnxBackend};
        use tracing::info;

        let config_error = |source| ArtefactLoadError::Config {
            path: config.model.path.clone(),
            source,
        };
        let config = config.clone().validate().map_err(config_error)?;
        let symptoms = Vocabulary::load_artefact(&config.symptoms_tokeniser)?;
        let causes = Vocabulary::load_artefact(&config.causes_tokeniser)?;
        let backend = OnnxBackend::load(&config.model, config.model_io.clone())?;
        info!(
            symptom_tokens = symptoms.len(),
            diagnosis_classes = causes.len(),
            max_len = config.max_len,
            padding = ?config.padding_type,
            "diagnosis engine ready"
        );
        Self::from_parts(config, symptoms, causes, backend, schema).map_err(config_error)
    }

    #[must_use]
    pub fn encoder(&self) -> &SequenceEncoder {
        &self.encoder
    }

    #[must_use]
    pub fn symptoms_vocabulary(&self) -> &Vocabulary {
        &self.symptoms
    }

    #[must_use]
    pub fn causes_vocabulary(&self) -> &Vocabulary {
        &self.causes
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        self.runtime.schema()
    }

    /// Encodes `input` with the symptom vocabulary.
    #[must_use]
    pub fn encode(&self, input: &SymptomInput) -> TokenSequence {
        self.encoder.encode(input, &self.symptoms)
    }

    /// Predicts from the individual request fields.
    ///
    /// # Errors
    ///
    /// See [`DiagnosisPredictor::predict`].
    pub fn predict_fields<S: AsRef<str>>(
        &self,
        subjective_symptoms: &[S],
        associated_symptoms: &[S],
        investigations_done: &[S],
        gender: &str,
        age: Age,
    ) -> Result<Vec<RankedDiagnosis>, PredictError> {
        let owned = |values: &[S]| {
            values
                .iter()
                .map(|value| value.as_ref().to_owned())
                .collect::<Vec<_>>()
        };
        let input = SymptomInput::new(gender, age)
            .with_subjective_symptoms(owned(subjective_symptoms))
            .with_associated_symptoms(owned(associated_symptoms))
            .with_investigations_done(owned(investigations_done));
        self.predict(&input)
    }

    fn run(
        &self,
        sequence: &TokenSequence,
        input: &SymptomInput,
    ) -> Result<Vec<RankedDiagnosis>, PredictError> {
        let distribution = self.runtime.infer(sequence, &input.gender, &input.age)?;
        rank(&distribution, &self.causes, self.top_k)
    }
}

impl DiagnosisPredictor for DiagnosisEngine {
    type Error = PredictError;

    fn predict(&self, input: &SymptomInput) -> Result<Vec<RankedDiagnosis>, Self::Error> {
        let sequence = self.encode(input);
        let ranked = self.run(&sequence, input);
        match &ranked {
            Ok(diagnoses) => debug!(
                top = ?diagnoses.first().map(|diagnosis| diagnosis.label.as_str()),
                returned = diagnoses.len(),
                "predicted diagnoses"
            ),
            Err(error) => debug!(%error, fatal = error.is_fatal(), "prediction failed"),
        }
        ranked
    }

    fn trace(&self, input: &SymptomInput) -> Result<PredictionTrace, Self::Error> {
        let sequence = self.encode(input);
        let diagnoses = self.run(&sequence, input)?;
        let tokens = self
            .encoder
            .tokens(input, &self.symptoms)
            .into_iter()
            .map(str::to_owned)
            .collect();
        Ok(PredictionTrace {
            tokens,
            sequence,
            diagnoses,
        })
    }
}

/// Single-initialisation barrier for a shared engine.
///
/// The first caller of [`EngineSlot::get_or_try_init`] runs the loader while
/// others wait; later callers receive the same engine. A failed load leaves
/// the slot empty so the next caller retries.
#[derive(Debug, Default)]
pub struct EngineSlot {
    engine: Mutex<Option<Arc<DiagnosisEngine>>>,
}

impl EngineSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engine: Mutex::new(None),
        }
    }

    /// The engine, if initialisation has completed.
    #[must_use]
    pub fn get(&self) -> Option<Arc<DiagnosisEngine>> {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the engine, running `init` if no engine has been built yet.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `init`.
    pub fn get_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<DiagnosisEngine, E>,
    ) -> Result<Arc<DiagnosisEngine>, E> {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(init()?);
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::Artefact,
        tests::support::{affinity_backend, vocabulary},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(top_k: Option<usize>) -> DiagnosisEngine {
        let mut config = EngineConfig::new(
            Artefact::new("model.onnx"),
            Artefact::new("symptoms.json"),
            Artefact::new("causes.json"),
            6,
        );
        config.top_k = top_k;
        let schema = FeatureSchema::new(["female", "male"], ["0-40", "40+"])
            .unwrap_or_else(|e| panic!("schema: {e}"));
        DiagnosisEngine::from_parts(
            config,
            vocabulary(&["fever", "cough", "|", "rash"]),
            vocabulary(&["flu", "measles"]),
            affinity_backend(4),
            schema,
        )
        .unwrap_or_else(|e| panic!("engine: {e}"))
    }

    #[test]
    fn trace_reports_tokens_and_sequence() {
        let input = SymptomInput::new("male", Age::Years(12.0))
            .with_subjective_symptoms(["fever"])
            .with_associated_symptoms(["rash"]);
        let trace = engine(None)
            .trace(&input)
            .unwrap_or_else(|e| panic!("trace: {e}"));
        assert_eq!(trace.tokens, vec!["fever", "|", "rash"]);
        assert_eq!(trace.sequence.ids(), &[0, 0, 0, 2, 4, 5]);
        assert_eq!(trace.diagnoses.len(), 4);
    }

    #[test]
    fn top_k_limits_predictions() {
        let input = SymptomInput::new("female", Age::Years(30.0)).with_subjective_symptoms(["cough"]);
        let ranked = engine(Some(1))
            .predict(&input)
            .unwrap_or_else(|e| panic!("predict: {e}"));
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn predict_fields_matches_predict() {
        let engine = engine(None);
        let input = SymptomInput::new("female", Age::Years(30.0))
            .with_subjective_symptoms(["fever", "cough"])
            .with_investigations_done(["rash"]);
        let from_fields = engine
            .predict_fields(&["fever", "cough"], &[], &["rash"], "female", Age::Years(30.0))
            .unwrap_or_else(|e| panic!("predict_fields: {e}"));
        let from_input = engine
            .predict(&input)
            .unwrap_or_else(|e| panic!("predict: {e}"));
        assert_eq!(from_fields, from_input);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::new(
            Artefact::new("model.onnx"),
            Artefact::new("symptoms.json"),
            Artefact::new("causes.json"),
            0,
        );
        config.top_k = None;
        let schema = FeatureSchema::new(["female"], ["0-40"]).unwrap_or_else(|e| panic!("schema: {e}"));
        let result = DiagnosisEngine::from_parts(
            config,
            vocabulary(&["fever"]),
            vocabulary(&["flu"]),
            affinity_backend(3),
            schema,
        );
        assert!(matches!(result, Err(ConfigError::ZeroMaxLen)));
    }

    #[test]
    fn slot_initialises_once_across_threads() {
        let slot = EngineSlot::new();
        let loads = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    slot.get_or_try_init(|| {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, ConfigError>(engine(None))
                    })
                    .unwrap_or_else(|e| panic!("init: {e}"));
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(slot.get().is_some());
    }

    #[test]
    fn slot_retries_after_failed_init() {
        let slot = EngineSlot::new();
        let failed = slot.get_or_try_init(|| Err(ConfigError::ZeroMaxLen));
        assert!(failed.is_err());
        assert!(slot.get().is_none());
        let engine = slot
            .get_or_try_init(|| Ok::<_, ConfigError>(engine(None)))
            .unwrap_or_else(|e| panic!("init: {e}"));
        assert!(Arc::ptr_eq(&engine, &slot.get().unwrap_or_else(|| panic!("engine set"))));
    }
}
