//! ONNX Runtime backend.

use std::{borrow::Cow, fmt, sync::Mutex};

use ort::{
    session::{Session, SessionInputValue},
    value::TensorRef,
};
use tracing::info;

use super::{
    artefact::Artefact,
    backend::InferenceBackend,
    config::{ModelIo, TensorElement},
    features::AuxFeatures,
};
use crate::{
    encoder::TokenSequence,
    errors::{ArtefactLoadError, InferenceError},
};

/// Diagnosis classifier executed by ONNX Runtime.
///
/// The session needs exclusive access while running, so calls serialise on
/// an internal mutex.
pub struct OnnxBackend {
    session: Mutex<Session>,
    io: ModelIo,
}

impl fmt::Debug for OnnxBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxBackend")
            .field("io", &self.io)
            .finish_non_exhaustive()
    }
}

impl OnnxBackend {
    /// Verifies the model artefact and opens an inference session.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactLoadError`] when the checksum does not match, the
    /// IO layout is invalid, or ONNX Runtime cannot load the graph.
    pub fn load(model: &Artefact, io: ModelIo) -> Result<Self, ArtefactLoadError> {
        io.validate().map_err(|source| ArtefactLoadError::Config {
            path: model.path.clone(),
            source,
        })?;
        model.verify()?;
        let session_error = |source| ArtefactLoadError::Session {
            path: model.path.clone(),
            source,
        };
        let session = Session::builder()
            .map_err(session_error)?
            .commit_from_file(&model.path)
            .map_err(session_error)?;
        info!(
            path = %model.path.display(),
            inputs = ?io.input_names,
            output = %io.output_name,
            "loaded ONNX model"
        );
        Ok(Self {
            session: Mutex::new(session),
            io,
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(
        &self,
        tokens: &TokenSequence,
        features: &AuxFeatures,
    ) -> Result<Vec<f32>, InferenceError> {
        #[expect(
            clippy::cast_possible_wrap,
            reason = "reference list indices are far below i64::MAX"
        )]
        let columns: [Vec<i64>; 3] = [
            tokens.ids().iter().map(|id| i64::from(*id)).collect(),
            vec![features.gender as i64],
            vec![features.age_group as i64],
        ];

        let mut inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
            Vec::with_capacity(self.io.input_names.len());
        let floats: Vec<Vec<f32>> = match self.io.element {
            TensorElement::Int64 => Vec::new(),
            #[expect(
                clippy::cast_precision_loss,
                reason = "token ids and indices stay well inside f32's exact range"
            )]
            TensorElement::Float32 => columns
                .iter()
                .map(|column| column.iter().map(|value| *value as f32).collect())
                .collect(),
        };

        for (position, name) in self.io.input_names.iter().enumerate() {
            let tensor_error = |source| InferenceError::Tensor {
                name: name.clone(),
                source,
            };
            let value: SessionInputValue<'_> = match self.io.element {
                TensorElement::Int64 => {
                    let column = columns.get(position).map(Vec::as_slice).unwrap_or_default();
                    TensorRef::from_array_view(([1_usize, column.len()], column))
                        .map_err(tensor_error)?
                        .into()
                }
                TensorElement::Float32 => {
                    let column = floats.get(position).map(Vec::as_slice).unwrap_or_default();
                    TensorRef::from_array_view(([1_usize, column.len()], column))
                        .map_err(tensor_error)?
                        .into()
                }
            };
            inputs.push((Cow::Borrowed(name.as_str()), value));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::SessionPoisoned)?;
        let outputs = session.run(inputs).map_err(InferenceError::Run)?;
        let output = outputs
            .get(self.io.output_name.as_str())
            .ok_or_else(|| InferenceError::OutputMissing {
                name: self.io.output_name.clone(),
            })?;
        let (_, scores) = output
            .try_extract_tensor::<f32>()
            .map_err(InferenceError::Run)?;
        Ok(scores.to_vec())
    }
}
