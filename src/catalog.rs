//! Reference lists supplied by the document store collaborator.
//!
//! The catalog is a read-only JSON document holding the gender and
//! age-group lists the model was trained on, the symptom and investigation
//! lists offered to clinicians, and recommended follow-up per diagnosis.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{ArtefactLoadError, ConfigError},
    model::FeatureSchema,
};

/// Read-only reference lists.
///
/// # Examples
///
/// ```
/// use provisional_dx::ReferenceCatalog;
///
/// let catalog: ReferenceCatalog = serde_json::from_str(r#"{
///     "genders": ["female", "male"],
///     "age_groups": ["0-18", "18+"],
///     "advises": {"pneumonia": ["chest x-ray", "antibiotics"]}
/// }"#).expect("catalog");
/// assert_eq!(catalog.read_advises("Pneumonia"), ["chest x-ray", "antibiotics"]);
/// assert!(catalog.read_advises("migraine").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceCatalog {
    pub genders: Vec<String>,
    pub age_groups: Vec<String>,
    #[serde(default)]
    pub subjective_symptoms: Vec<String>,
    #[serde(default)]
    pub associated_symptoms: Vec<String>,
    #[serde(default)]
    pub investigations: Vec<String>,
    /// Recommended investigations and management keyed by diagnosis label.
    #[serde(default)]
    pub advises: BTreeMap<String, Vec<String>>,
}

impl ReferenceCatalog {
    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactLoadError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ArtefactLoadError> {
        let text = fs::read_to_string(path).map_err(|source| ArtefactLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Self =
            serde_json::from_str(&text).map_err(|source| ArtefactLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            genders = catalog.genders.len(),
            age_groups = catalog.age_groups.len(),
            advised_diagnoses = catalog.advises.len(),
            "loaded reference catalog"
        );
        Ok(catalog)
    }

    /// Builds the feature schema from the gender and age-group lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either list is empty or has duplicates.
    pub fn feature_schema(&self) -> Result<FeatureSchema, ConfigError> {
        FeatureSchema::new(&self.genders, &self.age_groups)
    }

    /// Recommended follow-up for `diagnosis`, matched case-insensitively.
    ///
    /// Unknown diagnoses have no advice.
    #[must_use]
    pub fn read_advises(&self, diagnosis: &str) -> &[String] {
        let wanted = diagnosis.trim();
        self.advises
            .get(wanted)
            .or_else(|| {
                self.advises
                    .iter()
                    .find(|(label, _)| label.eq_ignore_ascii_case(wanted))
                    .map(|(_, advice)| advice)
            })
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_reads_catalog_file() {
        let mut file = NamedTempFile::new().unwrap_or_else(|e| panic!("create temp file: {e}"));
        write!(
            file,
            r#"{{"genders": ["female"], "age_groups": ["18+"], "investigations": ["ecg"]}}"#
        )
        .unwrap_or_else(|e| panic!("write catalog: {e}"));
        let catalog =
            ReferenceCatalog::load(file.path()).unwrap_or_else(|e| panic!("load catalog: {e}"));
        assert_eq!(catalog.investigations, vec!["ecg".to_owned()]);
        assert!(catalog.feature_schema().is_ok());
    }

    #[test]
    fn load_reports_path_of_invalid_catalog() {
        let mut file = NamedTempFile::new().unwrap_or_else(|e| panic!("create temp file: {e}"));
        write!(file, "{{\"genders\": 3}}").unwrap_or_else(|e| panic!("write catalog: {e}"));
        match ReferenceCatalog::load(file.path()) {
            Err(ArtefactLoadError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn empty_gender_list_is_a_config_error() {
        let catalog = ReferenceCatalog {
            age_groups: vec!["18+".into()],
            ..ReferenceCatalog::default()
        };
        assert_eq!(
            catalog.feature_schema(),
            Err(ConfigError::EmptyReferenceList { list: "genders" })
        );
    }
}
