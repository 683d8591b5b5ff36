//! Categorical auxiliary features: gender and age group.
//!
//! Gender and age never enter the token sequence. They are resolved against
//! the reference lists into indices and fed to the model alongside it.

use std::collections::HashSet;

use crate::{
    api::Age,
    errors::{ConfigError, InvalidFeatureError},
};

/// Indices of the caller's gender and age group in the reference lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuxFeatures {
    pub gender: usize,
    pub age_group: usize,
}

/// An age-group label and the span of years it covers, if the label has
/// a recognisable numeric shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeGroup {
    label: String,
    span: Option<(f32, f32)>,
}

impl AgeGroup {
    /// Parses a label such as `"30-40"`, `"60+"` or `"<5"`.
    ///
    /// Ranges are half-open: `"30-40"` covers `30 <= age < 40`. Labels with
    /// no numeric shape (for example `"adult"`) match by name only.
    ///
    /// # Examples
    ///
    /// ```
    /// use provisional_dx::model::AgeGroup;
    ///
    /// let group = AgeGroup::parse("30-40");
    /// assert!(group.contains(30.0));
    /// assert!(!group.contains(40.0));
    /// assert!(AgeGroup::parse("60+").contains(97.0));
    /// ```
    #[must_use]
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        Self {
            label: trimmed.to_owned(),
            span: parse_span(trimmed),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether `years` falls inside this group's span.
    #[must_use]
    pub fn contains(&self, years: f32) -> bool {
        self.span
            .is_some_and(|(lower, upper)| years >= lower && years < upper)
    }
}

fn parse_span(label: &str) -> Option<(f32, f32)> {
    let number = |text: &str| text.trim().parse::<f32>().ok().filter(|v| v.is_finite());
    if let Some(lower) = label.strip_suffix('+') {
        return number(lower).map(|lower| (lower, f32::INFINITY));
    }
    if let Some(upper) = label.strip_prefix('<') {
        return number(upper).map(|upper| (0.0, upper));
    }
    let (lower, upper) = label.split_once('-')?;
    match (number(lower), number(upper)) {
        (Some(lower), Some(upper)) if lower < upper => Some((lower, upper)),
        _ => None,
    }
}

/// Known genders and age groups the model was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    genders: Vec<String>,
    age_groups: Vec<AgeGroup>,
}

impl FeatureSchema {
    /// Builds a schema from the gender and age-group reference lists.
    ///
    /// List order defines the indices passed to the model.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either list is empty or holds a value
    /// twice (compared case-insensitively).
    pub fn new<G, A>(genders: G, age_groups: A) -> Result<Self, ConfigError>
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let genders: Vec<String> = genders
            .into_iter()
            .map(|gender| gender.as_ref().trim().to_owned())
            .collect();
        let age_groups: Vec<AgeGroup> = age_groups
            .into_iter()
            .map(|label| AgeGroup::parse(label.as_ref()))
            .collect();
        ensure_distinct("genders", genders.iter().map(String::as_str))?;
        ensure_distinct("age_groups", age_groups.iter().map(AgeGroup::label))?;
        Ok(Self {
            genders,
            age_groups,
        })
    }

    #[must_use]
    pub fn genders(&self) -> &[String] {
        &self.genders
    }

    #[must_use]
    pub fn age_groups(&self) -> &[AgeGroup] {
        &self.age_groups
    }

    /// Resolves a caller's gender and age into reference-list indices.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFeatureError`] when the gender is not listed, the
    /// age matches no group, or a numeric age is negative or non-finite.
    pub fn resolve(&self, gender: &str, age: &Age) -> Result<AuxFeatures, InvalidFeatureError> {
        let gender_index = self
            .genders
            .iter()
            .position(|known| known.eq_ignore_ascii_case(gender.trim()))
            .ok_or_else(|| InvalidFeatureError::UnknownGender {
                gender: gender.to_owned(),
                known: self.genders.clone(),
            })?;
        let age_group = self.age_group_index(age)?;
        Ok(AuxFeatures {
            gender: gender_index,
            age_group,
        })
    }

    fn age_group_index(&self, age: &Age) -> Result<usize, InvalidFeatureError> {
        match age {
            Age::Years(years) => self.group_for_years(*years),
            Age::Group(label) => {
                let trimmed = label.trim();
                if let Some(index) = self
                    .age_groups
                    .iter()
                    .position(|group| group.label.eq_ignore_ascii_case(trimmed))
                {
                    return Ok(index);
                }
                match trimmed.parse::<f32>() {
                    Ok(years) => self.group_for_years(years),
                    Err(_) => Err(InvalidFeatureError::UnknownAgeGroup {
                        age: label.clone(),
                    }),
                }
            }
        }
    }

    fn group_for_years(&self, years: f32) -> Result<usize, InvalidFeatureError> {
        if !years.is_finite() || years < 0.0 {
            return Err(InvalidFeatureError::InvalidAge { age: years });
        }
        self.age_groups
            .iter()
            .position(|group| group.contains(years))
            .ok_or_else(|| InvalidFeatureError::UnknownAgeGroup {
                age: years.to_string(),
            })
    }
}

fn ensure_distinct<'a>(
    list: &'static str,
    values: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let mut empty = true;
    for value in values {
        empty = false;
        if !seen.insert(value.to_ascii_lowercase()) {
            return Err(ConfigError::DuplicateReference {
                list,
                value: value.to_owned(),
            });
        }
    }
    if empty {
        Err(ConfigError::EmptyReferenceList { list })
    } else {
        Ok(())
    }
}
