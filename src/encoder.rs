//! Dictionary-style feature encoder.
//!
//! Mirrors a fitted dictionary vectorizer: string-valued features become
//! one-hot columns named `<field><separator><value>`, numeric features map to
//! the column named after the field.

use crate::errors::{PredictError, PredictResult};
use crate::features::{FeatureValue, FeatureVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do with a categorical level the encoder was not fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategories {
    #[default]
    Ignore,
    Error,
}

fn default_separator() -> String {
    "=".to_string()
}

/// On-disk form of the encoder artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSpec {
    pub feature_names: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub unknown_categories: UnknownCategories,
}

/// Sparse encoded row; entries are sorted by column.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub n_features: usize,
    pub entries: Vec<(usize, f64)>,
}

impl EncodedRow {
    /// Value of a column, zero when absent.
    pub fn get(&self, column: usize) -> f64 {
        self.entries
            .binary_search_by_key(&column, |(c, _)| *c)
            .map(|i| self.entries[i].1)
            .unwrap_or(0.0)
    }
}

/// Fitted encoder with its vocabulary index.
#[derive(Debug, Clone)]
pub struct DictVectorizer {
    spec: EncoderSpec,
    vocabulary: HashMap<String, usize>,
}

impl DictVectorizer {
    pub fn new(spec: EncoderSpec) -> Result<Self, String> {
        if spec.feature_names.is_empty() {
            return Err("encoder has no feature names".to_string());
        }
        if spec.separator.is_empty() {
            return Err("encoder separator is empty".to_string());
        }

        let mut vocabulary = HashMap::with_capacity(spec.feature_names.len());
        for (idx, name) in spec.feature_names.iter().enumerate() {
            if vocabulary.insert(name.clone(), idx).is_some() {
                return Err(format!("duplicate feature name '{name}'"));
            }
        }

        Ok(Self { spec, vocabulary })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let spec: EncoderSpec =
            serde_json::from_slice(bytes).map_err(|e| format!("invalid encoder JSON: {e}"))?;
        Self::new(spec)
    }

    pub fn n_features(&self) -> usize {
        self.spec.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.spec.feature_names
    }

    pub fn unknown_categories(&self) -> UnknownCategories {
        self.spec.unknown_categories
    }

    /// Encode one feature vector into the model's input columns.
    pub fn transform(&self, features: &FeatureVector) -> PredictResult<EncodedRow> {
        let mut entries = Vec::with_capacity(2);

        for (name, value) in features.entries() {
            match value {
                FeatureValue::Categorical(level) => {
                    let column = format!("{name}{}{level}", self.spec.separator);
                    match self.vocabulary.get(&column) {
                        Some(&idx) => entries.push((idx, 1.0)),
                        None => match self.spec.unknown_categories {
                            UnknownCategories::Ignore => {}
                            UnknownCategories::Error => {
                                return Err(PredictError::inference(format!(
                                    "unseen category '{level}' for feature '{name}'"
                                )))
                            }
                        },
                    }
                }
                FeatureValue::Numeric(x) => {
                    if let Some(&idx) = self.vocabulary.get(name) {
                        entries.push((idx, x));
                    }
                }
            }
        }

        entries.sort_by_key(|(c, _)| *c);
        Ok(EncodedRow {
            n_features: self.n_features(),
            entries,
        })
    }
}
