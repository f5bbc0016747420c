//! Job postings as produced by the posting-analysis step of the pipeline.
//!
//! Parsing is lenient: a posting that lacks fields, or carries
//! fields of the wrong type, is still a posting. It simply ends up with fewer
//! requirement phrases (possibly none, in which case the ranker skips it).

use serde_json::{Map, Value};
use thiserror::Error;

pub const ANALYSIS_KEY: &str = "analise";
pub const REFERENCE_KEY: &str = "referencia";
pub const MANDATORY_KEY: &str = "requisitos_obrigatorios";
pub const DESIRABLE_KEY: &str = "requisitos_desejaveis";
pub const CODE_KEY: &str = "Code";
pub const COMPANY_KEY: &str = "Company";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid input format: expected a list of postings or a single posting object, got {0}")]
    InvalidFormat(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobPosting {
    /// `referencia.Code` verbatim (string, number or null), `""` when absent.
    pub code: Value,
    /// Reference metadata (company, link, ...), passed through untouched.
    pub reference: Map<String, Value>,
    pub mandatory: Vec<String>,
    pub desirable: Vec<String>,
}

impl JobPosting {
    pub fn from_value(value: &Value) -> Self {
        let reference = value
            .get(REFERENCE_KEY)
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let code = reference
            .get(CODE_KEY)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));

        let analysis = value.get(ANALYSIS_KEY);

        Self {
            code,
            reference,
            mandatory: string_list(analysis, MANDATORY_KEY),
            desirable: string_list(analysis, DESIRABLE_KEY),
        }
    }

    /// Mandatory requirements followed by desirable ones, original order kept.
    pub fn requirements(&self) -> Vec<String> {
        self.mandatory
            .iter()
            .chain(self.desirable.iter())
            .cloned()
            .collect()
    }

    pub fn company(&self) -> Option<&str> {
        self.reference.get(COMPANY_KEY).and_then(|v| v.as_str())
    }

    /// Human-readable code for log lines.
    pub fn code_label(&self) -> String {
        match &self.code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

fn string_list(analysis: Option<&Value>, key: &str) -> Vec<String> {
    analysis
        .and_then(|a| a.get(key))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Normalizes a payload into postings: a list maps element-wise, a single
/// object becomes a one-element list.
pub fn parse_postings(value: &Value) -> Result<Vec<JobPosting>, InputError> {
    match value {
        Value::Array(items) => Ok(items.iter().map(JobPosting::from_value).collect()),
        Value::Object(_) => Ok(vec![JobPosting::from_value(value)]),
        Value::Null => Err(InputError::InvalidFormat("null")),
        Value::Bool(_) => Err(InputError::InvalidFormat("a boolean")),
        Value::Number(_) => Err(InputError::InvalidFormat("a number")),
        Value::String(_) => Err(InputError::InvalidFormat("a string")),
    }
}
