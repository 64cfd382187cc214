use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::classifier::Sample;

/// A validated pH / TDS pair. Both values are finite; no physical range is
/// enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub ph: f64,
    pub tds: f64,
}

impl Reading {
    pub fn as_sample(&self) -> Sample {
        [self.ph, self.tds]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Ph,
    Tds,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Ph => "pH",
            Field::Tds => "TDS",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{} value is required", .0.as_str())]
    MissingInput(Field),
    #[error("{} value must be numeric", .0.as_str())]
    NotNumeric(Field),
}

/// Raw form input: a string as typed into a form, a JSON number, or any
/// other JSON value, which can never be a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

fn parse_value(raw: Option<&RawValue>, field: Field) -> Result<f64, ValidationError> {
    let value = match raw {
        None => return Err(ValidationError::MissingInput(field)),
        Some(RawValue::Number(value)) => *value,
        Some(RawValue::Other(_)) => return Err(ValidationError::NotNumeric(field)),
        Some(RawValue::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(ValidationError::MissingInput(field));
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| ValidationError::NotNumeric(field))?
        }
    };

    if !value.is_finite() {
        return Err(ValidationError::NotNumeric(field));
    }
    Ok(value)
}

pub fn parse_reading(
    raw_ph: Option<&RawValue>,
    raw_tds: Option<&RawValue>,
) -> Result<Reading, ValidationError> {
    let ph = parse_value(raw_ph, Field::Ph)?;
    let tds = parse_value(raw_tds, Field::Tds)?;
    Ok(Reading { ph, tds })
}
