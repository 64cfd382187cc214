use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::Role;
use crate::prediction::QualityLabel;

/// Fixed-width RFC 3339 so that `ORDER BY created_at` sorts chronologically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_role(value: &str) -> Result<Role> {
    match value {
        "User" => Ok(Role::User),
        "Admin" => Ok(Role::Admin),
        other => Err(anyhow!("unknown user role {other}")),
    }
}

pub fn parse_label(value: String) -> QualityLabel {
    QualityLabel::from_name(&value).unwrap_or(QualityLabel::Unknown(value))
}
