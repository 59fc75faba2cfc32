use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PortalError;

const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Float(value) if !value.is_nan() => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            FieldValue::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                Some(*value as i64)
            }
            FieldValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn normalized(self) -> Self {
        match self {
            FieldValue::Float(value) if value.is_nan() => FieldValue::Null,
            FieldValue::Text(value) if value == "None" => FieldValue::Null,
            other => other,
        }
    }

    pub fn from_cell(raw: &str) -> Self {
        let cleaned = raw.replace('\u{00A0}', " ");
        let cell = cleaned.trim();
        if NA_MARKERS.contains(&cell) {
            return FieldValue::Null;
        }
        if let Ok(value) = cell.parse::<i64>() {
            return FieldValue::Integer(value);
        }
        if let Ok(value) = cell.parse::<f64>() {
            return FieldValue::Float(value).normalized();
        }
        FieldValue::Text(cell.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Float(value) if value.is_nan() => Ok(()),
            FieldValue::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                write!(f, "{value:.1}")
            }
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value).normalized()
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(FieldValue::as_i64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn normalize_values(self) -> Self {
        self.into_iter()
            .map(|(key, value)| (key, value.normalized()))
            .collect()
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Profession {
    Student,
    Researcher,
    Official,
    Fisherman,
    Other,
}

impl fmt::Display for Profession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profession::Student => write!(f, "Student"),
            Profession::Researcher => write!(f, "Researcher"),
            Profession::Official => write!(f, "Official"),
            Profession::Fisherman => write!(f, "Fisherman"),
            Profession::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
        });
        let trimmed = value.trim();
        if !pattern.is_match(trimmed) {
            return Err(PortalError::InvalidEmail(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub name: String,
    pub email: Email,
    pub role: Role,
}

impl RequestContext {
    pub fn new(name: impl Into<String>, email: Email, role: Role) -> Self {
        Self {
            name: name.into(),
            email,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), PortalError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PortalError::Forbidden)
        }
    }

    pub fn user_id(&self) -> String {
        let digest = md5::compute(self.email.as_str().as_bytes());
        let hex = format!("{digest:x}");
        format!("NCCR-{}", hex[..4].to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn cell_parsing() {
        assert_eq!(FieldValue::from_cell(" 28 "), FieldValue::Integer(28));
        assert_eq!(FieldValue::from_cell("7.85"), FieldValue::Float(7.85));
        assert_eq!(FieldValue::from_cell("NaN"), FieldValue::Null);
        assert_eq!(FieldValue::from_cell("None"), FieldValue::Null);
        assert_eq!(FieldValue::from_cell("\u{00A0}"), FieldValue::Null);
        assert_eq!(FieldValue::from_cell("Greenish"), FieldValue::text("Greenish"));
    }

    #[test]
    fn normalization_clears_nan_and_none_text() {
        assert_eq!(FieldValue::Float(f64::NAN).normalized(), FieldValue::Null);
        assert_eq!(FieldValue::text("None").normalized(), FieldValue::Null);
        assert_eq!(FieldValue::text("none").normalized(), FieldValue::text("none"));
    }

    #[test]
    fn display_matches_export_formatting() {
        assert_eq!(FieldValue::Float(28.0).to_string(), "28.0");
        assert_eq!(FieldValue::Float(7.25).to_string(), "7.25");
        assert_eq!(FieldValue::Null.to_string(), "");
    }

    #[test]
    fn parse_email() {
        let email: Email = " user@institute.edu ".parse().unwrap();
        assert_eq!(email.as_str(), "user@institute.edu");
        let err = "not-an-email".parse::<Email>().unwrap_err();
        assert_matches!(err, PortalError::InvalidEmail(_));
    }

    #[test]
    fn user_id_is_stable() {
        let ctx = RequestContext::new("Asha", "asha@example.org".parse().unwrap(), Role::User);
        let id = ctx.user_id();
        assert!(id.starts_with("NCCR-"));
        assert_eq!(id.len(), 9);
        assert_eq!(id, ctx.user_id());
    }

    #[test]
    fn record_json_round_trip() {
        let mut record = Record::new();
        record.insert("water_temp", 28.5);
        record.insert("location", "Marina");
        record.insert("ph", FieldValue::Null);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
