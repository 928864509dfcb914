//! Lab report models.
//!
//! Reports arrive from a schemaless store, so [`ReportRecord::from_raw`] is a
//! total function: every field is optional and falls back to a default
//! instead of failing. Partially populated records must still render.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Serum markers offered by the report entry form, in display order.
pub const STANDARD_SERUM_PANEL: [&str; 9] = [
    "IgG", "IgG1", "IgG2", "IgG3", "IgG4", "IgA", "IgA1", "IgA2", "IgM",
];

/// A single marker measurement as entered on a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// Marker name (e.g., "IgG1")
    pub marker: String,
    /// Value exactly as entered; parsed only at evaluation time
    pub raw_value: String,
}

impl Measurement {
    /// Create a measurement.
    pub fn new(marker: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            raw_value: raw_value.into(),
        }
    }

    /// Parse the raw value as a decimal number.
    ///
    /// A comma decimal separator ("12,5") is accepted. Blank, non-numeric and
    /// non-finite values yield `None`.
    pub fn numeric_value(&self) -> Option<f64> {
        let trimmed = self.raw_value.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

/// One lab report for one patient visit.
///
/// Demographics are a snapshot taken at report time and are never
/// recomputed from a live patient profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    /// Storage-assigned identifier, immutable once persisted
    pub id: String,
    /// Patient reference (national ID string)
    pub patient_id: String,
    /// Patient full name at report time
    pub full_name: String,
    /// Date of birth, if known
    pub birth_date: Option<NaiveDate>,
    /// Age in years at report time
    pub age: u32,
    /// Gender label as entered (e.g., "Erkek", "Kadın")
    pub gender: String,
    /// Patient category (e.g., inpatient/outpatient)
    pub patient_type: String,
    /// Sample type (e.g., "Serum")
    pub sample_type: String,
    /// Report date as free text, `DD/MM/YYYY`
    pub report_date: String,
    /// Measurements in entry order; duplicate markers are kept
    pub measurements: Vec<Measurement>,
}

impl ReportRecord {
    /// Build a record from an untyped storage payload.
    ///
    /// Defaults: strings `""`, `age` `0`, `birth_date` `None`, `measurements`
    /// empty. `id` and `tcNumber`/`patientId` accept strings or numbers; `age`
    /// accepts integers, floats (truncated) and numeric strings; `birthDate`
    /// accepts `YYYY-MM-DD`, RFC 3339 and `DD/MM/YYYY`. Measurement entries
    /// come from `serumTypes` (or `measurements`) as `{type|marker, value}`
    /// objects; non-object entries are skipped. A non-object root yields the
    /// all-default record.
    pub fn from_raw(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::default();
        };

        Self {
            id: identifier_field(obj, &["id"]),
            patient_id: identifier_field(obj, &["tcNumber", "patientId"]),
            full_name: string_field(obj, &["fullName"]),
            birth_date: first_present(obj, &["birthDate"]).and_then(birth_date_value),
            age: first_present(obj, &["age"]).map(age_value).unwrap_or(0),
            gender: string_field(obj, &["gender"]),
            patient_type: string_field(obj, &["patientType"]),
            sample_type: string_field(obj, &["sampleType"]),
            report_date: string_field(obj, &["reportDate"]),
            measurements: first_present(obj, &["serumTypes", "measurements"])
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(measurement_value).collect())
                .unwrap_or_default(),
        }
    }

    /// Render the record in the storage layout read by [`Self::from_raw`].
    pub fn to_raw(&self) -> Value {
        json!({
            "id": self.id,
            "tcNumber": self.patient_id,
            "fullName": self.full_name,
            "birthDate": self.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "age": self.age,
            "gender": self.gender,
            "patientType": self.patient_type,
            "sampleType": self.sample_type,
            "reportDate": self.report_date,
            "serumTypes": measurements_to_raw(&self.measurements),
        })
    }

    /// The report date, if it parses as `DD/MM/YYYY`.
    pub fn parsed_report_date(&self) -> Option<NaiveDate> {
        parse_report_date(&self.report_date)
    }
}

/// Render measurements as the `serumTypes` array of the storage layout.
pub fn measurements_to_raw(measurements: &[Measurement]) -> Value {
    Value::Array(
        measurements
            .iter()
            .map(|m| json!({ "type": m.marker, "value": m.raw_value }))
            .collect(),
    )
}

/// Parse a `D/M/YYYY` date (one or two digit day and month).
///
/// Surrounding whitespace is ignored. Calendar-invalid dates such as
/// `31/02/2024` are rejected rather than rolled over.
pub fn parse_report_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.trim().split('/');
    let day = digits(parts.next()?, 1, 2)?;
    let month = digits(parts.next()?, 1, 2)?;
    let year = digits(parts.next()?, 4, 4)?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Parse a birth date given as `YYYY-MM-DD`, RFC 3339 or `DD/MM/YYYY`.
pub fn parse_birth_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| parse_report_date(text))
}

/// Completed years between `birth` and `on`.
///
/// Returns `None` when `birth` is after `on`.
pub fn age_in_years(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    if birth > on {
        return None;
    }
    let mut years = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Input of the report entry workflow, before the store assigns an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportDraft {
    pub patient_id: String,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    /// Explicit age; derived from `birth_date` when absent
    pub age: Option<u32>,
    pub gender: String,
    pub patient_type: String,
    pub sample_type: String,
    pub report_date: String,
    pub measurements: Vec<Measurement>,
}

impl ReportDraft {
    /// Create an empty draft for a patient.
    pub fn new(patient_id: String) -> Self {
        Self {
            patient_id,
            ..Self::default()
        }
    }

    /// Age snapshot to store with the report.
    ///
    /// An explicit age wins. Otherwise the age is derived from the birth date
    /// at the report date, or at today's date if the report date does not
    /// parse. Falls back to 0.
    pub fn resolved_age(&self) -> u32 {
        if let Some(age) = self.age {
            return age;
        }
        let Some(birth) = self.birth_date else {
            return 0;
        };
        let on = parse_report_date(&self.report_date)
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        age_in_years(birth, on).unwrap_or(0)
    }

    /// Convert into a record with an empty id, ready for the store.
    pub fn into_record(self) -> ReportRecord {
        let age = self.resolved_age();
        ReportRecord {
            id: String::new(),
            patient_id: self.patient_id,
            full_name: self.full_name,
            birth_date: self.birth_date,
            age,
            gender: self.gender,
            patient_type: self.patient_type,
            sample_type: self.sample_type,
            report_date: self.report_date,
            measurements: self.measurements,
        }
    }
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first_present(obj, keys)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn identifier_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    match first_present(obj, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn age_value(value: &Value) -> u32 {
    let years = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match years {
        Some(y) if y.is_finite() && y >= 0.0 => y.trunc().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

fn birth_date_value(value: &Value) -> Option<NaiveDate> {
    parse_birth_date(value.as_str()?)
}

fn measurement_value(value: &Value) -> Option<Measurement> {
    let obj = value.as_object()?;
    let raw_value = match first_present(obj, &["value"]) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Some(Measurement {
        marker: string_field(obj, &["type", "marker"]),
        raw_value,
    })
}

fn digits(part: &str, min_len: usize, max_len: usize) -> Option<u32> {
    if part.len() < min_len || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}
