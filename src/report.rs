//! Report composition — form validation, record assembly, fixed-width text.
//!
//! A [`ReportRecord`] is built once per "Generate" and never mutated. The
//! random source and the clock are injected so a seeded generator and a
//! fixed timestamp reproduce a report exactly.
//!
//! The rendered text is preformatted monospace content: the PDF export draws
//! it line by line, so banner width and column widths must not drift.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use serde::Serialize;

use crate::catalog::{Catalog, Doctor, Hospital, TestPanel};
use crate::config::{
    COL_RANGE, COL_RESULT, COL_TEST, LAB_NUMBER_MAX, LAB_NUMBER_MIN, LAB_NUMBER_PREFIX,
    REPORTING_DELAY_HOURS, REPORT_WIDTH, TIMESTAMP_FORMAT,
};
use crate::synth::{synthesize, SynthesizedValue};

const FOOTER: &str = "FOR EDUCATIONAL PURPOSES ONLY";

// ─── Types ────────────────────────────────────────────────────────────────────

/// Raw form fields, exactly as typed or selected.
#[derive(Debug, Clone, Default)]
pub struct PatientForm {
    pub name: String,
    pub age: String,
    pub gender: String,
    /// Panel key or form label.
    pub test: String,
    /// Optional; blank or non-numeric means "Not specified".
    pub rest_days: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestDays {
    Days(u32),
    NotSpecified,
}

impl RestDays {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Self::NotSpecified;
        }
        s.parse().map(Self::Days).unwrap_or(Self::NotSpecified)
    }
}

impl std::fmt::Display for RestDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}"),
            Self::NotSpecified => f.write_str("Not specified"),
        }
    }
}

/// Validation failures, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter patient name")]
    MissingName,
    #[error("Please enter valid age")]
    InvalidAge,
    #[error("Please select gender")]
    MissingGender,
    #[error("Please select a test")]
    MissingTest,
    #[error("Unknown test: {0}")]
    UnknownTest(String),
}

/// Form fields after validation.
#[derive(Debug, Clone)]
pub struct ValidatedForm<'c> {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub panel: &'c TestPanel,
    pub rest_days: RestDays,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub name: String,
    pub unit: String,
    pub range: String,
    pub value: SynthesizedValue,
}

/// A fully composed report. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    pub patient_name: String,
    pub age: u32,
    pub gender: Gender,
    pub rest_days: RestDays,
    pub hospital: Hospital,
    pub doctor: Doctor,
    pub collection_centre: Option<String>,
    pub lab_number: String,
    pub collected_at: NaiveDateTime,
    pub reported_at: NaiveDateTime,
    pub panel_key: String,
    pub panel_name: String,
    pub notes: Vec<String>,
    pub results: Vec<ResultRow>,
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Checks name → age → gender → test, stopping at the first failure.
pub fn validate<'c>(
    form: &PatientForm,
    catalog: &'c Catalog,
) -> Result<ValidatedForm<'c>, ValidationError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingName);
    }

    let age = form.age.trim();
    if age.is_empty() || !age.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidAge);
    }
    let age: u32 = age.parse().map_err(|_| ValidationError::InvalidAge)?;

    let gender = Gender::parse(&form.gender).ok_or(ValidationError::MissingGender)?;

    let test = form.test.trim();
    if test.is_empty() {
        return Err(ValidationError::MissingTest);
    }
    let panel = catalog
        .resolve_selection(test)
        .ok_or_else(|| ValidationError::UnknownTest(test.to_string()))?;

    Ok(ValidatedForm {
        name: name.to_string(),
        age,
        gender,
        panel,
        rest_days: RestDays::parse(&form.rest_days),
    })
}

// ─── Composition ──────────────────────────────────────────────────────────────

/// Validates the form and builds a new record.
///
/// Draw order: hospital, doctor, collection centre, lab number, then one
/// synthesis per parameter in declared order.
pub fn compose<R: Rng + ?Sized>(
    form: &PatientForm,
    catalog: &Catalog,
    rng: &mut R,
    now: NaiveDateTime,
) -> Result<ReportRecord, ValidationError> {
    let valid = validate(form, catalog)?;

    let hospital = catalog.pick_hospital(rng).clone();
    let doctor = catalog.pick_doctor(rng).clone();
    let collection_centre = catalog.pick_collection_centre(rng).map(str::to_string);
    let lab_number = format!(
        "{LAB_NUMBER_PREFIX}{}",
        rng.gen_range(LAB_NUMBER_MIN..=LAB_NUMBER_MAX)
    );

    let results = valid
        .panel
        .parameters
        .iter()
        .map(|param| ResultRow {
            name: param.name.clone(),
            unit: param.unit.clone(),
            range: param.range.clone(),
            value: synthesize(&param.range, rng),
        })
        .collect::<Vec<_>>();

    tracing::info!(
        lab_number = %lab_number,
        panel = %valid.panel.key,
        rows = results.len(),
        "Report composed"
    );

    Ok(ReportRecord {
        patient_name: valid.name,
        age: valid.age,
        gender: valid.gender,
        rest_days: valid.rest_days,
        hospital,
        doctor,
        collection_centre,
        lab_number,
        collected_at: now,
        reported_at: now + Duration::hours(REPORTING_DELAY_HOURS),
        panel_key: valid.panel.key.clone(),
        panel_name: valid.panel.name.clone(),
        notes: valid.panel.notes.clone(),
        results,
    })
}

// ─── Rendering ────────────────────────────────────────────────────────────────

impl ReportRecord {
    /// Text encoded into the export QR code.
    pub fn qr_payload(&self) -> String {
        qr_payload(&self.patient_name, &self.lab_number)
    }

    pub fn collected_display(&self) -> String {
        self.collected_at.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn reported_display(&self) -> String {
        self.reported_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Renders the fixed-width text report.
    pub fn render(&self) -> String {
        let w = REPORT_WIDTH;
        let rule = "=".repeat(w);
        let mut lines: Vec<String> = Vec::new();

        lines.push(rule.clone());
        lines.push(format!("{:^w$}", self.hospital.name.to_uppercase()));
        lines.push(format!("{:^w$}", format!("Address: {}", self.hospital.address)));
        lines.push(format!(
            "{:^w$}",
            format!(
                "Web: {} | Reg. ID: {}",
                self.hospital.website, self.hospital.registration_id
            )
        ));
        lines.push(rule.clone());
        lines.push(String::new());

        lines.push(format!("Patient: {}", self.patient_name.to_uppercase()));
        lines.push(format!("Age: {} | Gender: {}", self.age, self.gender.as_str()));
        lines.push(format!(
            "Lab #: {} | Collected: {}",
            self.lab_number,
            self.collected_display()
        ));
        lines.push(format!("Reported: {}", self.reported_display()));
        if let Some(centre) = &self.collection_centre {
            lines.push(format!("Collection Centre: {centre}"));
        }
        lines.push(match self.rest_days {
            RestDays::Days(_) => format!("Bed Rest Recommended: {} Days", self.rest_days),
            RestDays::NotSpecified => format!("Bed Rest Recommended: {}", self.rest_days),
        });
        lines.push(String::new());

        lines.push(format!("{:^w$}", "Test Results"));
        lines.push(rule.clone());
        lines.push(format!("{:^w$}", self.panel_name));
        lines.push(rule.clone());
        lines.push(table_row("Test", &"Result", "Range"));
        lines.push("-".repeat(w));
        for row in &self.results {
            lines.push(table_row(&row.name, &row.value, &range_with_unit(row)));
        }
        lines.push(String::new());

        lines.push(format!("{:^w$}", "Notes:"));
        for note in &self.notes {
            lines.push(format!("- {note}"));
        }
        lines.push(String::new());

        lines.push(rule.clone());
        lines.push(format!("{:>w$}", format!("Physician: {}", self.doctor.name)));
        lines.push(format!(
            "{:>w$}",
            format!("{}, {}", self.doctor.qualification, self.doctor.designation)
        ));
        lines.push(rule.clone());
        lines.push(format!("{:^w$}", FOOTER));
        lines.push(rule);

        lines.join("\n")
    }
}

/// `"<PATIENT NAME> | <LAB NUMBER>"`
pub fn qr_payload(patient_name: &str, lab_number: &str) -> String {
    format!("{} | {}", patient_name.trim().to_uppercase(), lab_number)
}

fn table_row(name: &str, value: &dyn std::fmt::Display, range: &str) -> String {
    format!("{name:<COL_TEST$}| {value:<COL_RESULT$}| {range:<COL_RANGE$}")
}

fn range_with_unit(row: &ResultRow) -> String {
    if row.unit.is_empty() {
        row.range.clone()
    } else {
        format!("{} {}", row.range, row.unit)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
