//! Form shell — the state a report form keeps between button presses.
//!
//! Holds the displayed report text and the record it was rendered from.
//! "Generate" replaces both wholesale; a rejected form leaves them alone.
//! "Save as PDF" works from whatever is currently displayed. Errors come
//! back as user-facing strings, ready for a message box or stderr.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::catalog::Catalog;
use crate::export::{self, ExportError, ExportOptions, ExportOutcome};
use crate::report::{self, PatientForm, ReportRecord};

pub struct FormShell {
    catalog: Catalog,
    rng: StdRng,
    displayed: String,
    last: Option<ReportRecord>,
}

impl FormShell {
    /// Shell with an entropy-seeded random source.
    pub fn new(catalog: Catalog) -> Self {
        Self::with_rng(catalog, StdRng::from_entropy())
    }

    /// Shell with a fixed seed, for reproducible output.
    pub fn seeded(catalog: Catalog, seed: u64) -> Self {
        Self::with_rng(catalog, StdRng::seed_from_u64(seed))
    }

    fn with_rng(catalog: Catalog, rng: StdRng) -> Self {
        Self {
            catalog,
            rng,
            displayed: String::new(),
            last: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Currently displayed report text (empty before the first generate).
    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    pub fn last_record(&self) -> Option<&ReportRecord> {
        self.last.as_ref()
    }

    /// Composes a new report and displays it.
    pub fn generate(&mut self, form: &PatientForm, now: NaiveDateTime) -> Result<&str, String> {
        let record = report::compose(form, &self.catalog, &mut self.rng, now).map_err(|e| {
            tracing::debug!(error = %e, "Form rejected");
            e.to_string()
        })?;
        self.displayed = record.render();
        self.last = Some(record);
        Ok(&self.displayed)
    }

    /// Exports the displayed report.
    pub fn save_as_pdf(&self, options: &ExportOptions) -> Result<ExportOutcome, String> {
        let record = match &self.last {
            Some(record) if !self.displayed.trim().is_empty() => record,
            _ => return Err(ExportError::NothingToExport.to_string()),
        };
        export::export_pdf(
            &self.displayed,
            &record.patient_name,
            &record.lab_number,
            options,
        )
        .map_err(|e| match e {
            ExportError::NothingToExport => e.to_string(),
            other => format!("Failed to save PDF: {other}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn shell() -> FormShell {
        FormShell::seeded(Catalog::builtin().unwrap(), 21)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(16, 45, 0)
            .unwrap()
    }

    fn form() -> PatientForm {
        PatientForm {
            name: "John Roe".into(),
            age: "52".into(),
            gender: "Male".into(),
            test: "Fever Profile".into(),
            rest_days: "2".into(),
        }
    }

    #[test]
    fn save_before_generate_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = shell()
            .save_as_pdf(&ExportOptions {
                out_dir: tmp.path().to_path_buf(),
                open_preview: false,
            })
            .unwrap_err();
        assert_eq!(err, "No report to save");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn generate_displays_report() {
        let mut shell = shell();
        let text = shell.generate(&form(), now()).unwrap().to_string();
        assert!(text.contains("FEVER PROFILE"));
        assert!(text.contains("Patient: JOHN ROE"));
        assert!(text.contains("Bed Rest Recommended: 2 Days"));
        assert_eq!(shell.displayed(), text);
        assert_eq!(shell.last_record().unwrap().results.len(), 2);
    }

    #[test]
    fn rejected_form_keeps_previous_report() {
        let mut shell = shell();
        shell.generate(&form(), now()).unwrap();
        let before = shell.displayed().to_string();
        let lab = shell.last_record().unwrap().lab_number.clone();

        let bad = PatientForm {
            name: String::new(),
            age: "x".into(),
            ..form()
        };
        assert_eq!(shell.generate(&bad, now()).unwrap_err(), "Please enter patient name");
        assert_eq!(shell.displayed(), before);
        assert_eq!(shell.last_record().unwrap().lab_number, lab);
    }

    #[test]
    fn regenerate_replaces_record() {
        let mut shell = shell();
        shell.generate(&form(), now()).unwrap();
        let first = shell.last_record().unwrap().clone();
        shell.generate(&form(), now()).unwrap();
        let second = shell.last_record().unwrap();
        assert_ne!(first.lab_number, second.lab_number);
        assert_eq!(shell.displayed(), second.render());
    }

    #[test]
    fn save_after_generate_writes_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = shell();
        shell.generate(&form(), now()).unwrap();
        let outcome = shell
            .save_as_pdf(&ExportOptions {
                out_dir: tmp.path().to_path_buf(),
                open_preview: false,
            })
            .unwrap();
        assert!(outcome.path.exists());
        let name = outcome.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Medical_Report_"));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn export_failure_is_prefixed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = shell();
        shell.generate(&form(), now()).unwrap();
        let err = shell
            .save_as_pdf(&ExportOptions {
                out_dir: tmp.path().join("missing"),
                open_preview: false,
            })
            .unwrap_err();
        assert!(err.starts_with("Failed to save PDF: "), "{err}");
    }
}
