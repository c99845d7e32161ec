//! Reference catalog — hospitals, doctors, collection centres and test panels.
//!
//! Bundled data lives in `resources/catalog.json` and is compiled in. A
//! replacement catalog can be loaded from disk; both go through the same
//! validation, so an inverted reference range is rejected at load time
//! instead of surfacing during synthesis.

use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::synth::RangeExpr;

const BUILTIN_CATALOG: &str = include_str!("../resources/catalog.json");

/// Returned by [`Catalog::panel`] for keys that do not exist.
static EMPTY_PANEL: TestPanel = TestPanel {
    key: String::new(),
    label: String::new(),
    name: String::new(),
    parameters: Vec::new(),
    notes: Vec::new(),
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub name: String,
    pub address: String,
    pub website: String,
    pub registration_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub name: String,
    pub qualification: String,
    pub designation: String,
}

/// A single measured quantity within a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub unit: String,
    /// Reference-range expression, e.g. `70-100`, `<140`, `90/60-120/80`.
    pub range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPanel {
    /// Short lookup key, e.g. `diabetes`.
    pub key: String,
    /// Form label, e.g. `Diabetes Screening`.
    pub label: String,
    /// Report heading, e.g. `GLUCOSE TESTING`.
    pub name: String,
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl TestPanel {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.notes.is_empty()
    }
}

/// On-disk shape of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    hospitals: Vec<Hospital>,
    doctors: Vec<Doctor>,
    #[serde(default)]
    collection_centres: Vec<String>,
    panels: Vec<TestPanel>,
}

/// Errors from loading or validating a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {0}: {1}")]
    Load(String, String),
    #[error("Failed to parse catalog {0}: {1}")]
    Parse(String, String),
    #[error("Catalog has no {0}")]
    Empty(&'static str),
    #[error("Duplicate test panel key: {0}")]
    DuplicatePanel(String),
    #[error("Inverted reference range '{range}' for {parameter} in panel {panel}")]
    InvertedRange {
        panel: String,
        parameter: String,
        range: String,
    },
    #[error("Reference range '{range}' for {parameter} in panel {panel} is too wide to sample")]
    RangeTooWide {
        panel: String,
        parameter: String,
        range: String,
    },
}

/// Read-only reference data. Construct through [`Catalog::builtin`],
/// [`Catalog::load`] or [`Catalog::from_parts`]; all three validate.
#[derive(Debug, Clone)]
pub struct Catalog {
    hospitals: Vec<Hospital>,
    doctors: Vec<Doctor>,
    collection_centres: Vec<String>,
    panels: Vec<TestPanel>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json("builtin", BUILTIN_CATALOG)
    }

    /// Load a catalog JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&path.display().to_string(), &json)
    }

    fn from_json(source: &str, json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| CatalogError::Parse(source.to_string(), e.to_string()))?;
        Self::from_parts(
            file.hospitals,
            file.doctors,
            file.collection_centres,
            file.panels,
        )
    }

    pub fn from_parts(
        hospitals: Vec<Hospital>,
        doctors: Vec<Doctor>,
        collection_centres: Vec<String>,
        panels: Vec<TestPanel>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self {
            hospitals,
            doctors,
            collection_centres,
            panels,
        };
        catalog.validate()?;
        tracing::debug!(
            hospitals = catalog.hospitals.len(),
            doctors = catalog.doctors.len(),
            panels = catalog.panels.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.hospitals.is_empty() {
            return Err(CatalogError::Empty("hospitals"));
        }
        if self.doctors.is_empty() {
            return Err(CatalogError::Empty("doctors"));
        }

        let mut seen = HashSet::new();
        for panel in &self.panels {
            if !seen.insert(panel.key.to_lowercase()) {
                return Err(CatalogError::DuplicatePanel(panel.key.clone()));
            }
            for param in &panel.parameters {
                let expr = RangeExpr::parse(&param.range);
                if expr.is_inverted() {
                    return Err(CatalogError::InvertedRange {
                        panel: panel.key.clone(),
                        parameter: param.name.clone(),
                        range: param.range.clone(),
                    });
                }
                if expr.is_too_wide() {
                    return Err(CatalogError::RangeTooWide {
                        panel: panel.key.clone(),
                        parameter: param.name.clone(),
                        range: param.range.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn collection_centres(&self) -> &[String] {
        &self.collection_centres
    }

    pub fn panels(&self) -> &[TestPanel] {
        &self.panels
    }

    /// Look up a panel by key. Unknown keys yield an empty panel.
    pub fn panel(&self, key: &str) -> &TestPanel {
        self.find_panel(key).unwrap_or(&EMPTY_PANEL)
    }

    /// Strict lookup by key (case-insensitive).
    pub fn find_panel(&self, key: &str) -> Option<&TestPanel> {
        let key = key.trim();
        self.panels.iter().find(|p| p.key.eq_ignore_ascii_case(key))
    }

    /// Map a form selection to a panel. Accepts the key or the form label.
    pub fn resolve_selection(&self, selection: &str) -> Option<&TestPanel> {
        let selection = selection.trim();
        if selection.is_empty() {
            return None;
        }
        self.find_panel(selection).or_else(|| {
            self.panels
                .iter()
                .find(|p| p.label.eq_ignore_ascii_case(selection))
        })
    }

    // Lists are non-empty after validation, so indexing is in bounds.

    pub fn pick_hospital<R: Rng + ?Sized>(&self, rng: &mut R) -> &Hospital {
        &self.hospitals[rng.gen_range(0..self.hospitals.len())]
    }

    pub fn pick_doctor<R: Rng + ?Sized>(&self, rng: &mut R) -> &Doctor {
        &self.doctors[rng.gen_range(0..self.doctors.len())]
    }

    /// `None` when the catalog lists no collection centres.
    pub fn pick_collection_centre<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.collection_centres.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.collection_centres.len());
        Some(self.collection_centres[idx].as_str())
    }
}
