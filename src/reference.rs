use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::LookupError;
use crate::scrapers::types::opt_string_or_number;

/// One `{code, name}` row of a reference table
#[derive(Debug, Clone, Deserialize)]
pub struct CodeEntry {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub code: Option<String>,
    pub name: String,
}

/// A static code table (subjects, categories or regions)
#[derive(Debug, Clone)]
pub struct CodeTable {
    kind: &'static str,
    entries: Vec<CodeEntry>,
}

impl CodeTable {
    pub fn new(kind: &'static str, entries: Vec<CodeEntry>) -> Self {
        Self { kind, entries }
    }

    /// Code for an exact name. Unknown names are a configuration error.
    pub fn code_for_name(&self, name: &str) -> Result<&str, LookupError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.code.as_deref())
            .ok_or_else(|| LookupError {
                table: self.kind,
                name: name.to_string(),
            })
    }

    /// Name for a code, absent when unmatched
    pub fn name_for_code(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.code.as_deref() == Some(code))
            .map(|e| e.name.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Code tables used to build queries and translate codes back to names
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub subjects: CodeTable,
    pub categories: CodeTable,
    pub regions: CodeTable,
}

impl ReferenceData {
    /// Read `dynSubjRF.json`, `catCode.json` and `subject.json` from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            subjects: CodeTable::new("subject", read_table(&dir.join("dynSubjRF.json"))?),
            categories: CodeTable::new("category", read_table(&dir.join("catCode.json"))?),
            regions: CodeTable::new("region", read_table(&dir.join("subject.json"))?),
        })
    }

    /// Every known subject, sorted by name
    pub fn subject_names(&self) -> Vec<String> {
        self.subjects.names()
    }
}

fn read_table(path: &Path) -> Result<Vec<CodeEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference table {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Malformed reference table {}", path.display()))
}
