//! The `datapackage.json` sidecar describing a dataloaf.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the sidecar inside a package directory.
pub const SIDECAR: &str = "datapackage.json";

/// One column of a slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

/// Descriptor for one slice file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub path: String,
    #[serde(default = "default_format")]
    pub format: String,
    pub schema: Schema,
}

fn default_format() -> String {
    "csv".to_string()
}

/// Package-level metadata ("nutrition facts") of a dataloaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub name: String,
    /// RFC 3339 creation timestamp.
    pub created: String,
    /// Baseline of every categorical model term as `column::value`.
    #[serde(default)]
    pub intercept_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl NutritionFacts {
    pub fn new(name: &str, intercept_groups: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            intercept_groups,
            resources: Vec::new(),
        }
    }

    /// Insert or replace the descriptor of a slice.
    pub fn upsert_resource(&mut self, resource: Resource) {
        match self.resources.iter_mut().find(|r| r.name == resource.name) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
