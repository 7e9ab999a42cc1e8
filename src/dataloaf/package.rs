//! Dataloaf package directories.

use super::facts::{Field, NutritionFacts, Resource, Schema, SIDECAR};
use super::slice::{Slice, SLICE_SUFFIX};
use crate::error::{DaaError, Result};
use crate::resolve::ResolvedModel;
use regex::Regex;
use std::path::{Path, PathBuf};

/// A directory holding one CSV per statistic and a `datapackage.json` sidecar.
///
/// Every slice shares the same feature ids and the same columns.
#[derive(Debug, Clone)]
pub struct DataLoaf {
    dir: PathBuf,
    facts: Option<NutritionFacts>,
    /// Ids and columns every written slice must match.
    reference: Option<(Vec<String>, Vec<String>)>,
}

fn slice_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{}", name, SLICE_SUFFIX))
}

fn describe(slice: &Slice) -> Resource {
    let mut fields = vec![Field {
        name: slice.id_header().to_string(),
        kind: "string".to_string(),
    }];
    for column in slice.column_names().into_iter().skip(1) {
        let kind = if slice.value_columns().contains(&column) {
            "number"
        } else {
            "string"
        };
        fields.push(Field {
            name: column,
            kind: kind.to_string(),
        });
    }
    Resource {
        name: slice.name().to_string(),
        path: format!("{}{}", slice.name(), SLICE_SUFFIX),
        format: "csv".to_string(),
        schema: Schema { fields },
    }
}

impl DataLoaf {
    /// Whether `dir` already contains a sidecar or any slice file.
    pub fn holds_package<P: AsRef<Path>>(dir: P) -> Result<bool> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(false);
        }
        if dir.join(SIDECAR).exists() {
            return Ok(true);
        }
        for entry in std::fs::read_dir(dir)? {
            if entry?.file_name().to_string_lossy().ends_with(SLICE_SUFFIX) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Create a new package directory and write its sidecar.
    ///
    /// Packages are never written over: a directory that already holds a
    /// sidecar or slices is refused and left untouched.
    pub fn create<P: AsRef<Path>>(dir: P, facts: NutritionFacts) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if Self::holds_package(&dir)? {
            return Err(DaaError::PackageExists(dir));
        }
        std::fs::create_dir_all(&dir)?;
        facts.to_file(dir.join(SIDECAR))?;
        log::info!("Created dataloaf at {}", dir.display());
        Ok(Self {
            dir,
            facts: Some(facts),
            reference: None,
        })
    }

    /// Create a package whose intercept groups are the model's baselines.
    pub fn from_model<P: AsRef<Path>>(dir: P, name: &str, model: &ResolvedModel) -> Result<Self> {
        Self::create(dir, NutritionFacts::new(name, model.intercept_groups()))
    }

    /// Open an existing package. The sidecar is optional.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(DaaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("dataloaf directory {} does not exist", dir.display()),
            )));
        }
        let sidecar = dir.join(SIDECAR);
        let facts = if sidecar.is_file() {
            Some(NutritionFacts::from_file(&sidecar)?)
        } else {
            None
        };
        Ok(Self {
            dir,
            facts,
            reference: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The sidecar as loaded or last written.
    pub fn facts(&self) -> Option<&NutritionFacts> {
        self.facts.as_ref()
    }

    /// Read `datapackage.json` from disk.
    pub fn read_sidecar(&self) -> Result<NutritionFacts> {
        NutritionFacts::from_file(self.dir.join(SIDECAR))
    }

    /// Intercept groups recorded in the sidecar, empty when there is none.
    pub fn intercept_groups(&self) -> &[String] {
        self.facts
            .as_ref()
            .map(|f| f.intercept_groups.as_slice())
            .unwrap_or(&[])
    }

    /// Write a slice, checking it against the slices already in the package.
    pub fn write_slice(&mut self, slice: &Slice) -> Result<()> {
        if self.reference.is_none() {
            if let Some(first) = self
                .slice_names()?
                .into_iter()
                .find(|name| name != slice.name())
            {
                let existing = self.slice(&first)?;
                self.reference = Some((existing.feature_ids().to_vec(), existing.column_names()));
            }
        }

        let (ids, columns) = self
            .reference
            .get_or_insert_with(|| (slice.feature_ids().to_vec(), slice.column_names()));
        if ids.as_slice() != slice.feature_ids() {
            return Err(DaaError::SliceMismatch {
                slice: slice.name().to_string(),
                reason: "feature ids differ from the other slices".to_string(),
            });
        }
        if *columns != slice.column_names() {
            return Err(DaaError::SliceMismatch {
                slice: slice.name().to_string(),
                reason: format!(
                    "columns [{}] differ from [{}]",
                    slice.column_names().join(", "),
                    columns.join(", ")
                ),
            });
        }

        let path = slice_path(&self.dir, slice.name());
        slice.to_csv(&path)?;
        log::debug!("Wrote slice {}", path.display());

        if let Some(facts) = self.facts.as_mut() {
            facts.upsert_resource(describe(slice));
            facts.to_file(self.dir.join(SIDECAR))?;
        }
        Ok(())
    }

    /// Names of all slices on disk, sorted.
    pub fn slice_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = file_name.strip_suffix(SLICE_SUFFIX) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn has_slice(&self, name: &str) -> bool {
        slice_path(&self.dir, name).is_file()
    }

    /// Read one slice from disk.
    pub fn slice(&self, name: &str) -> Result<Slice> {
        let path = slice_path(&self.dir, name);
        if !path.is_file() {
            return Err(DaaError::SliceNotFound(name.to_string()));
        }
        Slice::from_csv(path, name)
    }

    /// Lazily read every slice whose name matches `pattern`.
    ///
    /// The directory is listed on each call and each slice is read when the
    /// iterator reaches it.
    pub fn iter_slices(&self, pattern: &str) -> Result<impl Iterator<Item = Result<Slice>> + '_> {
        let re = Regex::new(pattern)
            .map_err(|e| DaaError::InvalidParameter(format!("slice pattern: {}", e)))?;
        let names: Vec<String> = self
            .slice_names()?
            .into_iter()
            .filter(|name| re.is_match(name))
            .collect();
        Ok(names.into_iter().map(move |name| self.slice(&name)))
    }

    /// Read every slice.
    pub fn slices(&self) -> Result<Vec<Slice>> {
        self.iter_slices(".*")?.collect()
    }
}
