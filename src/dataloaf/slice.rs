//! One statistic of a dataloaf: a feature × column table stored as CSV.

use crate::error::{DaaError, Result};
use nalgebra::DMatrix;
use std::io::{Read, Write};
use std::path::Path;

/// File name suffix of every slice in a package.
pub const SLICE_SUFFIX: &str = "_slice.csv";

/// Parse a numeric cell. `NA`-style tokens become NaN and R logicals become 1/0.
fn parse_cell(raw: &str) -> Option<f64> {
    match raw.trim() {
        "" | "NA" | "NaN" | "nan" | "na" => Some(f64::NAN),
        "TRUE" | "True" | "true" => Some(1.0),
        "FALSE" | "False" | "false" => Some(0.0),
        other => other.parse::<f64>().ok(),
    }
}

fn format_cell(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", value)
    }
}

/// A named table of per-feature statistics.
///
/// The first column is always the feature id. Other non-numeric columns are
/// kept as labels; the rest are stored densely with one row per feature.
/// Columns are written back in the order they were read or added.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    name: String,
    id_header: String,
    feature_ids: Vec<String>,
    labels: Vec<(String, Vec<String>)>,
    value_columns: Vec<String>,
    values: DMatrix<f64>,
    /// Every column after the feature id, in header order.
    order: Vec<String>,
}

impl Slice {
    /// Build a slice from feature ids and a features × columns value matrix.
    pub fn new(
        name: &str,
        id_header: &str,
        feature_ids: Vec<String>,
        value_columns: Vec<String>,
        values: DMatrix<f64>,
    ) -> Result<Self> {
        if values.nrows() != feature_ids.len() || values.ncols() != value_columns.len() {
            return Err(DaaError::SliceMismatch {
                slice: name.to_string(),
                reason: format!(
                    "value matrix is {}x{} but there are {} feature ids and {} columns",
                    values.nrows(),
                    values.ncols(),
                    feature_ids.len(),
                    value_columns.len()
                ),
            });
        }
        Ok(Self {
            name: name.to_string(),
            id_header: id_header.to_string(),
            feature_ids,
            labels: Vec::new(),
            order: value_columns.clone(),
            value_columns,
            values,
        })
    }

    /// Attach a non-numeric label column.
    pub fn with_label(mut self, column: &str, values: Vec<String>) -> Result<Self> {
        if values.len() != self.feature_ids.len() {
            return Err(DaaError::SliceMismatch {
                slice: self.name.clone(),
                reason: format!(
                    "label column '{}' has {} rows, expected {}",
                    column,
                    values.len(),
                    self.feature_ids.len()
                ),
            });
        }
        self.labels.push((column.to_string(), values));
        self.order.push(column.to_string());
        Ok(self)
    }

    /// Load `<dir>/<name>_slice.csv`.
    pub fn from_csv<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, name)
    }

    /// Parse a comma separated slice with a header row.
    pub fn from_reader<R: Read>(reader: R, name: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(DaaError::EmptyData(format!("slice '{}' has no header", name)));
        }

        let mut records = Vec::new();
        for record in rdr.records() {
            records.push(record?);
        }

        let feature_ids: Vec<String> = records
            .iter()
            .map(|r| r.get(0).unwrap_or_default().to_string())
            .collect();

        let mut labels = Vec::new();
        let mut value_columns = Vec::new();
        let mut numeric: Vec<Vec<f64>> = Vec::new();
        for (col, header) in headers.iter().enumerate().skip(1) {
            let parsed: Option<Vec<f64>> = records
                .iter()
                .map(|r| parse_cell(r.get(col).unwrap_or_default()))
                .collect();
            match parsed {
                Some(column) => {
                    value_columns.push(header.clone());
                    numeric.push(column);
                }
                None => {
                    let column = records
                        .iter()
                        .map(|r| r.get(col).unwrap_or_default().to_string())
                        .collect();
                    labels.push((header.clone(), column));
                }
            }
        }

        let values = DMatrix::from_fn(feature_ids.len(), value_columns.len(), |r, c| {
            numeric[c][r]
        });

        Ok(Self {
            name: name.to_string(),
            id_header: headers[0].clone(),
            feature_ids,
            labels,
            value_columns,
            values,
            order: headers[1..].to_vec(),
        })
    }

    /// Write the slice as CSV, feature id first.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.column_names())?;
        for (row, id) in self.feature_ids.iter().enumerate() {
            let mut record = Vec::with_capacity(1 + self.order.len());
            record.push(id.clone());
            for column in &self.order {
                let cell = match self.get(row, column) {
                    Some(value) => format_cell(value),
                    None => self
                        .label(column)
                        .map(|labels| labels[row].clone())
                        .unwrap_or_default(),
                };
                record.push(cell);
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_header(&self) -> &str {
        &self.id_header
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    /// Numeric column names in file order.
    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    /// Every column name, feature id header first.
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(self.id_header.clone())
            .chain(self.order.iter().cloned())
            .collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.id_header == column
            || self.labels.iter().any(|(name, _)| name == column)
            || self.value_columns.iter().any(|c| c == column)
    }

    /// Values matrix (features × value columns).
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// A numeric column by name.
    pub fn column(&self, column: &str) -> Option<Vec<f64>> {
        let idx = self.value_columns.iter().position(|c| c == column)?;
        Some(self.values.column(idx).iter().copied().collect())
    }

    /// A text column by name; the feature id column counts as a label.
    pub fn label(&self, column: &str) -> Option<&[String]> {
        if column == self.id_header {
            return Some(&self.feature_ids);
        }
        self.labels
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, values)| values.as_slice())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.value_columns.iter().position(|c| c == column)?;
        (row < self.feature_ids.len()).then(|| self.values[(row, idx)])
    }

    /// Check that `other` has the same feature ids and columns as this slice.
    pub fn check_consistent(&self, other: &Slice) -> Result<()> {
        if self.feature_ids != other.feature_ids {
            return Err(DaaError::SliceMismatch {
                slice: other.name.clone(),
                reason: format!(
                    "feature ids differ from slice '{}' ({} vs {} rows)",
                    self.name,
                    other.feature_ids.len(),
                    self.feature_ids.len()
                ),
            });
        }
        if self.column_names() != other.column_names() {
            return Err(DaaError::SliceMismatch {
                slice: other.name.clone(),
                reason: format!(
                    "columns [{}] differ from slice '{}' columns [{}]",
                    other.column_names().join(", "),
                    self.name,
                    self.column_names().join(", ")
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LFC: &str = "id,(Intercept),bodysiteleft palm,bodysitetongue\n\
                       f1,0.5,-1.25,NA\n\
                       f2,1,2.5,0.125\n";

    #[test]
    fn test_read_slice() {
        let slice = Slice::from_reader(LFC.as_bytes(), "lfc").unwrap();
        assert_eq!(slice.name(), "lfc");
        assert_eq!(slice.id_header(), "id");
        assert_eq!(slice.feature_ids(), &["f1", "f2"]);
        assert_eq!(
            slice.value_columns(),
            &["(Intercept)", "bodysiteleft palm", "bodysitetongue"]
        );
        assert_eq!(slice.get(0, "bodysiteleft palm"), Some(-1.25));
        assert!(slice.get(0, "bodysitetongue").unwrap().is_nan());
        assert_eq!(slice.column("(Intercept)"), Some(vec![0.5, 1.0]));
    }

    #[test]
    fn test_logical_and_label_columns() {
        let text = "id,taxon,bodysitetongue\nf1,k__A;p__B,TRUE\nf2,k__A;p__C,FALSE\n";
        let slice = Slice::from_reader(text.as_bytes(), "diff_abn").unwrap();
        assert_eq!(slice.value_columns(), &["bodysitetongue"]);
        assert_eq!(slice.column("bodysitetongue"), Some(vec![1.0, 0.0]));
        assert_eq!(slice.label("taxon").unwrap()[1], "k__A;p__C");
        assert_eq!(slice.column_names(), vec!["id", "taxon", "bodysitetongue"]);
    }

    #[test]
    fn test_write_then_read() {
        let slice = Slice::from_reader(LFC.as_bytes(), "lfc").unwrap();
        let mut buf = Vec::new();
        slice.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("f1,0.5,-1.25,NA"));

        let reread = Slice::from_reader(buf.as_slice(), "lfc").unwrap();
        assert_eq!(reread.feature_ids(), slice.feature_ids());
        assert_eq!(reread.column_names(), slice.column_names());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = Slice::new(
            "se",
            "id",
            vec!["f1".into()],
            vec!["a".into(), "b".into()],
            DMatrix::zeros(1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, DaaError::SliceMismatch { .. }));
    }

    #[test]
    fn test_consistency_check() {
        let lfc = Slice::from_reader(LFC.as_bytes(), "lfc").unwrap();
        let se = Slice::from_reader(
            "id,(Intercept),bodysiteleft palm\nf1,0.1,0.2\nf2,0.3,0.4\n".as_bytes(),
            "se",
        )
        .unwrap();
        let err = lfc.check_consistent(&se).unwrap_err();
        assert!(err.to_string().contains("se"));
        assert!(lfc.check_consistent(&lfc.clone()).is_ok());
    }

    #[test]
    fn test_mixed_columns_keep_header_order() {
        let text = "id,lfc,note,diff,group\nf1,1.5,kept,TRUE,a\nf2,-0.5,dropped,FALSE,b\n";
        let slice = Slice::from_reader(text.as_bytes(), "extra").unwrap();
        assert_eq!(
            slice.column_names(),
            vec!["id", "lfc", "note", "diff", "group"]
        );
        assert_eq!(slice.value_columns(), &["lfc", "diff"]);

        let mut out = Vec::new();
        slice.write_to(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(
            written,
            "id,lfc,note,diff,group\nf1,1.5,kept,1,a\nf2,-0.5,dropped,0,b\n"
        );
        let reread = Slice::from_reader(written.as_bytes(), "extra").unwrap();
        assert_eq!(reread.column_names(), slice.column_names());
    }
}
