//! Count matrix with sparse storage for microbiome abundance data.

use crate::error::{DaaError, Result};
use sprs::{CsMat, TriMat};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse count matrix storing feature abundances across samples.
///
/// Rows represent features (taxa/genes), columns represent samples.
/// Uses CSR (Compressed Sparse Row) format for efficient row-wise operations.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Sparse matrix in CSR format (features × samples)
    data: CsMat<u64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

fn check_unique(ids: &[String], axis: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(DaaError::DuplicateId {
                axis: axis.to_string(),
                id: id.clone(),
            });
        }
    }
    Ok(())
}

/// Parse a non-negative whole count; `12` and `12.0` are both accepted.
fn parse_count(raw: &str) -> Option<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
        Some(v as u64)
    } else {
        None
    }
}

impl CountMatrix {
    /// Create a new CountMatrix from a sparse matrix and identifiers.
    pub fn new(
        data: CsMat<u64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(DaaError::InvalidParameter(format!(
                "Count matrix has {} rows but {} feature ids",
                nrows,
                feature_ids.len()
            )));
        }
        if ncols != sample_ids.len() {
            return Err(DaaError::InvalidParameter(format!(
                "Count matrix has {} columns but {} sample ids",
                ncols,
                sample_ids.len()
            )));
        }
        check_unique(&feature_ids, "feature")?;
        check_unique(&sample_ids, "sample")?;
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a count matrix from dense rows (one `Vec` per feature).
    pub fn from_rows(
        rows: &[Vec<u64>],
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_samples));
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_samples {
                return Err(DaaError::InvalidParameter(format!(
                    "Feature row {} has {} values, expected {}",
                    row,
                    values.len(),
                    n_samples
                )));
            }
            for (col, &val) in values.iter().enumerate() {
                if val > 0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Load a count matrix from a TSV file.
    ///
    /// Expected format:
    /// - Optional leading `# ...` comment lines (as written by `biom convert`)
    /// - Header row with sample IDs (first column is the feature ID header)
    /// - Subsequent rows: feature ID followed by non-negative whole counts
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let mut header_line_no = 0;
        let header_line = loop {
            let line = lines
                .next()
                .ok_or_else(|| DaaError::EmptyData("Empty TSV file".to_string()))??;
            header_line_no += 1;
            if line.trim().is_empty() || line.starts_with("# ") {
                continue;
            }
            break line;
        };
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DaaError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();

        for (line_idx, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let row_idx = feature_ids.len();
            let feature_id = fields[0].trim().to_string();
            if fields.len() != n_samples + 1 {
                return Err(DaaError::RaggedRow {
                    feature: feature_id,
                    line: header_line_no + line_idx + 1,
                    expected: n_samples,
                    actual: fields.len() - 1,
                });
            }
            feature_ids.push(feature_id);

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                let value = parse_count(value_str.trim()).ok_or_else(|| DaaError::InvalidCount {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value > 0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        let n_features = feature_ids.len();
        if n_features == 0 {
            return Err(DaaError::EmptyData("No features in TSV".to_string()));
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Write the count matrix to a TSV file with a `feature-id` header.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature-id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for value in self.row_dense(row_idx) {
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get a dense vector for a specific row (feature).
    pub fn row_dense(&self, row: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Compute column sums (library sizes per sample).
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Convert to a dense matrix (f64).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_features(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val as f64;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_matrix() -> CountMatrix {
        // 3 features × 4 samples
        let mut tri_mat = TriMat::new((3, 4));
        tri_mat.add_triplet(0, 0, 10);
        tri_mat.add_triplet(0, 1, 20);
        tri_mat.add_triplet(0, 3, 5);
        tri_mat.add_triplet(1, 0, 100);
        tri_mat.add_triplet(1, 1, 200);
        tri_mat.add_triplet(1, 2, 150);
        tri_mat.add_triplet(1, 3, 175);
        tri_mat.add_triplet(2, 0, 1);

        let feature_ids = vec!["feat_A".to_string(), "feat_B".to_string(), "feat_C".to_string()];
        let sample_ids = vec![
            "sample1".to_string(),
            "sample2".to_string(),
            "sample3".to_string(),
            "sample4".to_string(),
        ];

        CountMatrix::new(tri_mat.to_csr(), feature_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mat = create_test_matrix();
        assert_eq!(mat.n_features(), 3);
        assert_eq!(mat.n_samples(), 4);
    }

    #[test]
    fn test_get_values() {
        let mat = create_test_matrix();
        assert_eq!(mat.get(0, 0), 10);
        assert_eq!(mat.get(0, 2), 0);
        assert_eq!(mat.get(2, 1), 0);
    }

    #[test]
    fn test_col_sums() {
        let mat = create_test_matrix();
        assert_eq!(mat.col_sums(), vec![111, 220, 150, 180]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = CountMatrix::from_rows(
            &[vec![1, 2], vec![3, 4]],
            vec!["f1".into(), "f1".into()],
            vec!["S1".into(), "S2".into()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("f1"));
    }

    #[test]
    fn test_tsv_roundtrip() {
        let mat = create_test_matrix();

        let temp_file = NamedTempFile::new().unwrap();
        mat.to_tsv(temp_file.path()).unwrap();
        let written = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(written.starts_with("feature-id\tsample1"));

        let loaded = CountMatrix::from_tsv(temp_file.path()).unwrap();
        assert_eq!(loaded.feature_ids(), mat.feature_ids());
        assert_eq!(loaded.sample_ids(), mat.sample_ids());
        for row in 0..mat.n_features() {
            assert_eq!(loaded.row_dense(row), mat.row_dense(row));
        }
    }

    #[test]
    fn test_biom_style_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# Constructed from biom file").unwrap();
        writeln!(file, "#OTU ID\tS1\tS2").unwrap();
        writeln!(file, "O1\t12.0\t0.0").unwrap();
        writeln!(file, "O2\t3\t4").unwrap();
        file.flush().unwrap();

        let mat = CountMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(mat.sample_ids(), &["S1", "S2"]);
        assert_eq!(mat.row_dense(0), vec![12, 0]);
    }

    #[test]
    fn test_rejects_negative_and_fractional() {
        for bad in ["-1", "2.5", "abc"] {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "feature-id\tS1").unwrap();
            writeln!(file, "O1\t{}", bad).unwrap();
            file.flush().unwrap();
            let err = CountMatrix::from_tsv(file.path()).unwrap_err();
            assert!(matches!(err, DaaError::InvalidCount { .. }), "value {}", bad);
        }
    }

    #[test]
    fn test_ragged_rows_rejected() {
        for (row, feature, actual) in [("f1\t5", "f1", 1), ("f1\t1\t2\t3\t99\t100", "f1", 5)] {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "# Constructed from biom file").unwrap();
            writeln!(file, "feature-id\tS1\tS2\tS3").unwrap();
            writeln!(file, "{}", row).unwrap();
            file.flush().unwrap();

            match CountMatrix::from_tsv(file.path()).unwrap_err() {
                DaaError::RaggedRow {
                    feature: f,
                    line,
                    expected,
                    actual: a,
                } => {
                    assert_eq!(f, feature);
                    assert_eq!(line, 3);
                    assert_eq!(expected, 3);
                    assert_eq!(a, actual);
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }
}
