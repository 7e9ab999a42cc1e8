//! ANCOM results page with a volcano plot of W against group differences.

use super::html::{cell, table as html_table, vega_embed, HTML_HEAD, VEGA_SCRIPTS};
use crate::ancom::{AncomResults, DifferenceFunction, TransformFunction};
use crate::data::{Metadata, VariableType};
use crate::error::{DaaError, Result};
use crate::zero::CompositionTable;
use rayon::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

/// How to place features on the x axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VolcanoRequest {
    /// Categorical metadata column defining the groups.
    pub column: String,
    pub transform: TransformFunction,
    /// Defaults to mean difference for two groups, F statistic otherwise.
    pub difference: Option<DifferenceFunction>,
}

impl VolcanoRequest {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            transform: TransformFunction::default(),
            difference: None,
        }
    }
}

/// One point of the volcano plot.
#[derive(Debug, Clone, PartialEq)]
pub struct VolcanoPoint {
    pub feature_id: String,
    pub difference: f64,
    pub w: f64,
}

/// Per-feature group difference of transformed abundances.
///
/// Groups are the sorted levels of `request.column` among the table's samples;
/// samples with a missing value are left out.
pub fn volcano_points(
    table: &CompositionTable,
    metadata: &Metadata,
    results: &AncomResults,
    request: &VolcanoRequest,
) -> Result<(DifferenceFunction, Vec<VolcanoPoint>)> {
    let metadata = metadata.align_to(table.sample_ids())?;
    if !metadata.has_column(&request.column) {
        return Err(DaaError::ColumnNotFound {
            parameter: "metadata column".to_string(),
            column: request.column.clone(),
        });
    }
    if metadata.column_type(&request.column) == Some(VariableType::Numeric) {
        return Err(DaaError::InvalidVariableType {
            column: request.column.clone(),
            reason: "ANCOM groups must come from a categorical column".to_string(),
        });
    }

    let levels = metadata.levels_among(&request.column, table.sample_ids())?;
    if levels.len() < 2 {
        return Err(DaaError::InvalidParameter(format!(
            "column '{}' has {} group(s) among the table's samples; at least two are needed",
            request.column,
            levels.len()
        )));
    }
    let difference = request
        .difference
        .unwrap_or_else(|| DifferenceFunction::default_for(levels.len()));

    let group_of: Vec<Option<usize>> = table
        .sample_ids()
        .iter()
        .map(|sid| {
            metadata
                .get(sid, &request.column)
                .and_then(|v| v.as_categorical())
                .and_then(|level| levels.iter().position(|l| l == level))
        })
        .collect();

    let transformed: Vec<Vec<f64>> = (0..table.n_samples())
        .into_par_iter()
        .map(|j| request.transform.apply(&table.sample(j)))
        .collect::<Result<_>>()?;

    let feature_index: HashMap<&str, usize> = table
        .feature_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut points = Vec::with_capacity(results.len());
    for (k, feature_id) in results.feature_ids.iter().enumerate() {
        let i = *feature_index.get(feature_id.as_str()).ok_or_else(|| {
            DaaError::InvalidParameter(format!(
                "feature '{}' in the ANCOM results is not in the table",
                feature_id
            ))
        })?;
        let mut groups = vec![Vec::new(); levels.len()];
        for (j, group) in group_of.iter().enumerate() {
            if let Some(g) = group {
                groups[*g].push(transformed[j][i]);
            }
        }
        points.push(VolcanoPoint {
            feature_id: feature_id.clone(),
            difference: difference.compute(&groups)?,
            w: results.w[k],
        });
    }
    Ok((difference, points))
}

/// Write `ancom.csv`, the optional `percent-abundances.csv`, and an
/// `index.html` with the significant features and the volcano plot.
pub fn ancom_volcano(
    output_dir: &Path,
    table: &CompositionTable,
    metadata: &Metadata,
    results: &AncomResults,
    request: &VolcanoRequest,
) -> Result<Vec<VolcanoPoint>> {
    let (difference, points) = volcano_points(table, metadata, results, request)?;
    std::fs::create_dir_all(output_dir)?;
    results.to_csv(output_dir.join("ancom.csv"))?;

    let significant = results.significant();
    let mut html = format!(
        "<html>\n{}{}<body>\n<h1>ANCOM statistical results</h1>\n\
         <a href=\"ancom.csv\">Download as CSV</a><br>\n",
        HTML_HEAD, VEGA_SCRIPTS
    );
    let w_rows: Vec<(String, Vec<String>)> = significant
        .iter()
        .map(|&i| (results.feature_ids[i].clone(), vec![cell(results.w[i])]))
        .collect();
    html.push_str(&html_table("", &["W".to_string()], &w_rows));

    if let Some(percentiles) = &results.percentiles {
        percentiles.to_csv(output_dir.join("percent-abundances.csv"))?;
        html.push_str("<h1>Percentile abundances of features by group</h1>\n");
        html.push_str("<a href=\"percent-abundances.csv\">Download as CSV</a><br>\n");

        let columns = percentiles.value_columns().to_vec();
        let rows: Vec<(String, Vec<String>)> = significant
            .iter()
            .filter_map(|&i| {
                let id = &results.feature_ids[i];
                let row = percentiles.feature_ids().iter().position(|f| f == id)?;
                let cells = columns
                    .iter()
                    .map(|c| percentiles.get(row, c).map(cell).unwrap_or_default())
                    .collect();
                Some((id.clone(), cells))
            })
            .collect();
        html.push_str(&html_table(percentiles.id_header(), &columns, &rows));
    }

    let x_title = format!("{} {}", request.transform, difference);
    let values: Vec<_> = points
        .iter()
        .map(|p| json!({"feature": p.feature_id, "difference": p.difference, "W": p.w}))
        .collect();
    let spec = json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "title": "ANCOM Volcano Plot",
        "width": 600,
        "height": 600,
        "data": {"values": values},
        "mark": {"type": "circle", "size": 100},
        "encoding": {
            "x": {"field": "difference", "type": "quantitative", "title": x_title},
            "y": {"field": "W", "type": "quantitative", "title": "W"},
            "tooltip": [
                {"field": "feature", "type": "nominal", "title": "Feature ID"},
                {"field": "difference", "type": "quantitative", "title": x_title},
                {"field": "W", "type": "quantitative"}
            ]
        }
    });
    html.push_str(&vega_embed("volcano", &spec));
    html.push_str("</body></html>\n");
    std::fs::write(output_dir.join("index.html"), html)?;

    log::info!(
        "Wrote ANCOM report for {} features ({} significant) to {}",
        points.len(),
        significant.len(),
        output_dir.display()
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use tempfile::TempDir;

    fn table() -> CompositionTable {
        // features × samples
        let data = DMatrix::from_row_slice(
            2,
            4,
            &[
                1.0, 1.0, 9.0, 9.0, //
                4.0, 4.0, 4.0, 4.0,
            ],
        );
        CompositionTable::new(
            data,
            vec!["b1".into(), "b2".into()],
            vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
        )
        .unwrap()
    }

    fn metadata() -> Metadata {
        Metadata::from_reader(
            "sample-id\tgroup\tph\nS1\ta\t7\nS2\ta\t7.1\nS3\tb\t6\nS4\tb\t6.5\n".as_bytes(),
        )
        .unwrap()
    }

    fn results() -> AncomResults {
        AncomResults::new(
            vec!["b1".into(), "b2".into()],
            vec![1.0, 0.0],
            vec![true, false],
        )
        .unwrap()
    }

    #[test]
    fn test_two_groups_use_mean_difference() {
        let request = VolcanoRequest {
            transform: TransformFunction::Sqrt,
            ..VolcanoRequest::new("group")
        };
        let (difference, points) =
            volcano_points(&table(), &metadata(), &results(), &request).unwrap();
        assert_eq!(difference, DifferenceFunction::MeanDifference);
        // sqrt: group a = 1, group b = 3
        assert_relative_eq!(points[0].difference, -2.0);
        assert_relative_eq!(points[1].difference, 0.0);
    }

    #[test]
    fn test_numeric_column_rejected() {
        let err = volcano_points(&table(), &metadata(), &results(), &VolcanoRequest::new("ph"))
            .unwrap_err();
        assert!(matches!(err, DaaError::InvalidVariableType { .. }));
    }

    #[test]
    fn test_report_files() {
        let dir = TempDir::new().unwrap();
        ancom_volcano(
            dir.path(),
            &table(),
            &metadata(),
            &results(),
            &VolcanoRequest::new("group"),
        )
        .unwrap();
        let csv = std::fs::read_to_string(dir.path().join("ancom.csv")).unwrap();
        assert!(csv.contains("Reject null hypothesis"));
        let html = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(html.contains("<th>b1</th><td>1</td>"));
        assert!(!html.contains("<th>b2</th>"));
        assert!(html.contains("clr mean_difference"));
        assert!(!dir.path().join("percent-abundances.csv").exists());
    }
}
