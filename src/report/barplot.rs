//! Differential abundance bar plots, one page per model term.

use super::html::{chart_page, escape, HTML_HEAD, INTERPRETING_TEXT};
use crate::assemble::{assemble, AssembledRow, AssemblyRequest};
use crate::dataloaf::DataLoaf;
use crate::error::{DaaError, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// What `da_barplot` wrote.
#[derive(Debug, Clone, Default)]
pub struct BarplotReport {
    /// Term and figure path for every plotted term.
    pub figures: Vec<(String, PathBuf)>,
    /// Term and reason for every term that could not be plotted.
    pub failures: Vec<(String, String)>,
}

/// `<term>-ancombc-barplot.html` with whitespace runs collapsed to `-`.
pub fn barplot_file_name(term: &str) -> String {
    format!("{}-ancombc-barplot.html", term.replace(['/', '\\'], "_"))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn row_record(row: &AssembledRow, request: &AssemblyRequest) -> Value {
    let mut record = Map::new();
    record.insert("y_label".into(), json!(row.label));
    record.insert("feature".into(), json!(row.feature));
    record.insert(request.feature_id_label.clone(), json!(row.feature_id));
    record.insert(request.effect_size_label.clone(), json!(row.effect));
    record.insert(request.error_label.clone(), json!(row.error));
    record.insert(request.significance_label.clone(), json!(row.significance));
    record.insert("error-lower".into(), json!(row.error_lower()));
    record.insert("error-upper".into(), json!(row.error_upper()));
    record.insert("enriched".into(), json!(row.direction()));
    Value::Object(record)
}

/// Layered Vega-Lite bar chart with error rules for one term.
pub fn barplot_spec(term: &str, rows: &[AssembledRow], request: &AssemblyRequest) -> Value {
    let values: Vec<Value> = rows.iter().map(|r| row_record(r, request)).collect();
    let shared_y = json!({
        "field": "y_label",
        "type": "nominal",
        "title": "Feature ID (most specific, if taxonomic)",
        "sort": {"field": request.effect_size_label, "op": "min", "order": "descending"}
    });

    json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "title": term,
        "data": {"values": values},
        "layer": [
            {
                "mark": "bar",
                "encoding": {
                    "x": {
                        "field": request.effect_size_label,
                        "type": "quantitative",
                        "title": "Log Fold Change (LFC)"
                    },
                    "y": shared_y,
                    "color": {
                        "field": "enriched",
                        "type": "nominal",
                        "title": "Relative to reference",
                        "sort": "descending"
                    },
                    "tooltip": [
                        {"field": "feature", "type": "nominal"},
                        {"field": request.effect_size_label, "type": "quantitative"},
                        {"field": request.significance_label, "type": "quantitative"},
                        {"field": request.error_label, "type": "quantitative"},
                        {"field": "error-lower", "type": "quantitative"},
                        {"field": "error-upper", "type": "quantitative"}
                    ]
                }
            },
            {
                "mark": {"type": "rule", "color": "black"},
                "encoding": {
                    "x": {"field": "error-lower", "type": "quantitative"},
                    "x2": {"field": "error-upper"},
                    "y": shared_y
                }
            }
        ],
        "config": {
            "legend": {
                "strokeColor": "gray",
                "fillColor": "#EEEEEE",
                "padding": 10,
                "cornerRadius": 10
            }
        }
    })
}

/// Render one bar plot per term plus an `index.html` linking to them.
///
/// Missing slice labels or feature id column abort before any file is
/// written. Terms with nothing left to plot are reported inline in the index.
pub fn da_barplot(
    output_dir: &Path,
    loaf: &DataLoaf,
    request: &AssemblyRequest,
) -> Result<BarplotReport> {
    let terms = assemble(loaf, request)?;
    std::fs::create_dir_all(output_dir)?;

    let mut report = BarplotReport::default();
    let mut index = format!(
        "<html>\n{}\n<body>\nClick link to see figure for specific category:<p>\n<ul>\n",
        HTML_HEAD
    );

    for term in terms {
        match term.rows {
            Ok(rows) => {
                let file_name = barplot_file_name(&term.term);
                let path = output_dir.join(&file_name);
                let spec = barplot_spec(&term.term, &rows, request);
                std::fs::write(&path, chart_page(&term.term, &spec))?;
                index.push_str(&format!(
                    " <li><a href=\"./{}\">{}</a></li>\n",
                    escape(&file_name),
                    escape(&term.term)
                ));
                report.figures.push((term.term, path));
            }
            Err(DaaError::EmptyTerm { reason, .. }) => {
                log::warn!("Plotting {} failed: {}", term.term, reason);
                index.push_str(&format!(
                    "Plotting {} failed with error: {} <hr>\n",
                    escape(&term.term),
                    escape(&reason)
                ));
                report.failures.push((term.term, reason));
            }
            Err(e) => return Err(e),
        }
    }

    index.push_str("</ul>\n");
    index.push_str(INTERPRETING_TEXT);
    index.push_str("</body></html>");
    std::fs::write(output_dir.join("index.html"), index)?;

    log::info!(
        "Wrote {} bar plots to {} ({} terms skipped)",
        report.figures.len(),
        output_dir.display(),
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(
            barplot_file_name("bodysiteleft palm"),
            "bodysiteleft-palm-ancombc-barplot.html"
        );
        assert_eq!(
            barplot_file_name("a  b\tc"),
            "a-b-c-ancombc-barplot.html"
        );
        assert_eq!(barplot_file_name("x/y"), "x_y-ancombc-barplot.html");
    }

    #[test]
    fn test_spec_fields_follow_labels() {
        let request = AssemblyRequest::default();
        let rows = vec![AssembledRow {
            feature_id: "k__A;g__B".into(),
            label: "g__B".into(),
            feature: "k__A g__B".into(),
            effect: 1.5,
            error: 0.5,
            significance: 0.01,
        }];
        let spec = barplot_spec("groupb", &rows, &request);
        let value = &spec["data"]["values"][0];
        assert_eq!(value["lfc"], 1.5);
        assert_eq!(value["q_val"], 0.01);
        assert_eq!(value["error-upper"], 2.0);
        assert_eq!(value["enriched"], "enriched");
        assert_eq!(spec["layer"][1]["mark"]["type"], "rule");
        assert_eq!(spec["title"], "groupb");
    }
}
