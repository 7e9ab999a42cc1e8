//! Integration tests for the ANCOM-BC workflow: run, package, report.

use composition_daa::prelude::*;
use std::cell::Cell;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const TERMS: [&str; 3] = ["bodysiteleft palm", "bodysiteright palm", "bodysitetongue"];

/// Writes fixed slices to the job's output directory like the R script does.
struct CsvEngine {
    runs: Cell<usize>,
}

impl CsvEngine {
    fn new() -> Self {
        Self { runs: Cell::new(0) }
    }

    fn slice_text(statistic: &str) -> String {
        // k__Bacteria;g__Alpha is significant for left palm and tongue only.
        let rows: [(&str, [f64; 4]); 3] = match statistic {
            "lfc" => [
                ("k__Bacteria;g__Alpha", [0.1, 2.5, 0.2, -1.5]),
                ("k__Bacteria;g__Beta", [0.3, 0.4, -0.6, 0.1]),
                ("k__Bacteria;g__", [0.0, 0.05, 0.1, -0.2]),
            ],
            "se" => [
                ("k__Bacteria;g__Alpha", [0.1, 0.3, 0.2, 0.4]),
                ("k__Bacteria;g__Beta", [0.1, 0.2, 0.2, 0.1]),
                ("k__Bacteria;g__", [0.1, 0.1, 0.1, 0.1]),
            ],
            "q_val" => [
                ("k__Bacteria;g__Alpha", [0.9, 0.0001, 0.2, 0.0004]),
                ("k__Bacteria;g__Beta", [0.9, 0.4, 0.01, 0.8]),
                ("k__Bacteria;g__", [0.9, 0.9, 0.9, 0.9]),
            ],
            _ => [
                ("k__Bacteria;g__Alpha", [1.0, 8.0, 1.0, -4.0]),
                ("k__Bacteria;g__Beta", [3.0, 2.0, -3.0, 1.0]),
                ("k__Bacteria;g__", [0.0, 0.5, 1.0, -2.0]),
            ],
        };
        let mut text = format!("id,(Intercept),{}\n", TERMS.join(","));
        for (id, values) in rows {
            let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            text.push_str(&format!("{},{}\n", id, cells.join(",")));
        }
        text
    }
}

impl StatisticalEngine for CsvEngine {
    fn name(&self) -> &str {
        "csv fixture"
    }

    fn run(&self, job: &EngineJob) -> Result<RawResult> {
        self.runs.set(self.runs.get() + 1);

        let metadata = Metadata::from_tsv(&job.metadata_path)?;
        assert_eq!(metadata.sample_ids(), &["S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8"]);
        assert_eq!(job.reference_levels, "['bodysite::gut']");

        std::fs::create_dir_all(&job.output_loaf)?;
        for statistic in ["lfc", "se", "W", "p_val", "q_val"] {
            std::fs::write(
                job.output_loaf.join(format!("{}_slice.csv", statistic)),
                Self::slice_text(statistic),
            )?;
        }
        RawResult::from_dir(&job.output_loaf)
    }
}

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file.flush().unwrap();
    file
}

fn inputs() -> (CountMatrix, Metadata) {
    let table = write_temp(
        "#OTU ID\tS1\tS2\tS3\tS4\tS5\tS6\tS7\tS8\n\
         k__Bacteria;g__Alpha\t10\t12\t80\t75\t9\t11\t2\t3\n\
         k__Bacteria;g__Beta\t40\t38\t44\t41\t20\t22\t39\t40\n\
         k__Bacteria;g__\t5\t6\t5\t7\t6\t5\t4\t6\n",
    );
    // S9 has no counts and must not reach the engine.
    let metadata = write_temp(
        "sample-id\tbodysite\tsubject\n\
         S1\tgut\tsubject-1\n\
         S2\tgut\tsubject-2\n\
         S3\tleft palm\tsubject-1\n\
         S4\tleft palm\tsubject-2\n\
         S5\tright palm\tsubject-1\n\
         S6\tright palm\tsubject-2\n\
         S7\ttongue\tsubject-1\n\
         S8\ttongue\tsubject-2\n\
         S9\ttongue\tsubject-3\n",
    );
    (
        CountMatrix::from_tsv(table.path()).unwrap(),
        Metadata::from_tsv(metadata.path()).unwrap(),
    )
}

fn run_ancombc(output: &Path, engine: &CsvEngine) -> DataLoaf {
    let (table, metadata) = inputs();
    ancombc(
        &table,
        &metadata,
        "bodysite",
        &["bodysite::gut".to_string()],
        &AncombcParams::default(),
        engine,
        output,
    )
    .unwrap()
}

#[test]
fn test_ancombc_writes_dataloaf() {
    let dir = TempDir::new().unwrap();
    let engine = CsvEngine::new();
    let loaf = run_ancombc(&dir.path().join("ancombc"), &engine);
    assert_eq!(engine.runs.get(), 1);

    let reopened = DataLoaf::open(loaf.dir()).unwrap();
    assert_eq!(
        reopened.slice_names().unwrap(),
        vec!["W", "lfc", "p_val", "q_val", "se"]
    );
    assert_eq!(reopened.intercept_groups(), &["bodysite::gut"]);

    let lfc = reopened.slice("lfc").unwrap();
    assert_eq!(lfc.n_features(), 3);
    assert_eq!(lfc.get(0, "bodysiteleft palm"), Some(2.5));
}

#[test]
fn test_level_missing_from_table_stops_before_engine() {
    let dir = TempDir::new().unwrap();
    let engine = CsvEngine::new();
    let (table, metadata) = inputs();
    let err = ancombc(
        &table,
        &metadata,
        "bodysite",
        &["bodysite::placenta".to_string()],
        &AncombcParams::default(),
        &engine,
        &dir.path().join("ancombc"),
    )
    .unwrap_err();

    assert!(err.to_string().contains("placenta"));
    assert_eq!(engine.runs.get(), 0);
    assert!(!dir.path().join("ancombc").exists());
}

#[test]
fn test_barplot_threshold_keeps_significant_terms() {
    let dir = TempDir::new().unwrap();
    let loaf = run_ancombc(&dir.path().join("ancombc"), &CsvEngine::new());

    let request = AssemblyRequest {
        significance_threshold: 1e-3,
        ..AssemblyRequest::default()
    };
    let out = dir.path().join("barplot");
    let report = da_barplot(&out, &loaf, &request).unwrap();

    let plotted: Vec<&str> = report.figures.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(plotted, vec!["bodysiteleft palm", "bodysitetongue"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "bodysiteright palm");

    assert!(out.join("bodysiteleft-palm-ancombc-barplot.html").is_file());
    assert!(out.join("bodysitetongue-ancombc-barplot.html").is_file());
    assert!(!out.join("bodysiteright-palm-ancombc-barplot.html").exists());

    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains(
        "Plotting bodysiteright palm failed with error: \
         No features remaining after applying filters."
    ));
    assert!(index.contains("./bodysitetongue-ancombc-barplot.html"));
}

#[test]
fn test_barplot_labels_fall_back_for_unnamed_taxa() {
    let dir = TempDir::new().unwrap();
    let loaf = run_ancombc(&dir.path().join("ancombc"), &CsvEngine::new());

    let terms = assemble(&loaf, &AssemblyRequest::default()).unwrap();
    assert_eq!(terms.len(), 3);
    let rows = terms[0].rows.as_ref().unwrap();
    let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["g__Alpha", "g__Beta", "k__Bacteria"]);
}

#[test]
fn test_reports_are_reproducible() {
    let dir = TempDir::new().unwrap();
    let loaf = run_ancombc(&dir.path().join("ancombc"), &CsvEngine::new());

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    da_barplot(&first, &loaf, &AssemblyRequest::default()).unwrap();
    da_barplot(&second, &loaf, &AssemblyRequest::default()).unwrap();
    tabulate(&first.join("table"), &loaf).unwrap();
    tabulate(&second.join("table"), &loaf).unwrap();

    for file in [
        "index.html",
        "bodysitetongue-ancombc-barplot.html",
        "table/index.html",
    ] {
        let a = std::fs::read_to_string(first.join(file)).unwrap();
        let b = std::fs::read_to_string(second.join(file)).unwrap();
        assert_eq!(a, b, "{} differs between runs", file);
    }
}

#[test]
fn test_tabulate_shows_reference_levels() {
    let dir = TempDir::new().unwrap();
    let loaf = run_ancombc(&dir.path().join("ancombc"), &CsvEngine::new());

    let out = dir.path().join("tabulate");
    tabulate(&out, &loaf).unwrap();
    let html = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(html.contains("bodysite::gut"));
    for name in ["W", "lfc", "p_val", "q_val", "se"] {
        assert!(html.contains(&format!("<h2>{}</h2>", name)));
    }
}

#[test]
fn test_second_run_into_same_directory_is_refused() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("ancombc");
    let engine = CsvEngine::new();
    run_ancombc(&output, &engine);

    let (table, metadata) = inputs();
    let err = ancombc(
        &table,
        &metadata,
        "bodysite",
        &[],
        &AncombcParams::default(),
        &engine,
        &output,
    )
    .unwrap_err();
    assert!(matches!(err, DaaError::PackageExists(_)));
    assert_eq!(engine.runs.get(), 1);

    let loaf = DataLoaf::open(&output).unwrap();
    let listed: Vec<String> = loaf
        .read_sidecar()
        .unwrap()
        .resources
        .into_iter()
        .map(|r| r.name)
        .collect();
    let mut listed_sorted = listed.clone();
    listed_sorted.sort();
    assert_eq!(listed_sorted, loaf.slice_names().unwrap());
}
