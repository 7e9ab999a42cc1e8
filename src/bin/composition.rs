//! composition - differential abundance CLI
//!
//! Runs ANCOM-BC through its R script, renders dataloaf reports, and prepares
//! compositional tables.

use clap::{Parser, Subcommand};
use composition_daa::ancom::{AncomResults, DifferenceFunction, TransformFunction};
use composition_daa::assemble::AssemblyRequest;
use composition_daa::data::{CountMatrix, Metadata};
use composition_daa::dataloaf::{DataLoaf, Slice};
use composition_daa::engine::{ancombc, AncombcConfig, PAdjMethod, RscriptEngine};
use composition_daa::error::{DaaError, Result};
use composition_daa::report::{ancom_volcano, da_barplot, tabulate, VolcanoRequest};
use composition_daa::zero::{add_pseudocount, multiplicative_replacement, CompositionTable};
use std::path::{Path, PathBuf};

/// Differential abundance analysis of compositional feature tables
#[derive(Parser)]
#[command(name = "composition")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ANCOM-BC and write its results as a dataloaf
    Ancombc {
        /// Feature table TSV (features x samples)
        #[arg(short = 'i', long)]
        table: PathBuf,

        /// Sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Model formula over metadata columns (e.g. "bodysite + subject")
        #[arg(short, long)]
        formula: Option<String>,

        /// Reference level as column::value; repeat for several columns
        #[arg(short, long = "reference-level")]
        reference_levels: Vec<String>,

        /// YAML run configuration; flags given here take precedence
        #[arg(long)]
        config: Option<PathBuf>,

        /// p-value adjustment (holm, hochberg, hommel, bonferroni, BH, BY, fdr, none)
        #[arg(long)]
        p_adj_method: Option<PAdjMethod>,

        /// Prevalence cut-off for features
        #[arg(long)]
        prv_cut: Option<f64>,

        /// Library size cut-off for samples
        #[arg(long)]
        lib_cut: Option<u64>,

        /// Classify features as structural zeros using the lower bound (true|false)
        #[arg(long)]
        neg_lb: Option<bool>,

        /// Convergence tolerance of the E-M algorithm
        #[arg(long)]
        tol: Option<f64>,

        /// Maximum E-M iterations
        #[arg(long)]
        max_iter: Option<u32>,

        /// Use a conservative variance estimate of the test statistic (true|false)
        #[arg(long)]
        conserve: Option<bool>,

        /// Significance level
        #[arg(long)]
        alpha: Option<f64>,

        /// Stop the engine after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Path to run_ancombc.R (default: looked up on PATH)
        #[arg(long)]
        script: Option<PathBuf>,

        /// Interpreter for the script (e.g. Rscript)
        #[arg(long)]
        interpreter: Option<PathBuf>,

        /// Output dataloaf directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Bar plots of effect sizes per model term
    DaBarplot {
        /// Input dataloaf directory
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory for the HTML report
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "lfc")]
        effect_size_label: String,

        #[arg(long, default_value = "id")]
        feature_id_label: String,

        #[arg(long, default_value = "se")]
        error_label: String,

        #[arg(long, default_value = "q_val")]
        significance_label: String,

        /// Keep features with significance at or below this value
        #[arg(long, default_value = "1.0")]
        significance_threshold: f64,

        /// Keep features with absolute effect size at or above this value
        #[arg(long, default_value = "0.0")]
        effect_size_threshold: f64,

        /// TSV whose first column lists the feature ids to plot
        #[arg(long)]
        feature_ids: Option<PathBuf>,

        /// Separator between taxonomic ranks in feature ids
        #[arg(long, default_value = ";")]
        feature_id_delimiter: char,
    },

    /// Render every slice of a dataloaf as an HTML table
    Tabulate {
        /// Input dataloaf directory
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory for the HTML report
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace zeros so the table can be log-transformed
    AddPseudocount {
        /// Feature table TSV
        #[arg(short = 'i', long)]
        table: PathBuf,

        /// Output TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Value added to every cell, or the replacement delta with --multiplicative
        #[arg(short, long)]
        pseudocount: Option<f64>,

        /// Use multiplicative replacement on closed samples
        #[arg(long)]
        multiplicative: bool,
    },

    /// Report precomputed ANCOM results with a volcano plot
    AncomVolcano {
        /// Composition table TSV (no zeros for log and clr)
        #[arg(short = 'i', long)]
        table: PathBuf,

        /// Sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Categorical metadata column defining the groups
        #[arg(short, long)]
        column: String,

        /// ANCOM results CSV (id, W, reject)
        #[arg(short, long)]
        results: PathBuf,

        /// Optional percentile abundance CSV
        #[arg(long)]
        percentiles: Option<PathBuf>,

        /// sqrt, log or clr
        #[arg(long, default_value = "clr")]
        transform: TransformFunction,

        /// mean_difference or f_statistic
        #[arg(long)]
        difference: Option<DifferenceFunction>,

        /// Output directory for the HTML report
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write an example ANCOM-BC YAML configuration
    ExampleConfig {
        /// Output path for YAML
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Ancombc {
            table,
            metadata,
            formula,
            reference_levels,
            config,
            p_adj_method,
            prv_cut,
            lib_cut,
            neg_lb,
            tol,
            max_iter,
            conserve,
            alpha,
            timeout,
            script,
            interpreter,
            output,
        } => {
            let overrides = ParamOverrides {
                p_adj_method,
                prv_cut,
                lib_cut,
                neg_lb,
                tol,
                max_iter,
                conserve,
                alpha,
                timeout,
            };
            cmd_ancombc(
                &table,
                &metadata,
                formula,
                reference_levels,
                config.as_deref(),
                overrides,
                script,
                interpreter,
                &output,
            )
        }

        Commands::DaBarplot {
            data,
            output,
            effect_size_label,
            feature_id_label,
            error_label,
            significance_label,
            significance_threshold,
            effect_size_threshold,
            feature_ids,
            feature_id_delimiter,
        } => {
            let request = AssemblyRequest {
                effect_size_label,
                feature_id_label,
                error_label,
                significance_label,
                significance_threshold,
                effect_size_threshold,
                feature_ids: None,
                feature_id_delimiter,
            };
            cmd_da_barplot(&data, &output, request, feature_ids.as_deref())
        }

        Commands::Tabulate { data, output } => cmd_tabulate(&data, &output),

        Commands::AddPseudocount {
            table,
            output,
            pseudocount,
            multiplicative,
        } => cmd_add_pseudocount(&table, &output, pseudocount, multiplicative),

        Commands::AncomVolcano {
            table,
            metadata,
            column,
            results,
            percentiles,
            transform,
            difference,
            output,
        } => {
            let request = VolcanoRequest {
                column,
                transform,
                difference,
            };
            cmd_ancom_volcano(
                &table,
                &metadata,
                &results,
                percentiles.as_deref(),
                &request,
                &output,
            )
        }

        Commands::ExampleConfig { output } => cmd_example_config(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// ANCOM-BC parameters given on the command line.
struct ParamOverrides {
    p_adj_method: Option<PAdjMethod>,
    prv_cut: Option<f64>,
    lib_cut: Option<u64>,
    neg_lb: Option<bool>,
    tol: Option<f64>,
    max_iter: Option<u32>,
    conserve: Option<bool>,
    alpha: Option<f64>,
    timeout: Option<u64>,
}

impl ParamOverrides {
    fn apply(self, config: &mut AncombcConfig) {
        let params = &mut config.params;
        if let Some(v) = self.p_adj_method {
            params.p_adj_method = v;
        }
        if let Some(v) = self.prv_cut {
            params.prv_cut = v;
        }
        if let Some(v) = self.lib_cut {
            params.lib_cut = v;
        }
        if let Some(v) = self.tol {
            params.tol = v;
        }
        if let Some(v) = self.max_iter {
            params.max_iter = v;
        }
        if let Some(v) = self.alpha {
            params.alpha = v;
        }
        if self.timeout.is_some() {
            params.timeout_secs = self.timeout;
        }
        if let Some(v) = self.neg_lb {
            params.neg_lb = v;
        }
        if let Some(v) = self.conserve {
            params.conserve = v;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_ancombc(
    table_path: &Path,
    metadata_path: &Path,
    formula: Option<String>,
    reference_levels: Vec<String>,
    config_path: Option<&Path>,
    overrides: ParamOverrides,
    script: Option<PathBuf>,
    interpreter: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            eprintln!("Loading configuration from {:?}...", path);
            AncombcConfig::from_yaml(&std::fs::read_to_string(path)?)?
        }
        None => AncombcConfig::new(""),
    };
    if let Some(formula) = formula {
        config.formula = formula;
    }
    if !reference_levels.is_empty() {
        config.reference_levels = reference_levels;
    }
    overrides.apply(&mut config);
    if config.formula.trim().is_empty() {
        return Err(DaaError::InvalidParameter(
            "a formula is required (--formula or the config file)".to_string(),
        ));
    }

    eprintln!("Loading data...");
    let table = CountMatrix::from_tsv(table_path)?;
    let metadata = Metadata::from_tsv(metadata_path)?;
    eprintln!(
        "Loaded {} features x {} samples",
        table.n_features(),
        table.n_samples()
    );

    let mut engine = RscriptEngine::new(script);
    if let Some(interpreter) = interpreter {
        engine = engine.with_interpreter(interpreter);
    }

    eprintln!("Running ANCOM-BC with formula '{}'...", config.formula);
    let loaf = ancombc(
        &table,
        &metadata,
        &config.formula,
        &config.reference_levels,
        &config.params,
        &engine,
        output,
    )?;

    eprintln!("Done! Wrote {:?}", output);
    eprintln!("  Reference levels: {}", loaf.intercept_groups().join(", "));
    Ok(())
}

fn cmd_da_barplot(
    data: &Path,
    output: &Path,
    mut request: AssemblyRequest,
    feature_ids: Option<&Path>,
) -> Result<()> {
    if let Some(path) = feature_ids {
        let ids = read_feature_ids(path)?;
        eprintln!("Restricting plots to {} feature ids", ids.len());
        request.feature_ids = Some(ids);
    }

    let loaf = DataLoaf::open(data)?;
    let report = da_barplot(output, &loaf, &request)?;

    eprintln!("Wrote {} plots to {:?}", report.figures.len(), output);
    for (term, reason) in &report.failures {
        eprintln!("  {}: {}", term, reason);
    }
    Ok(())
}

/// First column of a TSV, skipping the header and `#` directive rows.
fn read_feature_ids(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        match record.get(0).map(str::trim) {
            Some(id) if !id.is_empty() && !id.starts_with('#') => ids.push(id.to_string()),
            _ => {}
        }
    }
    if ids.is_empty() {
        return Err(DaaError::EmptyData(format!(
            "no feature ids in {}",
            path.display()
        )));
    }
    Ok(ids)
}

fn cmd_tabulate(data: &Path, output: &Path) -> Result<()> {
    let loaf = DataLoaf::open(data)?;
    tabulate(output, &loaf)?;
    eprintln!("Wrote {:?}", output.join("index.html"));
    Ok(())
}

fn cmd_add_pseudocount(
    table_path: &Path,
    output: &Path,
    pseudocount: Option<f64>,
    multiplicative: bool,
) -> Result<()> {
    let table = CountMatrix::from_tsv(table_path)?;
    let composition = if multiplicative {
        multiplicative_replacement(&table, pseudocount)?
    } else {
        add_pseudocount(&table, pseudocount.unwrap_or(1.0))?
    };
    composition.to_tsv(output)?;
    eprintln!(
        "Wrote {} features x {} samples to {:?}",
        composition.n_features(),
        composition.n_samples(),
        output
    );
    Ok(())
}

fn cmd_ancom_volcano(
    table_path: &Path,
    metadata_path: &Path,
    results_path: &Path,
    percentiles: Option<&Path>,
    request: &VolcanoRequest,
    output: &Path,
) -> Result<()> {
    let table = CompositionTable::from_tsv(table_path)?;
    let metadata = Metadata::from_tsv(metadata_path)?;
    let mut results = AncomResults::from_csv(results_path)?;
    if let Some(path) = percentiles {
        results = results.with_percentiles(Slice::from_csv(path, "percent-abundances")?);
    }

    let points = ancom_volcano(output, &table, &metadata, &results, request)?;
    eprintln!(
        "Wrote ANCOM report for {} features ({} significant) to {:?}",
        points.len(),
        results.significant().len(),
        output
    );
    Ok(())
}

fn cmd_example_config(output: &Path) -> Result<()> {
    let yaml = AncombcConfig::example().to_yaml()?;
    std::fs::write(output, yaml)?;
    eprintln!("Example configuration written to {:?}", output);
    Ok(())
}
