//! ANCOM-BC run by an R script in a child process.

use super::raw::RawResult;
use super::{EngineJob, StatisticalEngine};
use crate::error::{DaaError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Runs `run_ancombc.R` (or another script with the same flags).
#[derive(Debug, Clone)]
pub struct RscriptEngine {
    script: PathBuf,
    interpreter: Option<PathBuf>,
}

impl Default for RscriptEngine {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RscriptEngine {
    pub const DEFAULT_SCRIPT: &'static str = "run_ancombc.R";

    /// Use `script`, or look up `run_ancombc.R` on `PATH`.
    pub fn new(script: Option<PathBuf>) -> Self {
        let script = script.unwrap_or_else(|| {
            which::which(Self::DEFAULT_SCRIPT).unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_SCRIPT))
        });
        Self {
            script,
            interpreter: None,
        }
    }

    /// Run the script through an interpreter (e.g. `Rscript`) instead of
    /// executing it directly.
    pub fn with_interpreter<P: Into<PathBuf>>(mut self, interpreter: P) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Flags passed to the script for a job.
    pub fn args(job: &EngineJob) -> Vec<OsString> {
        let p = &job.params;
        let mut args: Vec<OsString> = Vec::new();
        let mut flag = |name: &str, value: OsString| {
            args.push(OsString::from(format!("--{}", name)));
            args.push(value);
        };
        flag("inp_abundances_path", job.abundances_path.clone().into());
        flag("inp_metadata_path", job.metadata_path.clone().into());
        flag("formula", job.formula.clone().into());
        flag("p_adj_method", p.p_adj_method.name().into());
        flag("prv_cut", p.prv_cut.to_string().into());
        flag("lib_cut", p.lib_cut.to_string().into());
        flag("reference_levels", job.reference_levels.clone().into());
        flag("neg_lb", py_bool(p.neg_lb).into());
        flag("tol", p.tol.to_string().into());
        flag("max_iter", p.max_iter.to_string().into());
        flag("conserve", py_bool(p.conserve).into());
        flag("alpha", p.alpha.to_string().into());
        flag("output_loaf", job.output_loaf.clone().into());
        args
    }

    fn command(&self, job: &EngineJob) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.script);
                cmd
            }
            None => Command::new(&self.script),
        };
        cmd.args(Self::args(job));
        cmd
    }
}

/// Wait for the child, killing it once `timeout_secs` has elapsed.
fn wait_for(child: &mut Child, timeout_secs: Option<u64>, engine: &str) -> Result<ExitStatus> {
    let Some(seconds) = timeout_secs else {
        return Ok(child.wait()?);
    };
    let deadline = Instant::now() + Duration::from_secs(seconds);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            if let Err(e) = child.kill() {
                log::warn!("Failed to stop {}: {}", engine, e);
            }
            child.wait()?;
            return Err(DaaError::EngineTimeout {
                engine: engine.to_string(),
                seconds,
            });
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

impl StatisticalEngine for RscriptEngine {
    fn name(&self) -> &str {
        "ANCOM-BC in R"
    }

    fn run(&self, job: &EngineJob) -> Result<RawResult> {
        let mut cmd = self.command(job);
        log::info!("Running external command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| DaaError::EngineUnavailable {
            engine: format!("{} ({})", self.name(), self.script.display()),
            reason: e.to_string(),
        })?;
        let status = wait_for(&mut child, job.params.timeout_secs, self.name())?;

        if !status.success() {
            return Err(match status.code() {
                Some(code) => DaaError::EngineFailed {
                    engine: self.name().to_string(),
                    code,
                },
                None => DaaError::EngineKilled {
                    engine: self.name().to_string(),
                },
            });
        }

        RawResult::from_dir(&job.output_loaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AncombcParams;
    use tempfile::TempDir;

    fn job(dir: &Path, params: AncombcParams) -> EngineJob {
        EngineJob {
            abundances_path: dir.join("input.biom.tsv"),
            metadata_path: dir.join("input.map.txt"),
            formula: "bodysite".to_string(),
            reference_levels: "['bodysite::gut']".to_string(),
            params,
            output_loaf: dir.join("output_loaf"),
        }
    }

    fn sh_engine(dir: &Path, body: &str) -> RscriptEngine {
        let script = dir.join("engine.sh");
        std::fs::write(&script, body).unwrap();
        RscriptEngine::new(Some(script)).with_interpreter("sh")
    }

    #[test]
    fn test_flag_vocabulary() {
        let dir = TempDir::new().unwrap();
        let args: Vec<String> = RscriptEngine::args(&job(dir.path(), AncombcParams::default()))
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();

        let value = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).unwrap();
            args[idx + 1].clone()
        };
        assert_eq!(value("--formula"), "bodysite");
        assert_eq!(value("--p_adj_method"), "holm");
        assert_eq!(value("--prv_cut"), "0.1");
        assert_eq!(value("--lib_cut"), "0");
        assert_eq!(value("--neg_lb"), "False");
        assert_eq!(value("--conserve"), "False");
        assert_eq!(value("--max_iter"), "100");
        assert_eq!(value("--alpha"), "0.05");
        assert_eq!(value("--reference_levels"), "['bodysite::gut']");
        assert!(value("--output_loaf").ends_with("output_loaf"));
        assert_eq!(args.len(), 26);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_code() {
        let dir = TempDir::new().unwrap();
        let engine = sh_engine(dir.path(), "exit 3\n");
        let err = engine
            .run(&job(dir.path(), AncombcParams::default()))
            .unwrap_err();
        match &err {
            DaaError::EngineFailed { code, .. } => assert_eq!(*code, 3),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("return code 3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_run_reads_output() {
        let dir = TempDir::new().unwrap();
        let body = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --output_loaf) out="$2" ;;
  esac
  shift
done
mkdir -p "$out"
for s in lfc se W p_val q_val; do
  printf 'id,(Intercept)\nf1,1\n' > "$out/${s}_slice.csv"
done
"#;
        let engine = sh_engine(dir.path(), body);
        let raw = engine
            .run(&job(dir.path(), AncombcParams::default()))
            .unwrap();
        assert_eq!(raw.lfc.feature_ids(), &["f1"]);
        assert_eq!(raw.columns(), &["(Intercept)"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_stops_child() {
        let dir = TempDir::new().unwrap();
        let engine = sh_engine(dir.path(), "sleep 30\n");
        let params = AncombcParams {
            timeout_secs: Some(1),
            ..AncombcParams::default()
        };
        let started = Instant::now();
        let err = engine.run(&job(dir.path(), params)).unwrap_err();
        assert!(matches!(err, DaaError::EngineTimeout { seconds: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn test_missing_executable() {
        let dir = TempDir::new().unwrap();
        let engine = RscriptEngine::new(Some(dir.path().join("no-such-script.R")));
        let err = engine
            .run(&job(dir.path(), AncombcParams::default()))
            .unwrap_err();
        assert!(matches!(err, DaaError::EngineUnavailable { .. }));
    }
}
