//! Pipeline orchestration: load, validate, emit, and invoke k6.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::config::{LoadTestConfig, OutputFormat, OutputOptions};
use crate::error::{Error, Result};
use crate::k6::{ScriptEmitter, SCRIPT_FILENAME};

/// Options for a full pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Emit the script but do not execute k6.
    pub dry_run: bool,
    /// Keep the emitted script after a live run.
    pub keep_script: bool,
}

/// Runs the full load-test pipeline.
pub struct Runner;

impl Runner {
    /// Load → validate → emit → (optionally) execute.
    ///
    /// Stops at the first failing stage; there is no partial success.
    pub fn run(config_path: &Path, options: &RunOptions) -> Result<()> {
        println!("Loading configuration: {}", config_path.display());
        let config = LoadTestConfig::from_file(config_path)?;

        config.validate()?;
        println!("✓ Configuration valid");

        let script_path = write_script(&config, &options.output_dir)?;
        println!("✓ k6 script generated: {}", script_path.display());

        if options.dry_run {
            println!("Dry run - script generated but not executed");
            return Ok(());
        }

        run_k6(&script_path, &options.output_dir, config.output.as_ref())?;

        if options.keep_script {
            println!("✓ k6 script saved: {}", script_path.display());
        } else {
            // Best effort; a leftover script is not a run failure.
            if fs::remove_file(&script_path).is_ok() {
                debug!(path = %script_path.display(), "removed generated script");
            }
        }

        println!("✓ Load test completed");
        Ok(())
    }

    /// Validate the config and write the emitted script to an explicit path.
    pub fn generate(config_path: &Path, out_path: &Path) -> Result<()> {
        let config = LoadTestConfig::from_file(config_path)?;
        config.validate()?;

        let script = ScriptEmitter::new(&config).emit()?;
        fs::write(out_path, script).map_err(|source| Error::Write {
            path: out_path.display().to_string(),
            source,
        })?;
        println!("✓ k6 script written: {}", out_path.display());
        Ok(())
    }

    /// Load and validate only, reporting the first violation if any.
    pub fn validate(config_path: &Path) -> Result<()> {
        let config = LoadTestConfig::from_file(config_path)?;
        config.validate()?;
        println!("✓ {} is valid", config_path.display());
        Ok(())
    }
}

/// Emit the script into `output_dir` under the fixed name, overwriting any
/// previous run's output.
fn write_script(config: &LoadTestConfig, output_dir: &Path) -> Result<PathBuf> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).map_err(|source| Error::Write {
            path: output_dir.display().to_string(),
            source,
        })?;
    }

    let script = ScriptEmitter::new(config).emit()?;
    let script_path = output_dir.join(SCRIPT_FILENAME);
    fs::write(&script_path, script).map_err(|source| Error::Write {
        path: script_path.display().to_string(),
        source,
    })?;
    Ok(script_path)
}

/// Whether the k6 binary answers a version probe.
pub fn k6_installed() -> bool {
    Command::new("k6")
        .arg("version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Invoke `k6 run` with results written into the output directory. The
/// subprocess inherits stdout/stderr, so engine output streams live.
fn run_k6(script_path: &Path, output_dir: &Path, output: Option<&OutputOptions>) -> Result<()> {
    if !k6_installed() {
        return Err(Error::K6NotFound);
    }

    let out_arg = out_argument(output_dir, output);
    info!(script = %script_path.display(), out = %out_arg, "running k6");
    println!("Running: k6 run --out {out_arg} {}", script_path.display());

    let status = Command::new("k6")
        .arg("run")
        .arg("--out")
        .arg(&out_arg)
        .arg(script_path)
        .status()
        .map_err(Error::Spawn)?;

    if !status.success() {
        return Err(Error::ExecutionFailed);
    }

    if let Some(path) = out_arg.strip_prefix("json=") {
        println!("✓ Results saved to: {path}");
    }
    Ok(())
}

/// `--out` sink for `k6 run`: JSON into the output directory by default,
/// with influxdb/cloud passthrough when configured.
fn out_argument(output_dir: &Path, output: Option<&OutputOptions>) -> String {
    let format = output.and_then(|o| o.format).unwrap_or(OutputFormat::Json);
    let file = output.and_then(|o| o.file.as_deref());

    match format {
        OutputFormat::Json => {
            let path = file
                .map(PathBuf::from)
                .unwrap_or_else(|| output_dir.join("results.json"));
            format!("json={}", path.display())
        }
        OutputFormat::Influxdb => match file {
            Some(target) => format!("influxdb={target}"),
            None => "influxdb".to_string(),
        },
        OutputFormat::Cloud => "cloud".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn generate_writes_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("test.yaml");
        let mut file = fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
name: sample
baseUrl: https://api.test/items
execution:
  mode: construct
  concurrent: 2
  iterations: 10
parameters:
  - name: color
    type: array
    values: [red, green]
"#
        )
        .unwrap();

        let out_path = dir.path().join("script.js");
        Runner::generate(&config_path, &out_path).unwrap();

        let script = fs::read_to_string(&out_path).unwrap();
        assert!(script.contains("function constructUrl()"));
        assert!(script.contains("export default function()"));
    }

    #[test]
    fn dry_run_writes_fixed_filename_and_skips_k6() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("test.yaml");
        fs::write(
            &config_path,
            r#"
name: sample
baseUrl: https://api.test/items
execution:
  mode: construct
  iterations: 1
parameters:
  - name: id
    type: integer
"#,
        )
        .unwrap();

        let out_dir = dir.path().join("out");
        Runner::run(
            &config_path,
            &RunOptions {
                output_dir: out_dir.clone(),
                dry_run: true,
                keep_script: false,
            },
        )
        .unwrap();
        assert!(out_dir.join(SCRIPT_FILENAME).exists());
    }

    #[test]
    fn run_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.yaml");
        fs::write(
            &config_path,
            r#"
name: bad
baseUrl: https://api.test/
execution:
  mode: construct
  iterations: 1
"#,
        )
        .unwrap();

        let err = Runner::run(
            &config_path,
            &RunOptions {
                output_dir: dir.path().join("out"),
                dry_run: true,
                keep_script: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("Construct mode"));
    }

    #[test]
    fn out_argument_defaults_to_json_in_output_dir() {
        let arg = out_argument(Path::new("/tmp/out"), None);
        assert_eq!(arg, "json=/tmp/out/results.json");
    }

    #[test]
    fn out_argument_honors_influxdb_target() {
        let output = OutputOptions {
            format: Some(OutputFormat::Influxdb),
            file: Some("http://influx.test:8086/k6".into()),
        };
        let arg = out_argument(Path::new("/tmp/out"), Some(&output));
        assert_eq!(arg, "influxdb=http://influx.test:8086/k6");
    }
}
