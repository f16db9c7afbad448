//! Load test configuration loaded from YAML.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use url::Url;

use crate::error::{Error, Result};

/// Main load test configuration.
///
/// Loaded once from a YAML file, validated once, then consumed read-only by
/// the script emitter. Never mutated after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_url: String,
    pub execution: Execution,
    /// Raw k6 options merged verbatim into the emitted options block.
    #[serde(default)]
    pub k6_options: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(default)]
    pub batch: Option<BatchSource>,
    #[serde(default)]
    pub request: Option<RequestShape>,
    #[serde(default)]
    pub output: Option<OutputOptions>,
}

/// Execution profile for the test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub mode: Mode,
    /// Virtual user count handed to the engine as `vus`.
    #[serde(default)]
    pub concurrent: Option<u32>,
    #[serde(default)]
    pub iterations: Option<u64>,
    /// Engine duration string, e.g. `30s` or `5m`.
    #[serde(default)]
    pub duration: Option<String>,
}

/// How URLs are produced during the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Build a URL from parameter specs on every iteration.
    Construct,
    /// Pick URLs from a list pre-loaded out of a CSV file.
    Batch,
}

/// A named parameter generation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub spec: ParameterSpec,
}

/// Type-specific generation rule, tagged by `type` in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterSpec {
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
        /// Zero-pad the decimal representation to this width.
        #[serde(default)]
        length: Option<usize>,
    },
    String {
        #[serde(default)]
        length: Option<usize>,
        #[serde(default)]
        charset: Option<Charset>,
        #[serde(default, rename = "customChars")]
        custom_chars: Option<String>,
    },
    Array {
        #[serde(default)]
        values: Vec<ScalarValue>,
    },
    Csv {
        file: String,
        column: String,
    },
    Url {
        file: String,
        column: String,
        #[serde(default)]
        encoding: Option<Encoding>,
    },
    Static {
        value: ScalarValue,
    },
}

/// Character pool selector for `string` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    Alpha,
    Numeric,
    #[default]
    Alphanumeric,
    Custom,
}

/// Post-processing applied to `url` parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Base64,
    Url,
}

/// A literal configuration value, either text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Number(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Number(n) => write!(f, "{n}"),
            ScalarValue::Float(x) => write!(f, "{x}"),
            ScalarValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&ScalarValue> for serde_json::Value {
    fn from(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Number(n) => (*n).into(),
            ScalarValue::Float(x) => (*x).into(),
            ScalarValue::Text(s) => s.clone().into(),
        }
    }
}

/// Source of pre-enumerated URLs for batch mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSource {
    pub file: String,
    pub column: String,
}

/// HTTP request shape for the emitted script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestShape {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Engine output sink passed through to `k6 run --out`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputOptions {
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Influxdb,
    Cloud,
}

const VALID_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

impl LoadTestConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| Error::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validate the configuration, stopping at the first violation.
    ///
    /// Structural checks run first (field shapes and value ranges), then
    /// cross-field rules such as mode/section consistency and referenced
    /// file existence. Read-only apart from the existence probes.
    pub fn validate(&self) -> Result<()> {
        self.validate_structure()?;
        self.validate_rules()
    }

    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("'name' must not be empty".into()));
        }

        Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid baseUrl '{}': {e}", self.base_url)))?;

        if self.execution.concurrent == Some(0) {
            return Err(Error::Config("'execution.concurrent' must be positive".into()));
        }
        if self.execution.iterations == Some(0) {
            return Err(Error::Config("'execution.iterations' must be positive".into()));
        }

        if let Some(parameters) = &self.parameters {
            let mut seen = HashSet::new();
            for param in parameters {
                if param.name.trim().is_empty() {
                    return Err(Error::Config("parameter names must not be empty".into()));
                }
                if !seen.insert(param.name.as_str()) {
                    return Err(Error::Config(format!(
                        "Duplicate parameter name: '{}'",
                        param.name
                    )));
                }
                param.validate_structure()?;
            }
        }

        if let Some(request) = &self.request {
            if let Some(method) = &request.method {
                if !VALID_METHODS.contains(&method.to_uppercase().as_str()) {
                    return Err(Error::Config(format!(
                        "Invalid request method: '{method}'"
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_rules(&self) -> Result<()> {
        match self.execution.mode {
            Mode::Construct => {
                if self.parameters.as_ref().map_or(true, |p| p.is_empty()) {
                    return Err(Error::Config(
                        "Construct mode requires parameters to be defined".into(),
                    ));
                }
            }
            Mode::Batch => {
                let batch = self.batch.as_ref().ok_or_else(|| {
                    Error::Config("Batch mode requires batch configuration".into())
                })?;
                if !Path::new(&batch.file).exists() {
                    return Err(Error::Config(format!("Batch file not found: {}", batch.file)));
                }
            }
        }

        if let Some(parameters) = &self.parameters {
            for param in parameters {
                param.validate_rules()?;
            }
        }

        // Note: both iterations and duration set at once is accepted; the
        // engine applies its own precedence between them.
        if self.execution.iterations.is_none() && self.execution.duration.is_none() {
            return Err(Error::Config(
                "Either iterations or duration must be specified".into(),
            ));
        }

        Ok(())
    }
}

impl Parameter {
    fn validate_structure(&self) -> Result<()> {
        match &self.spec {
            ParameterSpec::Integer { length, .. } | ParameterSpec::String { length, .. } => {
                if *length == Some(0) {
                    return Err(Error::Config(format!(
                        "Parameter '{}': length must be positive",
                        self.name
                    )));
                }
            }
            _ => {}
        }

        if let ParameterSpec::String {
            charset: Some(Charset::Custom),
            custom_chars,
            ..
        } = &self.spec
        {
            if custom_chars.as_deref().map_or(true, str::is_empty) {
                return Err(Error::Config(format!(
                    "Parameter '{}': charset 'custom' requires customChars",
                    self.name
                )));
            }
        }

        Ok(())
    }

    fn validate_rules(&self) -> Result<()> {
        match &self.spec {
            ParameterSpec::Array { values } => {
                if values.is_empty() {
                    return Err(Error::Config(format!(
                        "Array parameter '{}' must have at least one value",
                        self.name
                    )));
                }
            }
            ParameterSpec::Integer {
                min: Some(min),
                max: Some(max),
                ..
            } if min > max => {
                return Err(Error::Config(format!(
                    "Invalid range for parameter '{}': min ({min}) > max ({max})",
                    self.name
                )));
            }
            ParameterSpec::Csv { file, .. } | ParameterSpec::Url { file, .. } => {
                if !Path::new(file).exists() {
                    return Err(Error::Config(format!(
                        "File not found for parameter '{}': {file}",
                        self.name
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
