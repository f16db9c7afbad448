//! k6 script emission.
//!
//! Renders a validated [`LoadTestConfig`] into a complete, directly runnable
//! k6 JavaScript test. Batch URL lists and CSV-backed parameter values are
//! pre-fetched at emit time and inlined as literals; every other parameter
//! type becomes source code that samples a fresh value per iteration, with
//! the same semantics as the in-process generator.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::{
    Charset, Encoding, LoadTestConfig, Mode, Parameter, ParameterSpec,
};
use crate::csv::CsvTable;
use crate::error::{Error, Result};
use crate::generator::charset_chars;

/// Fixed name of the emitted script inside the output directory.
pub const SCRIPT_FILENAME: &str = "test.js";

/// Renders one configuration into k6 script text.
pub struct ScriptEmitter<'a> {
    config: &'a LoadTestConfig,
}

impl<'a> ScriptEmitter<'a> {
    pub fn new(config: &'a LoadTestConfig) -> Self {
        Self { config }
    }

    /// Emit the full script: header, options block, data section, entry point.
    pub fn emit(&self) -> Result<String> {
        Ok(format!(
            "\nimport http from 'k6/http';\nimport {{ check, sleep }} from 'k6';\n\n{}\n\n{}\n\n{}\n",
            self.options_block(),
            self.data_section()?,
            self.default_function()
        ))
    }

    /// Execution profile merged with raw passthrough options; passthrough
    /// wins on key collision.
    fn options_block(&self) -> String {
        let mut options = serde_json::Map::new();
        let execution = &self.config.execution;

        if let Some(vus) = execution.concurrent {
            options.insert("vus".into(), vus.into());
        }
        if let Some(iterations) = execution.iterations {
            options.insert("iterations".into(), iterations.into());
        }
        if let Some(duration) = &execution.duration {
            options.insert("duration".into(), duration.clone().into());
        }
        if let Some(extra) = &self.config.k6_options {
            for (key, value) in extra {
                options.insert(key.clone(), value.clone());
            }
        }

        format!("export let options = {};", pretty(&Value::Object(options)))
    }

    fn data_section(&self) -> Result<String> {
        match self.config.execution.mode {
            Mode::Batch => self.batch_data(),
            Mode::Construct => self.construct_data(),
        }
    }

    /// Inline the batch URL list and a random picker.
    fn batch_data(&self) -> Result<String> {
        // Re-checked here even though validation catches it earlier.
        let batch = self
            .config
            .batch
            .as_ref()
            .ok_or_else(|| Error::Config("Batch mode requires batch configuration".into()))?;

        let urls = load_column(&batch.file, &batch.column)?;
        Ok(format!(
            "\nconst testUrls = {};\n\nfunction getRandomUrl() {{\n  return testUrls[Math.floor(Math.random() * testUrls.length)];\n}}",
            pretty(&json!(urls))
        ))
    }

    /// Inline pre-fetched CSV data plus a `constructUrl()` that samples
    /// parameter values per iteration and assembles a query string.
    fn construct_data(&self) -> Result<String> {
        let base = js_string(&self.config.base_url);
        let parameters = match &self.config.parameters {
            Some(parameters) if !parameters.is_empty() => parameters,
            _ => {
                return Ok(format!(
                    "\nfunction constructUrl() {{\n  return {base};\n}}"
                ));
            }
        };

        let mut loaders = Vec::new();
        for param in parameters {
            if let Some(loader) = self.data_loader(param)? {
                loaders.push(loader);
            }
        }

        let snippets: Vec<String> = parameters.iter().map(parameter_snippet).collect();
        let pushes: Vec<String> = parameters
            .iter()
            .map(|p| {
                format!(
                    "  params.push('{}=' + encodeURIComponent({}));",
                    p.name,
                    js_ident(&p.name)
                )
            })
            .collect();

        Ok(format!(
            "\n{}\n\nfunction constructUrl() {{\n{}\n  \n  let url = {base};\n  const params = [];\n{}\n  \n  if (params.length > 0) {{\n    url += '?' + params.join('&');\n  }}\n  \n  return url;\n}}",
            loaders.join("\n"),
            snippets.join("\n"),
            pushes.join("\n"),
        ))
    }

    /// Pre-fetched data array for file-backed parameters, applying any
    /// configured encoding at emit time.
    fn data_loader(&self, param: &Parameter) -> Result<Option<String>> {
        let (file, column, encoding) = match &param.spec {
            ParameterSpec::Csv { file, column } => (file, column, None),
            ParameterSpec::Url {
                file,
                column,
                encoding,
            } => (file, column, *encoding),
            _ => return Ok(None),
        };

        let mut values = load_column(file, column)?;
        if let Some(encoding) = encoding {
            values = values
                .iter()
                .map(|v| match encoding {
                    Encoding::Base64 => {
                        use base64::engine::general_purpose::STANDARD;
                        use base64::Engine as _;
                        STANDARD.encode(v)
                    }
                    Encoding::Url => crate::generator::auto_escape(v).into_owned(),
                })
                .collect();
        }

        Ok(Some(format!(
            "const {}Data = {};",
            js_ident(&param.name),
            serde_json::to_string(&values).expect("string array serializes"),
        )))
    }

    /// Entry point: one request per invocation, fixed status and latency
    /// checks, short pause.
    fn default_function(&self) -> String {
        let request = self.config.request.as_ref();
        let method = request
            .and_then(|r| r.method.as_deref())
            .unwrap_or("GET")
            .to_uppercase();

        let mut options = serde_json::Map::new();
        if let Some(headers) = request.and_then(|r| r.headers.as_ref()) {
            if !headers.is_empty() {
                options.insert("headers".into(), json!(headers));
            }
        }
        if let Some(body) = request.and_then(|r| r.body.as_ref()) {
            if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
                options.insert("body".into(), json!(body));
            }
        }

        let request_options = if options.is_empty() {
            String::new()
        } else {
            format!(", {}", pretty(&Value::Object(options)))
        };

        let url_source = match self.config.execution.mode {
            Mode::Batch => "getRandomUrl()",
            Mode::Construct => "constructUrl()",
        };

        format!(
            "\nexport default function() {{\n  const url = {url_source};\n  \n  const response = http.{}(url{request_options});\n  \n  check(response, {{\n    'status is 200': (r) => r.status === 200,\n    'response time < 500ms': (r) => r.timings.duration < 500,\n  }});\n  \n  sleep(1);\n}}",
            method.to_lowercase(),
        )
    }
}

/// Per-iteration sampling code for one parameter.
fn parameter_snippet(param: &Parameter) -> String {
    let name = js_ident(&param.name);
    match &param.spec {
        ParameterSpec::Integer { min, max, length } => {
            let min = min.unwrap_or(0);
            let max = max.unwrap_or(100);
            let sample = format!("Math.floor(Math.random() * ({max} - {min} + 1)) + {min}");
            match length {
                Some(width) => format!(
                    "\n  // {}: integer parameter\n  const {name}Raw = {sample};\n  const {name} = parseInt(String({name}Raw).padStart({width}, '0'), 10);",
                    param.name
                ),
                None => format!(
                    "\n  // {}: integer parameter\n  const {name} = {sample};",
                    param.name
                ),
            }
        }
        ParameterSpec::String {
            length,
            charset,
            custom_chars,
        } => {
            let pool = charset_chars(charset.unwrap_or(Charset::Alphanumeric), custom_chars.as_deref());
            format!(
                "\n  // {}: string parameter\n  const {name}Charset = {};\n  let {name} = '';\n  for (let i = 0; i < {}; i++) {{\n    {name} += {name}Charset.charAt(Math.floor(Math.random() * {name}Charset.length));\n  }}",
                param.name,
                js_string(pool),
                length.unwrap_or(10),
            )
        }
        ParameterSpec::Array { values } => {
            let literals: Vec<Value> = values.iter().map(Value::from).collect();
            format!(
                "\n  // {}: array parameter\n  const {name}Values = {};\n  const {name} = {name}Values[Math.floor(Math.random() * {name}Values.length)];",
                param.name,
                serde_json::to_string(&literals).expect("scalar array serializes"),
            )
        }
        ParameterSpec::Csv { file, .. } | ParameterSpec::Url { file, .. } => format!(
            "\n  // {}: {} parameter (loaded from {})\n  const {name} = {name}Data[Math.floor(Math.random() * {name}Data.length)];",
            param.name,
            type_name(&param.spec),
            file,
        ),
        ParameterSpec::Static { value } => format!(
            "\n  // {}: static parameter\n  const {name} = {};",
            param.name,
            serde_json::to_string(&Value::from(value)).expect("scalar serializes"),
        ),
    }
}

fn type_name(spec: &ParameterSpec) -> &'static str {
    match spec {
        ParameterSpec::Integer { .. } => "integer",
        ParameterSpec::String { .. } => "string",
        ParameterSpec::Array { .. } => "array",
        ParameterSpec::Csv { .. } => "csv",
        ParameterSpec::Url { .. } => "url",
        ParameterSpec::Static { .. } => "static",
    }
}

/// Load one CSV column for inlining; empty results abort emission.
fn load_column(file: &str, column: &str) -> Result<Vec<String>> {
    let table = CsvTable::load(Path::new(file))?;
    if !table.headers().iter().any(|h| h == column) {
        return Err(Error::MissingColumn {
            column: column.to_string(),
            file: file.to_string(),
        });
    }
    let values = table.column(column);
    if values.is_empty() {
        return Err(Error::EmptyCsv(file.to_string()));
    }
    Ok(values)
}

/// A safe JavaScript identifier derived from a parameter name.
fn js_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// A double-quoted JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).expect("string serializes")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).expect("JSON value serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadTestConfig;
    use std::io::Write;

    fn config_from(yaml: &str) -> LoadTestConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn options_merge_prefers_passthrough() {
        let config = config_from(
            r#"
name: merge
baseUrl: https://api.test/
execution:
  mode: construct
  concurrent: 10
  iterations: 100
k6Options:
  vus: 50
  thresholds:
    http_req_duration: ["p(95)<500"]
parameters:
  - name: id
    type: integer
"#,
        );
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("\"vus\": 50"));
        assert!(!script.contains("\"vus\": 10"));
        assert!(script.contains("\"iterations\": 100"));
        assert!(script.contains("p(95)<500"));
    }

    #[test]
    fn construct_script_samples_each_parameter_type() {
        let config = config_from(
            r#"
name: kinds
baseUrl: https://api.test/item
execution:
  mode: construct
  iterations: 10
parameters:
  - name: id
    type: integer
    min: 1
    max: 9
  - name: session
    type: string
    length: 12
  - name: color
    type: array
    values: [red, green]
  - name: version
    type: static
    value: v2
"#,
        );
        let script = ScriptEmitter::new(&config).emit().unwrap();

        assert!(script.contains("import http from 'k6/http';"));
        assert!(script.contains("function constructUrl()"));
        assert!(script.contains("const id = Math.floor(Math.random() * (9 - 1 + 1)) + 1;"));
        assert!(script.contains("const sessionCharset ="));
        assert!(script.contains("const colorValues = [\"red\",\"green\"];"));
        assert!(script.contains("const version = \"v2\";"));
        assert!(script.contains("params.push('color=' + encodeURIComponent(color));"));
        assert!(script.contains("'status is 200': (r) => r.status === 200"));
        assert!(script.contains("'response time < 500ms': (r) => r.timings.duration < 500"));
        assert!(script.contains("sleep(1);"));
    }

    #[test]
    fn integer_length_pads_and_reparses_in_script() {
        let config = config_from(
            r#"
name: pad
baseUrl: https://api.test/
execution:
  mode: construct
  iterations: 1
parameters:
  - name: id
    type: integer
    min: 1
    max: 9
    length: 5
"#,
        );
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("padStart(5, '0')"));
        assert!(script.contains("parseInt(String(idRaw)"));
    }

    #[test]
    fn construct_mode_without_parameters_returns_base_url() {
        let mut config = config_from(
            r#"
name: bare
baseUrl: https://api.test/health
execution:
  mode: construct
  iterations: 1
"#,
        );
        config.parameters = None;
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("return \"https://api.test/health\";"));
    }

    #[test]
    fn csv_parameter_data_is_inlined() {
        let mut data = tempfile::NamedTempFile::new().unwrap();
        write!(data, "user,city\nu1,berlin\nu2,oslo\n").unwrap();

        let config = config_from(&format!(
            r#"
name: csv
baseUrl: https://api.test/
execution:
  mode: construct
  iterations: 1
parameters:
  - name: city
    type: csv
    file: {}
    column: city
"#,
            data.path().display()
        ));
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("const cityData = [\"berlin\",\"oslo\"];"));
        assert!(script.contains("const city = cityData[Math.floor(Math.random() * cityData.length)];"));
    }

    #[test]
    fn batch_script_inlines_urls() {
        let mut data = tempfile::NamedTempFile::new().unwrap();
        write!(data, "url\nhttps://a.test/\nhttps://b.test/\n").unwrap();

        let config = config_from(&format!(
            r#"
name: batch
baseUrl: https://unused.test/
execution:
  mode: batch
  iterations: 5
batch:
  file: {}
  column: url
"#,
            data.path().display()
        ));
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("const testUrls ="));
        assert!(script.contains("https://a.test/"));
        assert!(script.contains("function getRandomUrl()"));
        assert!(script.contains("const url = getRandomUrl();"));
    }

    #[test]
    fn batch_mode_without_batch_block_fails_emission() {
        let mut config = config_from(
            r#"
name: batch
baseUrl: https://api.test/
execution:
  mode: batch
  iterations: 5
"#,
        );
        config.batch = None;
        let err = ScriptEmitter::new(&config).emit().unwrap_err();
        assert!(err.to_string().contains("batch configuration"));
    }

    #[test]
    fn batch_missing_column_aborts_emission() {
        let mut data = tempfile::NamedTempFile::new().unwrap();
        write!(data, "link\nhttps://a.test/\n").unwrap();

        let config = config_from(&format!(
            r#"
name: batch
baseUrl: https://api.test/
execution:
  mode: batch
  iterations: 5
batch:
  file: {}
  column: url
"#,
            data.path().display()
        ));
        let err = ScriptEmitter::new(&config).emit().unwrap_err();
        assert!(err.to_string().contains("'url'"));
    }

    #[test]
    fn post_request_attaches_body_and_headers() {
        let config = config_from(
            r#"
name: post
baseUrl: https://api.test/items
execution:
  mode: construct
  iterations: 1
parameters:
  - name: id
    type: integer
request:
  method: POST
  headers:
    Content-Type: application/json
  body: '{"flag":true}'
"#,
        );
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("http.post(url, {"));
        assert!(script.contains("\"Content-Type\": \"application/json\""));
        assert!(script.contains("\"body\""));
    }

    #[test]
    fn get_request_never_attaches_body() {
        let config = config_from(
            r#"
name: get
baseUrl: https://api.test/items
execution:
  mode: construct
  iterations: 1
parameters:
  - name: id
    type: integer
request:
  method: GET
  body: ignored
"#,
        );
        let script = ScriptEmitter::new(&config).emit().unwrap();
        assert!(script.contains("http.get(url);"));
        assert!(!script.contains("ignored"));
    }

    #[test]
    fn js_ident_sanitizes_names() {
        assert_eq!(js_ident("user-id"), "user_id");
        assert_eq!(js_ident("9lives"), "_9lives");
        assert_eq!(js_ident("plain"), "plain");
    }
}
