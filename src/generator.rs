//! Parameter value generation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::config::{Charset, Encoding, Parameter, ParameterSpec, ScalarValue};
use crate::csv::CsvTable;
use crate::error::{Error, Result};

pub const ALPHA: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const NUMERIC: &str = "0123456789";
pub const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Everything outside the unreserved URL set gets percent-encoded.
const ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// One generated `(name, value)` pair, created fresh per simulated request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedParameter {
    pub name: String,
    pub value: GeneratedValue,
}

/// A concrete generated value, either text or a number.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for GeneratedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratedValue::Text(s) => write!(f, "{s}"),
            GeneratedValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Produces concrete values from parameter specs.
///
/// CSV sources are loaded once per distinct file path and cached for the
/// lifetime of the generator; the cache is never invalidated within a run.
pub struct ParameterGenerator {
    rng: StdRng,
    csv_cache: HashMap<PathBuf, CsvTable>,
}

impl ParameterGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded generator for reproducible output.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            csv_cache: HashMap::new(),
        }
    }

    /// Generate one value according to `param`'s declared type.
    pub fn generate(&mut self, param: &Parameter) -> Result<GeneratedValue> {
        match &param.spec {
            ParameterSpec::Integer { min, max, length } => {
                Ok(GeneratedValue::Number(self.integer(*min, *max, *length)))
            }
            ParameterSpec::String {
                length,
                charset,
                custom_chars,
            } => {
                let s = self.string(*length, charset.unwrap_or_default(), custom_chars.as_deref());
                Ok(text(s))
            }
            ParameterSpec::Array { values } => self.from_array(&param.name, values),
            ParameterSpec::Csv { file, column } => {
                let value = self.from_csv(file, column)?;
                Ok(text(value))
            }
            ParameterSpec::Url {
                file,
                column,
                encoding,
            } => {
                let value = self.from_csv(file, column)?;
                Ok(match encoding {
                    Some(Encoding::Base64) => text(BASE64.encode(&value)),
                    // Explicitly url-encoded values skip the auto-escape pass.
                    Some(Encoding::Url) => GeneratedValue::Text(
                        utf8_percent_encode(&value, ESCAPE_SET).to_string(),
                    ),
                    None => text(value),
                })
            }
            ParameterSpec::Static { value } => Ok(match value {
                ScalarValue::Number(n) => GeneratedValue::Number(*n),
                other => text(other.to_string()),
            }),
        }
    }

    /// Generate one value for each spec, preserving input order.
    pub fn generate_set(&mut self, parameters: &[Parameter]) -> Result<Vec<GeneratedParameter>> {
        parameters
            .iter()
            .map(|param| {
                Ok(GeneratedParameter {
                    name: param.name.clone(),
                    value: self.generate(param)?,
                })
            })
            .collect()
    }

    fn integer(&mut self, min: Option<i64>, max: Option<i64>, length: Option<usize>) -> i64 {
        let min = min.unwrap_or(0);
        let max = max.unwrap_or(100);
        // gen_range panics on an inverted range; half-specified ranges can
        // produce one when only min is set above the default max.
        if min > max {
            return min;
        }
        let value = self.rng.gen_range(min..=max);

        match length {
            // Pad then reparse; leading zeros do not survive the reparse.
            Some(width) => format!("{value:0width$}").parse().unwrap_or(value),
            None => value,
        }
    }

    fn string(&mut self, length: Option<usize>, charset: Charset, custom: Option<&str>) -> String {
        let length = length.unwrap_or(10);
        let pool: Vec<char> = charset_chars(charset, custom).chars().collect();
        (0..length)
            .map(|_| pool[self.rng.gen_range(0..pool.len())])
            .collect()
    }

    fn from_array(&mut self, name: &str, values: &[ScalarValue]) -> Result<GeneratedValue> {
        if values.is_empty() {
            return Err(Error::EmptyArray(name.to_string()));
        }
        let idx = self.rng.gen_range(0..values.len());
        Ok(match &values[idx] {
            ScalarValue::Number(n) => GeneratedValue::Number(*n),
            other => text(other.to_string()),
        })
    }

    fn from_csv(&mut self, file: &str, column: &str) -> Result<String> {
        self.ensure_loaded(file)?;
        let table = &self.csv_cache[&PathBuf::from(file)];
        if table.is_empty() {
            return Err(Error::EmptyCsv(file.to_string()));
        }
        let idx = self.rng.gen_range(0..table.len());
        table
            .value(idx, column)
            .map(str::to_string)
            .ok_or_else(|| Error::MissingColumn {
                column: column.to_string(),
                file: file.to_string(),
            })
    }

    fn ensure_loaded(&mut self, file: &str) -> Result<()> {
        let path = PathBuf::from(file);
        if !self.csv_cache.contains_key(&path) {
            let table = CsvTable::load(&path)?;
            self.csv_cache.insert(path, table);
        }
        Ok(())
    }

    #[cfg(test)]
    fn cached_files(&self) -> usize {
        self.csv_cache.len()
    }
}

impl Default for ParameterGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Character pool for a charset selector. An absent or empty custom pool
/// falls back to alphanumeric.
pub fn charset_chars<'a>(charset: Charset, custom: Option<&'a str>) -> &'a str {
    match charset {
        Charset::Alpha => ALPHA,
        Charset::Numeric => NUMERIC,
        Charset::Alphanumeric => ALPHANUMERIC,
        Charset::Custom => custom.filter(|s| !s.is_empty()).unwrap_or(ALPHANUMERIC),
    }
}

fn text(value: String) -> GeneratedValue {
    GeneratedValue::Text(auto_escape(&value).into_owned())
}

/// Percent-encode `value` for URL embedding when needed.
///
/// A value is escaped if it contains characters outside the unreserved set,
/// or if a URL-parse probe shows it would not survive query embedding as-is.
pub fn auto_escape(value: &str) -> Cow<'_, str> {
    let unreserved = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'));
    if unreserved && probe_roundtrips(value) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(utf8_percent_encode(value, ESCAPE_SET).to_string())
}

/// Embed `value` in a probe URL's query and check that serialization leaves
/// it untouched.
fn probe_roundtrips(value: &str) -> bool {
    let raw = format!("v={value}");
    match Url::parse(&format!("http://probe.invalid/?{raw}")) {
        Ok(url) => url.query() == Some(raw.as_str()),
        Err(_) => false,
    }
}
