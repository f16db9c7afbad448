//! URL assembly from generated parameters.

use url::form_urlencoded;
use url::Url;

use crate::error::{Error, Result};
use crate::generator::GeneratedParameter;

/// Builds request URLs from a base URL or path template.
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Append every parameter as a query parameter, in input order, and
    /// serialize back to a canonical URL string.
    pub fn construct_url(&self, parameters: &[GeneratedParameter]) -> Result<String> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {e}", self.base)))?;
        // query_pairs_mut leaves a bare '?' behind when nothing is appended
        if !parameters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for param in parameters {
                pairs.append_pair(&param.name, &param.value.to_string());
            }
        }
        Ok(url.to_string())
    }

    /// One URL per parameter set, preserving input order.
    pub fn construct_urls(&self, sets: &[Vec<GeneratedParameter>]) -> Result<Vec<String>> {
        sets.iter().map(|set| self.construct_url(set)).collect()
    }

    /// Substitute `{name}` placeholders in the base template; parameters
    /// without a placeholder are appended as query parameters instead.
    pub fn construct_url_with_path_params(&self, parameters: &[GeneratedParameter]) -> String {
        let mut url = self.base.clone();
        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut unmatched = false;

        for param in parameters {
            let placeholder = format!("{{{}}}", param.name);
            let value = param.value.to_string();
            if url.contains(&placeholder) {
                url = url.replacen(&placeholder, &value, 1);
            } else {
                query.append_pair(&param.name, &value);
                unmatched = true;
            }
        }

        if unmatched {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query.finish());
        }
        url
    }
}
