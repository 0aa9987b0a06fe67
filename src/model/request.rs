//! Normalized request handed to the downstream framework.

use axum::http::Method;
use bytes::Bytes;
use url::Url;

use crate::model::event::RequestSource;
use crate::model::multi_map::{Headers, MultiValueMap};
use crate::model::query::QueryParams;
use crate::security::SecurityContext;

/// A request independent of the event shape it arrived in.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Decoded path, after base-path stripping.
    pub path: String,
    pub headers: Headers,
    pub query: QueryParams,
    /// Query string exactly as the event carried it, already encoded.
    pub raw_query: Option<String>,
    pub stage_variables: MultiValueMap<String>,
    pub path_parameters: MultiValueMap<String>,
    pub body: Bytes,
    pub source: RequestSource,
    /// Request id used for log correlation.
    pub request_id: String,
    /// Caller address, when the event reports one.
    pub source_ip: Option<String>,
    pub security: SecurityContext,
}

/// Event data with no HTTP equivalent, exposed to the framework as a request
/// extension.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub source: RequestSource,
    pub stage_variables: MultiValueMap<String>,
    pub path_parameters: MultiValueMap<String>,
    pub source_ip: Option<String>,
}

impl ProxyRequest {
    /// Percent-encoded path plus query string, e.g. `/items?a=1&a=2`.
    ///
    /// A raw query string is passed through untouched; otherwise the parsed
    /// parameters are encoded in name order.
    pub fn path_and_query(&self) -> Result<String, url::ParseError> {
        let mut url = Url::parse("http://localhost")?;
        url.set_path(&self.path);
        if let Some(raw) = self.raw_query.as_deref().filter(|q| !q.is_empty()) {
            return Ok(format!("{}?{}", url.path(), raw));
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, values) in self.query.iter() {
                for value in values {
                    pairs.append_pair(name, value);
                }
            }
        }
        Ok(match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_first(name).map(String::as_str)
    }

    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            source: self.source,
            stage_variables: self.stage_variables.clone(),
            path_parameters: self.path_parameters.clone(),
            source_ip: self.source_ip.clone(),
        }
    }
}
