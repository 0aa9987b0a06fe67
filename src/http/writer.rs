//! Committed response to outbound wire shape.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::ContainerConfig;
use crate::error::ProxyError;
use crate::http::container::ResponseParts;
use crate::model::event::RequestSource;
use crate::model::{InvocationContext, ProxyResponse};

/// Turns a committed [`ResponseParts`] into a [`ProxyResponse`].
pub trait ResponseWriter: Send + Sync {
    fn write_response(
        &self,
        parts: ResponseParts,
        ctx: &InvocationContext,
    ) -> Result<ProxyResponse, ProxyError>;
}

/// Writer for every supported event shape.
#[derive(Debug, Clone)]
pub struct ProxyResponseWriter {
    config: ContainerConfig,
}

impl ProxyResponseWriter {
    pub fn from_config(config: &ContainerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Default for ProxyResponseWriter {
    fn default() -> Self {
        Self::from_config(&ContainerConfig::default())
    }
}

impl ResponseWriter for ProxyResponseWriter {
    fn write_response(
        &self,
        parts: ResponseParts,
        _ctx: &InvocationContext,
    ) -> Result<ProxyResponse, ProxyError> {
        let mut response = ProxyResponse::new(parts.status.as_u16());

        if !parts.body.is_empty() {
            let binary = parts
                .content_type()
                .is_some_and(|ct| self.config.is_binary_content_type(ct));
            response.body = Some(if binary {
                response.is_base64_encoded = true;
                STANDARD.encode(&parts.body)
            } else {
                match String::from_utf8(parts.body.clone()) {
                    Ok(text) => text,
                    Err(_) => {
                        response.is_base64_encoded = true;
                        STANDARD.encode(&parts.body)
                    }
                }
            });
        }

        match parts.source {
            RequestSource::HttpApiV2 => {
                let mut headers = parts.headers;
                if let Some(cookies) = headers.remove("Set-Cookie") {
                    response.cookies = Some(cookies);
                }
                response.headers = Some(
                    headers
                        .iter()
                        .map(|(k, values)| (k.to_string(), values.join(",")))
                        .collect(),
                );
            }
            source => {
                if self.config.single_value_headers {
                    response.headers = Some(first_values(&parts.headers));
                }
                if source == RequestSource::Alb {
                    response.status_description = Some(status_description(parts.status));
                }
                response.multi_value_headers = Some(parts.headers);
            }
        }

        Ok(response)
    }
}

fn first_values(headers: &crate::model::Headers) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, values)| values.first().map(|v| (k.to_string(), v.clone())))
        .collect()
}

/// `"200 OK"`, as the load balancer expects it.
fn status_description(status: axum::http::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
