//! Inbound event to normalized request.

use axum::http::Method;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use url::form_urlencoded;

use crate::config::ContainerConfig;
use crate::error::ProxyError;
use crate::model::event::{
    AlbEvent, GatewayProxyEvent, HttpApiV2Event, InboundEvent, VpcLatticeEvent,
};
use crate::model::multi_map::{Headers, MultiValueMap};
use crate::model::query::QueryParams;
use crate::model::{InvocationContext, ProxyRequest};
use crate::security::SecurityContext;

/// Turns an inbound event into a [`ProxyRequest`].
pub trait RequestReader: Send + Sync {
    /// Fails with [`ProxyError::InvalidRequest`] on malformed input.
    fn read_request(
        &self,
        event: &InboundEvent,
        security: SecurityContext,
        ctx: &InvocationContext,
        config: &ContainerConfig,
    ) -> Result<ProxyRequest, ProxyError>;
}

/// Reader for every supported event shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventRequestReader;

impl RequestReader for EventRequestReader {
    fn read_request(
        &self,
        event: &InboundEvent,
        security: SecurityContext,
        _ctx: &InvocationContext,
        config: &ContainerConfig,
    ) -> Result<ProxyRequest, ProxyError> {
        let mut request = match event {
            InboundEvent::ApiGateway(e) => read_gateway(e, security)?,
            InboundEvent::Alb(e) => read_alb(e, security)?,
            InboundEvent::HttpApiV2(e) => read_http_api(e, security)?,
            InboundEvent::VpcLattice(e) => read_lattice(e, security)?,
        };
        request.path = strip_base_path(&request.path, config);
        tracing::debug!(
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
            "Request translated"
        );
        Ok(request)
    }
}

fn read_gateway(e: &GatewayProxyEvent, security: SecurityContext) -> Result<ProxyRequest, ProxyError> {
    let query = match &e.multi_value_query_string_parameters {
        Some(multi) => multi.clone(),
        None => single_query(e.query_string_parameters.as_ref()),
    };
    Ok(ProxyRequest {
        method: parse_method(&e.http_method)?,
        path: e.path.clone().unwrap_or_else(|| "/".to_string()),
        headers: e.merged_headers(),
        query,
        raw_query: None,
        stage_variables: single_values(e.stage_variables.as_ref()),
        path_parameters: single_values(e.path_parameters.as_ref()),
        body: decode_body(e.body.as_deref(), e.is_base64_encoded)?,
        source: crate::model::RequestSource::ApiGateway,
        request_id: security.request_id().to_string(),
        source_ip: e.request_context.identity.source_ip.clone(),
        security,
    })
}

fn read_alb(e: &AlbEvent, security: SecurityContext) -> Result<ProxyRequest, ProxyError> {
    // The balancer forwards query parameters still percent-encoded.
    let mut query = QueryParams::new();
    match (&e.multi_value_query_string_parameters, &e.query_string_parameters) {
        (Some(multi), _) => {
            for (key, values) in multi.iter() {
                for value in values {
                    let (k, v) = decode_pair(key, value);
                    query.add(k, v);
                }
            }
        }
        (None, Some(single)) => {
            for (key, value) in single {
                let (k, v) = decode_pair(key, value);
                query.add(k, v);
            }
        }
        (None, None) => {}
    }

    let headers = e.merged_headers();
    let source_ip = headers
        .get_first("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    Ok(ProxyRequest {
        method: parse_method(&e.http_method)?,
        path: e.path.clone().unwrap_or_else(|| "/".to_string()),
        headers,
        query,
        raw_query: None,
        stage_variables: MultiValueMap::new(),
        path_parameters: MultiValueMap::new(),
        body: decode_body(e.body.as_deref(), e.is_base64_encoded)?,
        source: crate::model::RequestSource::Alb,
        request_id: security.request_id().to_string(),
        source_ip,
        security,
    })
}

fn read_http_api(e: &HttpApiV2Event, security: SecurityContext) -> Result<ProxyRequest, ProxyError> {
    let http = &e.request_context.http;
    let mut headers = e.merged_headers();
    if let Some(cookies) = e.cookies.as_ref().filter(|c| !c.is_empty()) {
        headers.put_single("Cookie", cookies.join("; "));
    }

    let raw_query = e.raw_query_string.clone().filter(|raw| !raw.is_empty());
    let query = match raw_query.as_deref() {
        Some(raw) => form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => single_query(e.query_string_parameters.as_ref()),
    };

    let path = e
        .raw_path
        .clone()
        .or_else(|| http.path.clone())
        .unwrap_or_else(|| "/".to_string());
    Ok(ProxyRequest {
        method: parse_method(&http.method)?,
        path,
        headers,
        query,
        raw_query,
        stage_variables: single_values(e.stage_variables.as_ref()),
        path_parameters: single_values(e.path_parameters.as_ref()),
        body: decode_body(e.body.as_deref(), e.is_base64_encoded)?,
        source: crate::model::RequestSource::HttpApiV2,
        request_id: security.request_id().to_string(),
        source_ip: http.source_ip.clone(),
        security,
    })
}

fn read_lattice(e: &VpcLatticeEvent, security: SecurityContext) -> Result<ProxyRequest, ProxyError> {
    Ok(ProxyRequest {
        method: parse_method(&e.method)?,
        path: e.path.clone().unwrap_or_else(|| "/".to_string()),
        headers: e.headers.clone(),
        query: single_query(e.query_string_parameters.as_ref()),
        raw_query: None,
        stage_variables: MultiValueMap::new(),
        path_parameters: MultiValueMap::new(),
        body: decode_body(e.body.as_deref(), e.is_base64_encoded)?,
        source: crate::model::RequestSource::VpcLattice,
        request_id: security.request_id().to_string(),
        source_ip: None,
        security,
    })
}

fn parse_method(method: &str) -> Result<Method, ProxyError> {
    if method.is_empty() {
        return Err(ProxyError::InvalidRequest("missing HTTP method".to_string()));
    }
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ProxyError::InvalidRequest(format!("invalid HTTP method '{}'", method)))
}

fn decode_body(body: Option<&str>, is_base64: bool) -> Result<Bytes, ProxyError> {
    match body {
        None => Ok(Bytes::new()),
        Some(b) if is_base64 => STANDARD
            .decode(b)
            .map(Bytes::from)
            .map_err(|e| ProxyError::InvalidRequest(format!("body is not valid base64: {}", e))),
        Some(b) => Ok(Bytes::copy_from_slice(b.as_bytes())),
    }
}

fn single_values(map: Option<&std::collections::HashMap<String, String>>) -> Headers {
    map.cloned().map(Headers::from).unwrap_or_default()
}

fn single_query(map: Option<&std::collections::HashMap<String, String>>) -> QueryParams {
    map.cloned().map(QueryParams::from).unwrap_or_default()
}

fn decode_pair(key: &str, value: &str) -> (String, String) {
    let encoded = format!("{}={}", key, value);
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .unwrap_or_else(|| (key.to_string(), value.to_string()))
}

/// Remove the configured base path, on a segment boundary.
fn strip_base_path(path: &str, config: &ContainerConfig) -> String {
    if !config.strip_base_path {
        return path.to_string();
    }
    let Some(base) = config
        .service_base_path
        .as_deref()
        .map(|b| b.trim_end_matches('/'))
        .filter(|b| !b.is_empty())
    else {
        return path.to_string();
    };

    match path.strip_prefix(base) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestSource;
    use serde_json::json;

    fn read(event: serde_json::Value, config: &ContainerConfig) -> Result<ProxyRequest, ProxyError> {
        let event: InboundEvent = serde_json::from_value(event).unwrap();
        let ctx = InvocationContext::new("ctx-req");
        let security = SecurityContext::resolve(&event, &ctx);
        EventRequestReader.read_request(&event, security, &ctx, config)
    }

    #[test]
    fn test_gateway_event() {
        let req = read(
            json!({
                "path": "/v1/orders",
                "httpMethod": "post",
                "headers": {"Content-Type": "application/json"},
                "multiValueQueryStringParameters": {"tag": ["a", "b"]},
                "stageVariables": {"env": "dev"},
                "requestContext": {"requestId": "gw-1", "identity": {"sourceIp": "10.0.0.9"}},
                "body": "{\"id\":1}"
            }),
            &ContainerConfig::default(),
        )
        .unwrap();

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.path, "/v1/orders");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.query.get("tag").unwrap(), ["a", "b"]);
        assert_eq!(req.stage_variables.get_first("env").map(String::as_str), Some("dev"));
        assert_eq!(req.request_id, "gw-1");
        assert_eq!(req.source_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(req.source, RequestSource::ApiGateway);
        assert_eq!(&req.body[..], br#"{"id":1}"#);
    }

    #[test]
    fn test_query_names_keep_their_case() {
        let req = read(
            json!({
                "path": "/items",
                "httpMethod": "GET",
                "multiValueQueryStringParameters": {"id": ["1"], "ID": ["2"]}
            }),
            &ContainerConfig::default(),
        )
        .unwrap();

        assert_eq!(req.query.get("id").unwrap(), ["1"]);
        assert_eq!(req.query.get("ID").unwrap(), ["2"]);
        assert!(req.raw_query.is_none());
    }

    #[test]
    fn test_base64_body() {
        let req = read(
            json!({
                "path": "/upload",
                "httpMethod": "PUT",
                "body": "AAEC/w==",
                "isBase64Encoded": true
            }),
            &ContainerConfig::default(),
        )
        .unwrap();
        assert_eq!(&req.body[..], &[0u8, 1, 2, 255]);
    }

    #[test]
    fn test_invalid_base64_body() {
        let err = read(
            json!({"path": "/", "httpMethod": "PUT", "body": "***", "isBase64Encoded": true}),
            &ContainerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
    }

    #[test]
    fn test_invalid_method() {
        let err = read(json!({"path": "/", "httpMethod": "GE T"}), &ContainerConfig::default())
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
    }

    #[test]
    fn test_strip_base_path() {
        let config = ContainerConfig {
            strip_base_path: true,
            service_base_path: Some("/v1/".to_string()),
            ..Default::default()
        };
        assert_eq!(strip_base_path("/v1/orders", &config), "/orders");
        assert_eq!(strip_base_path("/v1", &config), "/");
        assert_eq!(strip_base_path("/v10/orders", &config), "/v10/orders");
        assert_eq!(strip_base_path("/other", &config), "/other");
        assert_eq!(
            strip_base_path("/v1/orders", &ContainerConfig::default()),
            "/v1/orders"
        );
    }

    #[test]
    fn test_http_api_raw_query_and_cookies() {
        let req = read(
            json!({
                "version": "2.0",
                "rawPath": "/items",
                "rawQueryString": "a=1&a=2&q=hello+world",
                "cookies": ["s=1", "t=2"],
                "headers": {"accept": "text/plain"},
                "requestContext": {
                    "requestId": "v2-1",
                    "http": {"method": "GET", "path": "/items", "sourceIp": "1.2.3.4"}
                }
            }),
            &ContainerConfig::default(),
        )
        .unwrap();

        assert_eq!(req.source, RequestSource::HttpApiV2);
        assert_eq!(req.query.get("a").unwrap(), ["1", "2"]);
        assert_eq!(req.query.get_first("q"), Some("hello world"));
        assert_eq!(req.raw_query.as_deref(), Some("a=1&a=2&q=hello+world"));
        assert_eq!(req.header("cookie"), Some("s=1; t=2"));
        assert_eq!(req.source_ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(req.request_id, "v2-1");
    }

    #[test]
    fn test_alb_decodes_query() {
        let req = read(
            json!({
                "httpMethod": "GET",
                "path": "/search",
                "queryStringParameters": {"q": "a%20b"},
                "headers": {"x-forwarded-for": "8.8.8.8, 10.0.0.1"},
                "requestContext": {"elb": {"targetGroupArn": "arn:tg"}}
            }),
            &ContainerConfig::default(),
        )
        .unwrap();
        assert_eq!(req.query.get_first("q"), Some("a b"));
        assert_eq!(req.source_ip.as_deref(), Some("8.8.8.8"));
        assert_eq!(req.request_id, "ctx-req");
    }

    #[test]
    fn test_lattice_event() {
        let req = read(
            json!({
                "version": "2.0",
                "path": "/svc",
                "method": "DELETE",
                "headers": {"x-id": ["1", "2"]},
                "queryStringParameters": {"force": "true"},
                "requestContext": {"serviceArn": "arn:svc"}
            }),
            &ContainerConfig::default(),
        )
        .unwrap();
        assert_eq!(req.method, Method::DELETE);
        assert_eq!(req.headers.get("X-Id").unwrap(), ["1", "2"]);
        assert_eq!(req.query.get_first("force"), Some("true"));
    }
}
