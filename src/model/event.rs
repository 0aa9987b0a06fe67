//! Inbound event shapes.
//!
//! Only the fields the bridge reads are modeled; anything else in the payload
//! is ignored by serde. The four shapes are closed under [`InboundEvent`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::multi_map::Headers;
use crate::model::query::QueryParams;

/// Which wire shape an exchange arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    ApiGateway,
    Alb,
    HttpApiV2,
    VpcLattice,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::ApiGateway => "api_gateway",
            RequestSource::Alb => "alb",
            RequestSource::HttpApiV2 => "http_api_v2",
            RequestSource::VpcLattice => "vpc_lattice",
        }
    }
}

impl fmt::Display for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any supported inbound event.
///
/// Variants are tried in declaration order; each one has a required field the
/// others lack (`requestContext.http`, `requestContext.serviceArn`,
/// `requestContext.elb`, `httpMethod`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InboundEvent {
    HttpApiV2(HttpApiV2Event),
    VpcLattice(VpcLatticeEvent),
    Alb(AlbEvent),
    ApiGateway(GatewayProxyEvent),
}

impl InboundEvent {
    pub fn source(&self) -> RequestSource {
        match self {
            InboundEvent::ApiGateway(_) => RequestSource::ApiGateway,
            InboundEvent::Alb(_) => RequestSource::Alb,
            InboundEvent::HttpApiV2(_) => RequestSource::HttpApiV2,
            InboundEvent::VpcLattice(_) => RequestSource::VpcLattice,
        }
    }

    /// Request id carried inside the event itself, when the shape has one.
    pub fn event_request_id(&self) -> Option<&str> {
        match self {
            InboundEvent::ApiGateway(e) => e.request_context.request_id.as_deref(),
            InboundEvent::HttpApiV2(e) => e.request_context.request_id.as_deref(),
            InboundEvent::Alb(_) | InboundEvent::VpcLattice(_) => None,
        }
    }
}

// --- Gateway REST (payload 1.0) ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProxyEvent {
    pub resource: Option<String>,
    pub path: Option<String>,
    pub http_method: String,
    pub headers: Option<HashMap<String, String>>,
    pub multi_value_headers: Option<Headers>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub multi_value_query_string_parameters: Option<QueryParams>,
    pub path_parameters: Option<HashMap<String, String>>,
    pub stage_variables: Option<HashMap<String, String>>,
    #[serde(default)]
    pub request_context: GatewayRequestContext,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequestContext {
    pub request_id: Option<String>,
    pub stage: Option<String>,
    pub resource_id: Option<String>,
    #[serde(default)]
    pub identity: RequestIdentity,
    pub authorizer: Option<AuthorizerContext>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    pub access_key: Option<String>,
    pub account_id: Option<String>,
    pub caller: Option<String>,
    pub user: Option<String>,
    pub user_arn: Option<String>,
    pub cognito_identity_id: Option<String>,
    pub cognito_identity_pool_id: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Authorizer output attached by a custom or user-pool authorizer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    pub principal_id: Option<String>,
    pub claims: Option<HashMap<String, Value>>,
    /// Remaining context entries set by the authorizer.
    #[serde(flatten)]
    pub context: HashMap<String, Value>,
}

impl AuthorizerContext {
    /// The `sub` claim of a user-pool authorizer, if present.
    pub fn claims_subject(&self) -> Option<&str> {
        self.claims.as_ref()?.get("sub")?.as_str()
    }
}

// --- Application load balancer ---

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbEvent {
    pub http_method: String,
    pub path: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub multi_value_headers: Option<Headers>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub multi_value_query_string_parameters: Option<QueryParams>,
    pub request_context: AlbRequestContext,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbRequestContext {
    pub elb: AlbTargetContext,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbTargetContext {
    pub target_group_arn: Option<String>,
}

impl AlbEvent {
    /// All request headers, whichever of the two header maps the balancer used.
    pub fn merged_headers(&self) -> Headers {
        merge_headers(self.headers.as_ref(), self.multi_value_headers.as_ref())
    }
}

// --- HTTP API (payload 2.0) ---

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpApiV2Event {
    pub version: Option<String>,
    pub route_key: Option<String>,
    pub raw_path: Option<String>,
    pub raw_query_string: Option<String>,
    pub cookies: Option<Vec<String>>,
    pub headers: Option<HashMap<String, String>>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub path_parameters: Option<HashMap<String, String>>,
    pub stage_variables: Option<HashMap<String, String>>,
    pub request_context: HttpApiV2RequestContext,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpApiV2RequestContext {
    pub account_id: Option<String>,
    pub api_id: Option<String>,
    pub domain_name: Option<String>,
    pub request_id: Option<String>,
    pub route_key: Option<String>,
    pub stage: Option<String>,
    pub time_epoch: Option<i64>,
    pub http: HttpApiV2HttpContext,
    pub authorizer: Option<HttpApiV2Authorizer>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpApiV2HttpContext {
    pub method: String,
    pub path: Option<String>,
    pub protocol: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Authorizer map of an HTTP API request; at most one member is set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HttpApiV2Authorizer {
    pub jwt: Option<HttpApiV2JwtAuthorizer>,
    pub lambda: Option<HashMap<String, Value>>,
    pub iam: Option<HttpApiV2IamAuthorizer>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HttpApiV2JwtAuthorizer {
    #[serde(default)]
    pub claims: HashMap<String, Value>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpApiV2IamAuthorizer {
    pub access_key: Option<String>,
    pub account_id: Option<String>,
    pub caller_id: Option<String>,
    pub principal_org_id: Option<String>,
    pub user_arn: Option<String>,
    pub user_id: Option<String>,
}

impl HttpApiV2Event {
    pub fn merged_headers(&self) -> Headers {
        merge_headers(self.headers.as_ref(), None)
    }
}

// --- VPC Lattice (payload 2.0) ---

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcLatticeEvent {
    pub version: Option<String>,
    pub path: Option<String>,
    pub method: String,
    #[serde(default)]
    pub headers: Headers,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub request_context: VpcLatticeRequestContext,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcLatticeRequestContext {
    pub service_network_arn: Option<String>,
    pub service_arn: String,
    pub target_group_arn: Option<String>,
    #[serde(default)]
    pub identity: VpcLatticeIdentity,
    pub region: Option<String>,
    pub time_epoch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcLatticeIdentity {
    pub source_vpc_arn: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub principal: Option<String>,
    pub session_name: Option<String>,
    pub x509_san_dns: Option<String>,
    pub x509_subject_cn: Option<String>,
}

impl GatewayProxyEvent {
    pub fn merged_headers(&self) -> Headers {
        merge_headers(self.headers.as_ref(), self.multi_value_headers.as_ref())
    }
}

/// Merge a single-value and a multi-value header map.
///
/// The multi-value map wins for any key it contains; the single-value map only
/// fills keys the other one lacks.
pub(crate) fn merge_headers(
    single: Option<&HashMap<String, String>>,
    multi: Option<&Headers>,
) -> Headers {
    let mut out = multi.cloned().unwrap_or_default();
    if let Some(single) = single {
        for (k, v) in single {
            if !out.contains_key(k) {
                out.add(k.clone(), v.clone());
            }
        }
    }
    out
}
