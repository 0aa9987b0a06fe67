//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! InboundEvent + InvocationContext
//!     → SecurityContext::resolve (one resolver per event shape)
//!         gateway.rs  (user pool claims, custom authorizer, IAM access key)
//!         alb.rs      (OIDC headers set by the balancer)
//!         http_api.rs (JWT, lambda and IAM authorizers)
//!         lattice.rs  (IAM identity)
//!     → SecurityContext (immutable, owned by one exchange)
//! ```
//!
//! # Design Decisions
//! - Markers are checked in a fixed precedence: token claims, custom
//!   authorizer, platform identity, none
//! - The principal is resolved lazily; a bearer token is only decoded when
//!   asked for, and a bad token yields no principal rather than an error
//! - `is_secure()` is defined from the scheme and cannot disagree with it

pub mod alb;
pub mod gateway;
pub mod http_api;
pub mod jwt;
pub mod lattice;

use std::fmt;

use crate::model::{InboundEvent, InvocationContext};
use crate::security::jwt::decode_subject;

/// Authentication scheme of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// Custom (lambda) authorizer; the principal is opaque.
    CustomAuthorizer,
    /// Federated identity pool (user pool claims).
    CognitoUserPool,
    /// Platform-native signed credentials.
    AwsIam,
    /// Bearer token validated by a JWT authorizer.
    Jwt,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::CustomAuthorizer => "CUSTOM_AUTHORIZER",
            AuthScheme::CognitoUserPool => "COGNITO_USER_POOL",
            AuthScheme::AwsIam => "AWS_IAM",
            AuthScheme::Jwt => "JWT",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the principal comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalSource {
    Absent,
    /// Identifier carried verbatim by the event.
    Identifier(String),
    /// Bearer token whose `sub` claim is the principal.
    BearerToken(String),
}

/// What `is_user_in_role` checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSource {
    /// Literal comparison with the resolved principal.
    Principal,
    /// Token scopes, or the names of the token's claims.
    TokenClaims {
        scopes: Vec<String>,
        claim_keys: Vec<String>,
    },
}

/// Authentication descriptor for one exchange.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    scheme: Option<AuthScheme>,
    principal: PrincipalSource,
    roles: RoleSource,
    request_id: String,
}

impl SecurityContext {
    /// Resolve the descriptor for an event, dispatching on its shape.
    pub fn resolve(event: &InboundEvent, ctx: &InvocationContext) -> Self {
        let resolved = match event {
            InboundEvent::ApiGateway(e) => gateway::resolve(e, ctx),
            InboundEvent::Alb(e) => alb::resolve(e, ctx),
            InboundEvent::HttpApiV2(e) => http_api::resolve(e, ctx),
            InboundEvent::VpcLattice(e) => lattice::resolve(e, ctx),
        };
        tracing::debug!(
            request_id = %resolved.request_id,
            source = %event.source(),
            scheme = ?resolved.scheme,
            "Security context resolved"
        );
        resolved
    }

    /// Descriptor for a request that carries no authentication.
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            scheme: None,
            principal: PrincipalSource::Absent,
            roles: RoleSource::Principal,
            request_id: request_id.into(),
        }
    }

    pub(crate) fn new(
        scheme: AuthScheme,
        principal: PrincipalSource,
        roles: RoleSource,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            scheme: Some(scheme),
            principal,
            roles,
            request_id: request_id.into(),
        }
    }

    pub fn authentication_scheme(&self) -> Option<AuthScheme> {
        self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_some()
    }

    /// Principal name, decoding a bearer token if that is where it lives.
    pub fn user_principal(&self) -> Option<String> {
        self.scheme?;
        match &self.principal {
            PrincipalSource::Absent => None,
            PrincipalSource::Identifier(id) => Some(id.clone()),
            PrincipalSource::BearerToken(token) => match decode_subject(token) {
                Ok(sub) => Some(sub),
                Err(e) => {
                    tracing::warn!(
                        request_id = %sanitize(&self.request_id),
                        error = %e,
                        "Could not read principal from bearer token"
                    );
                    None
                }
            },
        }
    }

    pub fn is_user_in_role(&self, role: &str) -> bool {
        if self.scheme.is_none() {
            return false;
        }
        match &self.roles {
            RoleSource::TokenClaims { scopes, claim_keys } => {
                scopes.iter().any(|s| s == role) || claim_keys.iter().any(|k| k == role)
            }
            RoleSource::Principal => self.user_principal().as_deref() == Some(role),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Strip CR and LF so event-supplied values cannot forge log lines.
pub(crate) fn sanitize(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Request id for log correlation: the event's own id, else the platform's.
pub(crate) fn correlation_id(event_id: Option<&str>, ctx: &InvocationContext) -> String {
    event_id.unwrap_or(&ctx.request_id).to_string()
}
