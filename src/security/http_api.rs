//! HTTP API events (payload 2.0).

use serde_json::Value;

use crate::model::event::HttpApiV2Event;
use crate::model::InvocationContext;
use crate::security::{correlation_id, AuthScheme, PrincipalSource, RoleSource, SecurityContext};

/// JWT authorizer, then lambda authorizer, then IAM authorizer.
pub fn resolve(event: &HttpApiV2Event, ctx: &InvocationContext) -> SecurityContext {
    let request_id = correlation_id(event.request_context.request_id.as_deref(), ctx);
    let Some(authorizer) = &event.request_context.authorizer else {
        return SecurityContext::anonymous(request_id);
    };

    if let Some(jwt) = &authorizer.jwt {
        let principal = match event.merged_headers().get_first("authorization") {
            Some(token) => PrincipalSource::BearerToken(token.clone()),
            None => PrincipalSource::Absent,
        };
        let roles = RoleSource::TokenClaims {
            scopes: jwt.scopes.clone().unwrap_or_default(),
            claim_keys: jwt.claims.keys().cloned().collect(),
        };
        return SecurityContext::new(AuthScheme::Jwt, principal, roles, request_id);
    }

    if let Some(lambda) = &authorizer.lambda {
        let principal = match lambda.get("principalId") {
            Some(Value::String(id)) => PrincipalSource::Identifier(id.clone()),
            _ => PrincipalSource::Absent,
        };
        return SecurityContext::new(
            AuthScheme::CustomAuthorizer,
            principal,
            RoleSource::Principal,
            request_id,
        );
    }

    if let Some(iam) = &authorizer.iam {
        let principal = match &iam.user_arn {
            Some(arn) => PrincipalSource::Identifier(arn.clone()),
            None => PrincipalSource::Absent,
        };
        return SecurityContext::new(AuthScheme::AwsIam, principal, RoleSource::Principal, request_id);
    }

    SecurityContext::anonymous(request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    fn v2(authorizer: Value, authorization: Option<String>) -> HttpApiV2Event {
        let mut headers = serde_json::Map::new();
        if let Some(auth) = authorization {
            headers.insert("Authorization".into(), Value::String(auth));
        }
        serde_json::from_value(json!({
            "version": "2.0",
            "rawPath": "/",
            "headers": headers,
            "requestContext": {
                "requestId": "v2-req",
                "http": {"method": "GET", "path": "/"},
                "authorizer": authorizer
            }
        }))
        .unwrap()
    }

    fn bearer(payload: &str) -> String {
        format!("Bearer hdr.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn test_jwt_principal_and_roles() {
        let event = v2(
            json!({"jwt": {"claims": {"sub": "abc", "admin": "true"}, "scopes": ["orders.read"]}}),
            Some(bearer(r#"{"sub":"abc"}"#)),
        );
        let ctx = resolve(&event, &InvocationContext::new("platform"));
        assert_eq!(ctx.authentication_scheme(), Some(AuthScheme::Jwt));
        assert_eq!(ctx.request_id(), "v2-req");
        assert_eq!(ctx.user_principal().as_deref(), Some("abc"));
        assert!(ctx.is_user_in_role("orders.read"));
        assert!(ctx.is_user_in_role("admin"));
        assert!(!ctx.is_user_in_role("orders.write"));
    }

    #[test]
    fn test_malformed_token_keeps_scheme() {
        let event = v2(json!({"jwt": {"claims": {}}}), Some("Bearer not-a-token".into()));
        let ctx = resolve(&event, &InvocationContext::new("platform"));
        assert_eq!(ctx.authentication_scheme(), Some(AuthScheme::Jwt));
        assert!(ctx.is_secure());
        assert_eq!(ctx.user_principal(), None);
    }

    #[test]
    fn test_token_without_sub() {
        let event = v2(json!({"jwt": {"claims": {}}}), Some(bearer(r#"{"iss":"x"}"#)));
        let ctx = resolve(&event, &InvocationContext::new("platform"));
        assert_eq!(ctx.user_principal(), None);
    }

    #[test]
    fn test_lambda_and_iam_authorizers() {
        let lambda = v2(json!({"lambda": {"principalId": "tenant-1"}}), None);
        let ctx = resolve(&lambda, &InvocationContext::new("platform"));
        assert_eq!(ctx.authentication_scheme(), Some(AuthScheme::CustomAuthorizer));
        assert_eq!(ctx.user_principal().as_deref(), Some("tenant-1"));

        let iam = v2(json!({"iam": {"userArn": "arn:aws:iam::1:user/u"}}), None);
        let ctx = resolve(&iam, &InvocationContext::new("platform"));
        assert_eq!(ctx.authentication_scheme(), Some(AuthScheme::AwsIam));
        assert_eq!(ctx.user_principal().as_deref(), Some("arn:aws:iam::1:user/u"));
    }

    #[test]
    fn test_empty_authorizer_map() {
        let event = v2(json!({}), None);
        let ctx = resolve(&event, &InvocationContext::new("platform"));
        assert!(!ctx.is_secure());
        assert_eq!(ctx.authentication_scheme(), None);
    }
}
