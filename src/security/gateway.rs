//! Gateway REST events (payload 1.0).

use crate::model::event::GatewayProxyEvent;
use crate::model::InvocationContext;
use crate::security::{correlation_id, AuthScheme, PrincipalSource, RoleSource, SecurityContext};

/// User pool claims, then a custom authorizer, then an IAM access key.
pub fn resolve(event: &GatewayProxyEvent, ctx: &InvocationContext) -> SecurityContext {
    let request_ctx = &event.request_context;
    let request_id = correlation_id(request_ctx.request_id.as_deref(), ctx);

    if let Some(authorizer) = &request_ctx.authorizer {
        if let Some(sub) = authorizer.claims_subject() {
            return SecurityContext::new(
                AuthScheme::CognitoUserPool,
                PrincipalSource::Identifier(sub.to_string()),
                RoleSource::Principal,
                request_id,
            );
        }
        let principal = match &authorizer.principal_id {
            Some(id) => PrincipalSource::Identifier(id.clone()),
            None => PrincipalSource::Absent,
        };
        return SecurityContext::new(
            AuthScheme::CustomAuthorizer,
            principal,
            RoleSource::Principal,
            request_id,
        );
    }

    if request_ctx.identity.access_key.is_some() {
        let principal = match &request_ctx.identity.user_arn {
            Some(arn) => PrincipalSource::Identifier(arn.clone()),
            None => PrincipalSource::Absent,
        };
        return SecurityContext::new(AuthScheme::AwsIam, principal, RoleSource::Principal, request_id);
    }

    SecurityContext::anonymous(request_id)
}
