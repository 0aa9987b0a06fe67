//! Load balancer events.

use crate::model::event::AlbEvent;
use crate::model::InvocationContext;
use crate::security::{AuthScheme, PrincipalSource, RoleSource, SecurityContext};

/// Header the balancer sets after a successful OIDC authentication.
pub const ALB_ACCESS_TOKEN_HEADER: &str = "x-amzn-oidc-accesstoken";
/// Header holding the authenticated user's subject.
pub const ALB_IDENTITY_HEADER: &str = "x-amzn-oidc-identity";

pub fn resolve(event: &AlbEvent, ctx: &InvocationContext) -> SecurityContext {
    let headers = event.merged_headers();
    if !headers.contains_key(ALB_ACCESS_TOKEN_HEADER) {
        return SecurityContext::anonymous(&ctx.request_id);
    }

    let principal = match headers.get_first(ALB_IDENTITY_HEADER) {
        Some(identity) => PrincipalSource::Identifier(identity.clone()),
        None => PrincipalSource::Absent,
    };
    SecurityContext::new(
        AuthScheme::CustomAuthorizer,
        principal,
        RoleSource::Principal,
        &ctx.request_id,
    )
}
