//! Service lattice events (payload 2.0).

use crate::model::event::VpcLatticeEvent;
use crate::model::InvocationContext;
use crate::security::{AuthScheme, PrincipalSource, RoleSource, SecurityContext};

const IDENTITY_TYPE_IAM: &str = "AWS_IAM";

pub fn resolve(event: &VpcLatticeEvent, ctx: &InvocationContext) -> SecurityContext {
    let identity = &event.request_context.identity;
    if identity.kind.as_deref() != Some(IDENTITY_TYPE_IAM) {
        return SecurityContext::anonymous(&ctx.request_id);
    }

    let principal = match &identity.principal {
        Some(p) => PrincipalSource::Identifier(p.clone()),
        None => PrincipalSource::Absent,
    };
    SecurityContext::new(AuthScheme::AwsIam, principal, RoleSource::Principal, &ctx.request_id)
}
