//! Startup-type indicator of the hosting platform.
//!
//! Read once per process. Provisioned or snap-started environments
//! initialize ahead of traffic, so the async cold-start strategy is turned
//! off for anything but on-demand starts.

use std::sync::OnceLock;

pub const INITIALIZATION_TYPE_ENV: &str = "AWS_LAMBDA_INITIALIZATION_TYPE";
pub const INITIALIZATION_TYPE_ON_DEMAND: &str = "on-demand";

static INITIALIZATION_TYPE: OnceLock<String> = OnceLock::new();

/// The platform's initialization type, `on-demand` when unset.
pub fn initialization_type() -> &'static str {
    INITIALIZATION_TYPE.get_or_init(|| {
        std::env::var(INITIALIZATION_TYPE_ENV)
            .unwrap_or_else(|_| INITIALIZATION_TYPE_ON_DEMAND.to_string())
    })
}

pub fn is_async_initialization_disabled() -> bool {
    disables_async(initialization_type())
}

fn disables_async(init_type: &str) -> bool {
    init_type != INITIALIZATION_TYPE_ON_DEMAND
}
