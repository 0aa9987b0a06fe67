//! Invocation metadata supplied by the platform for each event.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Per-invocation metadata: request id, deadline and function identity.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Platform request id for this invocation.
    pub request_id: String,
    /// Absolute deadline after which the platform kills the invocation.
    pub deadline: Option<SystemTime>,
    /// ARN the function was invoked through.
    pub invoked_function_arn: Option<String>,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            invoked_function_arn: None,
        }
    }

    /// Context with a freshly generated request id, for local invocations.
    pub fn generated() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Set the deadline from epoch milliseconds, as the platform reports it.
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline = Some(UNIX_EPOCH + Duration::from_millis(deadline_ms));
        self
    }

    pub fn with_function_arn(mut self, arn: impl Into<String>) -> Self {
        self.invoked_function_arn = Some(arn.into());
        self
    }

    /// Time left before the deadline; `None` when no deadline is known.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.duration_since(SystemTime::now()).unwrap_or_default())
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::generated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_time() {
        let ctx = InvocationContext::new("req-1");
        assert!(ctx.remaining_time().is_none());

        let past = InvocationContext::new("req-2").with_deadline_ms(1_000);
        assert_eq!(past.remaining_time(), Some(Duration::ZERO));

        let future_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
            + 60_000;
        let future = InvocationContext::new("req-3").with_deadline_ms(future_ms);
        assert!(future.remaining_time().unwrap() > Duration::from_secs(50));
    }
}
