//! Single-use gate: one producer, many waiters, one signal.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The signal was dropped before the gate was opened.
    #[error("gate signal dropped before the gate was opened")]
    Abandoned,
}

/// Producer half. Consumed by [`GateSignal::open`].
#[derive(Debug)]
pub struct GateSignal {
    tx: watch::Sender<bool>,
}

/// Waiter half. Clone it to hand out more waiters.
#[derive(Debug, Clone)]
pub struct Gate {
    rx: watch::Receiver<bool>,
}

/// Create a closed gate and the signal that opens it.
pub fn gate() -> (GateSignal, Gate) {
    let (tx, rx) = watch::channel(false);
    (GateSignal { tx }, Gate { rx })
}

impl GateSignal {
    /// Open the gate and release every current and future waiter.
    pub fn open(self) {
        self.tx.send_replace(true);
    }

    /// A waiter bound to this signal.
    pub fn gate(&self) -> Gate {
        Gate {
            rx: self.tx.subscribe(),
        }
    }
}

impl Gate {
    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the gate opens.
    pub async fn wait(&self) -> Result<(), GateError> {
        let mut rx = self.rx.clone();
        rx.wait_for(|open| *open)
            .await
            .map(|_| ())
            .map_err(|_| GateError::Abandoned)
    }

    /// Wait at most `timeout`. `Ok(false)` means the time ran out first.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<bool, GateError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result.map(|()| true),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_releases_all_waiters() {
        let (signal, gate) = gate();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let g = gate.clone();
                tokio::spawn(async move { g.wait().await })
            })
            .collect();

        signal.open();
        for w in waiters {
            assert_eq!(w.await.unwrap(), Ok(()));
        }
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_late_waiter_sees_signal() {
        let (signal, gate) = gate();
        signal.open();
        assert_eq!(gate.wait_timeout(Duration::from_millis(10)).await, Ok(true));
    }

    #[tokio::test]
    async fn test_timeout_reports_closed() {
        let (_signal, gate) = gate();
        assert_eq!(gate.wait_timeout(Duration::from_millis(20)).await, Ok(false));
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn test_dropped_signal_abandons() {
        let (signal, gate) = gate();
        let waiter = tokio::spawn({
            let g = gate.clone();
            async move { g.wait().await }
        });
        drop(signal);
        assert_eq!(waiter.await.unwrap(), Err(GateError::Abandoned));
        assert_eq!(gate.wait_timeout(Duration::from_secs(1)).await, Err(GateError::Abandoned));
    }

    #[tokio::test]
    async fn test_subscribed_gate_follows_signal() {
        let (signal, _) = gate();
        let late = signal.gate();
        signal.open();
        assert!(late.is_open());
    }
}
