//! Startup orchestration.
//!
//! # Responsibilities
//! - Bootstrap the downstream framework, inline or on a background worker
//! - Keep the first invocation inside the platform's startup budget
//! - Publish the ready gate invocations wait on while bootstrap continues
//!
//! # Design Decisions
//! - Fail fast: bootstrap failure on the worker ends the process
//! - The wait window is measured from the process start, not from the call
//! - One start per initializer, and at most one swap of the ready gate

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwapOption;
use tokio::task::JoinHandle;

use crate::config::ColdStartConfig;
use crate::error::{cause_chain, InitializationError};
use crate::http::dispatch::Container;
use crate::lifecycle::init_type::is_async_initialization_disabled;
use crate::observability::metrics;
use crate::sync::gate::{gate, Gate, GateError, GateSignal};

/// Called when the background bootstrap fails.
pub type FatalHandler = Arc<dyn Fn(&InitializationError) + Send + Sync>;

/// How the framework gets bootstrapped.
pub enum Initializer {
    /// Bootstrap inline; errors are returned to the caller.
    Synchronous,
    /// Bootstrap on a worker, bounded by the startup budget.
    Asynchronous(AsyncInitializer),
}

impl Initializer {
    /// Async unless disabled by config or by the platform's startup type.
    pub fn from_environment(config: &ColdStartConfig) -> Self {
        if !config.async_init || is_async_initialization_disabled() {
            tracing::info!("Using synchronous initialization");
            Initializer::Synchronous
        } else {
            Initializer::Asynchronous(AsyncInitializer::new(config))
        }
    }

    pub async fn start<C: Container>(&self, container: Arc<C>) -> Result<(), InitializationError> {
        match self {
            Initializer::Synchronous => {
                let started = Instant::now();
                container.initialize().await?;
                metrics::record_cold_start_duration(started.elapsed());
                Ok(())
            }
            Initializer::Asynchronous(init) => init.start(container).await,
        }
    }

    /// Gate invocations must pass before dispatch, if bootstrap may still run.
    pub fn ready_gate(&self) -> Option<Gate> {
        match self {
            Initializer::Synchronous => None,
            Initializer::Asynchronous(init) => init.ready_gate(),
        }
    }

    pub fn shutdown(&self) {
        if let Initializer::Asynchronous(init) = self {
            init.shutdown();
        }
    }
}

/// State shared between the coordinator and its worker.
#[derive(Default)]
struct WorkerSlot {
    /// Signal of the currently published gate.
    signal: Option<GateSignal>,
    done: bool,
}

fn lock_slot(slot: &Mutex<WorkerSlot>) -> MutexGuard<'_, WorkerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the worker done on every exit path. Dropping a signal that was not
/// opened abandons its gate, so waiters fail instead of hanging.
struct SlotRelease(Arc<Mutex<WorkerSlot>>);

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.0);
        slot.done = true;
        if slot.signal.take().is_some() {
            tracing::warn!("Initialization worker exited without releasing the ready gate");
        }
    }
}

/// Cold-start coordinator that lets bootstrap run past the first invocation.
pub struct AsyncInitializer {
    start_time: SystemTime,
    max_init: Duration,
    grace: Duration,
    ready: ArcSwapOption<Gate>,
    slot: Arc<Mutex<WorkerSlot>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    fatal: FatalHandler,
}

impl AsyncInitializer {
    /// Measure the budget from the process start time.
    pub fn new(config: &ColdStartConfig) -> Self {
        Self::build(
            process_start_time(),
            config.max_init_ms,
            config.grace_defaulted_ms,
        )
    }

    /// Measure the budget from `start_time`, taken as early as possible.
    pub fn with_start_time(start_time: SystemTime, config: &ColdStartConfig) -> Self {
        Self::build(start_time, config.max_init_ms, config.grace_explicit_ms)
    }

    fn build(start_time: SystemTime, max_init_ms: u64, grace_ms: u64) -> Self {
        Self {
            start_time,
            max_init: Duration::from_millis(max_init_ms),
            grace: Duration::from_millis(grace_ms),
            ready: ArcSwapOption::empty(),
            slot: Arc::new(Mutex::new(WorkerSlot::default())),
            worker: Mutex::new(None),
            fatal: Arc::new(exit_process),
        }
    }

    /// Replace the default fatal handler, which exits the process.
    pub fn with_fatal_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&InitializationError) + Send + Sync + 'static,
    {
        self.fatal = Arc::new(handler);
        self
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Time left in the startup budget, minus the grace margin.
    pub fn wait_window(&self) -> Duration {
        let deadline = self.start_time + self.max_init;
        deadline
            .duration_since(SystemTime::now())
            .unwrap_or_default()
            .saturating_sub(self.grace)
    }

    pub fn ready_gate(&self) -> Option<Gate> {
        self.ready.load_full().map(|g| (*g).clone())
    }

    /// Spawn the bootstrap worker and wait for it, at most for the window.
    ///
    /// Returns `Ok` either when bootstrap finished in time or when the window
    /// ran out; in the second case invocations wait on the swapped gate.
    pub async fn start<C: Container>(&self, container: Arc<C>) -> Result<(), InitializationError> {
        let Some(first) = self.spawn_worker(container) else {
            tracing::warn!("Async initializer already started, ignoring");
            return Ok(());
        };

        let window = self.wait_window();
        tracing::info!(wait_ms = window.as_millis() as u64, "Async initialization started");

        match first.wait_timeout(window).await {
            Ok(true) => Ok(()),
            Ok(false) => self.swap_gate(&first),
            Err(GateError::Abandoned) => Err(InitializationError::Interrupted),
        }
    }

    /// Publish the first gate and spawn the worker; `None` if already started.
    fn spawn_worker<C: Container>(&self, container: Arc<C>) -> Option<Gate> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return None;
        }

        let (signal, first) = gate();
        {
            let mut slot = lock_slot(&self.slot);
            slot.signal = Some(signal);
            slot.done = false;
        }
        self.ready.store(Some(Arc::new(first.clone())));

        *worker = Some(tokio::spawn(run_worker(
            container,
            Arc::clone(&self.slot),
            Arc::clone(&self.fatal),
        )));
        Some(first)
    }

    fn swap_gate(&self, current: &Gate) -> Result<(), InitializationError> {
        let mut slot = lock_slot(&self.slot);
        if slot.done {
            // Finished between the timeout and the lock.
            return if current.is_open() {
                Ok(())
            } else {
                Err(InitializationError::Interrupted)
            };
        }

        let (signal, next) = gate();
        slot.signal = Some(signal);
        self.ready.store(Some(Arc::new(next)));
        drop(slot);

        metrics::record_cold_start_overrun();
        tracing::info!(
            max_init_ms = self.max_init.as_millis() as u64,
            "Initialization is taking longer than the startup budget, continuing in the invocation path"
        );
        Ok(())
    }

    /// Abort the worker. Invocations waiting on the gate are released with
    /// an error.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for AsyncInitializer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn exit_process(_: &InitializationError) {
    std::process::exit(1);
}

async fn run_worker<C: Container>(
    container: Arc<C>,
    slot: Arc<Mutex<WorkerSlot>>,
    fatal: FatalHandler,
) {
    let release = SlotRelease(Arc::clone(&slot));
    let started = Instant::now();
    tracing::info!("Starting async initializer");

    match container.initialize().await {
        Ok(()) => {
            let mut state = lock_slot(&slot);
            state.done = true;
            if let Some(signal) = state.signal.take() {
                signal.open();
            }
            drop(state);
            metrics::record_cold_start_duration(started.elapsed());
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Container initialized"
            );
        }
        Err(e) => {
            tracing::error!(error = %cause_chain(&e), "Failed to initialize container handler");
            fatal(&e);
        }
    }
    drop(release);
}

static FIRST_OBSERVED: OnceLock<SystemTime> = OnceLock::new();

/// Wall-clock time the process started.
///
/// Read from procfs on Linux; elsewhere, and if procfs is unreadable, the
/// first time this function was called.
pub fn process_start_time() -> SystemTime {
    let fallback = *FIRST_OBSERVED.get_or_init(SystemTime::now);
    procfs_start_time().unwrap_or(fallback)
}

#[cfg(target_os = "linux")]
fn procfs_start_time() -> Option<SystemTime> {
    const CLOCK_TICKS_PER_SEC: u64 = 100;

    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    let start_ticks = parse_start_ticks(&stat)?;
    let proc_stat = std::fs::read_to_string("/proc/stat").ok()?;
    let boot_secs = parse_boot_time(&proc_stat)?;

    let since_boot = Duration::from_millis(start_ticks * 1000 / CLOCK_TICKS_PER_SEC);
    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(boot_secs) + since_boot)
}

#[cfg(not(target_os = "linux"))]
fn procfs_start_time() -> Option<SystemTime> {
    None
}

/// Field 22 of `/proc/<pid>/stat`. The command name may contain spaces, so
/// counting starts after its closing parenthesis.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_start_ticks(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(19)?.parse().ok()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_boot_time(proc_stat: &str) -> Option<u64> {
    proc_stat
        .lines()
        .find_map(|line| line.strip_prefix("btime "))?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_ticks() {
        let stat = "4242 (my (odd) cmd) S 1 4242 4242 0 -1 4194560 100 0 0 0 \
                    1 2 0 0 20 0 1 0 987654 1000 10";
        assert_eq!(parse_start_ticks(stat), Some(987654));
        assert_eq!(parse_start_ticks("garbage"), None);
    }

    #[test]
    fn test_parse_boot_time() {
        let proc_stat = "cpu  1 2 3\nintr 5\nbtime 1700000000\nprocesses 9\n";
        assert_eq!(parse_boot_time(proc_stat), Some(1_700_000_000));
        assert_eq!(parse_boot_time("cpu 1\n"), None);
    }

    #[test]
    fn test_process_start_is_in_the_past() {
        assert!(process_start_time() <= SystemTime::now());
    }

    #[test]
    fn test_wait_window_subtracts_grace() {
        let config = ColdStartConfig {
            max_init_ms: 10_000,
            grace_explicit_ms: 250,
            ..Default::default()
        };
        let init = AsyncInitializer::with_start_time(SystemTime::now(), &config);
        let window = init.wait_window();
        assert!(window <= Duration::from_millis(9_750));
        assert!(window > Duration::from_millis(9_000));
    }

    #[test]
    fn test_wait_window_saturates() {
        let start = SystemTime::now() - Duration::from_secs(60);
        let init = AsyncInitializer::with_start_time(start, &ColdStartConfig::default());
        assert_eq!(init.wait_window(), Duration::ZERO);
    }

    #[test]
    fn test_synchronous_has_no_gate() {
        assert!(Initializer::Synchronous.ready_gate().is_none());
    }
}
