//! Stability gate: block until the live page stops mutating and the network
//! goes quiet, bounded by a hard timeout.
//!
//! All wait state lives in one [`StabilityGate`] call; nothing is process-wide,
//! so concurrent sessions never share mutation flags. The gate owns the page
//! listeners only for the duration of a wait and always releases them before
//! returning, timeout included.

pub mod config;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

pub use config::GateConfig;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("signal probe failed: {0}")]
    Probe(String),
}

impl GateError {
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }
}

/// Live-page signals the gate polls; implemented by the browser bridge.
///
/// `attach` installs the mutation observer and request counter on the page;
/// `detach` removes them. The gate guarantees `detach` is called exactly once
/// per wait, whatever the wait's outcome.
#[async_trait]
pub trait StabilitySignals: Send + Sync {
    async fn attach(&self) -> Result<(), GateError>;

    /// True if any DOM mutation was observed since the previous call.
    /// Reading resets the flag.
    async fn dom_mutated(&self) -> Result<bool, GateError>;

    /// Number of network requests currently in flight.
    async fn requests_in_flight(&self) -> Result<u64, GateError>;

    async fn detach(&self) -> Result<(), GateError>;
}

/// Outcome of one stability wait.
#[derive(Clone, Copy, Debug)]
pub struct StabilityVerdict {
    /// Both quiet periods were satisfied.
    pub stable: bool,
    pub waited: Duration,
    /// The hard timeout expired first; the snapshot proceeds best-effort.
    pub timed_out: bool,
}

/// Waits for combined DOM and network quiescence.
pub struct StabilityGate {
    config: GateConfig,
}

impl StabilityGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Block until the page is quiet or the timeout elapses.
    ///
    /// Listeners are detached before returning on every path, including probe
    /// errors; leaking an observer would poison every later wait on the page.
    pub async fn wait_until_stable(
        &self,
        signals: &dyn StabilitySignals,
    ) -> Result<StabilityVerdict, GateError> {
        signals.attach().await?;
        let outcome = self.poll_until_quiet(signals).await;
        if let Err(err) = signals.detach().await {
            warn!(%err, "failed to detach stability listeners");
        }
        outcome
    }

    async fn poll_until_quiet(
        &self,
        signals: &dyn StabilitySignals,
    ) -> Result<StabilityVerdict, GateError> {
        let started = Instant::now();
        let mut dom_quiet_since = Instant::now();
        let mut net_quiet_since = Instant::now();

        loop {
            let now = Instant::now();
            if now.duration_since(started) >= self.config.max_wait() {
                let waited = started.elapsed();
                warn!(
                    waited_ms = waited.as_millis() as u64,
                    "stability wait timed out; snapshotting with degraded confidence"
                );
                return Ok(StabilityVerdict {
                    stable: false,
                    waited,
                    timed_out: true,
                });
            }

            if signals.dom_mutated().await? {
                dom_quiet_since = now;
            }
            if signals.requests_in_flight().await? > 0 {
                net_quiet_since = now;
            }

            let dom_quiet = dom_quiet_since.elapsed() >= self.config.dom_quiet();
            let net_quiet = net_quiet_since.elapsed() >= self.config.net_quiet();
            if dom_quiet && net_quiet {
                let waited = started.elapsed();
                debug!(waited_ms = waited.as_millis() as u64, "page is stable");
                return Ok(StabilityVerdict {
                    stable: true,
                    waited,
                    timed_out: false,
                });
            }

            sleep(self.config.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct ScriptedSignals {
        attached: AtomicUsize,
        detached: AtomicUsize,
        keep_mutating: AtomicBool,
        mutations_left: AtomicU64,
        inflight_polls_left: AtomicU64,
        fail_probe: AtomicBool,
    }

    #[async_trait]
    impl StabilitySignals for ScriptedSignals {
        async fn attach(&self) -> Result<(), GateError> {
            self.attached.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn dom_mutated(&self) -> Result<bool, GateError> {
            if self.fail_probe.load(Ordering::SeqCst) {
                return Err(GateError::probe("page went away"));
            }
            if self.keep_mutating.load(Ordering::SeqCst) {
                return Ok(true);
            }
            let left = self.mutations_left.load(Ordering::SeqCst);
            if left > 0 {
                self.mutations_left.store(left - 1, Ordering::SeqCst);
                return Ok(true);
            }
            Ok(false)
        }

        async fn requests_in_flight(&self) -> Result<u64, GateError> {
            let left = self.inflight_polls_left.load(Ordering::SeqCst);
            if left > 0 {
                self.inflight_polls_left.store(left - 1, Ordering::SeqCst);
                return Ok(1);
            }
            Ok(0)
        }

        async fn detach(&self) -> Result<(), GateError> {
            self.detached.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn quiet_page_stabilizes_before_timeout() {
        let gate = StabilityGate::new(GateConfig::fast());
        let signals = Arc::new(ScriptedSignals::default());

        let verdict = gate.wait_until_stable(signals.as_ref()).await.unwrap();
        assert!(verdict.stable);
        assert!(!verdict.timed_out);
        assert!(verdict.waited < gate.config().max_wait());
        assert_eq!(signals.attached.load(Ordering::SeqCst), 1);
        assert_eq!(signals.detached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn continuous_mutation_times_out_and_detaches() {
        let gate = StabilityGate::new(GateConfig::fast());
        let signals = Arc::new(ScriptedSignals::default());
        signals.keep_mutating.store(true, Ordering::SeqCst);

        let verdict = gate.wait_until_stable(signals.as_ref()).await.unwrap();
        assert!(!verdict.stable);
        assert!(verdict.timed_out);
        assert!(verdict.waited >= gate.config().max_wait());
        assert_eq!(signals.detached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settling_activity_eventually_stabilizes() {
        let gate = StabilityGate::new(GateConfig::fast());
        let signals = Arc::new(ScriptedSignals::default());
        signals.mutations_left.store(3, Ordering::SeqCst);
        signals.inflight_polls_left.store(5, Ordering::SeqCst);

        let verdict = gate.wait_until_stable(signals.as_ref()).await.unwrap();
        assert!(verdict.stable);
        assert!(verdict.waited >= gate.config().dom_quiet());
    }

    #[tokio::test]
    async fn probe_failure_still_detaches_listeners() {
        let gate = StabilityGate::new(GateConfig::fast());
        let signals = Arc::new(ScriptedSignals::default());
        signals.fail_probe.store(true, Ordering::SeqCst);

        let result = gate.wait_until_stable(signals.as_ref()).await;
        assert!(result.is_err());
        assert_eq!(signals.detached.load(Ordering::SeqCst), 1);
    }
}
