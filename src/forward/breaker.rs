//! Circuit Breaker
//!
//! Process-wide failure tracking for the outbound client. After
//! `failure_threshold` failures inside `window` the circuit opens and calls
//! fail fast for `cooldown`; the first call after that is let through as a
//! probe and its outcome closes or re-opens the circuit. A probe abandoned
//! before it reports an outcome frees the slot for the next caller.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ForwardError;

/// Breaker policy.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures inside `window` that trip the breaker
    pub failure_threshold: u32,
    /// Sliding window for counting failures
    pub window: Duration,
    /// Time spent open before a probe is allowed
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(30),
            cooldown: Duration::from_secs(15),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

// == Circuit Breaker ==
/// Shared breaker guarding every call to the origin class.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, moving an expired open circuit to half-open.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Asks permission for one call.
    ///
    /// Fails with [`ForwardError::CircuitOpen`] while open, and while a
    /// half-open probe is already in flight.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, ForwardError> {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());

        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => return Err(ForwardError::CircuitOpen),
            CircuitState::HalfOpen if inner.probe_in_flight => {
                return Err(ForwardError::CircuitOpen)
            }
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                true
            }
        };

        Ok(CallPermit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    /// Records a call the origin answered.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!("circuit closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    /// Records a transient failure, opening the circuit when the threshold is hit.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.lock();

        if inner.state == CircuitState::HalfOpen {
            warn!("circuit probe failed, re-opening");
            self.open(&mut inner, now);
            return;
        }

        inner.failures.push_back(now);
        while let Some(&oldest) = inner.failures.front() {
            if now.duration_since(oldest) > self.config.window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }

        if inner.state == CircuitState::Closed
            && inner.failures.len() >= self.config.failure_threshold.max(1) as usize
        {
            warn!(
                failures = inner.failures.len(),
                cooldown_secs = self.config.cooldown.as_secs(),
                "circuit opened"
            );
            self.open(&mut inner, now);
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            debug!("circuit probe abandoned, slot released");
            inner.probe_in_flight = false;
        }
    }

    fn open(&self, inner: &mut BreakerInner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.failures.clear();
        inner.probe_in_flight = false;
    }

    fn refresh(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let cooled = inner
            .opened_at
            .map_or(true, |opened| now.duration_since(opened) >= self.config.cooldown);
        if cooled {
            inner.state = CircuitState::HalfOpen;
            inner.probe_in_flight = false;
        }
    }
}

// == Call Permit ==
/// Permission for one call, handed out by [`CircuitBreaker::try_acquire`].
///
/// Report the outcome with [`succeed`](Self::succeed) or
/// [`fail`](Self::fail). Dropping a half-open probe permit unreported puts
/// the probe slot back.
#[derive(Debug)]
#[must_use = "report the call outcome through the permit"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this permit is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Records a call the origin answered.
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// Records a transient failure.
    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
