//! Bounded Oracle session pool.
//!
//! A fixed number of sessions is shared across concurrent tool calls.
//! Acquire waits up to a configured timeout (a recoverable error), idle
//! sessions past the grace period are recycled, and each acquire revalidates
//! a session with `SELECT 1 FROM DUAL` at most once per probe interval.
//! Driver work runs on blocking threads; transient faults are retried with
//! exponential backoff.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::driver::{Driver, DriverError, DriverSession};
use crate::error::ServiceError;

/// Exponential backoff for transient connectivity faults.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // 50ms -> 200ms -> 800ms
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            multiplier: 4,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * self.multiplier.pow(attempt)
    }

    pub fn should_retry(&self, error: &DriverError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    pub acquire_timeout: Duration,
    /// Idle sessions older than this are dropped instead of reused.
    pub idle_grace: Duration,
    /// Minimum spacing between liveness probes of one idle session.
    pub probe_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 8,
            acquire_timeout: Duration::from_millis(5000),
            idle_grace: Duration::from_secs(600),
            probe_interval: Duration::from_secs(60),
        }
    }
}

struct IdleSession {
    session: Box<dyn DriverSession>,
    parked_at: Instant,
    probed_at: Instant,
}

pub struct SessionPool {
    driver: Arc<dyn Driver>,
    idle: Mutex<Vec<IdleSession>>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
    retry: RetryPolicy,
}

impl SessionPool {
    pub fn new(driver: Arc<dyn Driver>, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.size.max(1)));
        Self {
            driver,
            idle: Mutex::new(Vec::new()),
            permits,
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Run `f` on a pooled session, retrying transient faults with backoff.
    ///
    /// `f` executes on a blocking thread; the session permit is held for the
    /// whole call including retries.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: Fn(&dyn DriverSession) -> Result<T, DriverError> + Send + Sync + 'static,
    {
        let permit = tokio::time::timeout(
            self.config.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            ServiceError::ConnectionError(format!(
                "session pool acquire timed out after {}ms",
                self.config.acquire_timeout.as_millis()
            ))
        })?
        .map_err(|_| ServiceError::Internal("session pool closed".into()))?;

        let f = Arc::new(f);
        let mut attempt: u32 = 0;
        let result = loop {
            let session = self.checkout().await?;
            let task = f.clone();
            let (session, outcome) =
                tokio::task::spawn_blocking(move || {
                    let outcome = task(session.as_ref());
                    (session, outcome)
                })
                .await
                .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))?;

            match outcome {
                Ok(value) => {
                    self.checkin(session);
                    break Ok(value);
                }
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    // The session is suspect after a transient fault; discard
                    // it and reconnect on the next attempt.
                    drop(session);
                    let backoff = self.retry.backoff(attempt);
                    warn!(attempt, ?backoff, "transient oracle fault, retrying: {err}");
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        drop(session);
                    } else {
                        self.checkin(session);
                    }
                    break Err(service_error(err));
                }
            }
        };
        drop(permit);
        result
    }

    /// Take an idle session, validating it if it sat long enough, or open a
    /// new one. Callers must already hold a permit.
    async fn checkout(&self) -> Result<Box<dyn DriverSession>, ServiceError> {
        loop {
            let candidate = {
                let mut idle = self.idle.lock().expect("pool lock poisoned");
                idle.pop()
            };
            let Some(parked) = candidate else { break };

            if parked.parked_at.elapsed() > self.config.idle_grace {
                debug!("recycling session idle past grace period");
                continue;
            }
            if parked.probed_at.elapsed() < self.config.probe_interval {
                return Ok(parked.session);
            }
            let session = parked.session;
            let (session, probe) =
                tokio::task::spawn_blocking(move || {
                    let probe = session.ping();
                    (session, probe)
                })
                .await
                .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))?;
            match probe {
                Ok(()) => return Ok(session),
                Err(err) => {
                    debug!("idle session failed probe, dropping: {err}");
                    continue;
                }
            }
        }

        let driver = self.driver.clone();
        let connected = tokio::task::spawn_blocking(move || driver.connect())
            .await
            .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))?;
        connected.map_err(service_error)
    }

    fn checkin(&self, session: Box<dyn DriverSession>) {
        let mut idle = self.idle.lock().expect("pool lock poisoned");
        let now = Instant::now();
        idle.push(IdleSession {
            session,
            parked_at: now,
            probed_at: now,
        });
    }
}

pub(crate) fn service_error(err: DriverError) -> ServiceError {
    match err {
        DriverError::Connect(message) => ServiceError::ConnectionError(message),
        DriverError::Db { code, message } => ServiceError::QueryError { code, message },
        DriverError::Other(message) => ServiceError::Internal(message),
    }
}
