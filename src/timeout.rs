//! Timeout utilities for bounding dissection work.
//!
//! Dissection is one long synchronous call. Loops over attacker-controlled
//! counts poll an [`IterationTimeout`]; the async [`with_timeout`] wrapper
//! bounds a whole run from the outside.

use crate::error::{DissectError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Default timeout duration in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300; // 5 minutes

/// Timeout configuration for async operations
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Whether to log timeout errors
    pub log_warnings: bool,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            log_warnings: true,
            operation_name: operation.into(),
        }
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!(
        operation = %config.operation_name,
        seconds = config.duration.as_secs(),
        "Starting bounded operation"
    );

    match timeout(config.duration, future).await {
        Ok(result) => result,
        Err(_) => {
            if config.log_warnings {
                error!(
                    operation = %config.operation_name,
                    seconds = config.duration.as_secs(),
                    "Operation timed out"
                );
            }
            Err(DissectError::Timeout {
                seconds: config.duration.as_secs(),
            })
        }
    }
}

/// Synchronous timeout check for loop iterations
#[derive(Debug)]
pub struct IterationTimeout {
    start: Instant,
    max_duration: Duration,
    check_interval: usize,
    iteration_count: usize,
    max_iterations: Option<usize>,
    operation_name: String,
}

impl IterationTimeout {
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            max_duration: Duration::from_secs(seconds),
            check_interval: 1000,
            iteration_count: 0,
            max_iterations: None,
            operation_name: operation.into(),
        }
    }

    /// Set how often the clock is consulted
    pub fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    /// Also fail once this many iterations have been counted
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Count one iteration and fail if the budget is spent.
    pub fn check(&mut self) -> Result<()> {
        self.iteration_count += 1;

        if let Some(max) = self.max_iterations {
            if self.iteration_count > max {
                error!(
                    operation = %self.operation_name,
                    iterations = self.iteration_count,
                    "Iteration budget exhausted"
                );
                return Err(DissectError::ResourceExhausted {
                    resource: format!("{} iterations", self.operation_name),
                    used: self.iteration_count as u64,
                    limit: max as u64,
                });
            }
        }

        if self.iteration_count % self.check_interval == 0 {
            let elapsed = self.start.elapsed();

            if elapsed > self.max_duration {
                error!(
                    operation = %self.operation_name,
                    iterations = self.iteration_count,
                    elapsed = ?elapsed,
                    "Operation timed out"
                );
                return Err(DissectError::Timeout {
                    seconds: elapsed.as_secs(),
                });
            }

            if elapsed.as_secs() > 30 && self.iteration_count % (self.check_interval * 10) == 0 {
                warn!(
                    operation = %self.operation_name,
                    iterations = self.iteration_count,
                    elapsed = ?elapsed,
                    "Operation still running"
                );
            }
        }

        Ok(())
    }

    pub fn iterations(&self) -> usize {
        self.iteration_count
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
