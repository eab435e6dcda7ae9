//! Simulated dependency latency and failure.

use std::time::Duration;

use rand::Rng;

use crate::http::error::AppError;

/// Base delay for normal order processing, in time units.
pub const NORMAL_BASE_UNITS: f64 = 120.0;
/// Base delay for chaos-mode work, in time units.
pub const CHAOS_BASE_UNITS: f64 = 600.0;
/// Jitter is drawn uniformly from `[JITTER_MIN_UNITS, JITTER_MIN_UNITS + JITTER_SPAN_UNITS)`.
pub const JITTER_MIN_UNITS: f64 = 50.0;
pub const JITTER_SPAN_UNITS: f64 = 900.0;
/// Failure probability in normal mode.
pub const NORMAL_FAILURE_RATE: f64 = 0.1;
/// Failure probability in chaos mode.
pub const CHAOS_FAILURE_RATE: f64 = 0.3;

/// Outcome drawn for a unit of simulated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Success,
    InjectedFailure,
    ProcessingError,
}

impl WorkOutcome {
    fn into_result(self) -> Result<(), AppError> {
        match self {
            WorkOutcome::Success => Ok(()),
            WorkOutcome::InjectedFailure => Err(AppError::InjectedFailure),
            WorkOutcome::ProcessingError => Err(AppError::Processing),
        }
    }
}

/// Delay and outcome for one call to [`ChaosSimulator::simulate_work`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkPlan {
    pub delay: Duration,
    pub outcome: WorkOutcome,
}

/// Models a dependency with variable latency and random partial failure.
#[derive(Debug, Clone, Copy)]
pub struct ChaosSimulator {
    /// Wall-clock length of one time unit.
    unit: Duration,
}

impl Default for ChaosSimulator {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

impl ChaosSimulator {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    /// Scale the default millisecond unit; `0.0` removes the delay entirely.
    ///
    /// Scales too large for a `Duration` saturate at `Duration::MAX`.
    pub fn with_delay_scale(scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 0.0 };
        Self::new(Duration::try_from_secs_f64(0.001 * scale).unwrap_or(Duration::MAX))
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Draw the delay and outcome for one unit of work.
    pub fn plan<R: Rng>(&self, chaos: bool, rng: &mut R) -> WorkPlan {
        let base = if chaos { CHAOS_BASE_UNITS } else { NORMAL_BASE_UNITS };
        let units = base + JITTER_MIN_UNITS + rng.gen::<f64>() * JITTER_SPAN_UNITS;
        let delay = Duration::try_from_secs_f64(self.unit.as_secs_f64() * units)
            .unwrap_or(Duration::MAX);

        let roll: f64 = rng.gen();
        let outcome = match (chaos, roll) {
            (true, r) if r < CHAOS_FAILURE_RATE => WorkOutcome::InjectedFailure,
            (false, r) if r < NORMAL_FAILURE_RATE => WorkOutcome::ProcessingError,
            _ => WorkOutcome::Success,
        };

        WorkPlan { delay, outcome }
    }

    /// Suspend for a jittered delay, then succeed or fail at random.
    ///
    /// The wait yields to the runtime; other requests keep running.
    pub async fn simulate_work(&self, chaos: bool) -> Result<(), AppError> {
        let plan = {
            let mut rng = rand::thread_rng();
            self.plan(chaos, &mut rng)
        };
        tracing::debug!(
            chaos,
            delay_ms = plan.delay.as_millis() as u64,
            outcome = ?plan.outcome,
            "Simulating work"
        );
        tokio::time::sleep(plan.delay).await;
        plan.outcome.into_result()
    }
}
