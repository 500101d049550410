//! Write-timeout accuracy measurement.
//!
//! Issues writes against a port whose gate is held closed and records how
//! long each one takes to give up. The tolerance applied to the average is a
//! property of the measurement, not of the engine: the engine itself never
//! fires early.

use crate::config::TimingConfig;
use crate::port::{PortError, SerialPort, TimeoutClock};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one measurement run.
#[derive(Debug, Clone, Serialize)]
pub struct TimingReport {
    pub expected_ms: f64,
    pub samples_ms: Vec<f64>,
    pub average_ms: f64,
    /// `|average - expected| / expected`
    pub deviation: f64,
    pub max_deviation: f64,
}

impl TimingReport {
    fn from_samples(expected: Duration, samples: &[Duration], max_deviation: f64) -> Self {
        let expected_ms = duration_ms(expected);
        let samples_ms: Vec<f64> = samples.iter().copied().map(duration_ms).collect();
        let average_ms = if samples_ms.is_empty() {
            0.0
        } else {
            samples_ms.iter().sum::<f64>() / samples_ms.len() as f64
        };
        let deviation = if expected_ms > 0.0 {
            (average_ms - expected_ms).abs() / expected_ms
        } else {
            average_ms
        };
        Self {
            expected_ms,
            samples_ms,
            average_ms,
            deviation,
            max_deviation,
        }
    }

    pub fn within_tolerance(&self) -> bool {
        self.deviation <= self.max_deviation
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// A timeout is the expected outcome; anything else aborts the run.
fn expect_timeout(result: Result<(), PortError>) -> Result<(), PortError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_timeout() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Time `config.attempts` writes using the port's configured write timeout.
///
/// The caller keeps the port blocked (XOFF received or CTS low) for the whole
/// run. Writes that complete instead of timing out are still recorded; the
/// report's deviation then exposes the problem.
pub fn measure_write_timeout(
    port: &SerialPort,
    config: &TimingConfig,
) -> Result<TimingReport, PortError> {
    let expected = port.write_timeout().as_duration().ok_or_else(|| {
        PortError::invalid_state("timing requires a bounded write timeout")
    })?;
    if config.attempts == 0 {
        return Err(PortError::invalid_argument("attempts must be positive"));
    }

    let payload = vec![b'x'; config.payload_len.max(1)];
    let clock = TimeoutClock;

    if config.warm_up {
        expect_timeout(port.write(&payload))?;
    }

    let mut samples = Vec::with_capacity(config.attempts);
    for attempt in 0..config.attempts {
        let stopwatch = clock.stopwatch();
        let result = port.write(&payload);
        let elapsed = stopwatch.elapsed();
        expect_timeout(result)?;
        debug!(attempt, elapsed_ms = duration_ms(elapsed), "timed write");
        samples.push(elapsed);
    }

    let report = TimingReport::from_samples(expected, &samples, config.max_deviation);
    info!(
        expected_ms = report.expected_ms,
        average_ms = report.average_ms,
        deviation = report.deviation,
        "write timeout measured"
    );
    Ok(report)
}
