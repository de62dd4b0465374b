use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ResourceUsage, UnitDescriptor, UnitError, UnitResult};

/// Runs a unit to completion, retrying failed attempts up to its
/// `max_retries`. Never fails: errors end up in the returned result.
pub(crate) async fn run_unit(unit: Arc<UnitDescriptor>, concurrent_units: usize) -> UnitResult {
    let start_time = Utc::now();
    let started = Instant::now();
    debug!(unit = %unit.name(), concurrent_units, "unit starting");

    let mut retry_count = 0;
    let outcome = loop {
        match run_attempt(&unit).await {
            Ok(()) => break Ok(()),
            Err(err) if retry_count < unit.max_retries() => {
                retry_count += 1;
                warn!(unit = %unit.name(), attempt = retry_count, error = %err, "unit failed, retrying");
            }
            Err(err) => break Err(err),
        }
    };

    let duration = started.elapsed();
    let end_time = Utc::now();

    let (success, error, resource_usage) = match outcome {
        Ok(()) => {
            let req = unit.requirement();
            let usage = ResourceUsage {
                peak_cpu_percent: req.cpu_percent,
                peak_memory_mb: req.memory_mb,
                network_mbps: req.network_mbps,
                concurrent_units,
            };
            (true, None, usage)
        }
        Err(err) => {
            warn!(unit = %unit.name(), error = %err, "unit failed");
            let usage = ResourceUsage {
                concurrent_units,
                ..ResourceUsage::default()
            };
            (false, Some(err.to_string()), usage)
        }
    };
    debug!(unit = %unit.name(), success, ?duration, "unit finished");

    UnitResult {
        success,
        start_time,
        end_time,
        duration,
        retry_count,
        resource_usage,
        error,
    }
}

async fn run_attempt(unit: &UnitDescriptor) -> Result<(), UnitError> {
    let mut handle = tokio::spawn(unit.start());

    let joined = match unit.timeout() {
        Some(timeout) => match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err(UnitError::TimedOut(timeout));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(res) => res,
        Err(err) if err.is_panic() => Err(UnitError::Panicked(panic_message(err.into_panic()))),
        Err(_) => Err(UnitError::Cancelled),
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ResourceRequirement;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn success_reports_declared_usage() {
        let unit = Arc::new(
            UnitDescriptor::new("ok", || async { Ok(()) })
                .with_requirement(ResourceRequirement::new(20.0, 512.0, 10.0)),
        );
        let res = run_unit(unit, 3).await;
        assert!(res.success);
        assert!(res.error.is_none());
        assert_eq!(res.retry_count, 0);
        assert_eq!(res.resource_usage.peak_cpu_percent, 20.0);
        assert_eq!(res.resource_usage.concurrent_units, 3);
        assert!(res.end_time >= res.start_time);
    }

    #[tokio::test]
    async fn failure_is_captured_with_zero_usage() {
        let unit = Arc::new(
            UnitDescriptor::new("bad", || async { Err(UnitError::failed("boom")) })
                .with_requirement(ResourceRequirement::new(20.0, 512.0, 10.0)),
        );
        let res = run_unit(unit, 1).await;
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("boom"));
        assert_eq!(res.resource_usage.peak_cpu_percent, 0.0);
    }

    #[tokio::test]
    async fn panic_is_captured() {
        fn explode() -> Result<(), UnitError> {
            panic!("unit exploded")
        }
        let unit = Arc::new(UnitDescriptor::new("panics", || async { explode() }));
        let res = run_unit(unit, 1).await;
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("panicked: unit exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_the_attempt() {
        let unit = Arc::new(
            UnitDescriptor::new("slow", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_timeout(Duration::from_secs(1)),
        );
        let res = run_unit(unit, 1).await;
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("timed out after 1s"));
        assert!(res.duration < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let unit = Arc::new(
            UnitDescriptor::new("flaky", move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(UnitError::failed("not yet"))
                    } else {
                        Ok(())
                    }
                }
            })
            .with_retries(5),
        );
        let res = run_unit(unit, 1).await;
        assert!(res.success);
        assert_eq!(res.retry_count, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let unit = Arc::new(
            UnitDescriptor::new("broken", || async { Err(UnitError::failed("always")) })
                .with_retries(2),
        );
        let res = run_unit(unit, 1).await;
        assert!(!res.success);
        assert_eq!(res.retry_count, 2);
    }
}
