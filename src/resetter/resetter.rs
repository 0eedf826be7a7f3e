// ABOUTME: Interval resetter that periodically resets consumed capacity on gates.
// ABOUTME: Holds weak references so it never keeps a gate alive.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::ResetterConfig;
use crate::error::ResetterError;
use crate::gate::CapacityGate;

type ManagedGates = Arc<Mutex<Vec<Weak<CapacityGate>>>>;

/// Resets one or more gates to their floor on a fixed period.
///
/// Attaching a resetter to a gate turns "capacity" into "capacity per
/// period". The timer is armed on construction and the first reset happens
/// one full period later.
///
/// Resets are best effort. A reservation admitted between the tick firing
/// and the waiters being re-checked is counted against the new period.
///
/// The timer runs until [`stop`](Self::stop) is called or the resetter is
/// dropped. Gates that have been dropped elsewhere are forgotten on the next
/// reset.
pub struct IntervalResetter {
    gates: ManagedGates,
    period: Option<Duration>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IntervalResetter {
    /// Create a resetter for `gates` and start its timer.
    ///
    /// Returns `Err(ResetterError::InvalidConfiguration)` for a zero period
    /// and `Err(ResetterError::NoRuntime)` when a period is set but no tokio
    /// runtime is running. An inert config needs no runtime.
    pub fn new<'a, I>(config: ResetterConfig, gates: I) -> Result<Self, ResetterError>
    where
        I: IntoIterator<Item = &'a Arc<CapacityGate>>,
    {
        config.validate()?;

        let gates: ManagedGates = Arc::new(Mutex::new(
            gates.into_iter().map(Arc::downgrade).collect(),
        ));
        let period = config.period();

        let task = match period {
            Some(period) => {
                let runtime =
                    tokio::runtime::Handle::try_current().map_err(|_| ResetterError::NoRuntime)?;
                let first_tick = Instant::now() + period;
                Some(runtime.spawn(run(gates.clone(), first_tick, period)))
            }
            None => None,
        };

        tracing::debug!(
            period_ms = config.period_ms,
            gates = gates.lock().len(),
            "interval resetter started"
        );

        Ok(Self {
            gates,
            period,
            task: Mutex::new(task),
        })
    }

    /// Create a resetter for a single gate.
    pub fn for_gate(
        config: ResetterConfig,
        gate: &Arc<CapacityGate>,
    ) -> Result<Self, ResetterError> {
        Self::new(config, [gate])
    }

    /// Start managing another gate.
    pub fn add_gate(&self, gate: &Arc<CapacityGate>) {
        self.gates.lock().push(Arc::downgrade(gate));
    }

    /// Number of managed gates that are still alive.
    pub fn gate_count(&self) -> usize {
        self.gates
            .lock()
            .iter()
            .filter(|gate| gate.strong_count() > 0)
            .count()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Reset every managed gate now, outside the timer.
    ///
    /// Returns the number of gates that were reset.
    pub fn reset_now(&self) -> usize {
        reset_all(&self.gates)
    }

    /// Whether the periodic timer is still armed.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the periodic timer. Managed gates keep their current state.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!("interval resetter stopped");
        }
    }
}

impl Drop for IntervalResetter {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for IntervalResetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalResetter")
            .field("period", &self.period)
            .field("gates", &self.gate_count())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run(gates: ManagedGates, first_tick: Instant, period: Duration) {
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let reset = reset_all(&gates);
        tracing::trace!(reset, "interval tick");
    }
}

/// Reset all live gates and forget the dropped ones.
fn reset_all(gates: &ManagedGates) -> usize {
    let mut gates = gates.lock();
    gates.retain(|gate| match gate.upgrade() {
        Some(gate) => {
            gate.reset();
            true
        }
        None => false,
    });
    gates.len()
}
