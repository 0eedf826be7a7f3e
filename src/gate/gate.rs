// ABOUTME: Capacity gate that admits async reservations against a moving ceiling.
// ABOUTME: Owns the consumed counter, the waiter queue, and the wake-up protocol.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, watch};

use super::config::{GateConfig, UnsatisfiablePolicy};
use crate::error::GateError;

/// Point-in-time view of a gate, published on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateSnapshot {
    pub consumed: f64,
    pub maximum: f64,
    pub floor: f64,
    /// Number of reservations currently waiting for capacity.
    pub waiting: usize,
}

/// A reservation blocked on insufficient capacity.
struct Waiter {
    id: u64,
    amount: f64,
    /// Carries the change admission made to `consumed`.
    completion: oneshot::Sender<Result<f64, GateError>>,
}

/// Mutable state for the gate, protected by a single mutex.
struct GateState {
    maximum: f64,
    floor: f64,
    consumed: f64,
    policy: UnsatisfiablePolicy,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

impl GateState {
    fn fits(&self, amount: f64) -> bool {
        self.consumed + amount <= self.maximum
    }

    /// Add `amount`, clamped at the floor. Returns the change actually made.
    fn apply(&mut self, amount: f64) -> f64 {
        let before = self.consumed;
        self.consumed = (self.consumed + amount).max(self.floor);
        self.consumed - before
    }

    /// Largest amount that could ever be admitted.
    fn limit(&self) -> f64 {
        self.maximum - self.floor
    }

    fn is_unsatisfiable(&self, amount: f64) -> bool {
        self.policy == UnsatisfiablePolicy::Reject && amount > self.limit()
    }

    fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            consumed: self.consumed,
            maximum: self.maximum,
            floor: self.floor,
            waiting: self.waiters.len(),
        }
    }

    /// Handle one state-change event.
    ///
    /// Waiters are visited in registration order and each one is checked
    /// against the consumed value left by the waiters admitted before it.
    /// Every admission changes `consumed` again, so passes repeat until one
    /// admits nothing.
    fn notify(&mut self) {
        loop {
            let mut admitted = 0;
            let queued = std::mem::take(&mut self.waiters);

            for waiter in queued {
                if !self.fits(waiter.amount) {
                    self.waiters.push_back(waiter);
                    continue;
                }

                let delta = self.apply(waiter.amount);
                tracing::debug!(
                    waiter = waiter.id,
                    amount = waiter.amount,
                    consumed = self.consumed,
                    "waiter admitted"
                );
                // The receiver is held by a live PendingReservation; it
                // refunds the delta itself if dropped before reading.
                let _ = waiter.completion.send(Ok(delta));
                admitted += 1;
            }

            tracing::trace!(admitted, waiting = self.waiters.len(), "notification pass");
            if admitted == 0 {
                break;
            }
        }
    }

    /// Fail every waiter that can no longer fit under the ceiling.
    fn reject_unsatisfiable(&mut self) {
        if self.policy != UnsatisfiablePolicy::Reject {
            return;
        }

        let limit = self.limit();
        let queued = std::mem::take(&mut self.waiters);

        for waiter in queued {
            if waiter.amount <= limit {
                self.waiters.push_back(waiter);
                continue;
            }
            tracing::warn!(
                waiter = waiter.id,
                amount = waiter.amount,
                limit,
                "pending reservation can no longer be admitted"
            );
            let _ = waiter.completion.send(Err(GateError::UnsatisfiableReservation {
                amount: waiter.amount,
                limit,
            }));
        }
    }
}

fn check_amount(amount: f64) -> Result<(), GateError> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(GateError::InvalidAmount(amount))
    }
}

/// Asynchronous capacity gate.
///
/// The gate tracks a consumed capacity between `floor` and (for admission
/// purposes) `maximum`. A reservation of `amount` is admitted when
/// `consumed + amount <= maximum`; otherwise the caller waits in a queue
/// until a state change (release, reset, ceiling or floor change) lets it in.
///
/// # Ordering
///
/// Within one state change, waiters are checked in registration order and a
/// single release can admit several of them. There is no global FIFO: a fresh
/// reservation that fits right away is admitted without queueing, even if
/// older, larger waiters are still pending.
///
/// # Cancellation
///
/// Dropping a pending [`reserve`](Self::reserve) future removes its waiter.
/// If the waiter was admitted just before being dropped, the change its
/// admission made to consumed capacity is undone.
pub struct CapacityGate {
    state: Mutex<GateState>,
    events: watch::Sender<GateSnapshot>,
}

impl std::fmt::Debug for CapacityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CapacityGate")
            .field("consumed", &snapshot.consumed)
            .field("maximum", &snapshot.maximum)
            .field("floor", &snapshot.floor)
            .field("waiting", &snapshot.waiting)
            .finish()
    }
}

impl CapacityGate {
    /// Create a new gate.
    ///
    /// Returns `Err(GateError::InvalidConfiguration)` if the config has
    /// non-finite values or a maximum below the floor.
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        config.validate()?;

        let state = GateState {
            maximum: config.maximum,
            floor: config.floor,
            consumed: config.initial_consumed(),
            policy: config.unsatisfiable,
            waiters: VecDeque::new(),
            next_id: 0,
        };
        let (events, _) = watch::channel(state.snapshot());

        Ok(Self {
            state: Mutex::new(state),
            events,
        })
    }

    /// Reserve `amount` of capacity, waiting until it fits.
    ///
    /// Returns without suspending when `consumed + amount <= maximum` holds at
    /// call time. Negative amounts release capacity but are still subject to
    /// the admission check; use [`release`](Self::release) to give capacity
    /// back unconditionally.
    ///
    /// Returns `Err(GateError::InvalidAmount)` for non-finite amounts, and
    /// `Err(GateError::UnsatisfiableReservation)` when the gate uses
    /// [`UnsatisfiablePolicy::Reject`] and the amount can never fit.
    pub async fn reserve(&self, amount: f64) -> Result<(), GateError> {
        match self.admit_or_enqueue(amount)? {
            None => Ok(()),
            Some(pending) => pending.wait().await,
        }
    }

    /// Reserve with cancellation support.
    ///
    /// Returns `Err(GateError::Cancelled)` if the cancel future completes
    /// first; the waiter is removed without being admitted.
    pub async fn reserve_with_cancel<F>(&self, amount: f64, cancel: F) -> Result<(), GateError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        tokio::select! {
            biased;
            () = &mut cancel => {
                Err(GateError::Cancelled)
            }
            result = self.reserve(amount) => {
                result
            }
        }
    }

    /// Reserve, giving up with `Err(GateError::Timeout)` after `timeout`.
    pub async fn reserve_timeout(&self, amount: f64, timeout: Duration) -> Result<(), GateError> {
        tokio::time::timeout(timeout, self.reserve(amount))
            .await
            .map_err(|_| GateError::Timeout(timeout))?
    }

    /// Reserve only if the amount fits right now.
    ///
    /// Returns `Ok(false)` without queueing when it does not.
    pub fn try_reserve(&self, amount: f64) -> Result<bool, GateError> {
        check_amount(amount)?;
        let mut state = self.state.lock();

        if state.is_unsatisfiable(amount) {
            return Err(GateError::UnsatisfiableReservation {
                amount,
                limit: state.limit(),
            });
        }
        if !state.fits(amount) {
            return Ok(false);
        }

        state.apply(amount);
        self.changed(&mut state);
        Ok(true)
    }

    /// Give back `amount` of capacity. Never waits.
    ///
    /// Consumed capacity is clamped at the floor.
    pub fn release(&self, amount: f64) -> Result<(), GateError> {
        check_amount(amount)?;
        if amount < 0.0 {
            return Err(GateError::InvalidAmount(amount));
        }

        let mut state = self.state.lock();
        state.apply(-amount);
        tracing::debug!(amount, consumed = state.consumed, "capacity released");
        self.changed(&mut state);
        Ok(())
    }

    /// Current consumed capacity.
    pub fn consumed(&self) -> f64 {
        self.state.lock().consumed
    }

    /// Current admission ceiling.
    pub fn maximum(&self) -> f64 {
        self.state.lock().maximum
    }

    /// Current floor.
    pub fn floor(&self) -> f64 {
        self.state.lock().floor
    }

    /// Number of reservations waiting for capacity.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        self.state.lock().snapshot()
    }

    /// Force consumed capacity to `value`, clamped at the floor.
    pub fn set_consumed(&self, value: f64) -> Result<(), GateError> {
        check_amount(value)?;

        let mut state = self.state.lock();
        state.consumed = value.max(state.floor);
        self.changed(&mut state);
        Ok(())
    }

    /// Drive consumed capacity back to the floor.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.consumed = state.floor;
        tracing::debug!(floor = state.floor, waiting = state.waiters.len(), "gate reset");
        self.changed(&mut state);
    }

    /// Change the admission ceiling and re-check all waiters against it.
    pub fn set_maximum(&self, maximum: f64) -> Result<(), GateError> {
        let mut state = self.state.lock();
        if !maximum.is_finite() || maximum < state.floor {
            return Err(GateError::InvalidConfiguration(format!(
                "maximum ({}) must be finite and not below floor ({})",
                maximum, state.floor
            )));
        }

        state.maximum = maximum;
        state.reject_unsatisfiable();
        self.changed(&mut state);
        Ok(())
    }

    /// Change the floor, re-clamping consumed capacity to it.
    pub fn set_floor(&self, floor: f64) -> Result<(), GateError> {
        let mut state = self.state.lock();
        if !floor.is_finite() || floor > state.maximum {
            return Err(GateError::InvalidConfiguration(format!(
                "floor ({}) must be finite and not above maximum ({})",
                floor, state.maximum
            )));
        }

        state.floor = floor;
        state.consumed = state.consumed.max(floor);
        state.reject_unsatisfiable();
        self.changed(&mut state);
        Ok(())
    }

    /// Subscribe to state changes.
    ///
    /// The receiver always holds the latest snapshot. It is meant for
    /// metrics and logging and plays no part in admitting waiters.
    pub fn subscribe(&self) -> watch::Receiver<GateSnapshot> {
        self.events.subscribe()
    }

    /// Admit immediately or register a waiter.
    fn admit_or_enqueue(&self, amount: f64) -> Result<Option<PendingReservation<'_>>, GateError> {
        check_amount(amount)?;
        let mut state = self.state.lock();

        if state.fits(amount) {
            state.apply(amount);
            tracing::trace!(amount, consumed = state.consumed, "reservation admitted");
            self.changed(&mut state);
            return Ok(None);
        }

        if state.is_unsatisfiable(amount) {
            let limit = state.limit();
            tracing::warn!(amount, limit, "rejecting reservation that can never be admitted");
            return Err(GateError::UnsatisfiableReservation { amount, limit });
        }

        let id = state.next_id;
        state.next_id += 1;
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(Waiter {
            id,
            amount,
            completion: tx,
        });
        tracing::trace!(
            waiter = id,
            amount,
            consumed = state.consumed,
            maximum = state.maximum,
            "reservation waiting"
        );
        self.events.send_replace(state.snapshot());

        Ok(Some(PendingReservation {
            gate: self,
            id,
            amount,
            completion: rx,
            finished: false,
        }))
    }

    /// Raise a state-change event: wake eligible waiters, then publish.
    fn changed(&self, state: &mut GateState) {
        state.notify();
        self.events.send_replace(state.snapshot());
    }
}

/// A registered waiter, owned by the caller's `reserve` future.
///
/// Dropping it before completion deregisters the waiter, or undoes the
/// admission if the waiter was admitted in the meantime.
struct PendingReservation<'a> {
    gate: &'a CapacityGate,
    id: u64,
    amount: f64,
    completion: oneshot::Receiver<Result<f64, GateError>>,
    finished: bool,
}

impl PendingReservation<'_> {
    async fn wait(mut self) -> Result<(), GateError> {
        let result = (&mut self.completion).await;
        self.finished = true;
        result.unwrap_or(Err(GateError::Cancelled)).map(|_| ())
    }
}

impl Drop for PendingReservation<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut state = self.gate.state.lock();
        if let Some(index) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(index);
            tracing::debug!(waiter = self.id, amount = self.amount, "reservation cancelled");
            self.gate.events.send_replace(state.snapshot());
            return;
        }

        // Already out of the queue: admitted or rejected while nobody was
        // listening. An unobserved admission is undone by exactly the change
        // it made, which differs from `amount` when the floor clamped it.
        if let Ok(Ok(delta)) = self.completion.try_recv() {
            tracing::debug!(
                waiter = self.id,
                amount = self.amount,
                delta,
                "refunding admission of dropped reservation"
            );
            state.apply(-delta);
            self.gate.changed(&mut state);
        }
    }
}
