//! Cancellable one-second countdowns.
//!
//! A [`Countdown`] runs on its own task and reports the seconds left once per
//! second, then fires its completion callback. The returned
//! [`CountdownHandle`] stops it on `cancel()` or when dropped; a
//! [`CountdownSlot`] holds at most one handle, so starting a new countdown in
//! a slot always stops the previous one.

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

pub struct Countdown;

impl Countdown {
    /// Start counting down from `duration_seconds`.
    ///
    /// `on_tick` sees `duration_seconds, ..., 1`, the first immediately and
    /// the rest one second apart; `on_complete` runs one second after the
    /// last tick unless the countdown was cancelled. Must be called inside a
    /// tokio runtime.
    pub fn start<T, C>(duration_seconds: u64, mut on_tick: T, on_complete: C) -> CountdownHandle
    where
        T: FnMut(u64) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut remaining = duration_seconds;

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                if remaining == 0 {
                    break;
                }
                on_tick(remaining);
                remaining -= 1;
            }

            if !cancelled.is_cancelled() {
                on_complete();
            }
        });

        CountdownHandle { token }
    }
}

/// Stops its countdown when cancelled or dropped.
#[derive(Debug)]
pub struct CountdownHandle {
    token: CancellationToken,
}

impl CountdownHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Single-owner holder for a running countdown.
#[derive(Debug, Default)]
pub struct CountdownSlot {
    current: Option<CountdownHandle>,
}

impl CountdownSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle`, cancelling whatever countdown the slot held before.
    pub fn replace(&mut self, handle: CountdownHandle) {
        if let Some(previous) = self.current.replace(handle) {
            previous.cancel();
        }
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl FnMut(u64) + Send + 'static) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = ticks.clone();
        (ticks, move |left| sink.lock().unwrap().push(left))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_down_then_completes() {
        let (ticks, on_tick) = recorder();
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = done.clone();

        let _handle = Countdown::start(3, on_tick, move || done_flag.store(true, Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(*ticks.lock().unwrap(), vec![3, 2, 1]);
        assert!(!done.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_without_completion() {
        let (ticks, on_tick) = recorder();
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = done.clone();

        let handle = Countdown::start(5, on_tick, move || done_flag.store(true, Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![5, 4]);
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_replacement_stops_previous() {
        let (first_ticks, first_tick) = recorder();
        let (second_ticks, second_tick) = recorder();
        let mut slot = CountdownSlot::new();

        slot.replace(Countdown::start(10, first_tick, || {}));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        slot.replace(Countdown::start(2, second_tick, || {}));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(*first_ticks.lock().unwrap(), vec![10, 9]);
        assert_eq!(*second_ticks.lock().unwrap(), vec![2, 1]);
        assert!(slot.is_occupied());

        slot.clear();
        assert!(!slot.is_occupied());
    }
}
