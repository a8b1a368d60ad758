//! # Sample Channel Module
//!
//! Bounded FIFO handoff between the acquisition loop (producer) and the
//! consumer loop. Capacity and overflow behavior are configuration; the
//! default applies backpressure to the serial reader instead of silently
//! dropping instrument data, since the instrument's output rate is low
//! relative to the channel capacity.

use crate::sample::Sample;
use crossbeam_channel::{bounded, Receiver, Sender, SendTimeoutError, TrySendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the producer does when the channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Block up to the configured send timeout, then drop the sample
    Block,
    /// Discard the oldest queued sample to make room
    DropOldest,
}

/// Outcome of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    /// The sample was discarded after the send timeout elapsed
    Dropped,
    /// The consumer side is gone; the session is shutting down
    Closed,
}

/// Producer handle for the sample channel.
pub struct SampleSender {
    tx: Sender<Sample>,
    /// Present only under `DropOldest`, so the producer can evict the head
    /// of a full queue. Holding it otherwise would mask consumer shutdown.
    evict_rx: Option<Receiver<Sample>>,
    send_timeout: Duration,
}

/// Create the bounded sample channel.
pub fn sample_channel(
    capacity: usize,
    policy: OverflowPolicy,
    send_timeout: Duration,
) -> (SampleSender, Receiver<Sample>) {
    let (tx, rx) = bounded(capacity);
    let evict_rx = match policy {
        OverflowPolicy::Block => None,
        OverflowPolicy::DropOldest => Some(rx.clone()),
    };
    let sender = SampleSender {
        tx,
        evict_rx,
        send_timeout,
    };
    (sender, rx)
}

impl SampleSender {
    /// Push a sample without ever blocking indefinitely.
    pub fn push(&self, sample: Sample) -> PushOutcome {
        match &self.evict_rx {
            None => match self.tx.send_timeout(sample, self.send_timeout) {
                Ok(()) => PushOutcome::Sent,
                Err(SendTimeoutError::Timeout(_)) => PushOutcome::Dropped,
                Err(SendTimeoutError::Disconnected(_)) => PushOutcome::Closed,
            },
            Some(evict_rx) => {
                let mut sample = sample;
                loop {
                    match self.tx.try_send(sample) {
                        Ok(()) => return PushOutcome::Sent,
                        Err(TrySendError::Full(rejected)) => {
                            sample = rejected;
                            let _ = evict_rx.try_recv();
                        }
                        Err(TrySendError::Disconnected(_)) => return PushOutcome::Closed,
                    }
                }
            }
        }
    }
}
