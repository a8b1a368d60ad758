//! # Session Module
//!
//! Start/stop orchestration for one logging session. A session owns every
//! piece of pipeline state; nothing is global, so a second `start` after a
//! `stop` begins from scratch.
//!
//! ## Threads
//! - Acquisition thread: blocking serial I/O, produces samples
//! - Consumer thread: ticks on the sample channel, feeds the live-view
//!   windows and the recorder, and evaluates the flush policy
//!
//! ## Shutdown
//! `stop` raises the stop flag, joins the acquisition thread (bounded in
//! practice by the serial read timeout), lets the consumer drain whatever is
//! still queued, and forces one final flush regardless of the thresholds so
//! a clean stop never discards data.

use crate::acquisition::{
    AcquisitionLoop, ConnectionState, Connector, ReconnectPolicy, SerialConnector, StatusHandle,
};
use crate::channel::sample_channel;
use crate::config::Config;
use crate::decoder::LineDecoder;
use crate::error::{ConfigError, ConnectionError, PersistenceError};
use crate::heat_index::HeatIndexFn;
use crate::recorder::Recorder;
use crate::sample::Sample;
use crate::window::{ChannelId, Windows};
use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One running logging session.
pub struct Session {
    stop: Arc<AtomicBool>,
    status: Arc<StatusHandle>,
    windows: Arc<Mutex<Windows>>,
    acquisition: Option<JoinHandle<Result<(), ConnectionError>>>,
    consumer: Option<JoinHandle<Result<usize, PersistenceError>>>,
}

impl Session {
    /// Start logging from the configured serial port.
    pub fn start(config: Config, heat_index: HeatIndexFn) -> Result<Self, ConfigError> {
        let connector = SerialConnector {
            port_name: config.port.clone(),
            baud_rate: config.baud_rate,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        };
        Self::start_with_connector(config, heat_index, Box::new(connector))
    }

    /// Start with an explicit connector; the seam for tests and alternate
    /// transports.
    pub fn start_with_connector(
        config: Config,
        heat_index: HeatIndexFn,
        connector: Box<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        std::fs::create_dir_all(&config.output_dir).map_err(|e| ConfigError::InvalidValue {
            field: "output_dir",
            reason: e.to_string(),
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let status = Arc::new(StatusHandle::new());
        let windows = Arc::new(Mutex::new(Windows::new(config.window_capacity)));
        let (sender, receiver) = sample_channel(
            config.channel_capacity,
            config.overflow_policy,
            Duration::from_millis(config.send_timeout_ms),
        );
        let decoder = LineDecoder::new(config.protocol.clone(), heat_index);
        let recorder = Recorder::new(
            config.output_dir.clone(),
            config.record_threshold,
            Duration::from_secs(config.time_threshold_secs),
        );
        let reconnect = ReconnectPolicy {
            backoff: Duration::from_millis(config.reconnect_backoff_ms),
            max_attempts: config.max_reconnect_attempts,
        };

        let acquisition_loop = AcquisitionLoop::new(
            connector,
            decoder,
            sender,
            stop.clone(),
            status.clone(),
            reconnect,
            config.sync_clock_on_connect,
        );
        let acquisition = thread::spawn(move || {
            let result = acquisition_loop.run();
            if let Err(e) = &result {
                log::error!("Acquisition ended: {}", e);
            }
            result
        });

        let tick = Duration::from_millis(config.consumer_tick_ms);
        let consumer_windows = windows.clone();
        let consumer =
            thread::spawn(move || consumer_loop(receiver, recorder, consumer_windows, tick));

        log::info!("Logging session started");
        Ok(Session {
            stop,
            status,
            windows,
            acquisition: Some(acquisition),
            consumer: Some(consumer),
        })
    }

    /// Current state of the serial link, safe to call from any thread.
    pub fn connection_state(&self) -> ConnectionState {
        self.status.get()
    }

    /// Owned copy of one live-view channel in arrival order.
    pub fn snapshot(&self, channel: ChannelId) -> Vec<(NaiveDateTime, f64)> {
        self.windows.lock().unwrap().snapshot(channel)
    }

    /// Stop the session, draining the channel and forcing a final flush.
    pub fn stop(mut self) -> Result<(), PersistenceError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), PersistenceError> {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.acquisition.take() {
            if handle.join().is_err() {
                log::error!("Acquisition thread panicked");
            }
        }

        let result = match self.consumer.take() {
            Some(handle) => match handle.join() {
                Ok(flush_result) => flush_result.map(|_| ()),
                Err(_) => {
                    log::error!("Consumer thread panicked");
                    Ok(())
                }
            },
            None => Ok(()),
        };

        log::info!("Logging session stopped");
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.acquisition.is_some() || self.consumer.is_some() {
            if let Err(e) = self.shutdown() {
                log::error!("Final flush failed: {}", e);
            }
        }
    }
}

/// Consumer tick: receive in arrival order, feed windows and recorder, and
/// evaluate the flush policy. Exits when the producer side disconnects, at
/// which point everything still queued has been delivered; a final flush
/// then persists whatever remains buffered.
fn consumer_loop(
    receiver: Receiver<Sample>,
    mut recorder: Recorder,
    windows: Arc<Mutex<Windows>>,
    tick: Duration,
) -> Result<usize, PersistenceError> {
    loop {
        match receiver.recv_timeout(tick) {
            Ok(sample) => {
                windows.lock().unwrap().append(&sample);
                recorder.record(sample);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if recorder.should_flush(Instant::now()) {
            if let Err(e) = recorder.flush(Instant::now()) {
                log::warn!(
                    "Flush failed, keeping {} buffered records for retry: {}",
                    recorder.pending(),
                    e
                );
            }
        }
    }

    while let Ok(sample) = receiver.try_recv() {
        windows.lock().unwrap().append(&sample);
        recorder.record(sample);
    }
    recorder.flush(Instant::now())
}
