//! # Rolling Window Module
//!
//! Fixed-capacity per-channel history for live inspection. The consumer loop
//! appends each decoded sample; the view layer reads owned snapshots through
//! the session's guarded accessor and never mutates anything here.
//!
//! Eviction is strict FIFO: once a window reaches its configured capacity,
//! every append discards the oldest entry.

use crate::sample::Sample;
use chrono::NaiveDateTime;
use std::collections::VecDeque;

/// Identifies one plotted channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Temp1,
    Rh1,
    HeatIndex1,
    Temp2,
    Rh2,
    HeatIndex2,
}

impl ChannelId {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelId::Temp1 => "temp1",
            ChannelId::Rh1 => "rh1",
            ChannelId::HeatIndex1 => "heat_index1",
            ChannelId::Temp2 => "temp2",
            ChannelId::Rh2 => "rh2",
            ChannelId::HeatIndex2 => "heat_index2",
        }
    }

    /// Get all channel IDs
    pub fn all() -> Vec<ChannelId> {
        vec![
            ChannelId::Temp1,
            ChannelId::Rh1,
            ChannelId::HeatIndex1,
            ChannelId::Temp2,
            ChannelId::Rh2,
            ChannelId::HeatIndex2,
        ]
    }
}

/// One channel's bounded history of (timestamp, value) pairs.
pub struct RollingWindow {
    capacity: usize,
    points: VecDeque<(NaiveDateTime, f64)>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, time: NaiveDateTime, value: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((time, value));
    }

    /// Owned copy in arrival order.
    pub fn snapshot(&self) -> Vec<(NaiveDateTime, f64)> {
        self.points.iter().copied().collect()
    }
}

/// Container for all plotted channel windows.
pub struct Windows {
    temp1: RollingWindow,
    rh1: RollingWindow,
    heat_index1: RollingWindow,
    temp2: RollingWindow,
    rh2: RollingWindow,
    heat_index2: RollingWindow,
}

impl Windows {
    pub fn new(capacity: usize) -> Self {
        Self {
            temp1: RollingWindow::new(capacity),
            rh1: RollingWindow::new(capacity),
            heat_index1: RollingWindow::new(capacity),
            temp2: RollingWindow::new(capacity),
            rh2: RollingWindow::new(capacity),
            heat_index2: RollingWindow::new(capacity),
        }
    }

    /// Append one sample's values to every channel it carries.
    ///
    /// The windows need a time axis; a device timestamp that does not parse
    /// is skipped here while the sample still reaches persistence untouched.
    pub fn append(&mut self, sample: &Sample) {
        let time = match sample.parsed_timestamp() {
            Some(t) => t,
            None => {
                log::debug!(
                    "Skipping window append for unparseable timestamp {:?}",
                    sample.device_timestamp
                );
                return;
            }
        };

        self.temp1.push(time, sample.channel1.temperature);
        self.rh1.push(time, sample.channel1.relative_humidity);
        self.heat_index1.push(time, sample.channel1.heat_index);

        if let Some(ch2) = &sample.channel2 {
            self.temp2.push(time, ch2.temperature);
            self.rh2.push(time, ch2.relative_humidity);
            self.heat_index2.push(time, ch2.heat_index);
        }
    }

    pub fn snapshot(&self, channel: ChannelId) -> Vec<(NaiveDateTime, f64)> {
        self.window(channel).snapshot()
    }

    fn window(&self, channel: ChannelId) -> &RollingWindow {
        match channel {
            ChannelId::Temp1 => &self.temp1,
            ChannelId::Rh1 => &self.rh1,
            ChannelId::HeatIndex1 => &self.heat_index1,
            ChannelId::Temp2 => &self.temp2,
            ChannelId::Rh2 => &self.rh2,
            ChannelId::HeatIndex2 => &self.heat_index2,
        }
    }
}
