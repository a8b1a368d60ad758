//! Core value types for one decoded instrument reading.
//!
//! A `Sample` is built once by the line decoder, moved through the sample
//! channel, and handed out read-only to the window aggregator and the
//! recorder. It is never mutated after construction.

use chrono::NaiveDateTime;

/// Timestamp format the instrument emits in field 0 of each line.
pub const DEVICE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// One channel's readings plus the derived heat index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReading {
    pub temperature: f64,
    pub relative_humidity: f64,
    pub heat_index: f64,
}

/// One fully parsed, timestamped multi-channel reading.
///
/// The device timestamp is kept verbatim as the instrument sent it; it is
/// not time-zone-interpreted at this layer. Single-channel protocol variants
/// leave `channel2` empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub device_timestamp: String,
    pub channel1: ChannelReading,
    pub channel2: Option<ChannelReading>,
}

impl Sample {
    /// Parse the device timestamp for consumers that need a time axis.
    ///
    /// Returns `None` if the instrument sent something that does not match
    /// `DEVICE_TIMESTAMP_FORMAT`; the raw string is still persisted as-is.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.device_timestamp, DEVICE_TIMESTAMP_FORMAT).ok()
    }
}
