//! # Line Decoder Module
//!
//! Turns one raw instrument line into a validated `Sample`, or a
//! `DecodeError` explaining why the line was unusable.
//!
//! ## Protocol Variants
//! The deployed instruments speak two comma-separated layouts: a
//! single-channel record with at least 4 fields and a dual-channel record
//! with at least 8. Field offsets are configuration, not constants, so the
//! decoder is built with a `ProtocolVariant` at session start.
//!
//! ## Why Pure
//! The decoder owns no I/O and no clock; given its variant and the injected
//! heat index function it is a pure function of the input line, which keeps
//! the whole parsing contract unit-testable without hardware.

use crate::error::DecodeError;
use crate::heat_index::HeatIndexFn;
use crate::sample::{ChannelReading, Sample};
use serde::{Deserialize, Serialize};

/// Offsets of one channel's numeric fields within the comma-separated line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOffsets {
    pub temperature: usize,
    pub humidity: usize,
}

/// Field layout of the active instrument variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVariant {
    /// Minimum field count for a line to be considered structurally complete
    pub min_fields: usize,
    pub channel1: FieldOffsets,
    pub channel2: Option<FieldOffsets>,
}

impl ProtocolVariant {
    /// Single-channel instrument: `timestamp, temp, <unit>, rh, ...`
    pub fn single_channel() -> Self {
        Self {
            min_fields: 4,
            channel1: FieldOffsets { temperature: 1, humidity: 3 },
            channel2: None,
        }
    }

    /// Dual-channel instrument: `timestamp, temp, <unit>, rh, <unit>, temp2, <unit>, rh2`
    pub fn dual_channel() -> Self {
        Self {
            min_fields: 8,
            channel1: FieldOffsets { temperature: 1, humidity: 3 },
            channel2: Some(FieldOffsets { temperature: 5, humidity: 7 }),
        }
    }
}

/// Decodes raw instrument lines into samples.
pub struct LineDecoder {
    variant: ProtocolVariant,
    heat_index: HeatIndexFn,
}

impl LineDecoder {
    pub fn new(variant: ProtocolVariant, heat_index: HeatIndexFn) -> Self {
        Self { variant, heat_index }
    }

    /// Decode one line.
    ///
    /// The instrument is known to emit non-breaking spaces; they are
    /// normalized to ordinary spaces before splitting.
    pub fn decode(&self, raw: &str) -> Result<Sample, DecodeError> {
        let cleaned = raw.replace('\u{a0}', " ");
        let fields: Vec<&str> = cleaned.trim().split(',').map(str::trim).collect();

        if fields.len() < self.variant.min_fields {
            return Err(DecodeError::TooFewFields {
                found: fields.len(),
                minimum: self.variant.min_fields,
            });
        }

        let device_timestamp = fields[0].to_string();
        let channel1 = self.read_channel(&fields, &self.variant.channel1)?;
        let channel2 = match &self.variant.channel2 {
            Some(offsets) => Some(self.read_channel(&fields, offsets)?),
            None => None,
        };

        Ok(Sample {
            device_timestamp,
            channel1,
            channel2,
        })
    }

    fn read_channel(
        &self,
        fields: &[&str],
        offsets: &FieldOffsets,
    ) -> Result<ChannelReading, DecodeError> {
        let temperature = parse_field(fields, offsets.temperature)?;
        let relative_humidity = parse_field(fields, offsets.humidity)?;
        let heat_index = (self.heat_index)(temperature, relative_humidity);

        Ok(ChannelReading {
            temperature,
            relative_humidity,
            heat_index,
        })
    }
}

fn parse_field(fields: &[&str], index: usize) -> Result<f64, DecodeError> {
    let raw = fields.get(index).ok_or(DecodeError::FieldIndex {
        index,
        field_count: fields.len(),
    })?;

    raw.parse::<f64>().map_err(|source| DecodeError::NumericParse {
        index,
        value: (*raw).to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(t: f64, rh: f64) -> f64 {
        t + rh
    }

    #[test]
    fn test_decode_dual_channel_line() {
        let decoder = LineDecoder::new(ProtocolVariant::dual_channel(), sum);
        let sample = decoder
            .decode("01/01/2024 10:00:00, 22.5, C, 55.0, %, -3.25, C, 80.5")
            .expect("valid line");

        assert_eq!(sample.device_timestamp, "01/01/2024 10:00:00");
        assert_eq!(sample.channel1.temperature, 22.5);
        assert_eq!(sample.channel1.relative_humidity, 55.0);
        assert_eq!(sample.channel1.heat_index, sum(22.5, 55.0));

        let ch2 = sample.channel2.expect("dual channel");
        assert_eq!(ch2.temperature, -3.25);
        assert_eq!(ch2.relative_humidity, 80.5);
        assert_eq!(ch2.heat_index, sum(-3.25, 80.5));
    }

    #[test]
    fn test_decode_single_channel_line() {
        let decoder = LineDecoder::new(ProtocolVariant::single_channel(), sum);
        let sample = decoder
            .decode("01/01/2024 10:00:00, 22.5, x, 55.0, x")
            .expect("valid line");

        assert_eq!(sample.channel1.temperature, 22.5);
        assert_eq!(sample.channel1.relative_humidity, 55.0);
        assert_eq!(sample.channel1.heat_index, sum(22.5, 55.0));
        assert!(sample.channel2.is_none());
    }

    #[test]
    fn test_decode_normalizes_non_breaking_spaces() {
        let decoder = LineDecoder::new(ProtocolVariant::single_channel(), sum);
        let sample = decoder
            .decode("01/01/2024\u{a0}10:00:00,\u{a0}22.5, C, 55.0")
            .expect("valid line");

        assert_eq!(sample.device_timestamp, "01/01/2024 10:00:00");
        assert_eq!(sample.channel1.temperature, 22.5);
    }

    #[test]
    fn test_decode_too_few_fields() {
        let decoder = LineDecoder::new(ProtocolVariant::dual_channel(), sum);
        let err = decoder.decode("01/01/2024 10:00:00, 22.5, C, 55.0").unwrap_err();

        match err {
            DecodeError::TooFewFields { found, minimum } => {
                assert_eq!(found, 4);
                assert_eq!(minimum, 8);
            }
            other => panic!("expected TooFewFields, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_empty_line_is_too_few_fields() {
        let decoder = LineDecoder::new(ProtocolVariant::single_channel(), sum);
        assert!(matches!(
            decoder.decode("   "),
            Err(DecodeError::TooFewFields { found: 1, .. })
        ));
    }

    #[test]
    fn test_decode_numeric_parse_failure() {
        let decoder = LineDecoder::new(ProtocolVariant::single_channel(), sum);
        let err = decoder.decode("01/01/2024 10:00:00, OL, C, 55.0").unwrap_err();

        match err {
            DecodeError::NumericParse { index, value, .. } => {
                assert_eq!(index, 1);
                assert_eq!(value, "OL");
            }
            other => panic!("expected NumericParse, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_field_index_failure() {
        // Offsets past min_fields are legal configuration; a line that meets
        // the minimum can still be missing a configured field.
        let variant = ProtocolVariant {
            min_fields: 2,
            channel1: FieldOffsets { temperature: 1, humidity: 5 },
            channel2: None,
        };
        let decoder = LineDecoder::new(variant, sum);
        let err = decoder.decode("01/01/2024 10:00:00, 22.5").unwrap_err();

        match err {
            DecodeError::FieldIndex { index, field_count } => {
                assert_eq!(index, 5);
                assert_eq!(field_count, 2);
            }
            other => panic!("expected FieldIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_round_trips_float_text() {
        let decoder = LineDecoder::new(ProtocolVariant::single_channel(), sum);
        let sample = decoder
            .decode("01/01/2024 10:00:00, 21.0625, C, 54.125")
            .expect("valid line");

        assert_eq!(sample.channel1.temperature, 21.0625);
        assert_eq!(sample.channel1.relative_humidity, 54.125);
    }
}
