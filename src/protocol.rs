//! Wire format of the capture request and of the binary frame the scope answers with.
//!
//! A request is plain ASCII, `ST<timebase><channel><trigger level><edge>E`.
//! The answer is a fixed 4003 byte frame:
//!
//! ```text
//! +-----+-----+---------------------------------------+-----+
//! | 'S' | 'M' | 2000 samples, 2 bytes each (lo, hi)   | 'E' |
//! +-----+-----+---------------------------------------+-----+
//! ```
//!
//! Each sample carries 7 bits in `lo` and 5 bits in `hi`. The top bit of every
//! payload byte is not part of the sample.

use std::fmt;
use std::ops::Range;

use crate::channel_settings::{Channel, ChannelSettings};

pub const SAMPLES_PER_CAPTURE: usize = 2000;
pub const FRAME_LEN: usize = 2 + SAMPLES_PER_CAPTURE * 2 + 1;

pub const START_MARKER: u8 = b'S';
pub const MODE_MARKER: u8 = b'M';
pub const END_MARKER: u8 = b'E';

const START_POS: usize = 0;
const MODE_POS: usize = 1;
const END_POS: usize = FRAME_LEN - 1;
const PAYLOAD: Range<usize> = 2..END_POS;

const LOW_MASK: u8 = 0x7F;
const HIGH_MASK: u8 = 0x1F;
const LOW_BITS: u32 = 7;

/// Largest value a decoded sample can take.
pub const MAX_SAMPLE: u16 = 0x0FFF;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is {actual} bytes long, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Expected marker {expected:#04x} at byte {position} but found {found:#04x}")]
    BadMarker {
        position: usize,
        expected: u8,
        found: u8,
    },
}

/// One capture request, with every field already in the form the firmware expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureCommand {
    pub timebase: u8,
    pub channel: u8,
    pub trigger: u16,
    pub rising_edge: bool,
}

impl CaptureCommand {
    pub fn new(channel: Channel, settings: &ChannelSettings) -> Self {
        Self {
            timebase: settings.timebase(),
            channel: channel.number(),
            trigger: settings.trigger_level(),
            rising_edge: settings.trigger_edge().is_rising(),
        }
    }

    /// The literal command, written to the link in a single write.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CaptureCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ST{}{}{}{}E",
            self.timebase,
            self.channel,
            self.trigger,
            u8::from(self.rising_edge)
        )
    }
}

/// Reassemble one 12 bit sample from its two payload bytes.
#[inline]
pub fn decode_sample(lo: u8, hi: u8) -> u16 {
    u16::from(lo & LOW_MASK) | (u16::from(hi & HIGH_MASK) << LOW_BITS)
}

/// Check the envelope markers of a complete frame.
pub fn validate_frame(frame: &[u8]) -> Result<(), FrameError> {
    if frame.len() != FRAME_LEN {
        return Err(FrameError::WrongLength {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }

    for (position, expected) in [
        (START_POS, START_MARKER),
        (MODE_POS, MODE_MARKER),
        (END_POS, END_MARKER),
    ] {
        let found = frame[position];
        if found != expected {
            return Err(FrameError::BadMarker {
                position,
                expected,
                found,
            });
        }
    }

    Ok(())
}

/// Validate a frame and unpack its samples, earliest first.
pub fn decode_frame(frame: &[u8]) -> Result<Vec<u16>, FrameError> {
    #[cfg(feature = "cpu-profiling")]
    let _zone = tracy_client::Client::running()
        .map(|client| client.span(tracy_client::span_location!("decode_frame"), 0));

    validate_frame(frame)?;

    Ok(frame[PAYLOAD]
        .chunks_exact(2)
        .map(|pair| decode_sample(pair[0], pair[1]))
        .collect())
}

#[cfg(test)]
pub(crate) fn encode_frame(samples: &[u16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.push(START_MARKER);
    frame.push(MODE_MARKER);
    for &sample in samples {
        frame.push((sample & u16::from(LOW_MASK)) as u8);
        frame.push((sample >> LOW_BITS) as u8 & HIGH_MASK);
    }
    frame.push(END_MARKER);
    frame
}
