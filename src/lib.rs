//! # Twinscope
//!
//! A Rust library for capturing waveforms from a two-channel serial oscilloscope.
//!
//! Each capture is one synchronous round trip: the current settings of a channel
//! are encoded into an ASCII request, the device answers with a fixed-size binary
//! frame, and the frame is unpacked into 2000 twelve bit samples.
//!
//! ## Features
//!
//! - **Settings store**: per-channel timebase, trigger level and trigger edge with
//!   clamped, always-valid mutators
//! - **Protocol**: typed capture command, frame validation and sample decoding,
//!   testable without hardware
//! - **Failure policy**: short reads and bad frames mean "no data this cycle",
//!   only a broken link is reported as an error
//! - **DataFrame output**: sweeps convert to a `polars` frame with time and volts
//!
//! ## Examples
//!
//! ### Polling both channels
//!
//! ```rust,no_run
//! use twinscope::{Channel, Oscilloscope, ScopeConfig};
//!
//! let mut scope = Oscilloscope::connect(&ScopeConfig::default())?;
//!
//! scope.settings_mut().increase_timebase(Channel::Ch1);
//!
//! for channel in Channel::ALL {
//!     match scope.get_samples(channel)? {
//!         Some(sweep) => println!("{}: {} samples", channel, sweep.len()),
//!         None => println!("{}: no data this cycle", channel),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Encoding a command
//!
//! ```rust
//! use twinscope::{CaptureCommand, Channel, ChannelSettings};
//!
//! let settings = ChannelSettings::new(2048);
//! let command = CaptureCommand::new(Channel::Ch1, &settings);
//! assert_eq!(command.encode(), "ST3120481E");
//! ```
//!
//! ### Decoding a frame
//!
//! ```rust
//! use twinscope::protocol::{decode_frame, FRAME_LEN};
//!
//! let mut frame = vec![0u8; FRAME_LEN];
//! frame[0] = b'S';
//! frame[1] = b'M';
//! frame[FRAME_LEN - 1] = b'E';
//!
//! let samples = decode_frame(&frame).unwrap();
//! assert_eq!(samples.len(), 2000);
//! ```

pub mod channel_settings;
pub mod oscilloscope;
pub mod protocol;
pub mod scope_connector;
pub mod serial_terminal;

// Re-export the main types for convenience
pub use channel_settings::{Channel, ChannelSettings, SettingsStore, TriggerEdge};

pub use protocol::{CaptureCommand, FrameError};

pub use serial_terminal::{ScopeLink, ScopeTerminal, TerminalError};

pub use scope_connector::{ConnectorError, ScopeConfig, ScopeConnector, ScopeDevice};

pub use oscilloscope::{CaptureError, Oscilloscope, SampleSequence};
