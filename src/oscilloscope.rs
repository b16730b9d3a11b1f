use crate::channel_settings::{
    time_per_division, Channel, SettingsStore, DIVISIONS_PER_SWEEP,
};
use crate::protocol::{self, CaptureCommand, FrameError, FRAME_LEN, SAMPLES_PER_CAPTURE};
use crate::scope_connector::{ConnectorError, ScopeConfig, ScopeConnector};
use crate::serial_terminal::{ScopeLink, ScopeTerminal, TerminalError};
use polars::prelude::*;
use serialport::SerialPort;
use std::io;
use std::time::Duration;

/// ADC code of 0 V.
pub const ZERO_VOLT_CODE: f64 = 2048.0;
/// 2000 codes span 1.5 V.
pub const VOLTS_PER_CODE: f64 = 1.5 / 2000.0;

const TIME_COLUMN_NAME: &str = "time";
const RAW_COLUMN_NAME: &str = "raw";
const VOLTS_COLUMN_NAME: &str = "volts";

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Short read: expected {expected} bytes but received {received}")]
    ShortRead { expected: usize, received: usize },

    #[error("Framing error: {0}")]
    Framing(#[from] FrameError),

    #[error("Transport error: {0}")]
    Transport(#[source] io::Error),
}

impl CaptureError {
    /// Whether the next polling cycle may simply try again.
    ///
    /// Short reads and bad frames are; a broken link is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

impl From<TerminalError> for CaptureError {
    fn from(e: TerminalError) -> Self {
        match e {
            TerminalError::ShortRead { expected, received } => {
                Self::ShortRead { expected, received }
            }
            TerminalError::Io(e) => Self::Transport(e),
        }
    }
}

/// One sweep of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSequence {
    channel: Channel,
    timebase: u8,
    samples: Vec<u16>,
}

impl SampleSequence {
    pub fn new(channel: Channel, timebase: u8, samples: Vec<u16>) -> Self {
        Self {
            channel,
            timebase,
            samples,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Timebase index the sweep was captured with.
    pub fn timebase(&self) -> u8 {
        self.timebase
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<u16> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time between two consecutive samples.
    pub fn sample_interval(&self) -> Duration {
        time_per_division(self.timebase) * DIVISIONS_PER_SWEEP / SAMPLES_PER_CAPTURE as u32
    }

    /// Convert a raw ADC code to volts.
    pub fn raw_to_voltage(raw: u16) -> f64 {
        (f64::from(raw) - ZERO_VOLT_CODE) * VOLTS_PER_CODE
    }

    /// The sweep as a frame with `time` (seconds), `raw` and `volts` columns.
    pub fn to_lazyframe(&self) -> Result<LazyFrame, PolarsError> {
        let interval = self.sample_interval().as_secs_f64();
        let raw: Vec<i32> = self.samples.iter().map(|&s| i32::from(s)).collect();
        let raw: Column = Series::new(RAW_COLUMN_NAME.into(), raw).into();

        let df = DataFrame::new(vec![raw])?
            .lazy()
            .with_row_index("row_index", Some(0))
            .with_columns([
                (col("row_index").cast(DataType::Float64) * lit(interval)).alias(TIME_COLUMN_NAME),
                ((col(RAW_COLUMN_NAME).cast(DataType::Float64) - lit(ZERO_VOLT_CODE))
                    * lit(VOLTS_PER_CODE))
                .alias(VOLTS_COLUMN_NAME),
            ])
            .select([
                col(TIME_COLUMN_NAME),
                col(RAW_COLUMN_NAME),
                col(VOLTS_COLUMN_NAME),
            ]);

        Ok(df)
    }
}

/// A two channel scope on a serial link, together with its acquisition settings.
///
/// The link is held for the lifetime of the value and closed when it is dropped.
pub struct Oscilloscope<L = Box<dyn SerialPort>> {
    terminal: ScopeTerminal<L>,
    settings: SettingsStore,
}

impl Oscilloscope {
    /// Open the configured device.
    pub fn connect(config: &ScopeConfig) -> Result<Self, ConnectorError> {
        let terminal = ScopeConnector::connect(config)?;
        Ok(Self::new(terminal, SettingsStore::new(config.trigger_level)))
    }
}

impl<L: ScopeLink> Oscilloscope<L> {
    pub fn new(terminal: ScopeTerminal<L>, settings: SettingsStore) -> Self {
        Self { terminal, settings }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    /// Request one sweep of `channel` using its current settings.
    ///
    /// Blocks until the whole frame arrived or the read timeout elapsed.
    /// Never retries on its own.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn capture(&mut self, channel: Channel) -> Result<SampleSequence, CaptureError> {
        let settings = self.settings.settings(channel);
        let command = CaptureCommand::new(channel, &settings);

        let frame = self.terminal.transact(&command.encode(), FRAME_LEN)?;
        let samples = protocol::decode_frame(&frame)?;

        Ok(SampleSequence::new(channel, settings.timebase(), samples))
    }

    /// Like [`Oscilloscope::capture`], but a retryable failure yields `Ok(None)`
    /// so the caller can skip this cycle. Only a broken link is an error.
    pub fn get_samples(
        &mut self,
        channel: Channel,
    ) -> Result<Option<SampleSequence>, CaptureError> {
        match self.capture(channel) {
            Ok(samples) => Ok(Some(samples)),
            Err(e) if e.is_retryable() => {
                log::warn!("No data from {} this cycle: {}", channel, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn terminal(&self) -> &ScopeTerminal<L> {
        &self.terminal
    }

    pub fn into_terminal(self) -> ScopeTerminal<L> {
        self.terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_settings::{TriggerEdge, DEFAULT_TRIGGER_LEVEL, MAX_TIMEBASE};
    use crate::protocol::{encode_frame, MAX_SAMPLE};
    use crate::serial_terminal::mock::MockLink;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn ramp() -> Vec<u16> {
        (0..SAMPLES_PER_CAPTURE as u16)
            .map(|i| (i * 3) % (MAX_SAMPLE + 1))
            .collect()
    }

    fn scope(link: MockLink) -> Oscilloscope<MockLink> {
        Oscilloscope::new(
            ScopeTerminal::new(link, TIMEOUT),
            SettingsStore::new(DEFAULT_TRIGGER_LEVEL),
        )
    }

    #[test]
    fn test_capture_ramp() {
        let link = MockLink::new().reply("ST3120481E", encode_frame(&ramp()));
        let mut scope = scope(link);

        let sweep = scope.capture(Channel::Ch1).unwrap();
        assert_eq!(sweep.channel(), Channel::Ch1);
        assert_eq!(sweep.timebase(), 3);
        assert_eq!(sweep.len(), SAMPLES_PER_CAPTURE);
        assert_eq!(sweep.samples(), ramp().as_slice());
        assert_eq!(scope.terminal().link().commands(), vec!["ST3120481E"]);
    }

    #[test]
    fn test_capture_uses_current_settings() {
        let link = MockLink::new().reply("ST6223040E", encode_frame(&ramp()));
        let mut scope = scope(link);

        let settings = scope.settings_mut();
        for _ in 0..5 {
            settings.increase_timebase(Channel::Ch2);
        }
        settings.increase_trigger_level(Channel::Ch2);
        settings.toggle_trigger_edge(Channel::Ch2);
        assert_eq!(settings.get_timebase(Channel::Ch2), MAX_TIMEBASE);

        let sweep = scope.get_samples(Channel::Ch2).unwrap().unwrap();
        assert_eq!(sweep.timebase(), MAX_TIMEBASE);
        assert_eq!(scope.terminal().link().commands(), vec!["ST6223040E"]);
    }

    #[test]
    fn test_channels_are_sequential_round_trips() {
        let link = MockLink::new()
            .reply("ST3120481E", encode_frame(&vec![1; SAMPLES_PER_CAPTURE]))
            .reply("ST3220481E", encode_frame(&vec![2; SAMPLES_PER_CAPTURE]));
        let mut scope = scope(link);

        let first = scope.capture(Channel::Ch1).unwrap();
        let second = scope.capture(Channel::Ch2).unwrap();
        assert!(first.samples().iter().all(|&s| s == 1));
        assert!(second.samples().iter().all(|&s| s == 2));
        assert_eq!(
            scope.terminal().link().commands(),
            vec!["ST3120481E", "ST3220481E"]
        );
    }

    #[test]
    fn test_link_is_handed_back_after_captures() {
        let link = MockLink::new().reply("ST3120481E", encode_frame(&ramp()));
        let mut scope = scope(link);
        scope.capture(Channel::Ch1).unwrap();
        assert!(scope.get_samples(Channel::Ch2).unwrap().is_none());

        let terminal = scope.into_terminal();
        assert_eq!(terminal.timeout(), TIMEOUT);
        assert_eq!(
            terminal.into_inner().commands(),
            vec!["ST3120481E", "ST3220481E"]
        );
    }

    #[test]
    fn test_truncated_frame_is_no_data() {
        let mut frame = encode_frame(&ramp());
        frame.pop();
        let mut scope = scope(MockLink::new().reply("ST3120481E", frame));

        assert!(matches!(
            scope.capture(Channel::Ch1),
            Err(CaptureError::ShortRead {
                expected: FRAME_LEN,
                received
            }) if received == FRAME_LEN - 1
        ));
        assert!(scope.get_samples(Channel::Ch1).unwrap().is_none());
    }

    #[test]
    fn test_silent_device_is_no_data() {
        let mut scope = scope(MockLink::new());
        assert!(scope.get_samples(Channel::Ch1).unwrap().is_none());
        assert!(scope.get_samples(Channel::Ch2).unwrap().is_none());
    }

    #[test]
    fn test_bad_end_marker_is_no_data() {
        let mut frame = encode_frame(&ramp());
        frame[FRAME_LEN - 1] = b'X';
        let mut scope = scope(MockLink::new().reply("ST3120481E", frame));

        let err = scope.capture(Channel::Ch1).unwrap_err();
        assert!(matches!(err, CaptureError::Framing(FrameError::BadMarker { .. })));
        assert!(err.is_retryable());
        assert!(scope.get_samples(Channel::Ch1).unwrap().is_none());
    }

    #[test]
    fn test_bad_start_marker_is_no_data() {
        let mut frame = encode_frame(&ramp());
        frame[0] = 0;
        let mut scope = scope(MockLink::new().reply("ST3120481E", frame));
        assert!(scope.get_samples(Channel::Ch1).unwrap().is_none());
    }

    #[test]
    fn test_broken_link_is_fatal() {
        let mut link = MockLink::new();
        link.write_error = Some(io::ErrorKind::BrokenPipe);
        let mut scope = scope(link);

        let err = scope.get_samples(Channel::Ch1).unwrap_err();
        assert!(matches!(err, CaptureError::Transport(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_read_failure_is_fatal() {
        let mut link = MockLink::new().reply("ST3120481E", encode_frame(&ramp()));
        link.read_error = Some(io::ErrorKind::NotConnected);
        let mut scope = scope(link);
        assert!(matches!(
            scope.get_samples(Channel::Ch1),
            Err(CaptureError::Transport(_))
        ));
    }

    #[test]
    fn test_sample_interval_follows_timebase() {
        let sweep = SampleSequence::new(Channel::Ch1, 3, ramp());
        // 100 us per division, ten divisions over 2000 samples
        assert_eq!(sweep.sample_interval(), Duration::from_nanos(500));

        let sweep = SampleSequence::new(Channel::Ch1, 0, ramp());
        assert_eq!(sweep.sample_interval(), Duration::from_nanos(25));
    }

    #[test]
    fn test_raw_to_voltage() {
        assert!(SampleSequence::raw_to_voltage(2048).abs() < 1e-9);
        assert!((SampleSequence::raw_to_voltage(4048) - 1.5).abs() < 1e-9);
        assert!((SampleSequence::raw_to_voltage(48) + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_to_lazyframe() {
        let sweep = SampleSequence::new(Channel::Ch2, 3, vec![2048, 4048, 48]);
        let df = sweep.to_lazyframe().unwrap().collect().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);

        let volts: Vec<f64> = df
            .column(VOLTS_COLUMN_NAME)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!((volts[1] - 1.5).abs() < 1e-9);

        let time: Vec<f64> = df
            .column(TIME_COLUMN_NAME)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!((time[2] - 1e-6).abs() < 1e-12);
    }

    #[test]
    fn test_edge_change_reaches_command() {
        let link = MockLink::new().reply("ST3120480E", encode_frame(&ramp()));
        let mut scope = scope(link);
        scope
            .settings_mut()
            .set_trigger_edge(Channel::Ch1, TriggerEdge::Falling);
        assert!(scope.get_samples(Channel::Ch1).unwrap().is_some());
    }
}
