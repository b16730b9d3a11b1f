// Text poller
//
// Connects to the scope, then captures the selected channels over and over and
// prints a short summary of every sweep. Run with RUST_LOG=debug to see the
// protocol traffic.

use clap::Parser;
use std::time::Duration;
use twinscope::{Channel, Oscilloscope, SampleSequence, ScopeConfig, ScopeConnector};

#[derive(Parser, Debug)]
#[command(author, version, about = "Poll a two-channel serial oscilloscope")]
struct Args {
    /// Serial device the scope is attached to
    #[arg(short, long, default_value = twinscope::scope_connector::DEFAULT_DEVICE)]
    device: String,

    /// Initial trigger level (ADC code, 128..=3968)
    #[arg(short, long, default_value_t = twinscope::channel_settings::DEFAULT_TRIGGER_LEVEL)]
    trigger_level: u16,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Only poll this channel (1 or 2)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
    channel: Option<u8>,

    /// Number of polling cycles
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,

    /// List serial ports and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    #[cfg(feature = "cpu-profiling")]
    let _tracy = tracy_client::Client::start();

    let args = Args::parse();

    if args.list {
        let devices = ScopeConnector::available_devices()?;
        if devices.is_empty() {
            println!("No serial ports found.");
        }
        for device in devices {
            println!("{} at {}", device.name, device.port);
        }
        return Ok(());
    }

    let config = ScopeConfig::default()
        .with_device(args.device)
        .with_read_timeout(Duration::from_millis(args.timeout_ms))
        .with_trigger_level(args.trigger_level);

    let mut scope = Oscilloscope::connect(&config)?;
    println!("Connected to {}\n", config.device);

    let channels: Vec<Channel> = match args.channel.and_then(Channel::from_number) {
        Some(channel) => vec![channel],
        None => Channel::ALL.to_vec(),
    };

    for cycle in 0..args.count {
        for &channel in &channels {
            match scope.get_samples(channel)? {
                Some(sweep) => print_summary(cycle, &sweep),
                None => println!("[{cycle:>3}] {channel}: no data"),
            }
        }
    }

    Ok(())
}

fn print_summary(cycle: usize, sweep: &SampleSequence) {
    let samples = sweep.samples();
    let min = samples.iter().copied().min().unwrap_or_default();
    let max = samples.iter().copied().max().unwrap_or_default();
    let sweep_time = sweep.sample_interval() * samples.len() as u32;

    println!(
        "[{:>3}] {}: {} samples over {:?}, {:.3}V to {:.3}V",
        cycle,
        sweep.channel(),
        samples.len(),
        sweep_time,
        SampleSequence::raw_to_voltage(min),
        SampleSequence::raw_to_voltage(max),
    );
}
