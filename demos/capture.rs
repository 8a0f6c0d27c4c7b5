// Trigger and capture example
//
// Arms the analyser on a single pattern, waits for the capture and writes it as CSV.

use clap::Parser;
use fastla_rs::capture_reading::SAMPLE_BITS;
use fastla_rs::{
    CaptureConfig, LaConnector, LinkConfig, SampleRate, TriggerProgram, TriggerStep,
};
use std::fs::File;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Capture samples from a fast logic analyser")]
struct Args {
    /// Serial port of the analyser, found automatically when omitted
    #[arg(short, long)]
    port: Option<String>,

    /// Trigger pattern, rightmost character is channel 0
    #[arg(short, long, default_value = "R")]
    trigger: String,

    /// Samples to capture
    #[arg(short = 'n', long, default_value_t = 40_000)]
    samples: u32,

    /// Samples to keep from before the trigger
    #[arg(long, default_value_t = 10_000)]
    pre_trigger: u32,

    /// Clock divider (0-3), sample clock is divided by (divider + 1) * 10^exponent
    #[arg(long, default_value_t = 0)]
    divider: u8,

    /// Clock divider exponent (0-3)
    #[arg(long, default_value_t = 0)]
    exponent: u8,

    /// Give up when the trigger has not fired after this many milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// CSV output file
    #[arg(short, long, default_value = "capture.csv")]
    output: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let analyser = LaConnector::connect(None, args.port.as_deref(), LinkConfig::default())?;
    let geometry = *analyser.geometry();

    let rate = SampleRate::new(args.divider, args.exponent)?;
    let capture = CaptureConfig::new(rate, args.samples, args.pre_trigger)?;
    let step = TriggerStep::when(&geometry).matches(0, &args.trigger).build()?;
    let program = TriggerProgram::from_steps(geometry, vec![step], capture)?;

    println!(
        "Capturing {} samples at {:.0} S/s, trigger {}",
        args.samples,
        rate.samples_per_second(),
        args.trigger
    );

    let armed = analyser.arm(&program).map_err(|(_, e)| e)?;
    let (_analyser, reading) = match armed.wait_timeout(Duration::from_millis(args.timeout_ms)) {
        Ok(result) => result,
        Err((armed, e)) => {
            println!("{}", e);
            armed.cancel()?;
            return Ok(());
        }
    };

    let channels = geometry.sample_width().min(SAMPLE_BITS);
    reading.write_csv(File::create(&args.output)?, channels)?;
    println!("Wrote {} samples to {}", reading.len(), args.output);

    Ok(())
}
