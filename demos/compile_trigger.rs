// Compile a trigger program without hardware
//
// Prints the step listing, the LUT regions and optionally the VHDL testbench stimulus.

use clap::Parser;
use fastla_rs::{compile, AnalyserGeometry, CaptureConfig, Operation, TriggerProgram, TriggerStep};

#[derive(Parser, Debug)]
#[command(about = "Compile a trigger sequence into LUT words")]
struct Args {
    /// Channels on the sample bus
    #[arg(long, default_value_t = 16)]
    sample_width: usize,

    /// Trigger steps supported by the bitstream
    #[arg(long, default_value_t = 16)]
    max_steps: usize,

    /// Patterns per trigger step (2 or 4)
    #[arg(long, default_value_t = 2)]
    patterns: usize,

    /// One step per value, e.g. "XXXR" or "XXXR/XXHL" for two patterns
    #[arg(required = true)]
    steps: Vec<String>,

    /// Combine the patterns of every step with OR instead of AND
    #[arg(long)]
    any: bool,

    /// Match count for every step
    #[arg(long, default_value_t = 1)]
    count: u16,

    /// Print the VHDL stimulus array
    #[arg(long)]
    vhdl: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let geometry = AnalyserGeometry::new(args.sample_width, args.max_steps, args.patterns, 16)?;
    let operation = if args.any { Operation::Or } else { Operation::And };

    let steps = args
        .steps
        .iter()
        .map(|step| {
            step.split('/')
                .enumerate()
                .fold(TriggerStep::when(&geometry), |builder, (index, pattern)| {
                    builder.matches(index, pattern)
                })
                .operation(operation)
                .times(args.count)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let program = TriggerProgram::from_steps(geometry, steps, CaptureConfig::default())?;

    println!("Trigger sequence:");
    for (index, step) in program.active_steps().iter().enumerate() {
        println!("  {:2}: {}", index, step);
    }

    let image = compile(&program);
    let layout = image.layout();
    println!("\n{} LUTs", layout.total_luts);
    for (name, words) in [
        ("pattern", image.pattern_words()),
        ("combiner", image.combiner_words()),
        ("count", image.count_words()),
        ("flag", image.flag_words()),
    ] {
        println!("  {:<8} {:3} LUTs", name, words.len());
        for word in words.iter().filter(|&&w| w != 0).take(4) {
            println!("           {:#010x}", word);
        }
    }

    if args.vhdl {
        print!("{}", image.to_vhdl_stimulus());
    }

    Ok(())
}
