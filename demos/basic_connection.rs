// Basic device discovery and connection example
//
// This example shows how to find analysers and read their version and trigger geometry.

use fastla_rs::{LaConnector, LinkConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Fast Logic Analyser Discovery Example");
    println!("=====================================\n");

    println!("1. Discovering available analysers...");
    let devices = LaConnector::get_available_devices(None)?;

    if devices.is_empty() {
        println!("No analysers found. Please connect a device and try again.");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    for (i, device) in devices.iter().enumerate() {
        let serial = device.serial_number.as_deref().unwrap_or("-");
        println!("  {}. {} at {} (serial {})", i + 1, device.name, device.port, serial);
    }
    println!();

    println!("2. Connecting to {}...", devices[0].port);
    let mut analyser = LaConnector::connect(None, Some(&devices[0].port), LinkConfig::default())?;
    println!("Successfully connected!");

    println!("\n3. Device information:");
    let geometry = analyser.geometry();
    println!("  Sample width:        {} channels", geometry.sample_width());
    println!("  Trigger steps:       {}", geometry.max_trigger_steps());
    println!("  Patterns per step:   {}", geometry.max_trigger_patterns());
    println!("  Match counter bits:  {}", geometry.match_counter_bits());
    println!("  LUTs per program:    {}", geometry.layout().total_luts);

    println!("\n4. Testing basic communication...");
    match analyser.try_read_version() {
        Some(version) => println!("  Bitstream version {}", version),
        None => println!("  No answer to the version request"),
    }
    let state = analyser.read_status()?;
    println!("  Acquisition state: {}", state.as_str());

    Ok(())
}
