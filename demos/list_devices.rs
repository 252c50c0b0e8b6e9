//! Lists loopback capture endpoints and output devices.
//!
//! Run with: cargo run --example list_devices

use echo_route::{list_capture_endpoints, list_output_devices};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Capture endpoints:");
    for endpoint in list_capture_endpoints()? {
        let marker = if endpoint.is_default { " (default)" } else { "" };
        println!("  {}{marker}", endpoint.display_name);
    }

    println!("Output devices:");
    for device in list_output_devices()? {
        println!("  [{}] {} - {} ch", device.index, device.name, device.channels);
    }

    Ok(())
}
