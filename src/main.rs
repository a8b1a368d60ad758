mod acquisition;
mod channel;
mod config;
mod decoder;
mod error;
mod heat_index;
mod ports;
mod recorder;
mod sample;
mod session;
mod window;

use config::Config;
use session::Session;
use window::ChannelId;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    // A positional argument overrides the configured port.
    if let Some(port) = std::env::args().nth(1) {
        config.port = port;
    }

    if config.port.trim().is_empty() {
        println!("No serial port configured. Available ports:");
        match ports::scan_ports() {
            Ok(devices) if devices.is_empty() => println!("  (none found)"),
            Ok(devices) => {
                for device in devices {
                    println!("  {} - {}", device.name, device.description);
                }
            }
            Err(e) => println!("  {}", e),
        }
        println!("\nUsage: hygrolog <PORT>");
        println!("Or set `port` in the config file.");
        std::process::exit(2);
    }

    let session = match Session::start(config, heat_index::rothfusz) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Cannot start logging session: {}", e);
            std::process::exit(1);
        }
    };

    println!("Logging started. Press Enter to stop.");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    println!("Connection: {:?}", session.connection_state());
    for channel in ChannelId::all() {
        let points = session.snapshot(channel);
        if !points.is_empty() {
            println!("  {}: {} points in the live window", channel.name(), points.len());
        }
    }

    if let Err(e) = session.stop() {
        log::error!("Final flush failed: {}", e);
        std::process::exit(1);
    }

    println!("Logger stopped.");
}
