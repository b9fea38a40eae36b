use dolby_cp750::{Cp750Device, DeviceConfig};
use std::time::Duration;

/// Connects to a CP750 and prints a state line on every poll cycle.
///
/// Usage: monitor <host> [port]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| {
        eprintln!("usage: monitor <host> [port]");
        std::process::exit(2);
    });
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => dolby_cp750::DEFAULT_PORT,
    };

    let config = DeviceConfig::new(host)
        .with_port(port)
        .with_poll_interval(Duration::from_secs(1));
    let mut device = Cp750Device::new(config);

    let mut faults = device.subscribe_faults();
    tokio::spawn(async move {
        while let Ok(fault) = faults.recv().await {
            eprintln!("poll failed: {fault}");
        }
    });

    let mut updates = device.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow().clone();
                if snapshot.is_offline() {
                    println!("offline");
                    continue;
                }
                let input = snapshot
                    .input
                    .as_ref()
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let valid: String = (1..=4)
                    .map(|ch| match snapshot.dig_valid(ch) {
                        Some(true) => '+',
                        Some(false) => '-',
                        None => '?',
                    })
                    .collect();
                println!(
                    "fader: {:>6} dB  input: {:<15}  mute: {:<5}  dig valid: {}",
                    snapshot.fader.map(|f| f.to_string()).unwrap_or_else(|| "?".into()),
                    input,
                    snapshot.mute.map(|m| m.to_string()).unwrap_or_else(|| "?".into()),
                    valid,
                );
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    device.shutdown().await;
    Ok(())
}
