//! Rust library for monitoring and controlling Dolby CP750 cinema audio processors
//!
//! The CP750 speaks a line-oriented ASCII protocol over TCP: one CRLF-terminated
//! command per line, one reply per line, no framing and no error channel. This
//! library keeps a cached state snapshot fresh and exposes validated control
//! operations on top of that protocol. It supports:
//!
//! - Fader level, input source, and mute control
//! - Digital input signal-validity monitoring
//! - Background polling with copy-on-write snapshot publication
//! - Gating on an external power condition (e.g. a booth power switch)
//! - Automatic reconnect-and-resend when the device goes silent
//!
//! # Quick Start
//!
//! ```no_run
//! use dolby_cp750::{Cp750Device, DeviceConfig, InputSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeviceConfig::new("192.168.1.50").with_name("Screen 7");
//!     let mut device = Cp750Device::new(config);
//!
//!     // Control the processor
//!     device.set_fader(-12.5).await?;
//!     device.set_input(InputSource::Digital1).await?;
//!
//!     // Watch the polled state
//!     let mut updates = device.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow().clone();
//!         println!("fader: {:?} mute: {:?}", snapshot.fader, snapshot.mute);
//!         break; // Just show one update
//!     }
//!
//!     device.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Device**: per-processor handle owning the transport, gate, and coordinator
//! - **Coordinator**: fixed-cadence poll loop publishing immutable snapshots
//! - **Transport**: TCP connection, line codec, timeout and single-retry policy
//! - **Gate**: per-call availability check against an external power condition
//! - **Protocol**: command builders and reply parsing
//! - **Types**: domain types and data structures

mod config;
mod coordinator;
mod device;
mod error;
mod gate;
mod protocol;
mod transport;
mod types;

// Public exports
pub use config::{DeviceConfig, FaderScale, DEFAULT_NAME, DEFAULT_PORT};
pub use coordinator::Coordinator;
pub use device::Cp750Device;
pub use error::{Cp750Error, Result};
pub use gate::{AvailabilityGate, ConditionLookup};
pub use transport::Transport;
pub use types::{DeviceSnapshot, InputSource};
