use crate::config::DeviceConfig;
use crate::coordinator::Coordinator;
use crate::error::{Cp750Error, Result};
use crate::gate::{AvailabilityGate, ConditionLookup};
use crate::protocol;
use crate::transport::Transport;
use crate::types::{DeviceSnapshot, InputSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};

/// Handle for one CP750 processor
///
/// Owns the per-device aggregate: the shared transport, the availability
/// gate, and a running [`Coordinator`]. Host adapters consume the read-only
/// snapshot plus the three write operations; everything else (UI, config
/// forms, lifecycle) lives outside this crate.
///
/// Writes never mutate the cached snapshot directly. Each one sends the
/// device command and then triggers an out-of-cadence refresh, so the
/// published state only ever reflects what the device actually accepted.
///
/// # Example
///
/// ```no_run
/// use dolby_cp750::{Cp750Device, DeviceConfig, InputSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DeviceConfig::new("192.168.1.50").with_name("Screen 7");
///     let mut device = Cp750Device::new(config);
///
///     device.set_fader(-12.5).await?;
///     device.set_input(InputSource::Digital1).await?;
///     device.set_mute(false).await?;
///
///     let snapshot = device.snapshot();
///     println!("fader: {:?} input: {:?}", snapshot.fader, snapshot.input);
///
///     device.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Cp750Device {
    config: DeviceConfig,
    transport: Arc<Mutex<Transport>>,
    coordinator: Coordinator,
    available: Arc<AtomicBool>,
}

impl Cp750Device {
    /// Create a device handle and start polling
    ///
    /// Without a power lookup the availability gate stays open even if the
    /// configuration names a power condition.
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_power_lookup(config, Arc::new(|_| None))
    }

    /// Create a device handle whose gate resolves its power condition
    /// through `lookup`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dolby_cp750::{Cp750Device, DeviceConfig};
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let config = DeviceConfig::new("192.168.1.50").with_power_switch("booth_power");
    ///     let device = Cp750Device::with_power_lookup(
    ///         config,
    ///         Arc::new(|condition| Some(condition == "booth_power")),
    ///     );
    ///     println!("{:?}", device.snapshot());
    /// }
    /// ```
    pub fn with_power_lookup(config: DeviceConfig, lookup: ConditionLookup) -> Self {
        let gate = AvailabilityGate::new(config.power_switch.clone(), lookup);
        let transport = Transport::new(config.host.clone(), config.port, gate.clone());
        let available = transport.shared_available();
        let transport = Arc::new(Mutex::new(transport));
        let coordinator = Coordinator::start(
            transport.clone(),
            gate,
            config.name.clone(),
            config.poll_interval,
        );

        Self {
            config,
            transport,
            coordinator,
            available,
        }
    }

    /// The configured display name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The device configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The snapshot from the most recent completed poll cycle
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.coordinator.snapshot()
    }

    /// Subscribe to snapshot publications
    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.coordinator.subscribe()
    }

    /// Subscribe to poll-cycle faults
    pub fn subscribe_faults(&self) -> broadcast::Receiver<Arc<Cp750Error>> {
        self.coordinator.subscribe_faults()
    }

    /// Whether the transport currently holds a live, successfully-used
    /// connection
    ///
    /// Lock-free: reads a flag shared with the transport rather than taking
    /// the connection mutex, so a presentation read never waits behind an
    /// in-flight poll battery.
    pub fn available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Run a poll cycle now, out of cadence
    pub async fn refresh(&self) {
        self.coordinator.refresh().await;
    }

    /// Set the fader level
    ///
    /// The accepted range and wire format follow the configured
    /// [`FaderScale`](crate::FaderScale); out-of-range values fail with
    /// [`Cp750Error::Validation`] without touching the device.
    pub async fn set_fader(&self, value: f64) -> Result<()> {
        let command = self.config.fader_scale.fader_command(value)?;
        self.send(&command).await
    }

    /// Select the input source
    ///
    /// Only the documented sources are accepted; [`InputSource::Other`]
    /// fails with [`Cp750Error::Validation`].
    pub async fn set_input(&self, source: InputSource) -> Result<()> {
        if !source.is_known() {
            return Err(Cp750Error::Validation(format!(
                "unknown input source token {:?}",
                source.token()
            )));
        }
        self.send(&protocol::set_input_command(&source)).await
    }

    /// Set the global mute state
    pub async fn set_mute(&self, on: bool) -> Result<()> {
        self.send(&protocol::set_mute_command(on)).await
    }

    /// Stop polling and close the connection
    pub async fn shutdown(&mut self) {
        self.coordinator.stop().await;
        self.transport.lock().await.disconnect().await;
    }

    /// Send a write command, then reconcile the snapshot
    ///
    /// The device echoes accepted commands, but an unrecognized one may be
    /// echoed back or silently dropped just the same, so the reply carries
    /// no signal worth inspecting. The follow-up refresh is the single
    /// source of truth for the visible state.
    async fn send(&self, command: &str) -> Result<()> {
        {
            let mut transport = self.transport.lock().await;
            transport.send_command(command).await?;
        }
        self.coordinator.refresh().await;
        Ok(())
    }
}
