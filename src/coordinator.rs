use crate::error::Cp750Error;
use crate::gate::AvailabilityGate;
use crate::protocol;
use crate::transport::Transport;
use crate::types::{DeviceSnapshot, InputSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::MissedTickBehavior;

/// Keeps the cached [`DeviceSnapshot`] fresh and serializes socket access
///
/// A background timer runs one poll cycle per interval. Cycles are
/// single-flight: a tick that arrives while a cycle is in flight is dropped
/// (never queued), and an on-demand [`refresh`](Coordinator::refresh) joins
/// the in-flight cycle instead of starting a second one. Each cycle holds
/// the shared transport lock for its whole query battery, so a concurrent
/// facade write can never interleave with the poll's request/response pairs.
///
/// # Example
///
/// ```no_run
/// use dolby_cp750::{AvailabilityGate, Coordinator, Transport};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio::sync::Mutex;
///
/// #[tokio::main]
/// async fn main() {
///     let gate = AvailabilityGate::open();
///     let transport = Arc::new(Mutex::new(Transport::new("192.168.1.50", 61408, gate.clone())));
///     let mut coordinator = Coordinator::start(
///         transport,
///         gate,
///         "Screen 7".to_string(),
///         Duration::from_secs(1),
///     );
///
///     let mut updates = coordinator.subscribe();
///     while updates.changed().await.is_ok() {
///         println!("snapshot: {:?}", *updates.borrow());
///     }
///
///     coordinator.stop().await;
/// }
/// ```
pub struct Coordinator {
    inner: Arc<Inner>,
    stop_tx: broadcast::Sender<()>,
    task: Option<tokio::task::JoinHandle<()>>,
}

struct Inner {
    transport: Arc<Mutex<Transport>>,
    gate: AvailabilityGate,
    name: String,
    /// Single-flight guard: held for the duration of one poll cycle
    cycle_guard: Mutex<()>,
    snapshot_tx: watch::Sender<DeviceSnapshot>,
    /// Bumped after every cycle, success or failure; lets a refresh join an
    /// in-flight cycle by waiting for the bump instead of queueing
    generation_tx: watch::Sender<u64>,
    fault_tx: broadcast::Sender<Arc<Cp750Error>>,
}

impl Coordinator {
    /// Start polling `transport` every `poll_interval`
    ///
    /// The first cycle runs immediately. `gate` is the same gate the
    /// transport carries; the coordinator consults it up front so a powered-
    /// off device yields the offline snapshot without any transport call.
    pub fn start(
        transport: Arc<Mutex<Transport>>,
        gate: AvailabilityGate,
        name: String,
        poll_interval: Duration,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(DeviceSnapshot::offline());
        let (generation_tx, _) = watch::channel(0u64);
        let (fault_tx, _) = broadcast::channel(16);
        let (stop_tx, _) = broadcast::channel(1);

        let inner = Arc::new(Inner {
            transport,
            gate,
            name,
            cycle_guard: Mutex::new(()),
            snapshot_tx,
            generation_tx,
            fault_tx,
        });

        let loop_inner = inner.clone();
        let mut stop_rx = stop_tx.subscribe();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::debug!("poll loop for {} stopped", loop_inner.name);
                        break;
                    }
                    _ = ticker.tick() => {
                        match loop_inner.cycle_guard.try_lock() {
                            Ok(_running) => loop_inner.run_cycle().await,
                            // A refresh is on the wire; drop this tick.
                            Err(_) => tracing::trace!("poll already in flight, skipping tick"),
                        }
                    }
                }
            }
        });

        Self {
            inner,
            stop_tx,
            task: Some(task),
        }
    }

    /// The snapshot published by the most recent completed cycle
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot publications
    ///
    /// Each successful cycle replaces the snapshot wholesale; subscribers
    /// see either the previous value or the new one, never a mix.
    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Subscribe to poll-cycle faults
    ///
    /// Transport failures abort the cycle, keep the previous snapshot, and
    /// land here; they never stop the timer loop.
    pub fn subscribe_faults(&self) -> broadcast::Receiver<Arc<Cp750Error>> {
        self.inner.fault_tx.subscribe()
    }

    /// Run a poll cycle now, out of cadence
    ///
    /// Called by the write path after a command so the snapshot reconciles
    /// with what the device actually accepted. Joins an in-flight cycle
    /// rather than starting a second one.
    pub async fn refresh(&self) {
        // Subscribe before probing the guard: if the in-flight cycle ends
        // between the two steps, the generation bump is still observed.
        let mut generation = self.inner.generation_tx.subscribe();
        match self.inner.cycle_guard.try_lock() {
            Ok(_running) => self.inner.run_cycle().await,
            Err(_) => {
                let _ = generation.changed().await;
            }
        }
    }

    /// Stop the poll loop
    ///
    /// An in-flight read is abandoned rather than awaited; the socket itself
    /// is closed by whoever owns the transport.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Inner {
    /// One poll cycle: gate check, query battery, publish
    ///
    /// Caller holds `cycle_guard`.
    async fn run_cycle(&self) {
        if !self.gate.is_available() {
            // Powered off is a normal state, not a fault.
            self.publish_offline().await;
        } else {
            match self.query_device().await {
                Ok(snapshot) => {
                    self.snapshot_tx.send_replace(snapshot);
                }
                Err(Cp750Error::GateClosed) => {
                    // Power dropped mid-cycle.
                    self.publish_offline().await;
                }
                Err(err) => {
                    // Previous snapshot stays; the next tick proceeds normally.
                    tracing::debug!("poll of {} failed: {err}", self.name);
                    let _ = self.fault_tx.send(Arc::new(err));
                }
            }
        }
        self.generation_tx.send_modify(|generation| *generation += 1);
    }

    /// Publish the all-absent snapshot for a gated-off device
    ///
    /// Also drops the connection: a powered-off processor cannot hold a live
    /// socket, so the `available` flag must read false until power returns.
    async fn publish_offline(&self) {
        self.transport.lock().await.disconnect().await;
        self.snapshot_tx.send_replace(DeviceSnapshot::offline());
    }

    /// Issue the fixed query battery and assemble a snapshot
    ///
    /// Holds the transport lock across all seven exchanges. A malformed
    /// reply leaves its field absent; only a transport error fails the cycle.
    async fn query_device(&self) -> crate::error::Result<DeviceSnapshot> {
        let mut transport = self.transport.lock().await;

        let fader = protocol::float_value(&transport.send_command(protocol::FADER_QUERY).await?);
        let input = protocol::reply_value(&transport.send_command(protocol::INPUT_MODE_QUERY).await?)
            .map(InputSource::from_token);
        let mute = protocol::bool_value(&transport.send_command(protocol::MUTE_QUERY).await?);

        let mut digital_input_valid = [None; 4];
        for channel in 1..=4 {
            let reply = transport.send_command(&protocol::dig_valid_query(channel)).await?;
            digital_input_valid[channel - 1] = protocol::bool_value(&reply);
        }

        Ok(DeviceSnapshot {
            fader,
            input,
            mute,
            digital_input_valid,
        })
    }
}
