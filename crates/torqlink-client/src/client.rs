//! The TCP shell around [`Core`].
//!
//! Owns the socket and two background threads: a reader that feeds
//! received bytes into the core, and a ticker that drives heartbeat,
//! timeouts, the cycle watchdog, and reconnect attempts. Both serialize
//! through the core's mutex, run one step, then drain outbound frames and
//! events outside the lock. Listeners are invoked on whichever thread
//! produced the event and must not block.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::core::Core;
use crate::error::Result;
use crate::event::Event;
use crate::state::ClientState;

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const READ_CHUNK_SIZE: usize = 4096;

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Open Protocol client handle.
pub struct Client {
    shared: Arc<Shared>,
    ticker: Option<thread::JoinHandle<()>>,
}

struct Shared {
    core: Mutex<Core>,
    /// Writer half. The reader thread owns a cloned handle.
    conn: Mutex<Option<TcpStream>>,
    listeners: Mutex<Vec<Listener>>,
    /// Bumped per established connection so a stale reader thread cannot
    /// tear down its successor.
    generation: AtomicU64,
    running: AtomicBool,
}

/// A poisoned lock only means another thread panicked mid-step; the
/// protocol state itself is still consistent enough to shut down with.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let shared = Arc::new(Shared {
            core: Mutex::new(Core::new(config)),
            conn: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            running: AtomicBool::new(true),
        });

        let ticker_shared = Arc::clone(&shared);
        let ticker = thread::Builder::new()
            .name("torqlink-ticker".to_string())
            .spawn(move || ticker_loop(ticker_shared))
            .ok();

        Self { shared, ticker }
    }

    /// Register an event listener. Listeners see events in emission order.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        lock(&self.shared.listeners).push(Arc::new(listener));
    }

    /// Open the TCP connection and start the handshake. No-op when
    /// already connected.
    pub fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let (host, port) = {
            let core = lock(&self.shared.core);
            (core.config().host.clone(), core.config().port)
        };
        info!(%host, port, "connecting");
        let stream = TcpStream::connect((host.as_str(), port))?;
        Shared::install(&self.shared, stream)
    }

    /// Send the communication stop, suppress reconnection, and drop the
    /// socket.
    pub fn disconnect(&self) {
        {
            let mut core = lock(&self.shared.core);
            core.prepare_disconnect(Instant::now());
        }
        Shared::drain(&self.shared);

        let stream = lock(&self.shared.conn).take();
        if let Some(stream) = stream {
            let _ = stream.shutdown(Shutdown::Both);
        }

        {
            let mut core = lock(&self.shared.core);
            core.connection_lost(Instant::now());
        }
        Shared::drain(&self.shared);
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.core).is_connected()
    }

    /// Connected and handshaken: application MIDs may flow.
    pub fn is_ready(&self) -> bool {
        lock(&self.shared.core).is_ready()
    }

    /// Deep copy of the current state snapshot.
    pub fn get_state(&self) -> ClientState {
        lock(&self.shared.core).snapshot()
    }

    pub fn get_spindle_count(&self) -> u8 {
        lock(&self.shared.core).spindle_count()
    }

    pub fn set_spindle_count(&self, count: u8) -> Result<()> {
        self.with_core(|core, _| core.set_spindle_count(count))
    }

    pub fn select_job(&self, id: u16) -> Result<u64> {
        self.with_core(|core, now| core.select_job(id, now))
    }

    pub fn select_parameter_set(&self, id: u16) -> Result<u64> {
        self.with_core(|core, now| core.select_param_set(id, now))
    }

    pub fn download_vin(&self, vin: &str) -> Result<u64> {
        self.with_core(|core, now| core.download_vin(vin, now))
    }

    pub fn enable_tool(&self) -> Result<u64> {
        self.with_core(|core, now| core.enable_tool(now))
    }

    pub fn disable_tool(&self) -> Result<u64> {
        self.with_core(|core, now| core.disable_tool(now))
    }

    /// Start a tightening. Runs the full interlock gate first.
    pub fn start_tightening(&self) -> Result<u64> {
        self.with_core(|core, now| core.start_tightening(now))
    }

    pub fn reset_batch(&self) -> Result<u64> {
        self.with_core(|core, now| core.reset_batch(now))
    }

    pub fn decrement_batch(&self) -> Result<u64> {
        self.with_core(|core, now| core.decrement_batch(now))
    }

    pub fn subscribe_tightening_results(&self) -> Result<u64> {
        self.with_core(|core, now| core.subscribe_tightening_results(now))
    }

    pub fn unsubscribe_tightening_results(&self) -> Result<u64> {
        self.with_core(|core, now| core.unsubscribe_tightening_results(now))
    }

    pub fn subscribe_alarms(&self) -> Result<u64> {
        self.with_core(|core, now| core.subscribe_alarms(now))
    }

    pub fn unsubscribe_alarms(&self) -> Result<u64> {
        self.with_core(|core, now| core.unsubscribe_alarms(now))
    }

    pub fn acknowledge_alarm(&self) -> Result<u64> {
        self.with_core(|core, now| core.acknowledge_alarm(now))
    }

    fn with_core<T>(&self, f: impl FnOnce(&mut Core, Instant) -> T) -> T {
        let out = {
            let mut core = lock(&self.shared.core);
            f(&mut core, Instant::now())
        };
        Shared::drain(&self.shared);
        out
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(stream) = lock(&self.shared.conn).take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
    }
}

impl Shared {
    /// Wire up an established stream: split it, mark the core connected,
    /// and start the reader.
    fn install(shared: &Arc<Self>, stream: TcpStream) -> Result<()> {
        let _ = stream.set_nodelay(true);
        let reader = stream.try_clone()?;
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&shared.conn) = Some(stream);

        {
            let mut core = lock(&shared.core);
            core.connection_opened(Instant::now());
        }
        Shared::drain(shared);

        let reader_shared = Arc::clone(shared);
        thread::Builder::new()
            .name("torqlink-reader".to_string())
            .spawn(move || reader_loop(reader_shared, reader, generation))?;
        Ok(())
    }

    /// Write queued frames and dispatch queued events, outside the core
    /// lock.
    fn drain(shared: &Arc<Self>) {
        let (outbox, events) = {
            let mut core = lock(&shared.core);
            (core.take_outbox(), core.take_events())
        };

        if !outbox.is_empty() {
            let mut write_error = None;
            {
                let mut conn = lock(&shared.conn);
                if let Some(stream) = conn.as_mut() {
                    for frame in &outbox {
                        if let Err(err) = stream.write_all(frame).and_then(|()| stream.flush()) {
                            write_error = Some(err);
                            break;
                        }
                    }
                }
            }
            if let Some(err) = write_error {
                warn!(%err, "socket write failed");
                let generation = shared.generation.load(Ordering::SeqCst);
                {
                    let mut core = lock(&shared.core);
                    core.io_error(&err);
                }
                Shared::connection_down(shared, generation);
            }
        }

        if !events.is_empty() {
            let listeners = lock(&shared.listeners).clone();
            for event in &events {
                for listener in &listeners {
                    listener(event);
                }
            }
        }
    }

    /// Tear down the connection owned by `generation`. Stale readers from
    /// a replaced connection fall through without touching anything.
    fn connection_down(shared: &Arc<Self>, generation: u64) {
        if shared.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "stale reader exit");
            return;
        }
        let stream = lock(&shared.conn).take();
        drop(stream);
        {
            let mut core = lock(&shared.core);
            core.connection_lost(Instant::now());
        }
        Shared::drain(shared);
    }
}

fn reader_loop(shared: Arc<Shared>, mut stream: TcpStream, generation: u64) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                {
                    let mut core = lock(&shared.core);
                    core.handle_bytes(&chunk[..n], Instant::now());
                }
                Shared::drain(&shared);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(%err, "socket read failed");
                {
                    let mut core = lock(&shared.core);
                    core.io_error(&err);
                }
                break;
            }
        }
    }
    Shared::connection_down(&shared, generation);
}

fn ticker_loop(shared: Arc<Shared>) {
    while shared.running.load(Ordering::SeqCst) {
        thread::sleep(TICK_INTERVAL);
        let now = Instant::now();

        let attempt = {
            let mut core = lock(&shared.core);
            core.poll(now);
            core.take_reconnect_attempt(now)
        };
        Shared::drain(&shared);

        if attempt {
            let (host, port) = {
                let core = lock(&shared.core);
                (core.config().host.clone(), core.config().port)
            };
            debug!(%host, port, "reconnect attempt");
            match TcpStream::connect((host.as_str(), port)) {
                Ok(stream) => {
                    if let Err(err) = Shared::install(&shared, stream) {
                        warn!(%err, "reconnect install failed");
                        let mut core = lock(&shared.core);
                        core.reconnect_failed(Instant::now());
                        drop(core);
                        Shared::drain(&shared);
                    }
                }
                Err(err) => {
                    debug!(%err, "reconnect attempt failed");
                    {
                        let mut core = lock(&shared.core);
                        core.reconnect_failed(Instant::now());
                    }
                    Shared::drain(&shared);
                }
            }
        }
    }
}
