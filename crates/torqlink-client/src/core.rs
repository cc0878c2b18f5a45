//! The sans-io protocol core.
//!
//! Owns the state tree, the decode buffer, the command tracker, and the
//! cycle aggregator. Consumes received bytes and the passage of time;
//! produces typed events and outbound wire bytes. Every entry point takes
//! `now` from the caller, so heartbeat, command timeout, watchdog, and
//! reconnect backoff are all testable without sleeping.
//!
//! The socket shell serializes reader, ticker, and operator calls through
//! one `Mutex<Core>`; nothing in here touches I/O.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use torqlink_frame::{decode_step, extend_stripped, Decoded, Frame};
use torqlink_mid::{decode_inbound, mids, Inbound, Outbound, TighteningResult};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::cycle::CycleAggregator;
use crate::error::{ClientError, Result};
use crate::event::Event;
use crate::interlock::{check_link, check_start};
use crate::state::{ClientState, SpindleCountSource, Subscriptions};
use crate::tracker::CommandTracker;

/// Idle time after which a keep-alive goes out.
pub const HEARTBEAT_IDLE: Duration = Duration::from_secs(7);
/// First reconnect delay.
pub const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
/// Reconnect delay ceiling.
pub const RECONNECT_MAX: Duration = Duration::from_secs(30);

pub struct Core {
    config: ClientConfig,
    state: ClientState,
    tracker: CommandTracker,
    cycle: CycleAggregator,
    rx_buf: BytesMut,
    outbox: Vec<Bytes>,
    events: Vec<Event>,
    /// Last send-or-receive, for heartbeat idle measurement.
    last_activity: Option<Instant>,
    reconnect_at: Option<Instant>,
    reconnect_delay: Duration,
    /// VIN sent with MID 0050, applied to state once the controller
    /// accepts it.
    pending_vin: Option<String>,
    manual_disconnect: bool,
}

impl Core {
    pub fn new(config: ClientConfig) -> Self {
        let tracker = CommandTracker::new(config.allow_duplicate_commands);
        Self {
            config,
            state: ClientState::default(),
            tracker,
            cycle: CycleAggregator::new(),
            rx_buf: BytesMut::new(),
            outbox: Vec::new(),
            events: Vec::new(),
            last_activity: None,
            reconnect_at: None,
            reconnect_delay: RECONNECT_INITIAL,
            pending_vin: None,
            manual_disconnect: false,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Deep snapshot for external consumption.
    pub fn snapshot(&self) -> ClientState {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connection.connected
    }

    pub fn is_ready(&self) -> bool {
        self.state.connection.connected && self.state.connection.link_ready
    }

    pub fn spindle_count(&self) -> u8 {
        self.state.tool.spindle_count
    }

    /// Drain the frames queued for the wire.
    pub fn take_outbox(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outbox)
    }

    /// Drain the events emitted since the last drain.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ---- connection lifecycle ------------------------------------------

    /// The shell established a TCP connection.
    pub fn connection_opened(&mut self, now: Instant) {
        self.rx_buf.clear();
        self.manual_disconnect = false;
        self.reconnect_at = None;
        self.reconnect_delay = RECONNECT_INITIAL;
        self.last_activity = Some(now);

        let conn = &mut self.state.connection;
        conn.connected = true;
        conn.link_ready = false;
        conn.reconnecting = false;
        conn.reconnect_attempts = 0;

        if let Some(count) = self.config.spindle_count {
            self.adopt_spindle_count(count.clamp(1, 99), SpindleCountSource::Config);
        }

        self.push(Event::Connected);
        let _ = self.track_and_send(Outbound::comm_start(), now);
    }

    /// The socket closed or failed. Idempotent.
    pub fn connection_lost(&mut self, now: Instant) {
        if !self.state.connection.connected {
            return;
        }

        self.cycle.clear();
        for cmd in self.tracker.abort_all() {
            self.push(Event::CommandAborted {
                mid: cmd.mid,
                command_id: cmd.command_id,
            });
        }
        self.rx_buf.clear();
        self.outbox.clear();
        self.pending_vin = None;
        self.last_activity = None;

        self.state.connection.connected = false;
        self.state.connection.link_ready = false;
        self.state.protocol.subscriptions = Subscriptions::default();

        self.push(Event::Disconnected);

        if self.config.auto_reconnect && !self.manual_disconnect {
            self.schedule_reconnect(now);
        }
    }

    /// A reconnect attempt could not open a socket.
    pub fn reconnect_failed(&mut self, now: Instant) {
        if self.state.connection.connected || self.manual_disconnect {
            return;
        }
        self.schedule_reconnect(now);
    }

    /// Returns `true` (once) when a reconnect attempt is due.
    pub fn take_reconnect_attempt(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(at) if now >= at && !self.state.connection.connected => {
                self.reconnect_at = None;
                true
            }
            _ => false,
        }
    }

    /// Prepare a clean, operator-requested disconnect: send the
    /// communication stop and suppress reconnection. The shell drops the
    /// socket afterwards.
    pub fn prepare_disconnect(&mut self, now: Instant) {
        self.manual_disconnect = true;
        self.config.auto_reconnect = false;
        self.reconnect_at = None;
        self.state.connection.reconnecting = false;
        if self.state.connection.connected {
            self.send_plain(Outbound::comm_stop(), now);
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        let delay = self.reconnect_delay;
        self.state.connection.reconnecting = true;
        self.state.connection.reconnect_attempts += 1;
        self.reconnect_at = Some(now + delay);
        debug!(
            attempt = self.state.connection.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.push(Event::Reconnecting {
            attempt: self.state.connection.reconnect_attempts,
            delay_ms: delay.as_millis() as u64,
        });
        self.reconnect_delay = (delay * 2).min(RECONNECT_MAX);
    }

    // ---- time ----------------------------------------------------------

    /// Periodic tick: heartbeat, command expiry, cycle watchdog.
    pub fn poll(&mut self, now: Instant) {
        if self.state.connection.connected {
            if let Some(last) = self.last_activity {
                if now.saturating_duration_since(last) >= HEARTBEAT_IDLE {
                    self.send_plain(Outbound::keep_alive(), now);
                }
            }
        }

        for cmd in self.tracker.expire(now) {
            match cmd.mid {
                mids::BATCH_RESET => self.state.batch.pending_reset = false,
                mids::VIN_DOWNLOAD => self.pending_vin = None,
                _ => {}
            }
            self.push(Event::CommandTimeout {
                mid: cmd.mid,
                command_id: cmd.command_id,
            });
        }

        if let Some(incomplete) = self.cycle.take_expired(now) {
            self.push(Event::TighteningIncomplete {
                expected: self.state.tool.spindle_count,
                received: incomplete.received,
                results: incomplete.results,
            });
        }
    }

    // ---- inbound -------------------------------------------------------

    /// Feed received bytes through the frame decoder and project every
    /// complete frame.
    pub fn handle_bytes(&mut self, data: &[u8], now: Instant) {
        extend_stripped(&mut self.rx_buf, data);
        loop {
            match decode_step(&mut self.rx_buf) {
                Decoded::Frame(frame) => self.apply(frame, now),
                Decoded::Defect(defect) => {
                    if self.config.validate_frames {
                        self.push(Event::FrameError { defect });
                    }
                }
                // The length envelope held, so the frame was consumed
                // whole; a garbled MID is a parse failure, not stream
                // corruption.
                Decoded::GarbledMid { mid } => {
                    self.push(Event::ParseError {
                        mid: 0,
                        detail: format!(
                            "frame MID field '{}' is not numeric",
                            String::from_utf8_lossy(&mid)
                        ),
                    });
                }
                Decoded::Incomplete => break,
            }
        }
    }

    /// Surface a socket-level failure. The shell follows up with
    /// [`Core::connection_lost`].
    pub fn io_error(&mut self, err: &std::io::Error) {
        self.push(Event::Error {
            detail: err.to_string(),
        });
    }

    fn apply(&mut self, frame: Frame, now: Instant) {
        self.last_activity = Some(now);
        self.state.connection.last_received_mid = Some(frame.mid);
        let is_result = matches!(frame.mid, mids::RESULT | mids::OLD_RESULT);

        match decode_inbound(&frame, self.state.protocol.revision) {
            Ok(inbound) => {
                self.project(inbound, now);
                self.push_state_changed();
            }
            Err(err) => {
                warn!(mid = frame.mid, %err, "payload parse failed");
                self.push(Event::ParseError {
                    mid: frame.mid,
                    detail: err.to_string(),
                });
            }
        }

        // Unconditional: an unacknowledged result blocks the controller's
        // result queue, so the ack goes out even when parsing failed.
        if is_result {
            self.send_plain(Outbound::result_ack(), now);
        }
    }

    fn project(&mut self, inbound: Inbound, now: Instant) {
        match inbound {
            Inbound::CommStartAck { revision } => {
                self.state.protocol.revision = revision;
                let first_ack = !self.state.connection.link_ready;
                self.state.connection.link_ready = true;
                if let Some(cmd) = self.tracker.resolve_first(mids::COMM_START) {
                    self.push(Event::CommandSuccess {
                        mid: cmd.mid,
                        command_id: cmd.command_id,
                    });
                }
                self.push(Event::LinkEstablished { revision });
                if first_ack {
                    let _ = self.track_and_send(Outbound::subscribe_results(), now);
                    let _ = self.track_and_send(Outbound::subscribe_alarms(), now);
                }
            }
            Inbound::CommandAccepted { accepted_mid } => {
                self.push(Event::CommandAccepted { mid: accepted_mid });
                if let Some(cmd) = self.tracker.resolve_first(accepted_mid) {
                    self.push(Event::CommandSuccess {
                        mid: accepted_mid,
                        command_id: cmd.command_id,
                    });
                }
                self.command_accepted_effects(accepted_mid);
            }
            Inbound::CommandError {
                failed_mid,
                error_code,
                message,
            } => {
                self.push(Event::CommandError {
                    failed_mid,
                    error_code,
                    message: message.clone(),
                });
                if let Some(cmd) = self.tracker.resolve_first(failed_mid) {
                    self.push(Event::CommandFailed {
                        mid: failed_mid,
                        command_id: cmd.command_id,
                        error_code,
                        message: message.clone(),
                    });
                }
                match failed_mid {
                    mids::BATCH_RESET => {
                        self.state.batch.pending_reset = false;
                        self.push(Event::BatchResetFailed {
                            error_code,
                            message,
                        });
                    }
                    mids::VIN_DOWNLOAD => {
                        self.pending_vin = None;
                    }
                    _ => {}
                }
            }
            Inbound::ParamSetReply { param_set_id } => {
                self.state.job.param_set_id = Some(param_set_id);
            }
            Inbound::BatchDecremented => {
                // MID 0021 is the dedicated ack for the outbound
                // decrement, outside the generic 0004/0005 scheme.
                if let Some(cmd) = self.tracker.resolve_first(mids::BATCH_DECREMENT) {
                    self.push(Event::CommandSuccess {
                        mid: cmd.mid,
                        command_id: cmd.command_id,
                    });
                }
                let batch = &mut self.state.batch;
                batch.counter = batch.counter.saturating_sub(1);
                if batch.size.is_some_and(|size| batch.counter < size) {
                    batch.complete = false;
                }
            }
            Inbound::BatchReply {
                batch_id,
                size,
                counter,
            } => {
                self.state.batch = crate::state::BatchState {
                    batch_id: Some(batch_id),
                    size: Some(size),
                    counter: counter.min(size),
                    active: true,
                    complete: false,
                    locked: true,
                    pending_reset: false,
                };
                // New traceability context.
                self.state.product.vin_locked = false;
                self.push(Event::BatchStarted { batch_id, size });
            }
            Inbound::JobReply {
                job_id,
                param_set_id,
            } => {
                self.state.job.job_id = Some(job_id);
                self.state.job.active = true;
                self.state.job.locked = true;
                if param_set_id.is_some() {
                    self.state.job.param_set_id = param_set_id;
                }
                // New traceability context.
                self.state.product.vin_locked = false;
                self.push(Event::JobSelected { job_id });
            }
            Inbound::ToolStatus {
                controller_ready,
                tool_enabled,
                tool_running,
                alarm_active,
            } => {
                self.state.controller.ready = controller_ready;
                self.state.tool.enabled = tool_enabled;
                let was_running = self.state.tool.running;
                self.state.tool.running = tool_running;
                self.state.controller.error_active = alarm_active;
                if tool_running && !was_running && !self.cycle.in_progress() {
                    self.cycle.start(now);
                    self.push(Event::TighteningCycleStarted {
                        timestamp_ms: unix_ms(),
                    });
                }
            }
            Inbound::VinReply { vin } => {
                self.state.product.vin_valid = !vin.is_empty();
                self.state.product.vin = vin;
            }
            Inbound::VinRequired { vin } => {
                self.state.product.vin_required = true;
                if !vin.is_empty() {
                    self.state.product.vin = vin.clone();
                    self.state.product.vin_valid = true;
                }
                self.push(Event::VinRequired { vin });
            }
            Inbound::Result(result) | Inbound::OldResult(result) => {
                self.process_result(result, now);
            }
            Inbound::Alarm(alarm) => {
                self.state.controller.error_active = true;
                self.state.controller.error_code = Some(alarm.code.clone());
                self.state.controller.alarms.push(alarm.clone());
                self.push(Event::Alarm { alarm });
            }
            Inbound::AlarmStatus { active, code } => {
                if active {
                    self.state.controller.error_active = true;
                    if let Some(code) = code {
                        self.state.controller.error_code = Some(code);
                    }
                } else {
                    self.state.controller.alarms.clear();
                    self.state.controller.error_active = false;
                    self.state.controller.error_code = None;
                }
                self.push(Event::AlarmStatus { active });
            }
            Inbound::MultiSpindleComplete { spindle_count } => {
                self.state.protocol.subscriptions.multi_spindle_status = true;
                if spindle_count > 0 && !self.state.tool.spindle_count_source.is_sticky() {
                    self.adopt_spindle_count(spindle_count.min(99), SpindleCountSource::Mid101);
                }
            }
            Inbound::Unknown { mid } => {
                debug!(mid, "no projection for MID");
            }
        }
    }

    fn command_accepted_effects(&mut self, accepted_mid: u16) {
        match accepted_mid {
            mids::BATCH_RESET => {
                // The counter only moves now, on confirmation.
                self.state.batch.counter = 0;
                self.state.batch.complete = false;
                self.state.batch.pending_reset = false;
                self.push(Event::BatchResetConfirmed);
            }
            mids::VIN_DOWNLOAD => {
                if let Some(vin) = self.pending_vin.take() {
                    self.state.product.vin = vin;
                    self.state.product.vin_valid = true;
                }
            }
            mids::RESULT_SUBSCRIBE => {
                self.state.protocol.subscriptions.tightening_results = true;
            }
            mids::RESULT_UNSUBSCRIBE => {
                self.state.protocol.subscriptions.tightening_results = false;
            }
            mids::ALARM => {
                self.state.protocol.subscriptions.alarms = true;
            }
            mids::ALARM_UNSUBSCRIBE => {
                self.state.protocol.subscriptions.alarms = false;
            }
            _ => {}
        }
    }

    fn process_result(&mut self, result: TighteningResult, now: Instant) {
        if !self.state.product.vin_locked && !self.state.product.vin.is_empty() {
            self.state.product.vin_locked = true;
            self.push(Event::VinLocked {
                vin: self.state.product.vin.clone(),
            });
        }

        if self.state.tool.spindle_count_source == SpindleCountSource::Default
            && result.spindle > self.state.tool.spindle_count
        {
            self.adopt_spindle_count(result.spindle, SpindleCountSource::Mid061);
        }

        self.push(Event::SpindleResult {
            result: result.clone(),
        });

        // Results can outrun the tool-running status report; the first one
        // then opens the cycle.
        if !self.cycle.in_progress() {
            self.cycle.start(now);
            self.push(Event::TighteningCycleStarted {
                timestamp_ms: unix_ms(),
            });
        }
        self.cycle.store(result);

        if let Some(done) = self.cycle.take_complete(self.state.tool.spindle_count, now) {
            self.record_batch_cycle();
            self.push(Event::TighteningCycleCompleted {
                results: done.results,
                overall_ok: done.overall_ok,
                duration_ms: done.duration.as_millis() as u64,
            });
        }
    }

    fn record_batch_cycle(&mut self) {
        let batch = &mut self.state.batch;
        if !batch.active || batch.complete {
            return;
        }
        let size = batch.size.unwrap_or(0);
        batch.counter = match batch.size {
            Some(size) => (batch.counter + 1).min(size),
            None => batch.counter + 1,
        };
        let counter = batch.counter;
        self.push(Event::BatchProgress { counter, size });

        let batch = &mut self.state.batch;
        if batch.size.is_some_and(|size| batch.counter >= size) {
            batch.complete = true;
            batch.active = false;
            let batch_id = batch.batch_id.unwrap_or(0);
            self.push(Event::BatchCompleted { batch_id });
        }
    }

    // ---- operator commands ---------------------------------------------

    pub fn select_job(&mut self, id: u16, now: Instant) -> Result<u64> {
        if id > 9999 {
            return Err(ClientError::InvalidArgument(format!(
                "job id {id} out of range 0..=9999"
            )));
        }
        self.command(Outbound::select_job(id), now)
    }

    pub fn select_param_set(&mut self, id: u16, now: Instant) -> Result<u64> {
        if id > 999 {
            return Err(ClientError::InvalidArgument(format!(
                "parameter set id {id} out of range 0..=999"
            )));
        }
        self.command(Outbound::select_param_set(id), now)
    }

    pub fn download_vin(&mut self, vin: &str, now: Instant) -> Result<u64> {
        if vin.len() > 25 {
            return Err(ClientError::InvalidArgument(format!(
                "VIN is {} characters, max 25",
                vin.len()
            )));
        }
        if !vin.is_ascii() || vin.chars().any(char::is_control) {
            return Err(ClientError::InvalidArgument(
                "VIN must be printable ASCII".to_string(),
            ));
        }
        let command_id = self.command(Outbound::download_vin(vin), now)?;
        self.pending_vin = Some(vin.to_string());
        Ok(command_id)
    }

    pub fn enable_tool(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::enable_tool(), now)
    }

    pub fn disable_tool(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::disable_tool(), now)
    }

    /// Start a tightening. The only command behind the full interlock
    /// gate.
    pub fn start_tightening(&mut self, now: Instant) -> Result<u64> {
        check_start(&self.state)?;
        self.track_and_send(Outbound::start_tightening(), now)
    }

    pub fn reset_batch(&mut self, now: Instant) -> Result<u64> {
        let command_id = self.command(Outbound::reset_batch(), now)?;
        self.state.batch.pending_reset = true;
        self.push_state_changed();
        Ok(command_id)
    }

    pub fn decrement_batch(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::decrement_batch(), now)
    }

    pub fn subscribe_tightening_results(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::subscribe_results(), now)
    }

    pub fn unsubscribe_tightening_results(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::unsubscribe_results(), now)
    }

    pub fn subscribe_alarms(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::subscribe_alarms(), now)
    }

    pub fn unsubscribe_alarms(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::unsubscribe_alarms(), now)
    }

    pub fn acknowledge_alarm(&mut self, now: Instant) -> Result<u64> {
        self.command(Outbound::acknowledge_alarm(), now)
    }

    /// Fix the spindle count locally. Outranks controller reports.
    pub fn set_spindle_count(&mut self, count: u8) -> Result<()> {
        if !(1..=99).contains(&count) {
            return Err(ClientError::InvalidArgument(format!(
                "spindle count {count} out of range 1..=99"
            )));
        }
        self.adopt_spindle_count(count, SpindleCountSource::Manual);
        self.push_state_changed();
        Ok(())
    }

    // ---- internals -----------------------------------------------------

    /// Link-gated, tracked command send.
    fn command(&mut self, outbound: Outbound, now: Instant) -> Result<u64> {
        check_link(&self.state)?;
        self.track_and_send(outbound, now)
    }

    /// Admit into the tracker (one-per-MID), then queue for the wire. No
    /// bytes are queued when admission fails.
    fn track_and_send(&mut self, outbound: Outbound, now: Instant) -> Result<u64> {
        let command_id = self.tracker.admit(outbound.mid, now)?;
        self.send_plain(outbound, now);
        Ok(command_id)
    }

    /// Queue a frame without tracking.
    fn send_plain(&mut self, outbound: Outbound, now: Instant) {
        let mut wire = BytesMut::new();
        match outbound.encode(&mut wire) {
            Ok(()) => {
                self.last_activity = Some(now);
                self.outbox.push(wire.freeze());
            }
            Err(err) => {
                // Unreachable for the fixed outbound set; surfaced rather
                // than silently dropped.
                warn!(mid = outbound.mid, %err, "frame encode failed");
                self.push(Event::Error {
                    detail: err.to_string(),
                });
            }
        }
    }

    fn adopt_spindle_count(&mut self, count: u8, source: SpindleCountSource) {
        let tool = &mut self.state.tool;
        if tool.spindle_count == count && tool.spindle_count_source == source {
            return;
        }
        tool.spindle_count = count;
        tool.spindle_count_source = source;
        self.push(Event::SpindleCountUpdated { count, source });
    }

    fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    fn push_state_changed(&mut self) {
        let snapshot = Box::new(self.state.clone());
        self.events.push(Event::StateChanged { state: snapshot });
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
