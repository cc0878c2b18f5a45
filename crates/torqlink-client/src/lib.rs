//! Open Protocol client for tightening controllers.
//!
//! Speaks the text-framed Open Protocol over a persistent TCP connection,
//! mirrors controller state (tool, job, batch, VIN, alarms), assembles
//! multi-spindle tightening results into atomic cycle events, and enforces
//! safety interlocks before operator-triggered actions.
//!
//! The protocol logic lives in a deterministic, I/O-free [`Core`] driven
//! by received bytes and caller-supplied time. [`Client`] wraps it with a
//! socket, a reader thread, and a ticker thread.
//!
//! ```no_run
//! use torqlink_client::{Client, ClientConfig, Event};
//!
//! let client = Client::new(ClientConfig::new("10.40.2.15"));
//! client.on(|event| {
//!     if let Event::TighteningCycleCompleted { overall_ok, .. } = event {
//!         println!("cycle done, ok={overall_ok}");
//!     }
//! });
//! client.connect().expect("controller unreachable");
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod cycle;
pub mod event;
pub mod interlock;
pub mod state;
pub mod tracker;

mod error;

pub use crate::client::Client;
pub use crate::config::{ClientConfig, DEFAULT_PORT};
pub use crate::core::Core;
pub use crate::error::{ClientError, Result};
pub use crate::event::Event;
pub use crate::interlock::InterlockError;
pub use crate::state::{ClientState, SpindleCountSource};
