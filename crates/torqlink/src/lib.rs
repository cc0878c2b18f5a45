//! Open Protocol client for tightening controllers.
//!
//! torqlink speaks the text-framed Open Protocol used by electronic
//! nutrunner controllers on automotive and aerospace assembly lines:
//! persistent TCP, a live state mirror, multi-spindle cycle aggregation,
//! and safety interlocks in front of operator commands.
//!
//! # Crate Structure
//!
//! - [`frame`] — ASCII length-prefixed wire framing with resynchronization
//! - [`mid`] — revision-aware typed message parsing and emission
//! - [`client`] — the client proper: state, events, cycle aggregation,
//!   interlocks, connection management

/// Re-export frame types.
pub mod frame {
    pub use torqlink_frame::*;
}

/// Re-export message types.
pub mod mid {
    pub use torqlink_mid::*;
}

/// Re-export client types.
pub mod client {
    pub use torqlink_client::*;
}
