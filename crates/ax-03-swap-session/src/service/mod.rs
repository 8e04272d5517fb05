//! # Session Service
//!
//! The session actor and its packet handlers. `hub` holds the service-node
//! side of the protocol, `trader` the Maker/Taker side; `watchdog` drives
//! retries, rollbacks and timeouts on a fixed tick.

pub mod hub;
pub mod session;
pub mod trader;
pub mod watchdog;

pub use session::{
    spawn_session, Dispatch, FatalReason, RetryReason, Session, SessionCommand, SessionConfig,
    SessionHandle, Side,
};
pub use watchdog::{spawn_watchdog, RetryQueue};
