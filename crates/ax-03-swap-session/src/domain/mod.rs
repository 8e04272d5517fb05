//! # Session Domain
//!
//! Order entities, state machines, invariants and errors.

pub mod errors;
pub mod exchange;
pub mod invariants;
pub mod order;
pub mod states;

pub use errors::SessionError;
pub use exchange::{ExchangeOrder, SideState};
pub use invariants::{derive_order_id, hashed_secrets_match, OrderIdFields};
pub use order::{MakerOrderParams, TakerAcceptParams, TraderOrder};
pub use states::{HubState, TradeState};
