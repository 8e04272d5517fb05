//! # Swap State Machines
//!
//! Trader-side and hub-side order states. Progress is monotone: a handler
//! that would move an order backwards drops its packet instead, which
//! also makes duplicate delivery idempotent.

/// Trader-side order state.
///
/// Declaration order is protocol order; `Ord` on this enum is the
/// monotone-progress relation used by the handlers' state guards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TradeState {
    /// Created locally, not yet confirmed by the hub.
    New,
    /// Advertised by the hub, joinable.
    Pending,
    /// Acceptance sent, waiting for the hub.
    Accepting,
    /// Frozen for setup; both parties committed.
    Hold,
    /// Parameters exchanged; Taker fee paid.
    Initialized,
    /// Own deposit broadcast.
    Created,
    /// Counterparty deposit redeemed (or redeem submitted).
    Committed,
    /// Swap complete.
    Finished,
    /// Terminal: aborted, funds released or never locked.
    Cancelled,
    /// Terminal path: deposit reclaim in progress.
    Rollback,
    /// Refund broadcast failed; watchdog keeps retrying.
    RollbackFailed,
    /// Terminal: discarded without settling.
    Dropped,
    /// Terminal: advert aged out.
    Expired,
}

impl TradeState {
    /// True for states no packet may advance out of.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Cancelled | Self::Dropped | Self::Expired
        )
    }

    /// True while the order still participates in the protocol.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && !matches!(self, Self::Rollback | Self::RollbackFailed)
    }
}

impl std::fmt::Display for TradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Accepting => "accepting",
            Self::Hold => "hold",
            Self::Initialized => "initialized",
            Self::Created => "created",
            Self::Committed => "committed",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Rollback => "rollback",
            Self::RollbackFailed => "rollback-failed",
            Self::Dropped => "dropped",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Hub-side state of an order pair.
///
/// The hub advances only once *both* sides have responded to the current
/// phase, so each flag pair in [`super::exchange::ExchangeOrder`] gates one
/// transition here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HubState {
    /// Advertised, no taker yet.
    New,
    /// First valid taker joined (at most one).
    Joined,
    /// Both sides acknowledged the hold.
    Hold,
    /// Both sides initialized.
    Initialized,
    /// Both deposits reported.
    Created,
    /// Both redeems reported; swap announced finished.
    Finished,
    /// Aborted.
    Cancelled,
    /// Discarded after cancellation.
    Dropped,
}

impl HubState {
    /// True once the pair can no longer advance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Dropped)
    }
}

impl std::fmt::Display for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Joined => "joined",
            Self::Hold => "hold",
            Self::Initialized => "initialized",
            Self::Created => "created",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Dropped => "dropped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_order() {
        assert!(TradeState::New < TradeState::Pending);
        assert!(TradeState::Pending < TradeState::Hold);
        assert!(TradeState::Hold < TradeState::Initialized);
        assert!(TradeState::Initialized < TradeState::Created);
        assert!(TradeState::Created < TradeState::Committed);
        assert!(TradeState::Committed < TradeState::Finished);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TradeState::Finished.is_terminal());
        assert!(TradeState::Cancelled.is_terminal());
        assert!(TradeState::Expired.is_terminal());
        assert!(!TradeState::Rollback.is_terminal());
        assert!(!TradeState::Created.is_terminal());
    }

    #[test]
    fn test_rollback_not_active() {
        assert!(!TradeState::Rollback.is_active());
        assert!(!TradeState::RollbackFailed.is_active());
        assert!(TradeState::Created.is_active());
    }

    #[test]
    fn test_hub_progress_order() {
        assert!(HubState::New < HubState::Joined);
        assert!(HubState::Joined < HubState::Hold);
        assert!(HubState::Created < HubState::Finished);
        assert!(HubState::Cancelled.is_terminal());
    }
}
