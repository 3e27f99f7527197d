//! The media link's own lifecycle: `PENDING -> ESTABLISHED -> CLOSED`
//! (terminal), with a 10 s establishment timeout enforced by the caller
//! (this module is pure and takes no clock).

use rphone_identity::LinkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Pending,
    Established,
    /// Terminal. Carries why it closed.
    Closed(CloseReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    LocalHangup,
    RemoteClosed,
    EstablishTimeout,
    TransportFailure,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("link event not legal while {state:?}")]
pub struct InvalidLinkTransition {
    pub state: LinkState,
}

/// One media link's lifecycle. `link_id` is only known once established.
pub struct LinkLifecycle {
    state: LinkState,
    link_id: Option<LinkId>,
}

impl LinkLifecycle {
    pub fn new() -> Self {
        Self {
            state: LinkState::Pending,
            link_id: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn link_id(&self) -> Option<LinkId> {
        self.link_id.clone()
    }

    /// The transport reports the link handshake completed.
    pub fn mark_established(&mut self, link_id: LinkId) -> Result<(), InvalidLinkTransition> {
        if self.state != LinkState::Pending {
            return Err(InvalidLinkTransition { state: self.state });
        }
        self.link_id = Some(link_id);
        self.state = LinkState::Established;
        Ok(())
    }

    /// The 10 s establishment window elapsed with no handshake.
    pub fn mark_establish_timeout(&mut self) -> Result<(), InvalidLinkTransition> {
        if self.state != LinkState::Pending {
            return Err(InvalidLinkTransition { state: self.state });
        }
        self.state = LinkState::Closed(CloseReason::EstablishTimeout);
        Ok(())
    }

    pub fn close(&mut self, reason: CloseReason) -> Result<(), InvalidLinkTransition> {
        if matches!(self.state, LinkState::Closed(_)) {
            return Err(InvalidLinkTransition { state: self.state });
        }
        self.state = LinkState::Closed(reason);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, LinkState::Closed(_))
    }
}

impl Default for LinkLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_id() -> LinkId {
        LinkId::from_bytes(vec![1, 2, 3, 4])
    }

    #[test]
    fn starts_pending_with_no_link_id() {
        let lc = LinkLifecycle::new();
        assert_eq!(lc.state(), LinkState::Pending);
        assert!(lc.link_id().is_none());
    }

    #[test]
    fn establishing_sets_the_link_id_and_state() {
        let mut lc = LinkLifecycle::new();
        lc.mark_established(link_id()).unwrap();
        assert_eq!(lc.state(), LinkState::Established);
        assert_eq!(lc.link_id(), Some(link_id()));
    }

    #[test]
    fn cannot_establish_twice() {
        let mut lc = LinkLifecycle::new();
        lc.mark_established(link_id()).unwrap();
        assert!(lc.mark_established(link_id()).is_err());
    }

    #[test]
    fn timeout_only_applies_while_pending() {
        let mut lc = LinkLifecycle::new();
        lc.mark_established(link_id()).unwrap();
        assert!(lc.mark_establish_timeout().is_err());
    }

    #[test]
    fn established_link_can_close_with_a_reason() {
        let mut lc = LinkLifecycle::new();
        lc.mark_established(link_id()).unwrap();
        lc.close(CloseReason::RemoteClosed).unwrap();
        assert_eq!(lc.state(), LinkState::Closed(CloseReason::RemoteClosed));
        assert!(lc.is_terminal());
    }

    #[test]
    fn closed_is_terminal_and_rejects_further_events() {
        let mut lc = LinkLifecycle::new();
        lc.close(CloseReason::LocalHangup).unwrap();
        assert!(lc.close(CloseReason::RemoteClosed).is_err());
        assert!(lc.mark_established(link_id()).is_err());
    }
}
