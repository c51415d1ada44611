//! Software-update notification state.
//!
//! The persisted form is a bitmask (Checking=1, HasUpdates=2, Notified=4);
//! in memory it is one of the five combinations actually used.

use log::debug;

use crate::model::UpdateNotice;

pub const CHECKING: u8 = 1;
pub const HAS_UPDATES: u8 = 2;
pub const NOTIFIED: u8 = 4;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UpdateState {
    #[default]
    Idle,
    Checking,
    HasUpdatesPending,
    HasUpdatesNotified,
    CheckingNotified,
}

impl UpdateState {
    /// Checking takes precedence over HasUpdates; a lone Notified bit is Idle.
    pub fn from_mask(mask: u8) -> Self {
        let notified = mask & NOTIFIED != 0;
        if mask & CHECKING != 0 {
            if notified { Self::CheckingNotified } else { Self::Checking }
        } else if mask & HAS_UPDATES != 0 {
            if notified { Self::HasUpdatesNotified } else { Self::HasUpdatesPending }
        } else {
            Self::Idle
        }
    }

    pub fn mask(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Checking => CHECKING,
            Self::HasUpdatesPending => HAS_UPDATES,
            Self::HasUpdatesNotified => HAS_UPDATES | NOTIFIED,
            Self::CheckingNotified => CHECKING | NOTIFIED,
        }
    }

    pub fn has_updates(self) -> bool {
        matches!(self, Self::HasUpdatesPending | Self::HasUpdatesNotified)
    }

    /// Transition taken on a settings reload.
    fn on_reload(self) -> (Self, Option<UpdateNotice>) {
        match self {
            Self::Checking => (Self::CheckingNotified, Some(UpdateNotice::Checking)),
            Self::HasUpdatesPending => (Self::HasUpdatesNotified, Some(UpdateNotice::HasUpdates)),
            other => (other, None),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct UpdateTracker {
    state: UpdateState,
}

impl UpdateTracker {
    pub fn new(mask: u8) -> Self {
        Self {
            state: UpdateState::from_mask(mask),
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn has_updates(&self) -> bool {
        self.state.has_updates()
    }

    /// Re-derives the state from a freshly reloaded mask and, if the user has
    /// not been told yet, returns the notice and moves to the notified state.
    /// The caller must persist `state().mask()` when a notice is returned.
    pub fn on_settings_reloaded(&mut self, mask: u8) -> Option<UpdateNotice> {
        let (next, notice) = UpdateState::from_mask(mask).on_reload();
        if next != self.state {
            debug!("Update state {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        notice
    }

    /// The user declined the known update; forget it entirely.
    pub fn ignore(&mut self) {
        self.state = UpdateState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_reload_is_silent() {
        let mut tracker = UpdateTracker::new(0);
        assert_eq!(tracker.on_settings_reloaded(0), None);
        assert_eq!(tracker.state().mask(), 0);
    }

    #[test]
    fn has_updates_notifies_once() {
        let mut tracker = UpdateTracker::new(0);
        assert_eq!(tracker.on_settings_reloaded(2), Some(UpdateNotice::HasUpdates));
        assert_eq!(tracker.state().mask(), 6);
        assert_eq!(tracker.on_settings_reloaded(6), None);
        assert_eq!(tracker.state().mask(), 6);
    }

    #[test]
    fn checking_notifies_once() {
        let mut tracker = UpdateTracker::new(0);
        assert_eq!(tracker.on_settings_reloaded(1), Some(UpdateNotice::Checking));
        assert_eq!(tracker.state(), UpdateState::CheckingNotified);
        assert_eq!(tracker.on_settings_reloaded(5), None);
    }

    #[test]
    fn checking_takes_precedence() {
        assert_eq!(UpdateState::from_mask(3), UpdateState::Checking);
        assert_eq!(UpdateState::from_mask(7), UpdateState::CheckingNotified);
        assert_eq!(UpdateState::from_mask(4), UpdateState::Idle);
    }

    #[test]
    fn ignore_resets_everything() {
        let mut tracker = UpdateTracker::new(6);
        assert!(tracker.has_updates());
        tracker.ignore();
        assert_eq!(tracker.state().mask(), 0);
        assert!(!tracker.has_updates());
    }

    #[test]
    fn new_cycle_after_notified_starts_clean() {
        let mut tracker = UpdateTracker::new(6);
        // The updater re-derived the mask from scratch for a new check.
        assert_eq!(tracker.on_settings_reloaded(1), Some(UpdateNotice::Checking));
        assert_eq!(tracker.on_settings_reloaded(2), Some(UpdateNotice::HasUpdates));
    }
}
