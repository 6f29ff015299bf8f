//! On-screen display state
//!
//! The OSD pops up when volume or brightness changes and hides itself 900ms
//! later. Every show restarts the timer; a hide timeout from an older show
//! must not hide a newer one, so each show gets a generation number and a
//! stale timeout is ignored. While the control center is open the OSD is
//! suppressed entirely.

use goblin_ipc::OsdKind;

/// Hide delay after the last show.
pub const HIDE_DELAY_MS: u64 = 900;

#[derive(Debug, Default)]
pub struct OsdState {
    showing: Option<OsdKind>,
    suppressed: bool,
    generation: u64,
}

impl OsdState {
    /// Request the OSD to show `kind`.
    ///
    /// Returns the generation to hand to the hide timer, or `None` when
    /// the show was ignored because the OSD is suppressed.
    pub fn show(&mut self, kind: OsdKind) -> Option<u64> {
        if self.suppressed {
            return None;
        }
        self.showing = Some(kind);
        self.generation += 1;
        Some(self.generation)
    }

    /// A hide timer fired. Returns true when the OSD actually hid.
    pub fn handle_hide_timeout(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.showing.is_none() {
            return false;
        }
        self.showing = None;
        true
    }

    /// Suppress (control center open) or release the OSD. Suppressing
    /// hides any visible overlay immediately.
    pub fn set_suppressed(&mut self, suppressed: bool) -> bool {
        self.suppressed = suppressed;
        if suppressed && self.showing.is_some() {
            self.showing = None;
            // Invalidate in-flight hide timers too.
            self.generation += 1;
            return true;
        }
        false
    }

    pub fn showing(&self) -> Option<OsdKind> {
        self.showing
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_then_timeout_hides() {
        let mut osd = OsdState::default();
        let generation = osd.show(OsdKind::Volume).unwrap();
        assert_eq!(osd.showing(), Some(OsdKind::Volume));
        assert!(osd.handle_hide_timeout(generation));
        assert_eq!(osd.showing(), None);
    }

    #[test]
    fn stale_timeout_does_not_hide_newer_show() {
        let mut osd = OsdState::default();
        let first = osd.show(OsdKind::Volume).unwrap();
        let second = osd.show(OsdKind::Brightness).unwrap();

        // The first show's timer fires late; the brightness overlay stays.
        assert!(!osd.handle_hide_timeout(first));
        assert_eq!(osd.showing(), Some(OsdKind::Brightness));

        assert!(osd.handle_hide_timeout(second));
        assert_eq!(osd.showing(), None);
    }

    #[test]
    fn suppressed_shows_are_ignored() {
        let mut osd = OsdState::default();
        osd.set_suppressed(true);
        assert!(osd.show(OsdKind::Volume).is_none());
        assert_eq!(osd.showing(), None);

        osd.set_suppressed(false);
        assert!(osd.show(OsdKind::Volume).is_some());
    }

    #[test]
    fn suppressing_hides_the_visible_overlay() {
        let mut osd = OsdState::default();
        let generation = osd.show(OsdKind::Volume).unwrap();
        assert!(osd.set_suppressed(true));
        assert_eq!(osd.showing(), None);
        // The pending timer is now stale.
        assert!(!osd.handle_hide_timeout(generation));
    }

    #[test]
    fn timeout_with_nothing_showing_is_a_noop() {
        let mut osd = OsdState::default();
        assert!(!osd.handle_hide_timeout(0));
    }
}
