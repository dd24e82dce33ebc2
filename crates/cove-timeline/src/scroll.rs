/// Distance in pixels from the bottom under which the viewer still counts
/// as pinned to the newest message.
pub const BOTTOM_THRESHOLD_PX: f32 = 40.0;

/// Scroll instruction for the host view, applied after the current paint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCmd {
    /// Pin the view to the newest message
    ScrollToBottom,
    /// Move the scroll offset by exactly this many pixels
    AdjustBy(f32),
    /// Restore an absolute offset (target switch)
    ScrollTo(f32),
}

/// Geometry of the scroll container as last reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub scroll_top: f32,
    pub viewport_height: f32,
    pub content_height: f32,
}

impl Viewport {
    pub fn max_scroll_top(&self) -> f32 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    pub fn distance_from_bottom(&self) -> f32 {
        self.max_scroll_top() - self.scroll_top
    }

    pub fn near_bottom(&self) -> bool {
        self.distance_from_bottom() <= BOTTOM_THRESHOLD_PX
    }
}

/// Saved scroll placement for a target the viewer navigated away from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedView {
    pub scroll_top: f32,
    pub intent: bool,
}

/// Keeps the viewer's place stable while content grows in either direction.
///
/// Three mutation sources feed it: older pages prepended above the viewport,
/// live messages appended below, and in-place growth such as an image
/// finishing its load. Prepends are compensated by an offset adjustment
/// deferred until after layout; the other two re-pin to the bottom only
/// while the viewer's intent is to stay there.
#[derive(Debug)]
pub struct ScrollAnchor {
    viewport: Viewport,
    /// True when the viewer wants to stay pinned to the newest message.
    intent: bool,
    /// An older page has been appended and its height delta has not been
    /// measured yet.
    prepend_expected: bool,
    /// Height prepended above the viewport, to be compensated on the next
    /// frame callback.
    pending_adjust: f32,
    /// The unobtrusive "new messages" affordance is showing.
    new_messages: bool,
}

impl ScrollAnchor {
    /// Starts pinned: on mount the view sits at the newest message.
    pub fn new() -> Self {
        Self {
            viewport: Viewport::default(),
            intent: true,
            prepend_expected: false,
            pending_adjust: 0.0,
            new_messages: false,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn intent(&self) -> bool {
        self.intent
    }

    pub fn new_messages_visible(&self) -> bool {
        self.new_messages
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport.viewport_height = height;
    }

    /// The viewer moved the scrollbar. Intent follows the position: near the
    /// bottom keeps the pin, further away releases it.
    pub fn on_scrolled(&mut self, scroll_top: f32) {
        self.viewport.scroll_top = scroll_top;
        self.intent = self.viewport.near_bottom();
        if self.intent {
            self.new_messages = false;
        }
    }

    /// An older page has been appended; the next content growth is the page
    /// materializing above the viewport, not something to re-pin over.
    pub fn note_prepend_expected(&mut self) {
        self.prepend_expected = true;
    }

    /// The confirmed message count grew from a live arrival. Without intent
    /// this surfaces the affordance instead of moving the view.
    pub fn note_live_growth(&mut self) {
        if !self.intent {
            self.new_messages = true;
        }
    }

    /// The content element's rendered height changed.
    pub fn on_content_resized(&mut self, new_height: f32) -> Option<ScrollCmd> {
        let delta = new_height - self.viewport.content_height;
        self.viewport.content_height = new_height;
        if delta == 0.0 {
            return None;
        }

        if self.prepend_expected && delta > 0.0 {
            // Measured height of the newly rendered older messages. The
            // offset correction lands on the next frame, after layout.
            self.pending_adjust += delta;
            self.prepend_expected = false;
            return None;
        }

        if self.pending_adjust != 0.0 {
            // Between a prepend and its frame correction any other growth
            // must not trigger a re-pin, or the two would fight.
            return None;
        }

        if self.intent {
            self.viewport.scroll_top = self.viewport.max_scroll_top();
            return Some(ScrollCmd::ScrollToBottom);
        }
        None
    }

    /// Next paint frame. Applies the deferred prepend compensation, if any.
    pub fn on_frame(&mut self) -> Option<ScrollCmd> {
        if self.pending_adjust == 0.0 {
            return None;
        }
        let delta = self.pending_adjust;
        self.pending_adjust = 0.0;
        self.viewport.scroll_top += delta;
        Some(ScrollCmd::AdjustBy(delta))
    }

    pub fn jump_to_bottom(&mut self) -> ScrollCmd {
        self.intent = true;
        self.new_messages = false;
        self.viewport.scroll_top = self.viewport.max_scroll_top();
        ScrollCmd::ScrollToBottom
    }

    pub fn save(&self) -> SavedView {
        SavedView { scroll_top: self.viewport.scroll_top, intent: self.intent }
    }

    pub fn restore(&mut self, saved: SavedView) {
        self.viewport.scroll_top = saved.scroll_top;
        self.intent = saved.intent;
        self.prepend_expected = false;
        self.pending_adjust = 0.0;
        self.new_messages = false;
    }
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(scroll_top: f32, viewport_height: f32, content_height: f32) -> ScrollAnchor {
        let mut a = ScrollAnchor::new();
        a.set_viewport_height(viewport_height);
        a.on_content_resized(content_height);
        a.on_scrolled(scroll_top);
        a
    }

    #[test]
    fn test_starts_pinned() {
        let a = ScrollAnchor::new();
        assert!(a.intent());
        assert!(!a.new_messages_visible());
    }

    #[test]
    fn test_scrolling_away_releases_intent() {
        let mut a = anchor(1400.0, 600.0, 2000.0);
        assert!(a.intent());

        a.on_scrolled(500.0);
        assert!(!a.intent());

        // Back within the threshold re-pins.
        a.on_scrolled(1380.0);
        assert!(a.intent());
    }

    #[test]
    fn test_prepend_adjustment_is_deferred_and_exact() {
        let mut a = anchor(500.0, 600.0, 2000.0);
        a.note_prepend_expected();

        // Page renders above the viewport: +600px of older content.
        assert_eq!(a.on_content_resized(2600.0), None);

        // Nothing moves until the frame callback, then the offset shifts by
        // exactly the measured delta.
        assert_eq!(a.on_frame(), Some(ScrollCmd::AdjustBy(600.0)));
        assert_eq!(a.viewport().scroll_top, 1100.0);
        assert_eq!(a.on_frame(), None);
    }

    #[test]
    fn test_live_growth_pinned_scrolls_to_bottom() {
        let mut a = anchor(1400.0, 600.0, 2000.0);
        a.note_live_growth();
        assert_eq!(a.on_content_resized(2040.0), Some(ScrollCmd::ScrollToBottom));
        assert_eq!(a.viewport().scroll_top, a.viewport().max_scroll_top());
        assert!(!a.new_messages_visible());
    }

    #[test]
    fn test_live_growth_unpinned_shows_affordance_only() {
        let mut a = anchor(200.0, 600.0, 2000.0);
        assert!(!a.intent());

        a.note_live_growth();
        assert!(a.new_messages_visible());
        assert_eq!(a.on_content_resized(2040.0), None);
        assert_eq!(a.viewport().scroll_top, 200.0);
    }

    #[test]
    fn test_image_load_repins_when_intent() {
        let mut a = anchor(1400.0, 600.0, 2000.0);
        // No live growth noted: this is in-place growth such as an image
        // finishing its load.
        assert_eq!(a.on_content_resized(2120.0), Some(ScrollCmd::ScrollToBottom));
    }

    #[test]
    fn test_resize_repin_suppressed_during_prepend_window() {
        let mut a = anchor(1360.0, 600.0, 2000.0);
        assert!(a.intent());

        a.note_prepend_expected();
        assert_eq!(a.on_content_resized(2600.0), None);

        // Growth landing between the prepend and its frame correction must
        // not re-pin.
        assert_eq!(a.on_content_resized(2620.0), None);

        assert_eq!(a.on_frame(), Some(ScrollCmd::AdjustBy(600.0)));

        // After the correction the anchor reacts normally again.
        assert_eq!(a.on_content_resized(2660.0), Some(ScrollCmd::ScrollToBottom));
    }

    #[test]
    fn test_jump_to_bottom_restores_pin_and_clears_affordance() {
        let mut a = anchor(200.0, 600.0, 2000.0);
        a.note_live_growth();
        assert!(a.new_messages_visible());

        assert_eq!(a.jump_to_bottom(), ScrollCmd::ScrollToBottom);
        assert!(a.intent());
        assert!(!a.new_messages_visible());
        assert_eq!(a.viewport().scroll_top, a.viewport().max_scroll_top());
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let mut a = anchor(321.0, 600.0, 2000.0);
        assert!(!a.intent());
        let saved = a.save();

        let mut b = ScrollAnchor::new();
        b.set_viewport_height(600.0);
        b.restore(saved);
        assert_eq!(b.viewport().scroll_top, 321.0);
        assert!(!b.intent());
    }
}
