use x11rb::protocol::xproto::Window;

/// Bit set of tag memberships; bit i means "on tag i".
pub type TagMask = u32;

pub fn tag_bit(tag_index: usize) -> TagMask {
    1 << tag_index
}

/// Mask covering every configured tag.
pub fn all_tags_mask(tag_count: usize) -> TagMask {
    (1 << tag_count) - 1
}

/// One managed window. Owned by a monitor's client lists; the window
/// handle is the key into the window manager's client arena.
#[derive(Debug, Clone)]
pub struct Client {
    pub name: String,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub old_x: i32,
    pub old_y: i32,
    pub old_w: i32,
    pub old_h: i32,
    pub base_w: i32,
    pub base_h: i32,
    pub inc_w: i32,
    pub inc_h: i32,
    pub max_w: i32,
    pub max_h: i32,
    pub min_w: i32,
    pub min_h: i32,
    pub hints_valid: bool,
    pub border_width: i32,
    pub old_border_width: i32,
    pub tags: TagMask,
    pub is_fixed: bool,
    pub is_floating: bool,
    pub is_urgent: bool,
    pub never_focus: bool,
    pub old_state: bool,
    pub is_fullscreen: bool,
    pub monitor: usize,
    pub win: Window,
}

impl Client {
    pub fn new(win: Window, monitor: usize, tags: TagMask) -> Self {
        Self {
            name: String::new(),
            min_aspect: 0.0,
            max_aspect: 0.0,
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            old_x: 0,
            old_y: 0,
            old_w: 0,
            old_h: 0,
            base_w: 0,
            base_h: 0,
            inc_w: 0,
            inc_h: 0,
            max_w: 0,
            max_h: 0,
            min_w: 0,
            min_h: 0,
            hints_valid: false,
            border_width: 0,
            old_border_width: 0,
            tags,
            is_fixed: false,
            is_floating: false,
            is_urgent: false,
            never_focus: false,
            old_state: false,
            is_fullscreen: false,
            monitor,
            win,
        }
    }

    /// Outer width including both border edges.
    pub fn total_width(&self) -> i32 {
        self.w + 2 * self.border_width
    }

    /// Outer height including both border edges.
    pub fn total_height(&self) -> i32 {
        self.h + 2 * self.border_width
    }

    pub fn is_visible_on(&self, tagset: TagMask) -> bool {
        self.tags & tagset != 0
    }

    /// Record new geometry, remembering the previous one for restores.
    pub fn apply_geometry(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.old_x = self.x;
        self.old_y = self.y;
        self.old_w = self.w;
        self.old_h = self.h;
        self.x = x;
        self.y = y;
        self.w = w;
        self.h = h;
    }

    /// Save pre-fullscreen state and flip into fullscreen. The caller is
    /// responsible for resizing the window to the monitor rectangle, which
    /// stashes the current geometry into the old_* fields.
    pub fn enter_fullscreen(&mut self) {
        self.is_fullscreen = true;
        self.old_state = self.is_floating;
        self.old_border_width = self.border_width;
        self.border_width = 0;
        self.is_floating = true;
    }

    /// Undo `enter_fullscreen`, restoring the floating flag, border width
    /// and last known geometry. Returns the rectangle to resize back to.
    pub fn exit_fullscreen(&mut self) -> (i32, i32, i32, i32) {
        self.is_fullscreen = false;
        self.is_floating = self.old_state;
        self.border_width = self.old_border_width;
        self.x = self.old_x;
        self.y = self.old_y;
        self.w = self.old_w;
        self.h = self.old_h;
        (self.x, self.y, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_masks() {
        assert_eq!(tag_bit(0), 0b1);
        assert_eq!(tag_bit(4), 0b10000);
        assert_eq!(all_tags_mask(9), 0x1ff);
        assert_eq!(all_tags_mask(1), 0b1);
    }

    #[test]
    fn visibility_uses_mask_intersection() {
        let mut client = Client::new(1, 0, 0b0110);
        assert!(client.is_visible_on(0b0010));
        assert!(client.is_visible_on(0b1100));
        assert!(!client.is_visible_on(0b1001));
        client.tags = 0b0001;
        assert!(client.is_visible_on(0b0001));
    }

    #[test]
    fn fullscreen_round_trip_restores_geometry_and_floating() {
        let mut client = Client::new(7, 0, 0b1);
        client.is_floating = true;
        client.border_width = 2;
        client.apply_geometry(10, 10, 300, 200);

        client.enter_fullscreen();
        // The window manager resizes to the monitor rectangle next,
        // which records the pre-fullscreen geometry as "old".
        client.apply_geometry(0, 0, 1920, 1080);
        assert!(client.is_fullscreen);
        assert!(client.is_floating);
        assert_eq!(client.border_width, 0);

        let (x, y, w, h) = client.exit_fullscreen();
        assert_eq!((x, y, w, h), (10, 10, 300, 200));
        assert!(client.is_floating);
        assert!(!client.is_fullscreen);
        assert_eq!(client.border_width, 2);
    }

    #[test]
    fn fullscreen_restores_tiled_state_too() {
        let mut client = Client::new(8, 0, 0b1);
        client.apply_geometry(0, 20, 958, 1060);
        client.border_width = 1;

        client.enter_fullscreen();
        client.apply_geometry(0, 0, 1920, 1080);
        let _ = client.exit_fullscreen();
        assert!(!client.is_floating);
        assert_eq!(client.border_width, 1);
        assert_eq!((client.x, client.y, client.w, client.h), (0, 20, 958, 1060));
    }
}
