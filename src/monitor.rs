use std::collections::HashMap;

use x11rb::protocol::xinerama::ConnectionExt as _;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use crate::client::{Client, TagMask};
use crate::errors::WmError;
use crate::layout::{LayoutKind, Rect};

type WmResult<T> = Result<T, WmError>;

/// Per-monitor defaults applied when a monitor record is created.
#[derive(Debug, Clone, Copy)]
pub struct MonitorDefaults {
    pub mfact: f32,
    pub nmaster: i32,
    pub show_bar: bool,
    pub top_bar: bool,
    pub layouts: [LayoutKind; 2],
    pub bar_height: i32,
}

/// One screen region. Owns its clients through two explicit orderings
/// over the same set: `clients` is the insertion-order stacking list and
/// `stack` the most-recently-focused list, both head-first.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub num: usize,
    pub layout_symbol: String,
    pub mfact: f32,
    pub nmaster: i32,
    pub bar_y: i32,
    /// Screen rectangle.
    pub mx: i32,
    pub my: i32,
    pub mw: i32,
    pub mh: i32,
    /// Window area: the screen rectangle minus the bar reservation.
    pub wx: i32,
    pub wy: i32,
    pub ww: i32,
    pub wh: i32,
    pub seltags: usize,
    pub sellt: usize,
    pub tagset: [TagMask; 2],
    pub show_bar: bool,
    pub top_bar: bool,
    pub clients: Vec<Window>,
    pub stack: Vec<Window>,
    pub sel: Option<Window>,
    pub bar_win: Window,
    pub layouts: [LayoutKind; 2],
}

impl Monitor {
    pub fn new(num: usize, defaults: &MonitorDefaults) -> Self {
        Self {
            num,
            layout_symbol: defaults.layouts[0].symbol().to_string(),
            mfact: defaults.mfact,
            nmaster: defaults.nmaster,
            bar_y: -defaults.bar_height,
            mx: 0,
            my: 0,
            mw: 0,
            mh: 0,
            wx: 0,
            wy: 0,
            ww: 0,
            wh: 0,
            seltags: 0,
            sellt: 0,
            tagset: [1, 1],
            show_bar: defaults.show_bar,
            top_bar: defaults.top_bar,
            clients: Vec::new(),
            stack: Vec::new(),
            sel: None,
            bar_win: x11rb::NONE,
            layouts: defaults.layouts,
        }
    }

    /// The active tag view.
    pub fn selected_tags(&self) -> TagMask {
        self.tagset[self.seltags]
    }

    pub fn current_layout(&self) -> LayoutKind {
        self.layouts[self.sellt]
    }

    pub fn window_area(&self) -> Rect {
        Rect::new(self.wx, self.wy, self.ww, self.wh)
    }

    /// Recompute the window area and bar position from the screen
    /// rectangle and the bar flags.
    pub fn update_bar_pos(&mut self, bar_height: i32) {
        self.wy = self.my;
        self.wh = self.mh;
        if self.show_bar {
            self.wh -= bar_height;
            if self.top_bar {
                self.bar_y = self.wy;
                self.wy += bar_height;
            } else {
                self.bar_y = self.wy + self.wh;
            }
        } else {
            self.bar_y = -bar_height;
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.mx && x < self.mx + self.mw && y >= self.my && y < self.my + self.mh
    }

    /// Overlap area between a rectangle and this monitor's window area.
    pub fn intersect_area(&self, x: i32, y: i32, w: i32, h: i32) -> i32 {
        let horizontal = 0.max((x + w).min(self.wx + self.ww) - x.max(self.wx));
        let vertical = 0.max((y + h).min(self.wy + self.wh) - y.max(self.wy));
        horizontal * vertical
    }

    /// Insert at the head of the stacking list.
    pub fn attach(&mut self, win: Window) {
        self.clients.insert(0, win);
    }

    pub fn detach(&mut self, win: Window) {
        self.clients.retain(|&w| w != win);
    }

    /// Insert at the head of the focus history.
    pub fn attach_stack(&mut self, win: Window) {
        self.stack.insert(0, win);
    }

    /// Remove from the focus history. If the removed client was the
    /// selection, the first remaining visible entry takes over (or no
    /// client stays selected).
    pub fn detach_stack(&mut self, win: Window, clients: &HashMap<Window, Client>) {
        self.stack.retain(|&w| w != win);
        if self.sel == Some(win) {
            let tags = self.selected_tags();
            self.sel = self
                .stack
                .iter()
                .copied()
                .find(|w| clients.get(w).is_some_and(|c| c.is_visible_on(tags)));
        }
    }

    /// Clients of this monitor visible under the active tag view, in
    /// stacking order.
    pub fn visible<'a>(
        &'a self,
        clients: &'a HashMap<Window, Client>,
    ) -> impl Iterator<Item = Window> + 'a {
        let tags = self.selected_tags();
        self.clients
            .iter()
            .copied()
            .filter(move |w| clients.get(w).is_some_and(|c| c.is_visible_on(tags)))
    }

    /// Visible, non-floating clients in stacking order; the sequence the
    /// layout engine partitions into master and stack.
    pub fn tiled<'a>(
        &'a self,
        clients: &'a HashMap<Window, Client>,
    ) -> impl Iterator<Item = Window> + 'a {
        let tags = self.selected_tags();
        self.clients.iter().copied().filter(move |w| {
            clients
                .get(w)
                .is_some_and(|c| !c.is_floating && c.is_visible_on(tags))
        })
    }

    /// Adjust the master fraction. Input below 1.0 is an absolute
    /// target, input of 1.0 or above a delta of `input - 1.0`; negative
    /// input is a downward delta. Out-of-range results are rejected
    /// outright rather than clamped.
    pub fn adjust_mfact(&mut self, factor: f32) -> bool {
        let new = if factor >= 1.0 {
            self.mfact + (factor - 1.0)
        } else if factor <= 0.0 {
            self.mfact + factor
        } else {
            factor
        };
        if !(0.05..=0.95).contains(&new) {
            return false;
        }
        self.mfact = new;
        true
    }
}

/// A hardware-reported screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Query the current screen rectangles, falling back to the whole
/// screen when Xinerama is inactive or reports nothing usable.
pub fn screen_rectangles(
    connection: &RustConnection,
    screen_width: i32,
    screen_height: i32,
) -> WmResult<Vec<ScreenRect>> {
    let whole_screen = || {
        vec![ScreenRect {
            x: 0,
            y: 0,
            w: screen_width,
            h: screen_height,
        }]
    };

    let active = connection
        .xinerama_is_active()
        .ok()
        .and_then(|cookie| cookie.reply().ok())
        .is_some_and(|reply| reply.state != 0);
    if !active {
        return Ok(whole_screen());
    }

    let Ok(reply) = connection.xinerama_query_screens()?.reply() else {
        return Ok(whole_screen());
    };

    let rects: Vec<ScreenRect> = reply
        .screen_info
        .iter()
        .filter(|info| info.width > 0 && info.height > 0)
        .map(|info| ScreenRect {
            x: info.x_org as i32,
            y: info.y_org as i32,
            w: info.width as i32,
            h: info.height as i32,
        })
        .collect();

    if rects.is_empty() {
        return Ok(whole_screen());
    }
    Ok(dedup_rects(rects))
}

/// Drop exact duplicates, preserving first-seen order.
pub fn dedup_rects(rects: Vec<ScreenRect>) -> Vec<ScreenRect> {
    let mut unique: Vec<ScreenRect> = Vec::with_capacity(rects.len());
    for rect in rects {
        if !unique.contains(&rect) {
            unique.push(rect);
        }
    }
    unique
}

/// Reconcile the monitor list against a deduplicated rectangle set.
///
/// Growing or changed rectangles update monitors in place (appending new
/// records for the surplus); a shrinking set tears down monitors from
/// the tail, re-owning their clients to the first monitor. Tags are
/// deliberately left untouched on re-owned clients, so windows that were
/// visible on the dead monitor's view may end up invisible under the
/// survivor's view until re-tagged.
///
/// Returns whether anything changed plus the bar windows of removed
/// monitors, which the caller must destroy.
pub fn apply_screen_rects(
    monitors: &mut Vec<Monitor>,
    clients: &mut HashMap<Window, Client>,
    rects: &[ScreenRect],
    defaults: &MonitorDefaults,
) -> (bool, Vec<Window>) {
    let mut dirty = false;
    let mut orphaned_bars = Vec::new();
    let previous_count = monitors.len();

    if rects.len() >= previous_count {
        for i in previous_count..rects.len() {
            monitors.push(Monitor::new(i, defaults));
        }
        for (i, (monitor, rect)) in monitors.iter_mut().zip(rects).enumerate() {
            let changed = monitor.mx != rect.x
                || monitor.my != rect.y
                || monitor.mw != rect.w
                || monitor.mh != rect.h;
            if i >= previous_count || changed {
                dirty = true;
                monitor.num = i;
                monitor.mx = rect.x;
                monitor.my = rect.y;
                monitor.mw = rect.w;
                monitor.mh = rect.h;
                monitor.wx = rect.x;
                monitor.wy = rect.y;
                monitor.ww = rect.w;
                monitor.wh = rect.h;
                monitor.update_bar_pos(defaults.bar_height);
            }
        }
    } else {
        while monitors.len() > rects.len() {
            let removed = monitors.pop().expect("len checked above");
            dirty = true;
            for win in removed.clients {
                if let Some(client) = clients.get_mut(&win) {
                    client.monitor = 0;
                }
                monitors[0].attach(win);
                monitors[0].attach_stack(win);
            }
            if removed.bar_win != x11rb::NONE {
                orphaned_bars.push(removed.bar_win);
            }
        }
    }

    (dirty, orphaned_bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MonitorDefaults {
        MonitorDefaults {
            mfact: 0.55,
            nmaster: 1,
            show_bar: true,
            top_bar: true,
            layouts: [LayoutKind::Tiled, LayoutKind::Floating],
            bar_height: 20,
        }
    }

    fn monitor_with(rect: ScreenRect) -> Monitor {
        let mut monitor = Monitor::new(0, &defaults());
        monitor.mx = rect.x;
        monitor.my = rect.y;
        monitor.mw = rect.w;
        monitor.mh = rect.h;
        monitor.update_bar_pos(20);
        monitor
    }

    fn client(win: Window, tags: TagMask) -> Client {
        Client::new(win, 0, tags)
    }

    #[test]
    fn attach_is_lifo_and_detach_removes_exactly_one() {
        let mut monitor = Monitor::new(0, &defaults());
        monitor.attach(1);
        monitor.attach(2);
        monitor.attach(3);
        assert_eq!(monitor.clients, vec![3, 2, 1]);
        monitor.detach(2);
        assert_eq!(monitor.clients, vec![3, 1]);
        monitor.detach(2);
        assert_eq!(monitor.clients, vec![3, 1]);
    }

    #[test]
    fn every_attached_client_appears_once_per_list() {
        let mut monitor = Monitor::new(0, &defaults());
        for win in [10, 11, 12, 13] {
            monitor.attach(win);
            monitor.attach_stack(win);
        }
        monitor.detach(11);
        monitor.stack.retain(|&w| w != 11);
        for win in [10, 12, 13] {
            assert_eq!(monitor.clients.iter().filter(|&&w| w == win).count(), 1);
            assert_eq!(monitor.stack.iter().filter(|&&w| w == win).count(), 1);
        }
        assert_eq!(monitor.clients.len(), 3);
        assert_eq!(monitor.stack.len(), 3);
    }

    #[test]
    fn detach_stack_falls_back_to_first_visible() {
        let mut clients = HashMap::new();
        clients.insert(1, client(1, 0b01));
        clients.insert(2, client(2, 0b10));
        clients.insert(3, client(3, 0b01));

        let mut monitor = Monitor::new(0, &defaults());
        monitor.tagset = [0b01, 0b01];
        for win in [3, 2, 1] {
            monitor.attach_stack(win);
        }
        // stack: [1, 2, 3], selected = 1
        monitor.sel = Some(1);

        monitor.detach_stack(1, &clients);
        // 2 is not visible on tag 1, so 3 takes over.
        assert_eq!(monitor.sel, Some(3));

        monitor.detach_stack(3, &clients);
        assert_eq!(monitor.sel, None, "no visible client left");
    }

    #[test]
    fn detach_stack_keeps_selection_when_other_client_removed() {
        let mut clients = HashMap::new();
        clients.insert(1, client(1, 0b01));
        clients.insert(2, client(2, 0b01));
        let mut monitor = Monitor::new(0, &defaults());
        monitor.attach_stack(1);
        monitor.attach_stack(2);
        monitor.sel = Some(2);
        monitor.detach_stack(1, &clients);
        assert_eq!(monitor.sel, Some(2));
    }

    #[test]
    fn tiled_skips_floating_and_invisible() {
        let mut clients = HashMap::new();
        clients.insert(1, client(1, 0b01));
        let mut floating = client(2, 0b01);
        floating.is_floating = true;
        clients.insert(2, floating);
        clients.insert(3, client(3, 0b10));
        clients.insert(4, client(4, 0b01));

        let mut monitor = Monitor::new(0, &defaults());
        for win in [4, 3, 2, 1] {
            monitor.attach(win);
        }
        let tiled: Vec<Window> = monitor.tiled(&clients).collect();
        assert_eq!(tiled, vec![1, 4]);
        let visible: Vec<Window> = monitor.visible(&clients).collect();
        assert_eq!(visible, vec![1, 2, 4]);
    }

    #[test]
    fn bar_reservation_tracks_placement() {
        let mut monitor = monitor_with(ScreenRect { x: 0, y: 0, w: 1920, h: 1080 });
        assert_eq!(monitor.wy, 20);
        assert_eq!(monitor.wh, 1060);
        assert_eq!(monitor.bar_y, 0);

        monitor.top_bar = false;
        monitor.update_bar_pos(20);
        assert_eq!(monitor.wy, 0);
        assert_eq!(monitor.wh, 1060);
        assert_eq!(monitor.bar_y, 1060);

        monitor.show_bar = false;
        monitor.update_bar_pos(20);
        assert_eq!(monitor.wh, 1080);
        assert_eq!(monitor.bar_y, -20);
    }

    #[test]
    fn mfact_absolute_relative_and_rejection() {
        let mut monitor = Monitor::new(0, &defaults());
        monitor.mfact = 0.6;
        assert!(monitor.adjust_mfact(0.5));
        assert_eq!(monitor.mfact, 0.5);

        assert!(monitor.adjust_mfact(1.1));
        assert!((monitor.mfact - 0.6).abs() < 1e-6);

        assert!(monitor.adjust_mfact(-0.05));
        assert!((monitor.mfact - 0.55).abs() < 1e-6);

        assert!(!monitor.adjust_mfact(0.96), "above 0.95 is rejected");
        assert!((monitor.mfact - 0.55).abs() < 1e-6);
        assert!(!monitor.adjust_mfact(0.01), "below 0.05 is rejected");
        monitor.mfact = 0.93;
        assert!(!monitor.adjust_mfact(1.1), "delta past 0.95 is a no-op");
        assert!((monitor.mfact - 0.93).abs() < 1e-6);
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let a = ScreenRect { x: 0, y: 0, w: 1920, h: 1080 };
        let b = ScreenRect { x: 1920, y: 0, w: 1280, h: 1024 };
        assert_eq!(dedup_rects(vec![a, b, a, b, a]), vec![a, b]);
    }

    #[test]
    fn growing_rect_set_appends_monitors() {
        let a = ScreenRect { x: 0, y: 0, w: 1920, h: 1080 };
        let b = ScreenRect { x: 1920, y: 0, w: 1280, h: 1024 };
        let mut monitors = vec![monitor_with(a)];
        let mut clients = HashMap::new();

        let (dirty, orphans) =
            apply_screen_rects(&mut monitors, &mut clients, &[a, b], &defaults());
        assert!(dirty);
        assert!(orphans.is_empty());
        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[1].num, 1);
        assert_eq!(
            (monitors[1].mx, monitors[1].my, monitors[1].mw, monitors[1].mh),
            (1920, 0, 1280, 1024)
        );
        assert_eq!(monitors[1].wy, 20, "bar reserved on the new monitor");
    }

    #[test]
    fn unchanged_rects_are_not_dirty() {
        let a = ScreenRect { x: 0, y: 0, w: 1920, h: 1080 };
        let mut monitors = vec![monitor_with(a)];
        let mut clients = HashMap::new();
        let (dirty, _) = apply_screen_rects(&mut monitors, &mut clients, &[a], &defaults());
        assert!(!dirty);
    }

    #[test]
    fn teardown_reowns_clients_with_tags_preserved() {
        let a = ScreenRect { x: 0, y: 0, w: 1920, h: 1080 };
        let b = ScreenRect { x: 1920, y: 0, w: 1280, h: 1024 };
        let mut monitors = vec![monitor_with(a), monitor_with(b)];
        monitors[1].num = 1;
        monitors[1].bar_win = 99;

        let mut clients = HashMap::new();
        clients.insert(1, client(1, 0b001));
        let mut on_b = Client::new(2, 1, 0b110);
        on_b.monitor = 1;
        clients.insert(2, on_b);
        monitors[0].attach(1);
        monitors[0].attach_stack(1);
        monitors[1].attach(2);
        monitors[1].attach_stack(2);

        let (dirty, orphans) =
            apply_screen_rects(&mut monitors, &mut clients, &[a], &defaults());
        assert!(dirty);
        assert_eq!(orphans, vec![99]);
        assert_eq!(monitors.len(), 1);
        assert_eq!(clients[&2].monitor, 0);
        assert_eq!(clients[&2].tags, 0b110, "tags survive the move");
        assert!(monitors[0].clients.contains(&2));
        assert!(monitors[0].stack.contains(&2));
        assert_eq!(monitors[0].clients.iter().filter(|&&w| w == 2).count(), 1);
    }
}
