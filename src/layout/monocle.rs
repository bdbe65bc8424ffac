use super::Rect;

/// Every tiled-visible client gets the full usable rectangle; only the
/// top of the stacking order is actually seen. The monitor overwrites
/// its layout symbol with the visible count.
pub fn arrange(area: Rect, border_widths: &[i32]) -> Vec<Rect> {
    border_widths
        .iter()
        .map(|&bw| Rect::new(area.x, area.y, area.w - 2 * bw, area.h - 2 * bw))
        .collect()
}

/// The live `[n]` symbol shown while monocle is active.
pub fn symbol(visible: usize) -> String {
    format!("[{}]", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_client_covers_the_usable_area() {
        let area = Rect::new(0, 22, 1280, 778);
        let rects = arrange(area, &[2, 2, 0]);
        assert_eq!(rects.len(), 3);
        assert_eq!(rects[0], Rect::new(0, 22, 1276, 774));
        assert_eq!(rects[1], Rect::new(0, 22, 1276, 774));
        assert_eq!(rects[2], Rect::new(0, 22, 1280, 778));
    }

    #[test]
    fn symbol_counts_visible_clients() {
        assert_eq!(symbol(0), "[0]");
        assert_eq!(symbol(12), "[12]");
    }
}
