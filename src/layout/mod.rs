pub mod monocle;
pub mod tiled;

use serde::Deserialize;

/// A rectangle in root-window coordinates. Layout results are inner
/// client geometry; border widths have already been subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

/// The closed set of layouts a monitor slot can hold. `Floating` has no
/// arrange function; floating-layout monitors leave every client where
/// it is, which several callers (restack, drags, configure requests)
/// check for via `has_arrange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LayoutKind {
    Tiled,
    Floating,
    Monocle,
}

impl LayoutKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Tiled => "[]=",
            Self::Floating => "><>",
            Self::Monocle => "[M]",
        }
    }

    pub fn has_arrange(&self) -> bool {
        !matches!(self, Self::Floating)
    }

    /// Compute target rectangles for the given tiled-visible clients.
    /// `border_widths[i]` belongs to the i-th client in stacking order;
    /// the result is index-aligned. `None` means the layout does not
    /// arrange at all.
    pub fn arrange(
        &self,
        area: Rect,
        nmaster: i32,
        mfact: f32,
        border_widths: &[i32],
    ) -> Option<Vec<Rect>> {
        match self {
            Self::Tiled => Some(tiled::arrange(area, nmaster, mfact, border_widths)),
            Self::Floating => None,
            Self::Monocle => Some(monocle::arrange(area, border_widths)),
        }
    }
}
