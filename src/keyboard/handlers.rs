use serde::Deserialize;

use super::keysyms::Keysym;

/// Every action a key or mouse binding can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum KeyAction {
    Spawn,
    KillClient,
    FocusStack,
    FocusMonitor,
    TagMonitor,
    IncNMaster,
    SetMFact,
    Zoom,
    View,
    ToggleView,
    Tag,
    ToggleTag,
    SetLayout,
    ToggleFloating,
    ToggleBar,
    ToggleFullScreen,
    MoveMouse,
    ResizeMouse,
    Quit,
    Restart,
}

/// The payload handed to an action. Each action reads the variant it
/// expects and treats anything else as "no argument".
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    None,
    Int(i32),
    UInt(u32),
    Float(f32),
    Str(String),
    List(Vec<String>),
    /// Index into the configured layout list.
    Layout(usize),
}

/// Where on screen a button press landed, decided before binding lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ClickTarget {
    TagBar,
    LayoutSymbol,
    StatusText,
    WinTitle,
    ClientWin,
    RootWin,
}

#[derive(Debug, Clone)]
pub struct Key {
    pub modifiers: u16,
    pub keysym: Keysym,
    pub action: KeyAction,
    pub arg: Arg,
}

impl Key {
    pub fn new(modifiers: u16, keysym: Keysym, action: KeyAction, arg: Arg) -> Self {
        Self { modifiers, keysym, action, arg }
    }
}

#[derive(Debug, Clone)]
pub struct MouseBinding {
    pub click: ClickTarget,
    pub modifiers: u16,
    pub button: u8,
    pub action: KeyAction,
    pub arg: Arg,
}

impl MouseBinding {
    pub fn new(click: ClickTarget, modifiers: u16, button: u8, action: KeyAction, arg: Arg) -> Self {
        Self { click, modifiers, button, action, arg }
    }
}

const LOCK_MASK: u16 = 0x0002;
const MODIFIER_BITS: u16 = 0x00fd; // shift, control, mod1..mod5

/// Strip Lock and NumLock, keep only real modifier bits. Both sides of
/// every binding comparison go through this.
pub fn clean_mask(state: u16, numlock_mask: u16) -> u16 {
    state & !(numlock_mask | LOCK_MASK) & MODIFIER_BITS
}

/// Linear scan for an exact (keysym, cleaned modifiers) match.
pub fn find_key<'a>(
    keys: &'a [Key],
    keysym: Keysym,
    state: u16,
    numlock_mask: u16,
) -> Option<&'a Key> {
    keys.iter().find(|key| {
        key.keysym == keysym
            && clean_mask(key.modifiers, numlock_mask) == clean_mask(state, numlock_mask)
    })
}

/// Linear scan for an exact (click target, button, cleaned modifiers)
/// match.
pub fn find_button<'a>(
    buttons: &'a [MouseBinding],
    click: ClickTarget,
    button: u8,
    state: u16,
    numlock_mask: u16,
) -> Option<&'a MouseBinding> {
    buttons.iter().find(|binding| {
        binding.click == click
            && binding.button == button
            && clean_mask(binding.modifiers, numlock_mask) == clean_mask(state, numlock_mask)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::keysyms;

    const MOD4: u16 = 0x0040;
    const SHIFT: u16 = 0x0001;
    const NUMLOCK: u16 = 0x0010;

    #[test]
    fn clean_mask_strips_lock_bits() {
        assert_eq!(clean_mask(MOD4 | LOCK_MASK, NUMLOCK), MOD4);
        assert_eq!(clean_mask(MOD4 | NUMLOCK, NUMLOCK), MOD4);
        assert_eq!(clean_mask(MOD4 | LOCK_MASK | NUMLOCK, NUMLOCK), MOD4);
        assert_eq!(clean_mask(SHIFT | MOD4, NUMLOCK), SHIFT | MOD4);
    }

    #[test]
    fn clean_mask_drops_button_state_bits() {
        // Button1 held during a key press sets bit 8.
        assert_eq!(clean_mask(MOD4 | 0x0100, NUMLOCK), MOD4);
    }

    #[test]
    fn key_lookup_requires_exact_modifiers() {
        let keys = [
            Key::new(MOD4, keysyms::XK_J, KeyAction::FocusStack, Arg::Int(1)),
            Key::new(MOD4 | SHIFT, keysyms::XK_J, KeyAction::TagMonitor, Arg::Int(1)),
        ];
        let hit = find_key(&keys, keysyms::XK_J, MOD4 | NUMLOCK, NUMLOCK).unwrap();
        assert_eq!(hit.action, KeyAction::FocusStack);

        let hit = find_key(&keys, keysyms::XK_J, MOD4 | SHIFT, NUMLOCK).unwrap();
        assert_eq!(hit.action, KeyAction::TagMonitor);

        assert!(find_key(&keys, keysyms::XK_J, SHIFT, NUMLOCK).is_none());
        assert!(find_key(&keys, keysyms::XK_K, MOD4, NUMLOCK).is_none());
    }

    #[test]
    fn button_lookup_matches_click_kind() {
        let buttons = [
            MouseBinding::new(ClickTarget::TagBar, 0, 1, KeyAction::View, Arg::UInt(0)),
            MouseBinding::new(ClickTarget::ClientWin, MOD4, 1, KeyAction::MoveMouse, Arg::None),
        ];
        let hit = find_button(&buttons, ClickTarget::TagBar, 1, 0, NUMLOCK).unwrap();
        assert_eq!(hit.action, KeyAction::View);
        assert!(find_button(&buttons, ClickTarget::RootWin, 1, 0, NUMLOCK).is_none());
        let hit = find_button(&buttons, ClickTarget::ClientWin, 1, MOD4 | LOCK_MASK, NUMLOCK);
        assert_eq!(hit.unwrap().action, KeyAction::MoveMouse);
    }
}
