pub mod bar;
pub mod client;
pub mod config;
pub mod errors;
pub mod keyboard;
pub mod layout;
pub mod monitor;
pub mod rules;
pub mod size_hints;
pub mod window_manager;

pub mod prelude {
    pub use crate::ColorScheme;
    pub use crate::Config;
    pub use crate::keyboard::{Arg, ClickTarget, Key, KeyAction, MouseBinding};
    pub use crate::layout::LayoutKind;
    pub use crate::rules::Rule;
    pub use x11rb::protocol::xproto::KeyButMask;
}

use crate::keyboard::{Arg, ClickTarget, Key, KeyAction, MouseBinding, keysyms};
use crate::layout::LayoutKind;
use crate::rules::Rule;

#[derive(Debug, Clone, Copy)]
pub struct ColorScheme {
    pub foreground: u32,
    pub background: u32,
    pub border: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Appearance
    pub border_width: u32,
    pub font: String,
    pub scheme_normal: ColorScheme,
    pub scheme_selected: ColorScheme,

    // Behavior
    pub snap: u32,
    pub show_bar: bool,
    pub top_bar: bool,
    pub mfact: f32,
    pub nmaster: i32,
    pub resize_hints: bool,
    pub lock_fullscreen: bool,

    // Basics
    pub terminal: String,
    pub modkey: x11rb::protocol::xproto::KeyButMask,

    pub tags: Vec<String>,
    pub rules: Vec<Rule>,
    pub layouts: Vec<LayoutKind>,
    pub keys: Vec<Key>,
    pub buttons: Vec<MouseBinding>,
    pub autostart: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        use x11rb::protocol::xproto::KeyButMask;

        const MODKEY: KeyButMask = KeyButMask::MOD4;
        const TERMINAL: &str = "st";

        let modkey = u16::from(MODKEY);
        let shift = u16::from(KeyButMask::SHIFT);
        let control = u16::from(KeyButMask::CONTROL);

        let mut keys = vec![
            Key::new(
                modkey,
                keysyms::XK_P,
                KeyAction::Spawn,
                Arg::List(vec!["dmenu_run".to_string()]),
            ),
            Key::new(
                modkey | shift,
                keysyms::XK_RETURN,
                KeyAction::Spawn,
                Arg::Str(TERMINAL.to_string()),
            ),
            Key::new(modkey, keysyms::XK_B, KeyAction::ToggleBar, Arg::None),
            Key::new(modkey, keysyms::XK_J, KeyAction::FocusStack, Arg::Int(1)),
            Key::new(modkey, keysyms::XK_K, KeyAction::FocusStack, Arg::Int(-1)),
            Key::new(modkey, keysyms::XK_I, KeyAction::IncNMaster, Arg::Int(1)),
            Key::new(modkey, keysyms::XK_D, KeyAction::IncNMaster, Arg::Int(-1)),
            Key::new(modkey, keysyms::XK_H, KeyAction::SetMFact, Arg::Float(-0.05)),
            Key::new(modkey, keysyms::XK_L, KeyAction::SetMFact, Arg::Float(1.05)),
            Key::new(modkey, keysyms::XK_RETURN, KeyAction::Zoom, Arg::None),
            Key::new(modkey, keysyms::XK_TAB, KeyAction::View, Arg::UInt(0)),
            Key::new(modkey | shift, keysyms::XK_C, KeyAction::KillClient, Arg::None),
            Key::new(modkey, keysyms::XK_T, KeyAction::SetLayout, Arg::Layout(0)),
            Key::new(modkey, keysyms::XK_F, KeyAction::SetLayout, Arg::Layout(1)),
            Key::new(modkey, keysyms::XK_M, KeyAction::SetLayout, Arg::Layout(2)),
            Key::new(modkey, keysyms::XK_SPACE, KeyAction::SetLayout, Arg::None),
            Key::new(
                modkey | shift,
                keysyms::XK_SPACE,
                KeyAction::ToggleFloating,
                Arg::None,
            ),
            Key::new(
                modkey | shift,
                keysyms::XK_F,
                KeyAction::ToggleFullScreen,
                Arg::None,
            ),
            Key::new(modkey, keysyms::XK_0, KeyAction::View, Arg::UInt(!0)),
            Key::new(modkey | shift, keysyms::XK_0, KeyAction::Tag, Arg::UInt(!0)),
            Key::new(modkey, keysyms::XK_COMMA, KeyAction::FocusMonitor, Arg::Int(-1)),
            Key::new(modkey, keysyms::XK_PERIOD, KeyAction::FocusMonitor, Arg::Int(1)),
            Key::new(
                modkey | shift,
                keysyms::XK_COMMA,
                KeyAction::TagMonitor,
                Arg::Int(-1),
            ),
            Key::new(
                modkey | shift,
                keysyms::XK_PERIOD,
                KeyAction::TagMonitor,
                Arg::Int(1),
            ),
            Key::new(modkey | shift, keysyms::XK_Q, KeyAction::Quit, Arg::None),
            Key::new(modkey | shift, keysyms::XK_R, KeyAction::Restart, Arg::None),
        ];

        for (i, &keysym) in keysyms::DIGITS.iter().enumerate() {
            let bit = 1 << i;
            keys.push(Key::new(modkey, keysym, KeyAction::View, Arg::UInt(bit)));
            keys.push(Key::new(
                modkey | control,
                keysym,
                KeyAction::ToggleView,
                Arg::UInt(bit),
            ));
            keys.push(Key::new(modkey | shift, keysym, KeyAction::Tag, Arg::UInt(bit)));
            keys.push(Key::new(
                modkey | control | shift,
                keysym,
                KeyAction::ToggleTag,
                Arg::UInt(bit),
            ));
        }

        let buttons = vec![
            MouseBinding::new(ClickTarget::LayoutSymbol, 0, 1, KeyAction::SetLayout, Arg::None),
            MouseBinding::new(
                ClickTarget::LayoutSymbol,
                0,
                3,
                KeyAction::SetLayout,
                Arg::Layout(2),
            ),
            MouseBinding::new(ClickTarget::WinTitle, 0, 2, KeyAction::Zoom, Arg::None),
            MouseBinding::new(
                ClickTarget::StatusText,
                0,
                2,
                KeyAction::Spawn,
                Arg::Str(TERMINAL.to_string()),
            ),
            MouseBinding::new(ClickTarget::ClientWin, modkey, 1, KeyAction::MoveMouse, Arg::None),
            MouseBinding::new(
                ClickTarget::ClientWin,
                modkey,
                2,
                KeyAction::ToggleFloating,
                Arg::None,
            ),
            MouseBinding::new(
                ClickTarget::ClientWin,
                modkey,
                3,
                KeyAction::ResizeMouse,
                Arg::None,
            ),
            // UInt(0) is the "use the clicked tag" sentinel.
            MouseBinding::new(ClickTarget::TagBar, 0, 1, KeyAction::View, Arg::UInt(0)),
            MouseBinding::new(ClickTarget::TagBar, 0, 3, KeyAction::ToggleView, Arg::UInt(0)),
            MouseBinding::new(ClickTarget::TagBar, modkey, 1, KeyAction::Tag, Arg::UInt(0)),
            MouseBinding::new(ClickTarget::TagBar, modkey, 3, KeyAction::ToggleTag, Arg::UInt(0)),
        ];

        Self {
            border_width: 1,
            font: "monospace:size=10".to_string(),
            scheme_normal: ColorScheme {
                foreground: 0xbbbbbb,
                background: 0x222222,
                border: 0x444444,
            },
            scheme_selected: ColorScheme {
                foreground: 0xeeeeee,
                background: 0x005577,
                border: 0x005577,
            },
            snap: 32,
            show_bar: true,
            top_bar: true,
            mfact: 0.55,
            nmaster: 1,
            resize_hints: true,
            lock_fullscreen: true,
            terminal: TERMINAL.to_string(),
            modkey: MODKEY,
            tags: vec!["1", "2", "3", "4", "5", "6", "7", "8", "9"]
                .into_iter()
                .map(String::from)
                .collect(),
            rules: vec![Rule {
                class: Some("Gimp".to_string()),
                is_floating: true,
                ..Rule::default()
            }],
            layouts: vec![LayoutKind::Tiled, LayoutKind::Floating, LayoutKind::Monocle],
            keys,
            buttons,
            autostart: Vec::new(),
        }
    }
}
