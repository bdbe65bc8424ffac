use serde::Deserialize;
use x11rb::protocol::xproto::KeyButMask;

use crate::errors::ConfigError;
use crate::keyboard::keysyms::{self, Keysym};
use crate::keyboard::{Arg, ClickTarget, Key, KeyAction, MouseBinding};
use crate::layout::LayoutKind;
use crate::rules::Rule;
use crate::{ColorScheme, Config};

#[derive(Debug, Deserialize)]
pub enum ModKey {
    /// Placeholder resolved to the configured `modkey`.
    Mod,
    Mod1,
    Mod2,
    Mod3,
    Mod4,
    Mod5,
    Shift,
    Control,
}

impl ModKey {
    fn to_mask(&self, modkey: KeyButMask) -> u16 {
        match self {
            ModKey::Mod => u16::from(modkey),
            ModKey::Mod1 => u16::from(KeyButMask::MOD1),
            ModKey::Mod2 => u16::from(KeyButMask::MOD2),
            ModKey::Mod3 => u16::from(KeyButMask::MOD3),
            ModKey::Mod4 => u16::from(KeyButMask::MOD4),
            ModKey::Mod5 => u16::from(KeyButMask::MOD5),
            ModKey::Shift => u16::from(KeyButMask::SHIFT),
            ModKey::Control => u16::from(KeyButMask::CONTROL),
        }
    }
}

fn combine(modifiers: &[ModKey], modkey: KeyButMask) -> u16 {
    modifiers.iter().fold(0, |acc, m| acc | m.to_mask(modkey))
}

#[rustfmt::skip]
#[derive(Debug, Deserialize)]
pub enum KeyName {
    Return, Tab, Space, Comma, Period,
    B, C, D, F, H, I, J, K, L, M, P, Q, R, T,
    Key0, Key1, Key2, Key3, Key4, Key5, Key6, Key7, Key8, Key9,
}

impl KeyName {
    fn to_keysym(&self) -> Keysym {
        match self {
            KeyName::Return => keysyms::XK_RETURN,
            KeyName::Tab => keysyms::XK_TAB,
            KeyName::Space => keysyms::XK_SPACE,
            KeyName::Comma => keysyms::XK_COMMA,
            KeyName::Period => keysyms::XK_PERIOD,
            KeyName::B => keysyms::XK_B,
            KeyName::C => keysyms::XK_C,
            KeyName::D => keysyms::XK_D,
            KeyName::F => keysyms::XK_F,
            KeyName::H => keysyms::XK_H,
            KeyName::I => keysyms::XK_I,
            KeyName::J => keysyms::XK_J,
            KeyName::K => keysyms::XK_K,
            KeyName::L => keysyms::XK_L,
            KeyName::M => keysyms::XK_M,
            KeyName::P => keysyms::XK_P,
            KeyName::Q => keysyms::XK_Q,
            KeyName::R => keysyms::XK_R,
            KeyName::T => keysyms::XK_T,
            KeyName::Key0 => keysyms::XK_0,
            KeyName::Key1 => keysyms::XK_1,
            KeyName::Key2 => keysyms::XK_2,
            KeyName::Key3 => keysyms::XK_3,
            KeyName::Key4 => keysyms::XK_4,
            KeyName::Key5 => keysyms::XK_5,
            KeyName::Key6 => keysyms::XK_6,
            KeyName::Key7 => keysyms::XK_7,
            KeyName::Key8 => keysyms::XK_8,
            KeyName::Key9 => keysyms::XK_9,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub enum ArgData {
    #[default]
    None,
    Int(i32),
    Mask(u32),
    Float(f32),
    Str(String),
    List(Vec<String>),
    Layout(usize),
}

impl ArgData {
    fn into_arg(self) -> Arg {
        match self {
            ArgData::None => Arg::None,
            ArgData::Int(n) => Arg::Int(n),
            ArgData::Mask(mask) => Arg::UInt(mask),
            ArgData::Float(f) => Arg::Float(f),
            ArgData::Str(s) => Arg::Str(s),
            ArgData::List(items) => Arg::List(items),
            ArgData::Layout(index) => Arg::Layout(index),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeyData {
    modifiers: Vec<ModKey>,
    key: KeyName,
    action: KeyAction,
    #[serde(default)]
    arg: ArgData,
}

#[derive(Debug, Deserialize)]
struct ButtonData {
    click: ClickTarget,
    #[serde(default)]
    modifiers: Vec<ModKey>,
    button: u8,
    action: KeyAction,
    #[serde(default)]
    arg: ArgData,
}

#[derive(Debug, Deserialize)]
struct ColorSchemeData {
    foreground: u32,
    background: u32,
    border: u32,
}

/// Every field is optional; anything omitted keeps the built-in default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigData {
    border_width: Option<u32>,
    font: Option<String>,
    scheme_normal: Option<ColorSchemeData>,
    scheme_selected: Option<ColorSchemeData>,
    snap: Option<u32>,
    show_bar: Option<bool>,
    top_bar: Option<bool>,
    mfact: Option<f32>,
    nmaster: Option<i32>,
    resize_hints: Option<bool>,
    lock_fullscreen: Option<bool>,
    terminal: Option<String>,
    modkey: Option<ModKey>,
    tags: Option<Vec<String>>,
    rules: Option<Vec<Rule>>,
    layouts: Option<Vec<LayoutKind>>,
    keybindings: Option<Vec<KeyData>>,
    mousebindings: Option<Vec<ButtonData>>,
    autostart: Option<Vec<String>>,
}

pub fn parse_config(input: &str) -> Result<Config, ConfigError> {
    let options = ron::Options::default()
        .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME);
    let data: ConfigData = options.from_str(input)?;
    let mut config = Config::default();

    if let Some(modkey) = data.modkey {
        config.modkey = match modkey.to_mask(config.modkey) {
            mask if mask == u16::from(KeyButMask::SHIFT) => KeyButMask::SHIFT,
            mask if mask == u16::from(KeyButMask::CONTROL) => KeyButMask::CONTROL,
            mask if mask == u16::from(KeyButMask::MOD1) => KeyButMask::MOD1,
            mask if mask == u16::from(KeyButMask::MOD2) => KeyButMask::MOD2,
            mask if mask == u16::from(KeyButMask::MOD3) => KeyButMask::MOD3,
            mask if mask == u16::from(KeyButMask::MOD5) => KeyButMask::MOD5,
            _ => KeyButMask::MOD4,
        };
    }
    if let Some(border_width) = data.border_width {
        config.border_width = border_width;
    }
    if let Some(font) = data.font {
        config.font = font;
    }
    if let Some(scheme) = data.scheme_normal {
        config.scheme_normal = ColorScheme {
            foreground: scheme.foreground,
            background: scheme.background,
            border: scheme.border,
        };
    }
    if let Some(scheme) = data.scheme_selected {
        config.scheme_selected = ColorScheme {
            foreground: scheme.foreground,
            background: scheme.background,
            border: scheme.border,
        };
    }
    if let Some(snap) = data.snap {
        config.snap = snap;
    }
    if let Some(show_bar) = data.show_bar {
        config.show_bar = show_bar;
    }
    if let Some(top_bar) = data.top_bar {
        config.top_bar = top_bar;
    }
    if let Some(mfact) = data.mfact {
        config.mfact = mfact;
    }
    if let Some(nmaster) = data.nmaster {
        config.nmaster = nmaster.max(0);
    }
    if let Some(resize_hints) = data.resize_hints {
        config.resize_hints = resize_hints;
    }
    if let Some(lock_fullscreen) = data.lock_fullscreen {
        config.lock_fullscreen = lock_fullscreen;
    }
    if let Some(terminal) = data.terminal {
        config.terminal = terminal;
    }
    if let Some(tags) = data.tags {
        config.tags = tags;
    }
    if let Some(rules) = data.rules {
        config.rules = rules;
    }
    if let Some(layouts) = data.layouts {
        config.layouts = layouts;
    }
    let modkey = config.modkey;
    if let Some(keybindings) = data.keybindings {
        config.keys = keybindings
            .into_iter()
            .map(|k| {
                Key::new(
                    combine(&k.modifiers, modkey),
                    k.key.to_keysym(),
                    k.action,
                    k.arg.into_arg(),
                )
            })
            .collect();
    }
    if let Some(mousebindings) = data.mousebindings {
        config.buttons = mousebindings
            .into_iter()
            .map(|b| {
                MouseBinding::new(
                    b.click,
                    combine(&b.modifiers, modkey),
                    b.button,
                    b.action,
                    b.arg.into_arg(),
                )
            })
            .collect();
    }
    if let Some(autostart) = data.autostart {
        config.autostart = autostart;
    }

    validate(&config)?;
    Ok(config)
}

/// Reject configurations the window manager cannot run with.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.tags.is_empty() {
        return Err(ConfigError::NoTags);
    }
    if config.tags.len() >= 32 {
        return Err(ConfigError::TooManyTags(config.tags.len()));
    }
    if !(0.05..=0.95).contains(&config.mfact) {
        return Err(ConfigError::InvalidMasterFactor(config.mfact));
    }
    if config.layouts.is_empty() {
        return Err(ConfigError::NoLayouts);
    }
    let layout_args = config
        .keys
        .iter()
        .map(|k| &k.arg)
        .chain(config.buttons.iter().map(|b| &b.arg));
    for arg in layout_args {
        if let Arg::Layout(index) = arg
            && *index >= config.layouts.len()
        {
            return Err(ConfigError::UnknownLayoutIndex(*index));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let config = parse_config("()").unwrap();
        let defaults = Config::default();
        assert_eq!(config.border_width, defaults.border_width);
        assert_eq!(config.tags, defaults.tags);
        assert_eq!(config.keys.len(), defaults.keys.len());
    }

    #[test]
    fn fields_override_defaults() {
        let config = parse_config(
            r#"(
                border_width: 3,
                mfact: 0.5,
                top_bar: false,
                tags: ["www", "dev", "misc"],
                terminal: "alacritty",
            )"#,
        )
        .unwrap();
        assert_eq!(config.border_width, 3);
        assert_eq!(config.mfact, 0.5);
        assert!(!config.top_bar);
        assert_eq!(config.tags, vec!["www", "dev", "misc"]);
        assert_eq!(config.terminal, "alacritty");
    }

    #[test]
    fn keybindings_replace_the_default_table() {
        let config = parse_config(
            r#"(
                keybindings: [
                    (modifiers: [Mod, Shift], key: Q, action: Quit),
                    (modifiers: [Mod], key: L, action: SetMFact, arg: Float(1.05)),
                    (modifiers: [Mod], key: Key1, action: View, arg: Mask(0b1)),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(config.keys.len(), 3);
        assert_eq!(config.keys[0].action, KeyAction::Quit);
        assert_eq!(config.keys[1].arg, Arg::Float(1.05));
        assert_eq!(config.keys[2].arg, Arg::UInt(1));
    }

    #[test]
    fn rules_deserialize_with_optional_fields() {
        let config = parse_config(
            r#"(
                rules: [
                    (class: "Gimp", is_floating: true),
                    (title: "scratch", tags: 0b100000000, monitor: 1),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].class.as_deref(), Some("Gimp"));
        assert!(config.rules[0].is_floating);
        assert_eq!(config.rules[1].tags, 0b100000000);
        assert_eq!(config.rules[1].monitor, Some(1));
    }

    #[test]
    fn out_of_range_layout_index_is_rejected() {
        let err = parse_config(
            r#"(
                keybindings: [
                    (modifiers: [Mod], key: M, action: SetLayout, arg: Layout(7)),
                ],
            )"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLayoutIndex(7)));
    }

    #[test]
    fn tag_count_limit_is_enforced() {
        let tags: Vec<String> = (0..32).map(|i| i.to_string()).collect();
        let input = format!("(tags: {:?})", tags);
        let err = parse_config(&input).unwrap_err();
        assert!(matches!(err, ConfigError::TooManyTags(32)));

        let err = parse_config("(tags: [])").unwrap_err();
        assert!(matches!(err, ConfigError::NoTags));
    }

    #[test]
    fn defaults_pass_validation() {
        validate(&Config::default()).unwrap();
    }
}
