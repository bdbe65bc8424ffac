pub mod handlers;
pub mod keysyms;

pub use handlers::{Arg, ClickTarget, Key, KeyAction, MouseBinding};
pub use keysyms::Keysym;

use x11rb::connection::Connection as _;
use x11rb::protocol::xproto::{ConnectionExt as _, Keycode};
use x11rb::rust_connection::RustConnection;

use crate::errors::WmError;

/// Keycode-to-keysym table fetched from the server, refreshed on
/// MappingNotify. Lookups use the first (unshifted) column, the way key
/// grabs are registered.
pub struct KeyboardMapping {
    first_keycode: Keycode,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl KeyboardMapping {
    pub fn fetch(connection: &RustConnection) -> Result<Self, WmError> {
        let setup = connection.setup();
        let first_keycode = setup.min_keycode;
        let count = setup.max_keycode - setup.min_keycode + 1;
        let reply = connection.get_keyboard_mapping(first_keycode, count)?.reply()?;
        Ok(Self {
            first_keycode,
            keysyms_per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    pub fn keysym(&self, keycode: Keycode) -> Option<Keysym> {
        if keycode < self.first_keycode {
            return None;
        }
        let index = (keycode - self.first_keycode) as usize * self.keysyms_per_keycode as usize;
        self.keysyms.get(index).copied()
    }

    /// All keycodes whose unshifted column produces the keysym.
    pub fn keycodes(&self, keysym: Keysym) -> Vec<Keycode> {
        let per = self.keysyms_per_keycode as usize;
        self.keysyms
            .chunks(per)
            .enumerate()
            .filter(|(_, column)| column.first() == Some(&keysym))
            .map(|(i, _)| self.first_keycode + i as Keycode)
            .collect()
    }
}
