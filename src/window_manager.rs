use std::collections::HashMap;
use std::os::unix::process::CommandExt as _;
use std::process::Command;

use tracing::{debug, error, info, warn};
use x11rb::COPY_DEPTH_FROM_PARENT;
use x11rb::connection::Connection;
use x11rb::cursor::Handle as CursorHandle;
use x11rb::protocol::{ErrorKind, Event};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::Config;
use crate::bar::{Bar, BarFrame};
use crate::bar::font::Font;
use crate::client::{Client, TagMask, all_tags_mask};
use crate::errors::{WmError, X11Error};
use crate::keyboard::handlers::{self, Arg, ClickTarget, KeyAction};
use crate::keyboard::{KeyboardMapping, keysyms};
use crate::layout::{LayoutKind, monocle};
use crate::monitor::{Monitor, MonitorDefaults, apply_screen_rects, screen_rectangles};
use crate::rules::apply_rules;
use crate::size_hints::{NORMAL_HINTS_LEN, NormalHints};

type WmResult<T> = Result<T, WmError>;

/// ICCCM WM_STATE values.
const WITHDRAWN_STATE: u32 = 0;
const NORMAL_STATE: u32 = 1;
const ICONIC_STATE: u32 = 3;

/// AnyKey for ungrab requests.
const ANY_KEY: Keycode = 0;

/// Request opcodes for the benign-error filter.
mod opcode {
    pub const CONFIGURE_WINDOW: u8 = 12;
    pub const GRAB_BUTTON: u8 = 28;
    pub const GRAB_KEY: u8 = 33;
    pub const SET_INPUT_FOCUS: u8 = 42;
    pub const COPY_AREA: u8 = 62;
    pub const POLY_SEGMENT: u8 = 66;
    pub const POLY_FILL_RECTANGLE: u8 = 70;
    pub const POLY_TEXT8: u8 = 74;
}

struct AtomCache {
    wm_protocols: Atom,
    wm_delete_window: Atom,
    wm_state: Atom,
    wm_take_focus: Atom,
    net_supported: Atom,
    net_wm_name: Atom,
    net_wm_state: Atom,
    net_supporting_wm_check: Atom,
    net_wm_state_fullscreen: Atom,
    net_active_window: Atom,
    net_wm_window_type: Atom,
    net_wm_window_type_dialog: Atom,
    net_client_list: Atom,
    utf8_string: Atom,
}

impl AtomCache {
    fn new(connection: &RustConnection) -> WmResult<Self> {
        let intern = |name: &[u8]| -> WmResult<Atom> {
            Ok(connection.intern_atom(false, name)?.reply()?.atom)
        };
        Ok(Self {
            wm_protocols: intern(b"WM_PROTOCOLS")?,
            wm_delete_window: intern(b"WM_DELETE_WINDOW")?,
            wm_state: intern(b"WM_STATE")?,
            wm_take_focus: intern(b"WM_TAKE_FOCUS")?,
            net_supported: intern(b"_NET_SUPPORTED")?,
            net_wm_name: intern(b"_NET_WM_NAME")?,
            net_wm_state: intern(b"_NET_WM_STATE")?,
            net_supporting_wm_check: intern(b"_NET_SUPPORTING_WM_CHECK")?,
            net_wm_state_fullscreen: intern(b"_NET_WM_STATE_FULLSCREEN")?,
            net_active_window: intern(b"_NET_ACTIVE_WINDOW")?,
            net_wm_window_type: intern(b"_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_dialog: intern(b"_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_client_list: intern(b"_NET_CLIENT_LIST")?,
            utf8_string: intern(b"UTF8_STRING")?,
        })
    }
}

struct Cursors {
    normal: Cursor,
    moving: Cursor,
    resizing: Cursor,
}

/// The interactive drag machine. Entered from the bound mouse actions,
/// exited on button release; while active, only pointer motion, button
/// release and a re-dispatched subset of other events are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Moving {
        win: Window,
        pointer_x: i32,
        pointer_y: i32,
        orig_x: i32,
        orig_y: i32,
    },
    Resizing {
        win: Window,
        orig_x: i32,
        orig_y: i32,
    },
}

pub struct WindowManager {
    config: Config,
    connection: RustConnection,
    screen_number: usize,
    root: Window,
    screen: Screen,
    screen_width: i32,
    screen_height: i32,
    atoms: AtomCache,
    cursors: Cursors,
    wm_check_window: Window,
    display: *mut x11::xlib::Display,
    font: Font,
    bar_height: i32,
    bars: Vec<Bar>,
    clients: HashMap<Window, Client>,
    monitors: Vec<Monitor>,
    selected_monitor: usize,
    motion_monitor: Option<usize>,
    status_text: String,
    keyboard_mapping: KeyboardMapping,
    numlock_mask: u16,
    drag: DragState,
    running: bool,
    restart: bool,
}

impl WindowManager {
    pub fn new(config: Config) -> WmResult<Self> {
        let (connection, screen_number) = x11rb::connect(None)?;
        let root = connection.setup().roots[screen_number].root;
        let screen = connection.setup().roots[screen_number].clone();

        // Only one client may select substructure redirection on the
        // root window; failing here means another WM owns it.
        connection
            .change_window_attributes(
                root,
                &ChangeWindowAttributesAux::new()
                    .event_mask(EventMask::SUBSTRUCTURE_REDIRECT),
            )?
            .check()
            .map_err(|_| X11Error::OtherWmRunning)?;

        let display = unsafe { x11::xlib::XOpenDisplay(std::ptr::null()) };
        if display.is_null() {
            return Err(WmError::X11(X11Error::DisplayOpenFailed));
        }
        let font = Font::new(display, screen_number as i32, &config.font)?;
        let bar_height = font.height() + 2;

        let atoms = AtomCache::new(&connection)?;

        let resource_db = x11rb::resource_manager::new_from_default(&connection)?;
        let cursor_handle = CursorHandle::new(&connection, screen_number, &resource_db)?.reply()?;
        let cursors = Cursors {
            normal: cursor_handle.load_cursor(&connection, "left_ptr")?,
            moving: cursor_handle.load_cursor(&connection, "fleur")?,
            resizing: cursor_handle.load_cursor(&connection, "sizing")?,
        };

        let keyboard_mapping = KeyboardMapping::fetch(&connection)?;

        let mut window_manager = Self {
            screen_width: screen.width_in_pixels as i32,
            screen_height: screen.height_in_pixels as i32,
            config,
            connection,
            screen_number,
            root,
            screen,
            atoms,
            cursors,
            wm_check_window: x11rb::NONE,
            display,
            font,
            bar_height,
            bars: Vec::new(),
            clients: HashMap::new(),
            monitors: Vec::new(),
            selected_monitor: 0,
            motion_monitor: None,
            status_text: String::new(),
            keyboard_mapping,
            numlock_mask: 0,
            drag: DragState::Idle,
            running: true,
            restart: false,
        };

        window_manager.update_geometry()?;
        window_manager.setup_ewmh()?;
        window_manager.update_status()?;

        window_manager.connection.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new()
                .cursor(window_manager.cursors.normal)
                .event_mask(
                    EventMask::SUBSTRUCTURE_REDIRECT
                        | EventMask::SUBSTRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::POINTER_MOTION
                        | EventMask::ENTER_WINDOW
                        | EventMask::LEAVE_WINDOW
                        | EventMask::STRUCTURE_NOTIFY
                        | EventMask::PROPERTY_CHANGE,
                ),
        )?;
        window_manager.grab_keys()?;
        window_manager.focus(None)?;
        window_manager.run_autostart();

        Ok(window_manager)
    }

    fn setup_ewmh(&mut self) -> WmResult<()> {
        let wm_check_window = self.connection.generate_id()?;
        self.connection.create_window(
            COPY_DEPTH_FROM_PARENT,
            wm_check_window,
            self.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new(),
        )?;
        self.connection.change_property32(
            PropMode::REPLACE,
            wm_check_window,
            self.atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[wm_check_window],
        )?;
        self.connection.change_property8(
            PropMode::REPLACE,
            wm_check_window,
            self.atoms.net_wm_name,
            self.atoms.utf8_string,
            b"tagwm",
        )?;
        self.connection.change_property32(
            PropMode::REPLACE,
            self.root,
            self.atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[wm_check_window],
        )?;
        self.wm_check_window = wm_check_window;

        let supported = [
            self.atoms.net_supported,
            self.atoms.net_wm_name,
            self.atoms.net_wm_state,
            self.atoms.net_supporting_wm_check,
            self.atoms.net_wm_state_fullscreen,
            self.atoms.net_active_window,
            self.atoms.net_wm_window_type,
            self.atoms.net_wm_window_type_dialog,
            self.atoms.net_client_list,
        ];
        self.connection.change_property32(
            PropMode::REPLACE,
            self.root,
            self.atoms.net_supported,
            AtomEnum::ATOM,
            &supported,
        )?;
        self.connection
            .delete_property(self.root, self.atoms.net_client_list)?;
        Ok(())
    }

    /// Adopt windows that already exist: viewable ones first, then
    /// iconified ones, transients last so their parents are managed.
    pub fn scan(&mut self) -> WmResult<()> {
        let tree = self.connection.query_tree(self.root)?.reply()?;

        let mut transients = Vec::new();
        for &win in &tree.children {
            let Ok(attrs) = self.connection.get_window_attributes(win)?.reply() else {
                continue;
            };
            if attrs.override_redirect {
                continue;
            }
            if self.transient_parent(win).is_some() {
                transients.push(win);
                continue;
            }
            if attrs.map_state == MapState::VIEWABLE
                || self.window_state(win) == Some(ICONIC_STATE)
            {
                self.manage(win)?;
            }
        }
        for win in transients {
            let Ok(attrs) = self.connection.get_window_attributes(win)?.reply() else {
                continue;
            };
            if attrs.map_state == MapState::VIEWABLE
                || self.window_state(win) == Some(ICONIC_STATE)
            {
                self.manage(win)?;
            }
        }
        Ok(())
    }

    /// The main loop. Blocks on the next event, dispatches it, repeats
    /// until a quit action clears the running flag. Returns whether a
    /// restart was requested.
    pub fn run(&mut self) -> WmResult<bool> {
        info!(screen = self.screen_number, "entering event loop");
        self.connection.flush()?;
        while self.running {
            let event = self.connection.wait_for_event()?;
            self.handle_event(event)?;
            self.connection.flush()?;
        }
        Ok(self.restart)
    }

    /// Tear down WM-owned resources; managed windows stay alive.
    pub fn cleanup(&mut self) -> WmResult<()> {
        self.connection
            .ungrab_key(ANY_KEY, self.root, ModMask::ANY)?;
        for bar in &self.bars {
            bar.destroy(&self.connection)?;
        }
        self.bars.clear();
        self.connection.destroy_window(self.wm_check_window)?;
        self.connection
            .set_input_focus(InputFocus::POINTER_ROOT, self.root, x11rb::CURRENT_TIME)?;
        self.connection
            .delete_property(self.root, self.atoms.net_active_window)?;
        self.connection.flush()?;
        Ok(())
    }

    /// O(1) dispatch over the closed event enumeration; unhandled kinds
    /// fall through silently.
    fn handle_event(&mut self, event: Event) -> WmResult<()> {
        match event {
            Event::MapRequest(event) => self.on_map_request(event),
            Event::UnmapNotify(event) => self.on_unmap_notify(event),
            Event::DestroyNotify(event) => self.on_destroy_notify(event),
            Event::ConfigureRequest(event) => self.on_configure_request(event),
            Event::ConfigureNotify(event) => self.on_configure_notify(event),
            Event::PropertyNotify(event) => self.on_property_notify(event),
            Event::ClientMessage(event) => self.on_client_message(event),
            Event::ButtonPress(event) => self.on_button_press(event),
            Event::KeyPress(event) => self.on_key_press(event),
            Event::EnterNotify(event) => self.on_enter_notify(event),
            Event::MotionNotify(event) => self.on_motion_notify(event),
            Event::FocusIn(event) => self.on_focus_in(event),
            Event::MappingNotify(event) => self.on_mapping_notify(event),
            Event::Expose(event) => self.on_expose(event),
            Event::Error(error) => {
                self.on_x_error(error);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Errors from requests racing a dying window are routine; anything
    /// else is logged with its raw codes and the loop keeps going.
    fn on_x_error(&self, error: x11rb::x11_utils::X11Error) {
        let benign = matches!(
            (error.error_kind, error.major_opcode),
            (ErrorKind::Window, _)
                | (ErrorKind::Match, opcode::SET_INPUT_FOCUS)
                | (ErrorKind::Match, opcode::CONFIGURE_WINDOW)
                | (ErrorKind::Drawable, opcode::POLY_TEXT8)
                | (ErrorKind::Drawable, opcode::POLY_FILL_RECTANGLE)
                | (ErrorKind::Drawable, opcode::POLY_SEGMENT)
                | (ErrorKind::Drawable, opcode::COPY_AREA)
                | (ErrorKind::Access, opcode::GRAB_BUTTON)
                | (ErrorKind::Access, opcode::GRAB_KEY)
        );
        if !benign {
            error!(
                request_code = error.major_opcode,
                error_code = error.error_code,
                "unexpected X error"
            );
        }
    }

    fn on_map_request(&mut self, event: MapRequestEvent) -> WmResult<()> {
        let Ok(attrs) = self.connection.get_window_attributes(event.window)?.reply() else {
            return Ok(());
        };
        if attrs.override_redirect {
            return Ok(());
        }
        if !self.clients.contains_key(&event.window) {
            self.manage(event.window)?;
        }
        Ok(())
    }

    fn on_unmap_notify(&mut self, event: UnmapNotifyEvent) -> WmResult<()> {
        if self.clients.contains_key(&event.window) {
            let synthetic = event.response_type & 0x80 != 0;
            if synthetic {
                self.set_client_state(event.window, WITHDRAWN_STATE)?;
            } else {
                self.unmanage(event.window, false)?;
            }
        }
        Ok(())
    }

    fn on_destroy_notify(&mut self, event: DestroyNotifyEvent) -> WmResult<()> {
        if self.clients.contains_key(&event.window) {
            self.unmanage(event.window, true)?;
        }
        Ok(())
    }

    fn on_configure_request(&mut self, event: ConfigureRequestEvent) -> WmResult<()> {
        if self.clients.contains_key(&event.window) {
            let has_arrange = self.monitors[self.selected_monitor]
                .current_layout()
                .has_arrange();
            let is_floating = self.clients[&event.window].is_floating;

            if event.value_mask.contains(ConfigWindow::BORDER_WIDTH) {
                if let Some(client) = self.clients.get_mut(&event.window) {
                    client.border_width = event.border_width as i32;
                }
            } else if is_floating || !has_arrange {
                let monitor_index = self.clients[&event.window].monitor;
                let (mx, my, mw, mh) = {
                    let monitor = &self.monitors[monitor_index];
                    (monitor.mx, monitor.my, monitor.mw, monitor.mh)
                };
                let client = self.clients.get_mut(&event.window).expect("checked above");

                if event.value_mask.contains(ConfigWindow::X) {
                    client.old_x = client.x;
                    client.x = mx + event.x as i32;
                }
                if event.value_mask.contains(ConfigWindow::Y) {
                    client.old_y = client.y;
                    client.y = my + event.y as i32;
                }
                if event.value_mask.contains(ConfigWindow::WIDTH) {
                    client.old_w = client.w;
                    client.w = event.width as i32;
                }
                if event.value_mask.contains(ConfigWindow::HEIGHT) {
                    client.old_h = client.h;
                    client.h = event.height as i32;
                }
                // Re-center floating windows pushed past the monitor.
                if client.x + client.w > mx + mw && client.is_floating {
                    client.x = mx + (mw / 2 - client.total_width() / 2);
                }
                if client.y + client.h > my + mh && client.is_floating {
                    client.y = my + (mh / 2 - client.total_height() / 2);
                }

                let moved = event.value_mask.contains(ConfigWindow::X)
                    || event.value_mask.contains(ConfigWindow::Y);
                let resized = event.value_mask.contains(ConfigWindow::WIDTH)
                    || event.value_mask.contains(ConfigWindow::HEIGHT);
                if moved && !resized {
                    self.send_configure_notify(event.window)?;
                }
                if self.is_visible(event.window) {
                    let client = &self.clients[&event.window];
                    let (x, y, w, h) = (client.x, client.y, client.w, client.h);
                    self.connection.configure_window(
                        event.window,
                        &ConfigureWindowAux::new()
                            .x(x)
                            .y(y)
                            .width(w as u32)
                            .height(h as u32),
                    )?;
                }
            } else {
                // Tiled clients under an active arrangement only get a
                // synthetic acknowledgment.
                self.send_configure_notify(event.window)?;
            }
        } else {
            // Unmanaged windows get their request honored verbatim.
            let mut aux = ConfigureWindowAux::new();
            if event.value_mask.contains(ConfigWindow::X) {
                aux = aux.x(event.x as i32);
            }
            if event.value_mask.contains(ConfigWindow::Y) {
                aux = aux.y(event.y as i32);
            }
            if event.value_mask.contains(ConfigWindow::WIDTH) {
                aux = aux.width(event.width as u32);
            }
            if event.value_mask.contains(ConfigWindow::HEIGHT) {
                aux = aux.height(event.height as u32);
            }
            if event.value_mask.contains(ConfigWindow::BORDER_WIDTH) {
                aux = aux.border_width(event.border_width as u32);
            }
            if event.value_mask.contains(ConfigWindow::SIBLING) {
                aux = aux.sibling(event.sibling);
            }
            if event.value_mask.contains(ConfigWindow::STACK_MODE) {
                aux = aux.stack_mode(event.stack_mode);
            }
            self.connection.configure_window(event.window, &aux)?;
        }
        self.connection.flush()?;
        Ok(())
    }

    fn on_configure_notify(&mut self, event: ConfigureNotifyEvent) -> WmResult<()> {
        if event.window != self.root {
            return Ok(());
        }
        let size_changed =
            self.screen_width != event.width as i32 || self.screen_height != event.height as i32;
        self.screen_width = event.width as i32;
        self.screen_height = event.height as i32;

        if self.update_geometry()? || size_changed {
            self.reposition_bars()?;
            let fullscreen: Vec<Window> = self
                .clients
                .values()
                .filter(|c| c.is_fullscreen)
                .map(|c| c.win)
                .collect();
            for win in fullscreen {
                let monitor_index = self.clients[&win].monitor;
                let (mx, my, mw, mh) = {
                    let m = &self.monitors[monitor_index];
                    (m.mx, m.my, m.mw, m.mh)
                };
                self.resize_client(win, mx, my, mw, mh)?;
            }
            self.focus(None)?;
            self.arrange(None)?;
        }
        Ok(())
    }

    fn on_property_notify(&mut self, event: PropertyNotifyEvent) -> WmResult<()> {
        if event.window == self.root && event.atom == Atom::from(AtomEnum::WM_NAME) {
            self.update_status()?;
            return Ok(());
        }
        if event.state == Property::DELETE || !self.clients.contains_key(&event.window) {
            return Ok(());
        }

        if event.atom == Atom::from(AtomEnum::WM_TRANSIENT_FOR) {
            let is_floating = self.clients[&event.window].is_floating;
            if !is_floating
                && let Some(parent) = self.transient_parent(event.window)
                && self.clients.contains_key(&parent)
            {
                let monitor_index = {
                    let client = self.clients.get_mut(&event.window).expect("checked above");
                    client.is_floating = true;
                    client.monitor
                };
                self.arrange(Some(monitor_index))?;
            }
        } else if event.atom == Atom::from(AtomEnum::WM_NORMAL_HINTS) {
            if let Some(client) = self.clients.get_mut(&event.window) {
                client.hints_valid = false;
            }
        } else if event.atom == Atom::from(AtomEnum::WM_HINTS) {
            self.update_wm_hints(event.window)?;
            self.draw_bars()?;
        }

        if event.atom == Atom::from(AtomEnum::WM_NAME) || event.atom == self.atoms.net_wm_name {
            self.update_title(event.window)?;
            let monitor_index = self.clients[&event.window].monitor;
            if self.monitors[monitor_index].sel == Some(event.window) {
                self.draw_bar(monitor_index)?;
            }
        }
        if event.atom == self.atoms.net_wm_window_type {
            self.update_window_type(event.window)?;
        }
        Ok(())
    }

    fn on_client_message(&mut self, event: ClientMessageEvent) -> WmResult<()> {
        if !self.clients.contains_key(&event.window) {
            return Ok(());
        }
        if event.type_ == self.atoms.net_wm_state {
            let data = event.data.as_data32();
            if data[1] == self.atoms.net_wm_state_fullscreen
                || data[2] == self.atoms.net_wm_state_fullscreen
            {
                let is_fullscreen = self.clients[&event.window].is_fullscreen;
                // 1 = _NET_WM_STATE_ADD, 2 = _NET_WM_STATE_TOGGLE
                let fullscreen = data[0] == 1 || (data[0] == 2 && !is_fullscreen);
                self.set_fullscreen(event.window, fullscreen)?;
            }
        } else if event.type_ == self.atoms.net_active_window {
            let selected = self.monitors[self.selected_monitor].sel;
            let is_urgent = self.clients[&event.window].is_urgent;
            if selected != Some(event.window) && !is_urgent {
                self.set_urgent(event.window, true)?;
            }
        }
        Ok(())
    }

    fn on_button_press(&mut self, event: ButtonPressEvent) -> WmResult<()> {
        let mut click = ClickTarget::RootWin;
        let mut clicked_tag: Option<usize> = None;

        // A click focuses the monitor it lands on.
        let monitor_index = self.window_to_monitor(event.event)?;
        if monitor_index != self.selected_monitor {
            let selected = self.monitors[self.selected_monitor].sel;
            if let Some(win) = selected {
                self.unfocus(win, true)?;
            }
            self.selected_monitor = monitor_index;
            self.focus(None)?;
        }

        if event.event == self.monitors[self.selected_monitor].bar_win {
            if let Some(bar) = self.bar_for(event.event) {
                let (target, tag) = bar.click_target(event.event_x as i32);
                click = target;
                clicked_tag = tag;
            }
        } else if self.clients.contains_key(&event.event) {
            self.focus(Some(event.event))?;
            self.restack(self.selected_monitor)?;
            self.connection
                .allow_events(Allow::REPLAY_POINTER, event.time)?;
            click = ClickTarget::ClientWin;
        }

        let binding = handlers::find_button(
            &self.config.buttons,
            click,
            event.detail,
            u16::from(event.state),
            self.numlock_mask,
        )
        .cloned();
        if let Some(binding) = binding {
            // Tag-bar bindings carrying the sentinel argument act on the
            // clicked tag instead.
            let arg = match (click, clicked_tag, &binding.arg) {
                (ClickTarget::TagBar, Some(tag), Arg::UInt(0)) => Arg::UInt(1 << tag),
                _ => binding.arg.clone(),
            };
            self.run_action(binding.action, &arg)?;
        }
        Ok(())
    }

    fn on_key_press(&mut self, event: KeyPressEvent) -> WmResult<()> {
        let Some(keysym) = self.keyboard_mapping.keysym(event.detail) else {
            return Ok(());
        };
        let binding = handlers::find_key(
            &self.config.keys,
            keysym,
            u16::from(event.state),
            self.numlock_mask,
        )
        .cloned();
        if let Some(binding) = binding {
            self.run_action(binding.action, &binding.arg)?;
        }
        Ok(())
    }

    fn on_enter_notify(&mut self, event: EnterNotifyEvent) -> WmResult<()> {
        if (event.mode != NotifyMode::NORMAL || event.detail == NotifyDetail::INFERIOR)
            && event.event != self.root
        {
            return Ok(());
        }
        let client_monitor = self.clients.get(&event.event).map(|c| c.monitor);
        let monitor_index = match client_monitor {
            Some(index) => index,
            None => self.window_to_monitor(event.event)?,
        };
        if monitor_index != self.selected_monitor {
            if let Some(selected) = self.monitors[self.selected_monitor].sel {
                self.unfocus(selected, true)?;
            }
            self.selected_monitor = monitor_index;
        } else if client_monitor.is_none()
            || self.monitors[self.selected_monitor].sel == Some(event.event)
        {
            return Ok(());
        }
        let target = self.clients.contains_key(&event.event).then_some(event.event);
        self.focus(target)?;
        Ok(())
    }

    fn on_motion_notify(&mut self, event: MotionNotifyEvent) -> WmResult<()> {
        if event.event != self.root {
            return Ok(());
        }
        let monitor_index =
            self.rect_to_monitor(event.root_x as i32, event.root_y as i32, 1, 1);
        if Some(monitor_index) != self.motion_monitor && self.motion_monitor.is_some() {
            if let Some(selected) = self.monitors[self.selected_monitor].sel {
                self.unfocus(selected, true)?;
            }
            self.selected_monitor = monitor_index;
            self.focus(None)?;
        }
        self.motion_monitor = Some(monitor_index);
        Ok(())
    }

    /// Some clients acquire focus on their own; hand it back to the
    /// selection.
    fn on_focus_in(&mut self, event: FocusInEvent) -> WmResult<()> {
        if let Some(selected) = self.monitors[self.selected_monitor].sel
            && event.event != selected
        {
            self.set_focus(selected)?;
        }
        Ok(())
    }

    fn on_mapping_notify(&mut self, event: MappingNotifyEvent) -> WmResult<()> {
        if event.request == Mapping::KEYBOARD {
            self.keyboard_mapping = KeyboardMapping::fetch(&self.connection)?;
            self.grab_keys()?;
        }
        Ok(())
    }

    fn on_expose(&mut self, event: ExposeEvent) -> WmResult<()> {
        if event.count == 0 {
            if let Some(index) = self
                .monitors
                .iter()
                .position(|m| m.bar_win == event.window)
            {
                self.draw_bar(index)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Actions

    fn run_action(&mut self, action: KeyAction, arg: &Arg) -> WmResult<()> {
        match action {
            KeyAction::Spawn => self.spawn(arg),
            KeyAction::KillClient => self.kill_client()?,
            KeyAction::FocusStack => {
                if let Arg::Int(direction) = arg {
                    self.focus_stack(*direction)?;
                }
            }
            KeyAction::FocusMonitor => {
                if let Arg::Int(direction) = arg {
                    self.focus_monitor(*direction)?;
                }
            }
            KeyAction::TagMonitor => {
                if let Arg::Int(direction) = arg {
                    self.tag_monitor(*direction)?;
                }
            }
            KeyAction::IncNMaster => {
                if let Arg::Int(delta) = arg {
                    self.inc_nmaster(*delta)?;
                }
            }
            KeyAction::SetMFact => {
                if let Arg::Float(factor) = arg {
                    self.set_mfact(*factor)?;
                }
            }
            KeyAction::Zoom => self.zoom()?,
            KeyAction::View => {
                if let Arg::UInt(mask) = arg {
                    self.view(*mask)?;
                }
            }
            KeyAction::ToggleView => {
                if let Arg::UInt(mask) = arg {
                    self.toggle_view(*mask)?;
                }
            }
            KeyAction::Tag => {
                if let Arg::UInt(mask) = arg {
                    self.tag(*mask)?;
                }
            }
            KeyAction::ToggleTag => {
                if let Arg::UInt(mask) = arg {
                    self.toggle_tag(*mask)?;
                }
            }
            KeyAction::SetLayout => {
                let layout = match arg {
                    Arg::Layout(index) => self.config.layouts.get(*index).copied(),
                    _ => None,
                };
                self.set_layout(layout)?;
            }
            KeyAction::ToggleFloating => self.toggle_floating()?,
            KeyAction::ToggleBar => self.toggle_bar()?,
            KeyAction::ToggleFullScreen => {
                if let Some(selected) = self.monitors[self.selected_monitor].sel {
                    let fullscreen = self.clients[&selected].is_fullscreen;
                    self.set_fullscreen(selected, !fullscreen)?;
                }
            }
            KeyAction::MoveMouse => self.move_mouse()?,
            KeyAction::ResizeMouse => self.resize_mouse()?,
            KeyAction::Quit => self.running = false,
            KeyAction::Restart => {
                self.running = false;
                self.restart = true;
            }
        }
        Ok(())
    }

    fn spawn(&self, arg: &Arg) {
        let argv: Vec<String> = match arg {
            Arg::Str(program) => vec![program.clone()],
            Arg::List(items) if !items.is_empty() => items.clone(),
            _ => return,
        };
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]).process_group(0);
        match command.spawn() {
            Ok(_) => debug!(program = %argv[0], "spawned"),
            Err(err) => warn!(program = %argv[0], %err, "spawn failed"),
        }
    }

    fn kill_client(&mut self) -> WmResult<()> {
        let Some(selected) = self.monitors[self.selected_monitor].sel else {
            return Ok(());
        };
        if !self.send_protocol(selected, self.atoms.wm_delete_window)? {
            self.connection.grab_server()?;
            self.connection.set_close_down_mode(CloseDown::DESTROY_ALL)?;
            self.connection.kill_client(selected)?;
            self.connection.flush()?;
            self.connection.ungrab_server()?;
        }
        Ok(())
    }

    fn focus_stack(&mut self, direction: i32) -> WmResult<()> {
        let monitor = &self.monitors[self.selected_monitor];
        let Some(selected) = monitor.sel else {
            return Ok(());
        };
        if self.clients[&selected].is_fullscreen && self.config.lock_fullscreen {
            return Ok(());
        }

        let visible: Vec<Window> = monitor.visible(&self.clients).collect();
        let Some(position) = visible.iter().position(|&w| w == selected) else {
            return Ok(());
        };
        let next = if direction > 0 {
            visible[(position + 1) % visible.len()]
        } else {
            visible[(position + visible.len() - 1) % visible.len()]
        };
        if next != selected {
            self.focus(Some(next))?;
            self.restack(self.selected_monitor)?;
        }
        Ok(())
    }

    fn direction_to_monitor(&self, direction: i32) -> usize {
        let count = self.monitors.len();
        if direction > 0 {
            (self.selected_monitor + 1) % count
        } else {
            (self.selected_monitor + count - 1) % count
        }
    }

    fn focus_monitor(&mut self, direction: i32) -> WmResult<()> {
        if self.monitors.len() < 2 {
            return Ok(());
        }
        let target = self.direction_to_monitor(direction);
        if target == self.selected_monitor {
            return Ok(());
        }
        if let Some(selected) = self.monitors[self.selected_monitor].sel {
            self.unfocus(selected, false)?;
        }
        self.selected_monitor = target;
        self.focus(None)?;
        Ok(())
    }

    fn tag_monitor(&mut self, direction: i32) -> WmResult<()> {
        if self.monitors.len() < 2 {
            return Ok(());
        }
        if let Some(selected) = self.monitors[self.selected_monitor].sel {
            self.send_monitor(selected, self.direction_to_monitor(direction))?;
        }
        Ok(())
    }

    fn inc_nmaster(&mut self, delta: i32) -> WmResult<()> {
        let monitor = &mut self.monitors[self.selected_monitor];
        monitor.nmaster = (monitor.nmaster + delta).max(0);
        self.arrange(Some(self.selected_monitor))
    }

    fn set_mfact(&mut self, factor: f32) -> WmResult<()> {
        let monitor = &mut self.monitors[self.selected_monitor];
        if !monitor.current_layout().has_arrange() {
            return Ok(());
        }
        if monitor.adjust_mfact(factor) {
            self.arrange(Some(self.selected_monitor))?;
        }
        Ok(())
    }

    /// Promote the selected tiled client to master; promoting the
    /// current master promotes the next tiled client instead.
    fn zoom(&mut self) -> WmResult<()> {
        let monitor = &self.monitors[self.selected_monitor];
        let Some(mut win) = monitor.sel else {
            return Ok(());
        };
        if !monitor.current_layout().has_arrange() || self.clients[&win].is_floating {
            return Ok(());
        }
        if monitor.tiled(&self.clients).next() == Some(win) {
            let Some(next) = monitor.tiled(&self.clients).nth(1) else {
                return Ok(());
            };
            win = next;
        }
        let monitor = &mut self.monitors[self.selected_monitor];
        monitor.detach(win);
        monitor.attach(win);
        self.focus(Some(win))?;
        self.arrange(Some(self.selected_monitor))
    }

    fn view(&mut self, mask: TagMask) -> WmResult<()> {
        let all_tags = all_tags_mask(self.config.tags.len());
        let monitor = &mut self.monitors[self.selected_monitor];
        if mask & all_tags == monitor.selected_tags() {
            return Ok(());
        }
        monitor.seltags ^= 1;
        if mask & all_tags != 0 {
            monitor.tagset[monitor.seltags] = mask & all_tags;
        }
        self.focus(None)?;
        self.arrange(Some(self.selected_monitor))
    }

    fn toggle_view(&mut self, mask: TagMask) -> WmResult<()> {
        let all_tags = all_tags_mask(self.config.tags.len());
        let monitor = &mut self.monitors[self.selected_monitor];
        let new_tagset = monitor.selected_tags() ^ (mask & all_tags);
        if new_tagset == 0 {
            return Ok(());
        }
        monitor.tagset[monitor.seltags] = new_tagset;
        self.focus(None)?;
        self.arrange(Some(self.selected_monitor))
    }

    fn tag(&mut self, mask: TagMask) -> WmResult<()> {
        let all_tags = all_tags_mask(self.config.tags.len());
        let Some(selected) = self.monitors[self.selected_monitor].sel else {
            return Ok(());
        };
        if mask & all_tags == 0 {
            return Ok(());
        }
        if let Some(client) = self.clients.get_mut(&selected) {
            client.tags = mask & all_tags;
        }
        self.focus(None)?;
        self.arrange(Some(self.selected_monitor))
    }

    fn toggle_tag(&mut self, mask: TagMask) -> WmResult<()> {
        let all_tags = all_tags_mask(self.config.tags.len());
        let Some(selected) = self.monitors[self.selected_monitor].sel else {
            return Ok(());
        };
        let new_tags = self.clients[&selected].tags ^ (mask & all_tags);
        if new_tags == 0 {
            return Ok(());
        }
        if let Some(client) = self.clients.get_mut(&selected) {
            client.tags = new_tags;
        }
        self.focus(None)?;
        self.arrange(Some(self.selected_monitor))
    }

    /// Toggle the layout slot, or install the given layout in the
    /// current slot. Re-arranges only when a client is selected.
    fn set_layout(&mut self, layout: Option<LayoutKind>) -> WmResult<()> {
        let monitor = &mut self.monitors[self.selected_monitor];
        match layout {
            None => monitor.sellt ^= 1,
            Some(layout) => monitor.layouts[monitor.sellt] = layout,
        }
        monitor.layout_symbol = monitor.current_layout().symbol().to_string();
        if monitor.sel.is_some() {
            self.arrange(Some(self.selected_monitor))?;
        } else {
            self.draw_bar(self.selected_monitor)?;
        }
        Ok(())
    }

    fn toggle_floating(&mut self) -> WmResult<()> {
        let Some(selected) = self.monitors[self.selected_monitor].sel else {
            return Ok(());
        };
        if self.clients[&selected].is_fullscreen {
            return Ok(());
        }
        let (floating, x, y, w, h) = {
            let client = self.clients.get_mut(&selected).expect("checked above");
            client.is_floating = !client.is_floating || client.is_fixed;
            (client.is_floating, client.x, client.y, client.w, client.h)
        };
        if floating {
            self.resize(selected, x, y, w, h, false)?;
        }
        self.arrange(Some(self.selected_monitor))
    }

    fn toggle_bar(&mut self) -> WmResult<()> {
        let bar_height = self.bar_height;
        let monitor = &mut self.monitors[self.selected_monitor];
        monitor.show_bar = !monitor.show_bar;
        monitor.update_bar_pos(bar_height);
        let (bar_win, wx, bar_y, ww) = (monitor.bar_win, monitor.wx, monitor.bar_y, monitor.ww);
        if let Some(bar) = self.bars.iter_mut().find(|b| b.window() == bar_win) {
            bar.reposition(&self.connection, wx, bar_y, ww)?;
        }
        self.arrange(Some(self.selected_monitor))
    }

    // ------------------------------------------------------------------
    // Focus and stacking

    /// Focus the given client, or the first visible client in the
    /// selected monitor's focus history when none (or an invisible one)
    /// is given.
    fn focus(&mut self, win: Option<Window>) -> WmResult<()> {
        let mut target = win;
        if target.is_none_or(|w| !self.is_visible(w)) {
            let monitor = &self.monitors[self.selected_monitor];
            let tags = monitor.selected_tags();
            target = monitor
                .stack
                .iter()
                .copied()
                .find(|w| self.clients.get(w).is_some_and(|c| c.is_visible_on(tags)));
        }

        let previous = self.monitors[self.selected_monitor].sel;
        if previous.is_some() && previous != target {
            self.unfocus(previous.expect("checked above"), false)?;
        }

        match target {
            Some(win) => {
                let monitor_index = self.clients[&win].monitor;
                if monitor_index != self.selected_monitor {
                    self.selected_monitor = monitor_index;
                }
                if self.clients[&win].is_urgent {
                    self.set_urgent(win, false)?;
                }
                // Move to the head of the focus history.
                let monitor = &mut self.monitors[monitor_index];
                monitor.stack.retain(|&w| w != win);
                monitor.attach_stack(win);

                self.grab_buttons(win, true)?;
                self.connection.change_window_attributes(
                    win,
                    &ChangeWindowAttributesAux::new()
                        .border_pixel(self.config.scheme_selected.border),
                )?;
                self.set_focus(win)?;
                self.monitors[self.selected_monitor].sel = Some(win);
            }
            None => {
                self.connection.set_input_focus(
                    InputFocus::POINTER_ROOT,
                    self.root,
                    x11rb::CURRENT_TIME,
                )?;
                self.connection
                    .delete_property(self.root, self.atoms.net_active_window)?;
                self.monitors[self.selected_monitor].sel = None;
            }
        }
        self.draw_bars()?;
        Ok(())
    }

    fn unfocus(&mut self, win: Window, refocus_root: bool) -> WmResult<()> {
        if !self.clients.contains_key(&win) {
            return Ok(());
        }
        self.grab_buttons(win, false)?;
        self.connection.change_window_attributes(
            win,
            &ChangeWindowAttributesAux::new().border_pixel(self.config.scheme_normal.border),
        )?;
        if refocus_root {
            self.connection.set_input_focus(
                InputFocus::POINTER_ROOT,
                self.root,
                x11rb::CURRENT_TIME,
            )?;
            self.connection
                .delete_property(self.root, self.atoms.net_active_window)?;
        }
        Ok(())
    }

    fn set_focus(&mut self, win: Window) -> WmResult<()> {
        if !self.clients[&win].never_focus {
            self.connection
                .set_input_focus(InputFocus::POINTER_ROOT, win, x11rb::CURRENT_TIME)?;
            self.connection.change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms.net_active_window,
                AtomEnum::WINDOW,
                &[win],
            )?;
        }
        self.send_protocol(win, self.atoms.wm_take_focus)?;
        Ok(())
    }

    /// Rebuild the z-order on one monitor: floating selection on top,
    /// tiled clients stacked below the bar in focus-history order.
    fn restack(&mut self, monitor_index: usize) -> WmResult<()> {
        self.draw_bar(monitor_index)?;
        let monitor = &self.monitors[monitor_index];
        let Some(selected) = monitor.sel else {
            return Ok(());
        };
        if self.clients[&selected].is_floating || !monitor.current_layout().has_arrange() {
            self.connection.configure_window(
                selected,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )?;
        }
        if monitor.current_layout().has_arrange() {
            let tags = monitor.selected_tags();
            let mut sibling = monitor.bar_win;
            let stacked: Vec<Window> = monitor
                .stack
                .iter()
                .copied()
                .filter(|w| {
                    self.clients
                        .get(w)
                        .is_some_and(|c| !c.is_floating && c.is_visible_on(tags))
                })
                .collect();
            for win in stacked {
                self.connection.configure_window(
                    win,
                    &ConfigureWindowAux::new()
                        .sibling(sibling)
                        .stack_mode(StackMode::BELOW),
                )?;
                sibling = win;
            }
        }
        self.connection.flush()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Arrangement

    fn arrange(&mut self, monitor_index: Option<usize>) -> WmResult<()> {
        match monitor_index {
            Some(index) => {
                self.show_hide(index)?;
                self.arrange_monitor(index)?;
                self.restack(index)?;
            }
            None => {
                for index in 0..self.monitors.len() {
                    self.show_hide(index)?;
                }
                for index in 0..self.monitors.len() {
                    self.arrange_monitor(index)?;
                }
            }
        }
        Ok(())
    }

    /// Move visible clients into place top-down and park hidden ones
    /// offscreen bottom-up, in focus-history order.
    fn show_hide(&mut self, monitor_index: usize) -> WmResult<()> {
        let monitor = &self.monitors[monitor_index];
        let tags = monitor.selected_tags();
        let has_arrange = monitor.current_layout().has_arrange();
        let stack = monitor.stack.clone();

        let mut hidden = Vec::new();
        for win in stack {
            let Some(client) = self.clients.get(&win) else {
                continue;
            };
            if client.is_visible_on(tags) {
                let (x, y, w, h) = (client.x, client.y, client.w, client.h);
                let needs_float_resize =
                    (!has_arrange || client.is_floating) && !client.is_fullscreen;
                self.connection
                    .configure_window(win, &ConfigureWindowAux::new().x(x).y(y))?;
                if needs_float_resize {
                    self.resize(win, x, y, w, h, false)?;
                }
            } else {
                hidden.push(win);
            }
        }
        for win in hidden.into_iter().rev() {
            let client = &self.clients[&win];
            let offscreen_x = -2 * client.total_width();
            let y = client.y;
            self.connection
                .configure_window(win, &ConfigureWindowAux::new().x(offscreen_x).y(y))?;
        }
        Ok(())
    }

    fn arrange_monitor(&mut self, monitor_index: usize) -> WmResult<()> {
        let monitor = &self.monitors[monitor_index];
        let layout = monitor.current_layout();

        let visible_count = monitor.visible(&self.clients).count();
        let symbol = if layout == LayoutKind::Monocle && visible_count > 0 {
            monocle::symbol(visible_count)
        } else {
            layout.symbol().to_string()
        };
        self.monitors[monitor_index].layout_symbol = symbol;

        if !layout.has_arrange() {
            return Ok(());
        }

        let monitor = &self.monitors[monitor_index];
        let tiled: Vec<Window> = monitor.tiled(&self.clients).collect();
        let border_widths: Vec<i32> = tiled
            .iter()
            .map(|w| self.clients[w].border_width)
            .collect();
        let rects = layout
            .arrange(
                monitor.window_area(),
                monitor.nmaster,
                monitor.mfact,
                &border_widths,
            )
            .unwrap_or_default();

        for (win, rect) in tiled.into_iter().zip(rects) {
            self.resize(win, rect.x, rect.y, rect.w, rect.h, false)?;
        }
        Ok(())
    }

    /// Apply size constraints, then issue the geometry change only when
    /// something actually changed.
    fn resize(
        &mut self,
        win: Window,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        interact: bool,
    ) -> WmResult<()> {
        if let Some((x, y, w, h)) = self.apply_size_hints(win, x, y, w, h, interact)? {
            self.resize_client(win, x, y, w, h)?;
        }
        Ok(())
    }

    fn resize_client(&mut self, win: Window, x: i32, y: i32, w: i32, h: i32) -> WmResult<()> {
        let border_width = {
            let client = self.clients.get_mut(&win).expect("resize of unmanaged window");
            client.apply_geometry(x, y, w, h);
            client.border_width
        };
        self.connection.configure_window(
            win,
            &ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(w as u32)
                .height(h as u32)
                .border_width(border_width as u32),
        )?;
        self.send_configure_notify(win)?;
        self.connection.flush()?;
        Ok(())
    }

    /// Clamp a candidate geometry to the screen (interactive) or the
    /// monitor window area, then apply WM_NORMAL_HINTS constraints for
    /// floating clients (or all clients when resize_hints is set).
    /// Returns `None` when the result equals the current geometry.
    fn apply_size_hints(
        &mut self,
        win: Window,
        mut x: i32,
        mut y: i32,
        mut w: i32,
        mut h: i32,
        interact: bool,
    ) -> WmResult<Option<(i32, i32, i32, i32)>> {
        w = w.max(1);
        h = h.max(1);

        let (monitor_index, total_w, total_h, border_width, is_floating) = {
            let client = &self.clients[&win];
            (
                client.monitor,
                client.total_width(),
                client.total_height(),
                client.border_width,
                client.is_floating,
            )
        };

        if interact {
            if x > self.screen_width {
                x = self.screen_width - total_w;
            }
            if y > self.screen_height {
                y = self.screen_height - total_h;
            }
            if x + w + 2 * border_width < 0 {
                x = 0;
            }
            if y + h + 2 * border_width < 0 {
                y = 0;
            }
        } else {
            let monitor = &self.monitors[monitor_index];
            if x >= monitor.wx + monitor.ww {
                x = monitor.wx + monitor.ww - total_w;
            }
            if y >= monitor.wy + monitor.wh {
                y = monitor.wy + monitor.wh - total_h;
            }
            if x + w + 2 * border_width <= monitor.wx {
                x = monitor.wx;
            }
            if y + h + 2 * border_width <= monitor.wy {
                y = monitor.wy;
            }
        }
        if h < self.bar_height {
            h = self.bar_height;
        }
        if w < self.bar_height {
            w = self.bar_height;
        }

        let has_arrange = self.monitors[monitor_index].current_layout().has_arrange();
        if self.config.resize_hints || is_floating || !has_arrange {
            if !self.clients[&win].hints_valid {
                self.update_size_hints(win)?;
            }
            let client = &self.clients[&win];
            let hints = NormalHints {
                base_w: client.base_w,
                base_h: client.base_h,
                inc_w: client.inc_w,
                inc_h: client.inc_h,
                max_w: client.max_w,
                max_h: client.max_h,
                min_w: client.min_w,
                min_h: client.min_h,
                min_aspect: client.min_aspect,
                max_aspect: client.max_aspect,
            };
            (w, h) = hints.constrain(w, h);
        }

        let client = &self.clients[&win];
        let changed = x != client.x || y != client.y || w != client.w || h != client.h;
        Ok(changed.then_some((x, y, w, h)))
    }

    // ------------------------------------------------------------------
    // Manage / unmanage

    fn manage(&mut self, win: Window) -> WmResult<()> {
        let geometry = self.connection.get_geometry(win)?.reply()?;
        let transient_parent = self
            .transient_parent(win)
            .filter(|parent| self.clients.contains_key(parent));

        let mut client = Client::new(win, self.selected_monitor, 0);
        client.x = geometry.x as i32;
        client.y = geometry.y as i32;
        client.w = geometry.width as i32;
        client.h = geometry.height as i32;
        client.old_x = client.x;
        client.old_y = client.y;
        client.old_w = client.w;
        client.old_h = client.h;
        client.old_border_width = geometry.border_width as i32;
        client.border_width = self.config.border_width as i32;
        self.clients.insert(win, client);

        self.update_title(win)?;

        if let Some(parent) = transient_parent {
            let (monitor, tags) = {
                let parent = &self.clients[&parent];
                (parent.monitor, parent.tags)
            };
            let client = self.clients.get_mut(&win).expect("inserted above");
            client.monitor = monitor;
            client.tags = tags;
        } else {
            let (instance, class) = self.window_class_instance(win);
            let title = self.clients[&win].name.clone();
            let placement = apply_rules(
                &class,
                &instance,
                &title,
                &self.config.rules,
                self.monitors.len(),
                self.selected_monitor,
                all_tags_mask(self.config.tags.len()),
                |monitor| self.monitors[monitor].selected_tags(),
            );
            let client = self.clients.get_mut(&win).expect("inserted above");
            client.tags = placement.tags;
            client.is_floating = placement.is_floating;
            client.monitor = placement.monitor;
        }

        // Clamp into the owning monitor.
        let monitor_index = self.clients[&win].monitor;
        {
            let (mx, my, mw, mh, wx, ww, bar_y) = {
                let monitor = &self.monitors[monitor_index];
                (
                    monitor.mx, monitor.my, monitor.mw, monitor.mh, monitor.wx, monitor.ww,
                    monitor.bar_y,
                )
            };
            let bar_height = self.bar_height;
            let client = self.clients.get_mut(&win).expect("inserted above");
            if client.x + client.total_width() > mx + mw {
                client.x = mx + mw - client.total_width();
            }
            if client.y + client.total_height() > my + mh {
                client.y = my + mh - client.total_height();
            }
            client.x = client.x.max(mx);
            // Keep the title area reachable when the bar is on top.
            let covers_bar = bar_y == my
                && client.x + client.w / 2 >= wx
                && client.x + client.w / 2 < wx + ww;
            client.y = client.y.max(if covers_bar { bar_height } else { my });
        }

        self.connection.configure_window(
            win,
            &ConfigureWindowAux::new().border_width(self.config.border_width),
        )?;
        self.connection.change_window_attributes(
            win,
            &ChangeWindowAttributesAux::new().border_pixel(self.config.scheme_normal.border),
        )?;
        // Propagates the border width even when the size does not change.
        self.send_configure_notify(win)?;
        self.update_window_type(win)?;
        self.update_size_hints(win)?;
        self.update_wm_hints(win)?;
        self.connection.change_window_attributes(
            win,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::ENTER_WINDOW
                    | EventMask::FOCUS_CHANGE
                    | EventMask::PROPERTY_CHANGE
                    | EventMask::STRUCTURE_NOTIFY,
            ),
        )?;
        self.grab_buttons(win, false)?;

        {
            let is_transient = transient_parent.is_some();
            let client = self.clients.get_mut(&win).expect("inserted above");
            if !client.is_floating {
                client.is_floating = is_transient || client.is_fixed;
                client.old_state = client.is_floating;
            }
        }
        if self.clients[&win].is_floating {
            self.connection.configure_window(
                win,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )?;
        }

        let monitor = &mut self.monitors[monitor_index];
        monitor.attach(win);
        monitor.attach_stack(win);

        self.connection.change_property32(
            PropMode::APPEND,
            self.root,
            self.atoms.net_client_list,
            AtomEnum::WINDOW,
            &[win],
        )?;
        // Some clients need an initial move far offscreen before the
        // first arrange.
        {
            let client = &self.clients[&win];
            self.connection.configure_window(
                win,
                &ConfigureWindowAux::new()
                    .x(client.x + 2 * self.screen_width)
                    .y(client.y)
                    .width(client.w as u32)
                    .height(client.h as u32),
            )?;
        }
        self.set_client_state(win, NORMAL_STATE)?;

        if monitor_index == self.selected_monitor
            && let Some(selected) = self.monitors[self.selected_monitor].sel
        {
            self.unfocus(selected, false)?;
        }
        self.monitors[monitor_index].sel = Some(win);
        self.arrange(Some(monitor_index))?;
        self.connection.map_window(win)?;
        self.focus(None)?;
        debug!(window = win, "managed");
        Ok(())
    }

    fn unmanage(&mut self, win: Window, destroyed: bool) -> WmResult<()> {
        let monitor_index = self.clients[&win].monitor;

        if !destroyed {
            // A concurrently dying window must not interleave other
            // clients' requests mid-sequence.
            let old_border_width = self.clients[&win].old_border_width;
            self.connection.grab_server()?;
            self.connection.configure_window(
                win,
                &ConfigureWindowAux::new().border_width(old_border_width as u32),
            )?;
            self.connection
                .ungrab_button(ButtonIndex::ANY, win, ModMask::ANY)?;
            self.set_client_state(win, WITHDRAWN_STATE)?;
            self.connection.flush()?;
            self.connection.ungrab_server()?;
        }

        let monitor = &mut self.monitors[monitor_index];
        monitor.detach(win);
        monitor.detach_stack(win, &self.clients);
        self.clients.remove(&win);

        self.focus(None)?;
        self.update_client_list()?;
        self.arrange(Some(monitor_index))?;
        debug!(window = win, destroyed, "unmanaged");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Interactive drags

    fn move_mouse(&mut self) -> WmResult<()> {
        let Some(win) = self.monitors[self.selected_monitor].sel else {
            return Ok(());
        };
        if self.clients[&win].is_fullscreen {
            return Ok(());
        }
        self.restack(self.selected_monitor)?;

        let status = self
            .connection
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                self.cursors.moving,
                x11rb::CURRENT_TIME,
            )?
            .reply()?
            .status;
        if status != GrabStatus::SUCCESS {
            return Ok(());
        }

        let pointer = self.connection.query_pointer(self.root)?.reply()?;
        let client = &self.clients[&win];
        self.drag = DragState::Moving {
            win,
            pointer_x: pointer.root_x as i32,
            pointer_y: pointer.root_y as i32,
            orig_x: client.x,
            orig_y: client.y,
        };
        self.run_drag(win)
    }

    fn resize_mouse(&mut self) -> WmResult<()> {
        let Some(win) = self.monitors[self.selected_monitor].sel else {
            return Ok(());
        };
        if self.clients[&win].is_fullscreen {
            return Ok(());
        }
        self.restack(self.selected_monitor)?;

        let (orig_x, orig_y, warp_x, warp_y) = {
            let client = &self.clients[&win];
            (
                client.x,
                client.y,
                (client.w + client.border_width - 1) as i16,
                (client.h + client.border_width - 1) as i16,
            )
        };
        let status = self
            .connection
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                self.cursors.resizing,
                x11rb::CURRENT_TIME,
            )?
            .reply()?
            .status;
        if status != GrabStatus::SUCCESS {
            return Ok(());
        }
        self.connection
            .warp_pointer(x11rb::NONE, win, 0, 0, 0, 0, warp_x, warp_y)?;

        self.drag = DragState::Resizing { win, orig_x, orig_y };
        self.run_drag(win)
    }

    /// The drag loop: pointer motion and the terminal button release are
    /// interpreted here, while configure-request, expose and map-request
    /// events go back through the regular dispatch so other windows keep
    /// responding.
    fn run_drag(&mut self, win: Window) -> WmResult<()> {
        let mut last_motion_time = 0u32;
        loop {
            let event = self.connection.wait_for_event()?;
            match event {
                Event::ConfigureRequest(_) | Event::Expose(_) | Event::MapRequest(_) => {
                    self.handle_event(event)?;
                }
                Event::MotionNotify(motion) => {
                    // ~60 Hz: closer events are dropped, not queued.
                    if motion.time.wrapping_sub(last_motion_time) <= 1000 / 60 {
                        continue;
                    }
                    last_motion_time = motion.time;
                    match self.drag {
                        DragState::Moving { .. } => self.drag_move_motion(&motion)?,
                        DragState::Resizing { .. } => self.drag_resize_motion(&motion)?,
                        DragState::Idle => break,
                    }
                }
                Event::ButtonRelease(_) => break,
                _ => {}
            }
        }
        self.drag = DragState::Idle;
        self.connection.ungrab_pointer(x11rb::CURRENT_TIME)?;

        // Dropping the window on another monitor re-owns it there.
        if self.clients.contains_key(&win) {
            let (x, y, w, h) = {
                let client = &self.clients[&win];
                (client.x, client.y, client.w, client.h)
            };
            let target = self.rect_to_monitor(x, y, w, h);
            if target != self.selected_monitor {
                self.send_monitor(win, target)?;
                self.selected_monitor = target;
                self.focus(None)?;
            }
        }
        Ok(())
    }

    fn drag_move_motion(&mut self, motion: &MotionNotifyEvent) -> WmResult<()> {
        let DragState::Moving { win, pointer_x, pointer_y, orig_x, orig_y } = self.drag else {
            return Ok(());
        };
        if !self.clients.contains_key(&win) {
            return Ok(());
        }

        let snap = self.config.snap as i32;
        let monitor = &self.monitors[self.selected_monitor];
        let (wx, wy, ww, wh) = (monitor.wx, monitor.wy, monitor.ww, monitor.wh);
        let has_arrange = monitor.current_layout().has_arrange();

        let mut new_x = orig_x + (motion.root_x as i32 - pointer_x);
        let mut new_y = orig_y + (motion.root_y as i32 - pointer_y);

        let (total_w, total_h, cur_x, cur_y, cur_w, cur_h, is_floating) = {
            let client = &self.clients[&win];
            (
                client.total_width(),
                client.total_height(),
                client.x,
                client.y,
                client.w,
                client.h,
                client.is_floating,
            )
        };

        if (wx - new_x).abs() < snap {
            new_x = wx;
        } else if ((wx + ww) - (new_x + total_w)).abs() < snap {
            new_x = wx + ww - total_w;
        }
        if (wy - new_y).abs() < snap {
            new_y = wy;
        } else if ((wy + wh) - (new_y + total_h)).abs() < snap {
            new_y = wy + wh - total_h;
        }

        // A far enough drag pulls a tile out of the grid.
        if !is_floating
            && has_arrange
            && ((new_x - cur_x).abs() > snap || (new_y - cur_y).abs() > snap)
        {
            self.toggle_floating()?;
        }

        if !has_arrange || self.clients[&win].is_floating {
            self.resize(win, new_x, new_y, cur_w, cur_h, true)?;
        }
        Ok(())
    }

    fn drag_resize_motion(&mut self, motion: &MotionNotifyEvent) -> WmResult<()> {
        let DragState::Resizing { win, orig_x, orig_y } = self.drag else {
            return Ok(());
        };
        if !self.clients.contains_key(&win) {
            return Ok(());
        }

        let snap = self.config.snap as i32;
        let (border_width, cur_x, cur_y, cur_w, cur_h, is_floating, client_monitor) = {
            let client = &self.clients[&win];
            (
                client.border_width,
                client.x,
                client.y,
                client.w,
                client.h,
                client.is_floating,
                client.monitor,
            )
        };
        let new_w = (motion.root_x as i32 - orig_x - 2 * border_width + 1).max(1);
        let new_h = (motion.root_y as i32 - orig_y - 2 * border_width + 1).max(1);

        let selected = &self.monitors[self.selected_monitor];
        let has_arrange = selected.current_layout().has_arrange();
        let client_area = self.monitors[client_monitor].window_area();
        let inside_selected = client_area.x + new_w >= selected.wx
            && client_area.x + new_w <= selected.wx + selected.ww
            && client_area.y + new_h >= selected.wy
            && client_area.y + new_h <= selected.wy + selected.wh;
        if inside_selected
            && !is_floating
            && has_arrange
            && ((new_w - cur_w).abs() > snap || (new_h - cur_h).abs() > snap)
        {
            self.toggle_floating()?;
        }

        if !has_arrange || self.clients[&win].is_floating {
            self.resize(win, cur_x, cur_y, new_w, new_h, true)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Monitors

    /// Reconcile the monitor list against the hardware-reported screen
    /// rectangles; returns whether anything changed.
    fn update_geometry(&mut self) -> WmResult<bool> {
        let rects = screen_rectangles(&self.connection, self.screen_width, self.screen_height)?;
        let defaults = MonitorDefaults {
            mfact: self.config.mfact,
            nmaster: self.config.nmaster,
            show_bar: self.config.show_bar,
            top_bar: self.config.top_bar,
            layouts: [
                self.config.layouts[0],
                self.config.layouts[1 % self.config.layouts.len()],
            ],
            bar_height: self.bar_height,
        };
        let (dirty, orphaned_bars) =
            apply_screen_rects(&mut self.monitors, &mut self.clients, &rects, &defaults);

        for bar_win in orphaned_bars {
            if let Some(position) = self.bars.iter().position(|b| b.window() == bar_win) {
                let bar = self.bars.remove(position);
                bar.destroy(&self.connection)?;
            }
        }
        self.create_missing_bars()?;

        if dirty {
            if self.selected_monitor >= self.monitors.len() {
                self.selected_monitor = 0;
            }
            let pointer = self.connection.query_pointer(self.root)?.reply()?;
            self.selected_monitor =
                self.rect_to_monitor(pointer.root_x as i32, pointer.root_y as i32, 1, 1);
            self.update_client_list()?;
        }
        Ok(dirty)
    }

    fn create_missing_bars(&mut self) -> WmResult<()> {
        for index in 0..self.monitors.len() {
            if self.monitors[index].bar_win != x11rb::NONE {
                continue;
            }
            let (wx, bar_y, ww) = {
                let monitor = &self.monitors[index];
                (monitor.wx, monitor.bar_y, monitor.ww)
            };
            let bar = Bar::new(
                &self.connection,
                &self.screen,
                self.display,
                self.screen_number,
                &self.font,
                &self.config,
                wx,
                bar_y,
                ww,
                self.bar_height,
            )?;
            self.monitors[index].bar_win = bar.window();
            self.bars.push(bar);
        }
        Ok(())
    }

    fn reposition_bars(&mut self) -> WmResult<()> {
        for index in 0..self.monitors.len() {
            let (bar_win, wx, bar_y, ww) = {
                let monitor = &self.monitors[index];
                (monitor.bar_win, monitor.wx, monitor.bar_y, monitor.ww)
            };
            if let Some(bar) = self.bars.iter_mut().find(|b| b.window() == bar_win) {
                bar.reposition(&self.connection, wx, bar_y, ww)?;
            }
        }
        Ok(())
    }

    fn bar_for(&self, bar_win: Window) -> Option<&Bar> {
        self.bars.iter().find(|b| b.window() == bar_win)
    }

    /// Move a client to another monitor, retagging it to the target's
    /// active view.
    fn send_monitor(&mut self, win: Window, target: usize) -> WmResult<()> {
        if self.clients[&win].monitor == target {
            return Ok(());
        }
        self.unfocus(win, true)?;
        let source = self.clients[&win].monitor;
        {
            let monitor = &mut self.monitors[source];
            monitor.detach(win);
            monitor.detach_stack(win, &self.clients);
        }
        let target_tags = self.monitors[target].selected_tags();
        if let Some(client) = self.clients.get_mut(&win) {
            client.monitor = target;
            client.tags = target_tags;
        }
        let monitor = &mut self.monitors[target];
        monitor.attach(win);
        monitor.attach_stack(win);
        self.focus(None)?;
        self.arrange(None)
    }

    /// The monitor with the largest overlap, defaulting to the current
    /// selection.
    fn rect_to_monitor(&self, x: i32, y: i32, w: i32, h: i32) -> usize {
        let mut result = self.selected_monitor;
        let mut best_area = 0;
        for (index, monitor) in self.monitors.iter().enumerate() {
            let area = monitor.intersect_area(x, y, w, h);
            if area > best_area {
                best_area = area;
                result = index;
            }
        }
        result
    }

    fn window_to_monitor(&self, win: Window) -> WmResult<usize> {
        if win == self.root {
            let pointer = self.connection.query_pointer(self.root)?.reply()?;
            return Ok(self.rect_to_monitor(pointer.root_x as i32, pointer.root_y as i32, 1, 1));
        }
        if let Some(index) = self.monitors.iter().position(|m| m.bar_win == win) {
            return Ok(index);
        }
        if let Some(client) = self.clients.get(&win) {
            return Ok(client.monitor);
        }
        Ok(self.selected_monitor)
    }

    // ------------------------------------------------------------------
    // Grabs

    fn modifier_combos(&self) -> [u16; 4] {
        let lock = u16::from(ModMask::LOCK);
        [0, lock, self.numlock_mask, self.numlock_mask | lock]
    }

    fn update_numlock_mask(&mut self) -> WmResult<()> {
        let reply = self.connection.get_modifier_mapping()?.reply()?;
        let per_modifier = reply.keycodes_per_modifier() as usize;
        let numlock_codes = self.keyboard_mapping.keycodes(keysyms::XK_NUM_LOCK);
        self.numlock_mask = 0;
        for (index, codes) in reply.keycodes.chunks(per_modifier).enumerate() {
            if codes.iter().any(|code| numlock_codes.contains(code)) {
                self.numlock_mask = 1 << index;
            }
        }
        Ok(())
    }

    fn grab_keys(&mut self) -> WmResult<()> {
        self.update_numlock_mask()?;
        self.connection
            .ungrab_key(ANY_KEY, self.root, ModMask::ANY)?;
        for key in &self.config.keys {
            for code in self.keyboard_mapping.keycodes(key.keysym) {
                for combo in self.modifier_combos() {
                    self.connection.grab_key(
                        true,
                        self.root,
                        (key.modifiers | combo).into(),
                        code,
                        GrabMode::ASYNC,
                        GrabMode::ASYNC,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Click-to-focus grabs for unfocused clients, plus the configured
    /// client-window bindings either way.
    fn grab_buttons(&mut self, win: Window, focused: bool) -> WmResult<()> {
        self.update_numlock_mask()?;
        self.connection
            .ungrab_button(ButtonIndex::ANY, win, ModMask::ANY)?;
        if !focused {
            self.connection.grab_button(
                false,
                win,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
                GrabMode::SYNC,
                GrabMode::SYNC,
                x11rb::NONE,
                x11rb::NONE,
                ButtonIndex::ANY,
                ModMask::ANY,
            )?;
        }
        for binding in &self.config.buttons {
            if binding.click != ClickTarget::ClientWin {
                continue;
            }
            for combo in self.modifier_combos() {
                self.connection.grab_button(
                    false,
                    win,
                    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
                    GrabMode::ASYNC,
                    GrabMode::SYNC,
                    x11rb::NONE,
                    x11rb::NONE,
                    ButtonIndex::from(binding.button),
                    (binding.modifiers | combo).into(),
                )?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Client state and properties

    fn is_visible(&self, win: Window) -> bool {
        self.clients.get(&win).is_some_and(|client| {
            client.is_visible_on(self.monitors[client.monitor].selected_tags())
        })
    }

    fn set_client_state(&self, win: Window, state: u32) -> WmResult<()> {
        self.connection.change_property32(
            PropMode::REPLACE,
            win,
            self.atoms.wm_state,
            self.atoms.wm_state,
            &[state, x11rb::NONE],
        )?;
        Ok(())
    }

    fn window_state(&self, win: Window) -> Option<u32> {
        let reply = self
            .connection
            .get_property(false, win, self.atoms.wm_state, self.atoms.wm_state, 0, 2)
            .ok()?
            .reply()
            .ok()?;
        reply.value32()?.next()
    }

    /// Offer `proto` through WM_PROTOCOLS if the client participates.
    fn send_protocol(&self, win: Window, proto: Atom) -> WmResult<bool> {
        let supported = self
            .connection
            .get_property(
                false,
                win,
                self.atoms.wm_protocols,
                AtomEnum::ATOM,
                0,
                u32::MAX,
            )?
            .reply()
            .ok()
            .and_then(|reply| {
                reply
                    .value32()
                    .map(|atoms| atoms.collect::<Vec<Atom>>())
            })
            .unwrap_or_default();

        if !supported.contains(&proto) {
            return Ok(false);
        }
        let event = ClientMessageEvent::new(
            32,
            win,
            self.atoms.wm_protocols,
            [proto, x11rb::CURRENT_TIME, 0, 0, 0],
        );
        self.connection
            .send_event(false, win, EventMask::NO_EVENT, event)?;
        Ok(true)
    }

    fn send_configure_notify(&self, win: Window) -> WmResult<()> {
        let Some(client) = self.clients.get(&win) else {
            return Ok(());
        };
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: win,
            window: win,
            above_sibling: x11rb::NONE,
            x: client.x as i16,
            y: client.y as i16,
            width: client.w as u16,
            height: client.h as u16,
            border_width: client.border_width as u16,
            override_redirect: false,
        };
        self.connection
            .send_event(false, win, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn set_fullscreen(&mut self, win: Window, fullscreen: bool) -> WmResult<()> {
        let is_fullscreen = self.clients[&win].is_fullscreen;
        if fullscreen && !is_fullscreen {
            self.connection.change_property32(
                PropMode::REPLACE,
                win,
                self.atoms.net_wm_state,
                AtomEnum::ATOM,
                &[self.atoms.net_wm_state_fullscreen],
            )?;
            let monitor_index = {
                let client = self.clients.get_mut(&win).expect("caller checked");
                client.enter_fullscreen();
                client.monitor
            };
            let (mx, my, mw, mh) = {
                let monitor = &self.monitors[monitor_index];
                (monitor.mx, monitor.my, monitor.mw, monitor.mh)
            };
            self.resize_client(win, mx, my, mw, mh)?;
            self.connection.configure_window(
                win,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )?;
        } else if !fullscreen && is_fullscreen {
            self.connection.change_property32(
                PropMode::REPLACE,
                win,
                self.atoms.net_wm_state,
                AtomEnum::ATOM,
                &[],
            )?;
            let (monitor_index, x, y, w, h) = {
                let client = self.clients.get_mut(&win).expect("caller checked");
                let (x, y, w, h) = client.exit_fullscreen();
                (client.monitor, x, y, w, h)
            };
            self.resize_client(win, x, y, w, h)?;
            self.arrange(Some(monitor_index))?;
        }
        Ok(())
    }

    fn set_urgent(&mut self, win: Window, urgent: bool) -> WmResult<()> {
        const URGENCY_HINT: u32 = 1 << 8;
        if let Some(client) = self.clients.get_mut(&win) {
            client.is_urgent = urgent;
        }
        let Ok(reply) = self
            .connection
            .get_property(false, win, AtomEnum::WM_HINTS, AtomEnum::WM_HINTS, 0, 9)?
            .reply()
        else {
            return Ok(());
        };
        let Some(mut hints) = reply.value32().map(|v| v.collect::<Vec<u32>>()) else {
            return Ok(());
        };
        if hints.is_empty() {
            return Ok(());
        }
        if urgent {
            hints[0] |= URGENCY_HINT;
        } else {
            hints[0] &= !URGENCY_HINT;
        }
        self.connection.change_property32(
            PropMode::REPLACE,
            win,
            AtomEnum::WM_HINTS,
            AtomEnum::WM_HINTS,
            &hints,
        )?;
        Ok(())
    }

    fn update_wm_hints(&mut self, win: Window) -> WmResult<()> {
        const INPUT_HINT: u32 = 1 << 0;
        const URGENCY_HINT: u32 = 1 << 8;

        let Ok(reply) = self
            .connection
            .get_property(false, win, AtomEnum::WM_HINTS, AtomEnum::WM_HINTS, 0, 9)?
            .reply()
        else {
            return Ok(());
        };
        let Some(hints) = reply.value32().map(|v| v.collect::<Vec<u32>>()) else {
            return Ok(());
        };
        if hints.is_empty() {
            return Ok(());
        }
        let flags = hints[0];

        let selected = self.monitors[self.selected_monitor].sel;
        if selected == Some(win) && flags & URGENCY_HINT != 0 {
            // The selected client never stays urgent.
            let mut cleared = hints.clone();
            cleared[0] = flags & !URGENCY_HINT;
            self.connection.change_property32(
                PropMode::REPLACE,
                win,
                AtomEnum::WM_HINTS,
                AtomEnum::WM_HINTS,
                &cleared,
            )?;
        } else if let Some(client) = self.clients.get_mut(&win) {
            client.is_urgent = flags & URGENCY_HINT != 0;
        }

        if let Some(client) = self.clients.get_mut(&win) {
            client.never_focus = if flags & INPUT_HINT != 0 && hints.len() > 1 {
                hints[1] == 0
            } else {
                false
            };
        }
        Ok(())
    }

    fn update_size_hints(&mut self, win: Window) -> WmResult<()> {
        let reply = self
            .connection
            .get_property(
                false,
                win,
                AtomEnum::WM_NORMAL_HINTS,
                AtomEnum::WM_SIZE_HINTS,
                0,
                NORMAL_HINTS_LEN as u32,
            )?
            .reply();

        let hints = reply.ok().and_then(|r| NormalHints::parse(&r.value));
        let Some(client) = self.clients.get_mut(&win) else {
            return Ok(());
        };
        match hints {
            Some(hints) => {
                client.base_w = hints.base_w;
                client.base_h = hints.base_h;
                client.inc_w = hints.inc_w;
                client.inc_h = hints.inc_h;
                client.max_w = hints.max_w;
                client.max_h = hints.max_h;
                client.min_w = hints.min_w;
                client.min_h = hints.min_h;
                client.min_aspect = hints.min_aspect;
                client.max_aspect = hints.max_aspect;
                client.is_fixed = hints.is_fixed();
                client.hints_valid = true;
            }
            None => {
                // Absent hints mean unconstrained; stay valid so the
                // lookup is not repeated every resize.
                client.base_w = 0;
                client.base_h = 0;
                client.inc_w = 0;
                client.inc_h = 0;
                client.max_w = 0;
                client.max_h = 0;
                client.min_w = 0;
                client.min_h = 0;
                client.min_aspect = 0.0;
                client.max_aspect = 0.0;
                client.is_fixed = false;
                client.hints_valid = true;
            }
        }
        Ok(())
    }

    fn update_window_type(&mut self, win: Window) -> WmResult<()> {
        if self.atom_property(win, self.atoms.net_wm_state)
            == Some(self.atoms.net_wm_state_fullscreen)
        {
            self.set_fullscreen(win, true)?;
        }
        if self.atom_property(win, self.atoms.net_wm_window_type)
            == Some(self.atoms.net_wm_window_type_dialog)
            && let Some(client) = self.clients.get_mut(&win)
        {
            client.is_floating = true;
        }
        Ok(())
    }

    fn atom_property(&self, win: Window, property: Atom) -> Option<Atom> {
        let reply = self
            .connection
            .get_property(false, win, property, AtomEnum::ATOM, 0, 1)
            .ok()?
            .reply()
            .ok()?;
        reply.value32()?.next()
    }

    fn transient_parent(&self, win: Window) -> Option<Window> {
        let reply = self
            .connection
            .get_property(
                false,
                win,
                AtomEnum::WM_TRANSIENT_FOR,
                AtomEnum::WINDOW,
                0,
                1,
            )
            .ok()?
            .reply()
            .ok()?;
        reply.value32()?.next().filter(|&parent| parent != x11rb::NONE)
    }

    fn text_property(&self, win: Window, property: Atom, type_: Atom) -> Option<String> {
        let reply = self
            .connection
            .get_property(false, win, property, type_, 0, 256)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn window_class_instance(&self, win: Window) -> (String, String) {
        let Some(raw) = self.text_property(
            win,
            Atom::from(AtomEnum::WM_CLASS),
            Atom::from(AtomEnum::STRING),
        ) else {
            return ("broken".to_string(), "broken".to_string());
        };
        let mut parts = raw.split('\0');
        let instance = parts.next().unwrap_or("broken").to_string();
        let class = parts.next().unwrap_or("broken").to_string();
        (instance, class)
    }

    fn update_title(&mut self, win: Window) -> WmResult<()> {
        let title = self
            .text_property(win, self.atoms.net_wm_name, self.atoms.utf8_string)
            .or_else(|| {
                self.text_property(
                    win,
                    Atom::from(AtomEnum::WM_NAME),
                    Atom::from(AtomEnum::ANY),
                )
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "broken".to_string());
        if let Some(client) = self.clients.get_mut(&win) {
            client.name = title;
        }
        Ok(())
    }

    /// Root window name is the status text.
    fn update_status(&mut self) -> WmResult<()> {
        self.status_text = self
            .text_property(
                self.root,
                Atom::from(AtomEnum::WM_NAME),
                Atom::from(AtomEnum::ANY),
            )
            .unwrap_or_else(|| format!("tagwm-{}", env!("CARGO_PKG_VERSION")));
        self.draw_bar(self.selected_monitor)?;
        Ok(())
    }

    fn update_client_list(&self) -> WmResult<()> {
        self.connection
            .delete_property(self.root, self.atoms.net_client_list)?;
        for monitor in &self.monitors {
            for &win in &monitor.clients {
                self.connection.change_property32(
                    PropMode::APPEND,
                    self.root,
                    self.atoms.net_client_list,
                    AtomEnum::WINDOW,
                    &[win],
                )?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bar rendering

    fn draw_bar(&mut self, monitor_index: usize) -> WmResult<()> {
        let monitor = &self.monitors[monitor_index];
        let mut occupied: TagMask = 0;
        let mut urgent: TagMask = 0;
        for client in self.clients.values() {
            if client.monitor == monitor_index {
                occupied |= client.tags;
                if client.is_urgent {
                    urgent |= client.tags;
                }
            }
        }
        let selection = monitor.sel.and_then(|w| self.clients.get(&w));
        let frame = BarFrame {
            tags: &self.config.tags,
            view_tags: monitor.selected_tags(),
            occupied,
            urgent,
            selection_tags: selection.map_or(0, |c| c.tags),
            layout_symbol: &monitor.layout_symbol,
            title: selection.map(|c| c.name.as_str()),
            title_floating: selection.is_some_and(|c| c.is_floating),
            title_fixed: selection.is_some_and(|c| c.is_fixed),
            status: &self.status_text,
            is_selected_monitor: monitor_index == self.selected_monitor,
        };

        let bar_win = monitor.bar_win;
        let Some(position) = self.bars.iter().position(|b| b.window() == bar_win) else {
            return Ok(());
        };
        self.bars[position].draw(&self.connection, &self.font, &self.config, &frame)?;
        Ok(())
    }

    fn draw_bars(&mut self) -> WmResult<()> {
        for index in 0..self.monitors.len() {
            self.draw_bar(index)?;
        }
        Ok(())
    }

    fn run_autostart(&self) {
        for command in &self.config.autostart {
            self.spawn(&Arg::List(vec![
                "sh".to_string(),
                "-c".to_string(),
                command.clone(),
            ]));
            info!(%command, "autostart");
        }
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        if !self.display.is_null() {
            unsafe {
                x11::xlib::XCloseDisplay(self.display);
            }
        }
    }
}
