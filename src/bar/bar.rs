use x11rb::COPY_DEPTH_FROM_PARENT;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use super::font::{Font, FontDraw};
use crate::client::TagMask;
use crate::errors::WmError;
use crate::keyboard::ClickTarget;
use crate::{ColorScheme, Config};

type WmResult<T> = Result<T, WmError>;

/// Everything one bar needs to render a frame; assembled by the window
/// manager from the owning monitor's state.
pub struct BarFrame<'a> {
    pub tags: &'a [String],
    pub view_tags: TagMask,
    pub occupied: TagMask,
    pub urgent: TagMask,
    /// Tag mask of the monitor's selected client, for the indicator box.
    pub selection_tags: TagMask,
    pub layout_symbol: &'a str,
    pub title: Option<&'a str>,
    pub title_floating: bool,
    pub title_fixed: bool,
    pub status: &'a str,
    /// Status and selected-title highlighting only appear on the
    /// monitor holding the global selection.
    pub is_selected_monitor: bool,
}

/// One monitor's status bar window plus the segment widths of the last
/// frame, which drive click classification.
pub struct Bar {
    window: Window,
    gc: Gcontext,
    font_draw: FontDraw,
    display: *mut x11::xlib::Display,
    width: i32,
    height: i32,
    padding: i32,
    tag_widths: Vec<i32>,
    layout_symbol_width: i32,
    status_width: i32,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection: &RustConnection,
        screen: &Screen,
        display: *mut x11::xlib::Display,
        screen_number: usize,
        font: &Font,
        config: &Config,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> WmResult<Self> {
        let window = connection.generate_id()?;
        let gc = connection.generate_id()?;

        connection.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            x as i16,
            y as i16,
            width as u16,
            height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new()
                .background_pixel(config.scheme_normal.background)
                .override_redirect(1)
                .event_mask(EventMask::EXPOSURE | EventMask::BUTTON_PRESS),
        )?;
        connection.create_gc(
            gc,
            window,
            &CreateGCAux::new()
                .foreground(config.scheme_normal.foreground)
                .background(config.scheme_normal.background),
        )?;
        connection.map_window(window)?;
        // The Xft surface lives on a second connection; the window must
        // exist server-side before it is used as a drawable.
        connection.flush()?;

        let visual = unsafe { x11::xlib::XDefaultVisual(display, screen_number as i32) };
        let colormap = unsafe { x11::xlib::XDefaultColormap(display, screen_number as i32) };
        let font_draw = FontDraw::new(display, window as x11::xlib::Drawable, visual, colormap)?;

        Ok(Bar {
            window,
            gc,
            font_draw,
            display,
            width,
            height,
            padding: font.height(),
            tag_widths: Vec::new(),
            layout_symbol_width: 0,
            status_width: 0,
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn destroy(&self, connection: &RustConnection) -> WmResult<()> {
        connection.unmap_window(self.window)?;
        connection.destroy_window(self.window)?;
        Ok(())
    }

    pub fn reposition(
        &mut self,
        connection: &RustConnection,
        x: i32,
        y: i32,
        width: i32,
    ) -> WmResult<()> {
        self.width = width;
        connection.configure_window(
            self.window,
            &ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(width as u32)
                .height(self.height as u32),
        )?;
        Ok(())
    }

    /// Padded width of a text segment.
    fn segment_width(&self, font: &Font, text: &str) -> i32 {
        font.text_width(text) + self.padding
    }

    fn fill(&self, connection: &RustConnection, rgb: u32, x: i32, y: i32, w: i32, h: i32) -> WmResult<()> {
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        connection.change_gc(self.gc, &ChangeGCAux::new().foreground(rgb))?;
        connection.poly_fill_rectangle(
            self.window,
            self.gc,
            &[Rectangle { x: x as i16, y: y as i16, width: w as u16, height: h as u16 }],
        )?;
        Ok(())
    }

    fn outline(&self, connection: &RustConnection, rgb: u32, x: i32, y: i32, w: i32, h: i32) -> WmResult<()> {
        connection.change_gc(self.gc, &ChangeGCAux::new().foreground(rgb))?;
        connection.poly_rectangle(
            self.window,
            self.gc,
            &[Rectangle { x: x as i16, y: y as i16, width: w as u16, height: h as u16 }],
        )?;
        Ok(())
    }

    /// Fill a segment background and draw its text, optionally with
    /// foreground and background swapped (urgency highlighting).
    #[allow(clippy::too_many_arguments)]
    fn draw_segment(
        &mut self,
        connection: &RustConnection,
        font: &Font,
        scheme: &ColorScheme,
        invert: bool,
        x: i32,
        width: i32,
        text: &str,
    ) -> WmResult<()> {
        let (fg, bg) = if invert {
            (scheme.background, scheme.foreground)
        } else {
            (scheme.foreground, scheme.background)
        };
        self.fill(connection, bg, x, 0, width, self.height)?;
        // The background fill must reach the server before the text,
        // which goes out on the Xft connection.
        connection.flush()?;
        let text_y = (self.height - font.height()) / 2 + font.ascent();
        self.font_draw
            .draw_text(font, fg, x + self.padding / 2, text_y, text);
        Ok(())
    }

    /// Render one frame: tags, layout symbol, title, then the
    /// right-aligned status area.
    pub fn draw(
        &mut self,
        connection: &RustConnection,
        font: &Font,
        config: &Config,
        frame: &BarFrame<'_>,
    ) -> WmResult<()> {
        let box_offset = font.height() / 9;
        let box_size = font.height() / 6 + 2;

        // Status first so tags may overdraw it on narrow screens; only
        // the selected monitor shows it.
        self.status_width = 0;
        if frame.is_selected_monitor {
            self.status_width = font.text_width(frame.status) + 2;
            let x = self.width - self.status_width;
            let scheme = &config.scheme_normal;
            self.fill(connection, scheme.background, x, 0, self.status_width, self.height)?;
            connection.flush()?;
            let text_y = (self.height - font.height()) / 2 + font.ascent();
            self.font_draw
                .draw_text(font, scheme.foreground, x, text_y, frame.status);
        }

        self.tag_widths.clear();
        let mut x = 0;
        for (i, tag) in frame.tags.iter().enumerate() {
            let bit = 1 << i;
            let width = self.segment_width(font, tag);
            self.tag_widths.push(width);

            let scheme = if frame.view_tags & bit != 0 {
                &config.scheme_selected
            } else {
                &config.scheme_normal
            };
            let urgent = frame.urgent & bit != 0;
            self.draw_segment(connection, font, scheme, urgent, x, width, tag)?;

            if frame.occupied & bit != 0 {
                let fg = if urgent { scheme.background } else { scheme.foreground };
                if frame.is_selected_monitor && frame.selection_tags & bit != 0 {
                    self.fill(connection, fg, x + box_offset, box_offset, box_size, box_size)?;
                } else {
                    self.outline(connection, fg, x + box_offset, box_offset, box_size, box_size)?;
                }
            }
            x += width;
        }

        self.layout_symbol_width = self.segment_width(font, frame.layout_symbol);
        self.draw_segment(
            connection,
            font,
            &config.scheme_normal,
            false,
            x,
            self.layout_symbol_width,
            frame.layout_symbol,
        )?;
        x += self.layout_symbol_width;

        let title_width = self.width - self.status_width - x;
        if title_width > self.height {
            match frame.title {
                Some(title) => {
                    let scheme = if frame.is_selected_monitor {
                        &config.scheme_selected
                    } else {
                        &config.scheme_normal
                    };
                    self.draw_segment(connection, font, scheme, false, x, title_width, title)?;
                    if frame.title_floating {
                        if frame.title_fixed {
                            self.fill(
                                connection,
                                scheme.foreground,
                                x + box_offset,
                                box_offset,
                                box_size,
                                box_size,
                            )?;
                        } else {
                            self.outline(
                                connection,
                                scheme.foreground,
                                x + box_offset,
                                box_offset,
                                box_size,
                                box_size,
                            )?;
                        }
                    }
                }
                None => {
                    self.fill(
                        connection,
                        config.scheme_normal.background,
                        x,
                        0,
                        title_width,
                        self.height,
                    )?;
                }
            }
        }

        connection.flush()?;
        unsafe {
            x11::xlib::XFlush(self.display);
        }
        Ok(())
    }

    /// Classify a click x-coordinate against the segment widths of the
    /// last drawn frame.
    pub fn click_target(&self, click_x: i32) -> (ClickTarget, Option<usize>) {
        let mut x = 0;
        for (tag_index, &width) in self.tag_widths.iter().enumerate() {
            x += width;
            if click_x < x {
                return (ClickTarget::TagBar, Some(tag_index));
            }
        }
        if click_x < x + self.layout_symbol_width {
            (ClickTarget::LayoutSymbol, None)
        } else if click_x > self.width - self.status_width {
            (ClickTarget::StatusText, None)
        } else {
            (ClickTarget::WinTitle, None)
        }
    }
}
