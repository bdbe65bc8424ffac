use std::collections::HashMap;
use std::ffi::CString;

use x11::xft::{XftColor, XftDraw, XftDrawStringUtf8, XftFont, XftFontOpenName};
use x11::xlib::{Colormap, Display, Drawable, Visual};
use x11::xrender::XRenderColor;

use crate::errors::X11Error;

/// An Xft font handle; measurement and metrics for the bar.
pub struct Font {
    xft_font: *mut XftFont,
    display: *mut Display,
}

impl Font {
    pub fn new(display: *mut Display, screen: i32, font_name: &str) -> Result<Self, X11Error> {
        let font_name_cstr =
            CString::new(font_name).map_err(|_| X11Error::FontLoadFailed(font_name.to_string()))?;

        let xft_font = unsafe { XftFontOpenName(display, screen, font_name_cstr.as_ptr()) };
        if xft_font.is_null() {
            return Err(X11Error::FontLoadFailed(font_name.to_string()));
        }

        Ok(Font { xft_font, display })
    }

    pub fn height(&self) -> i32 {
        unsafe { (*self.xft_font).height }
    }

    pub fn ascent(&self) -> i32 {
        unsafe { (*self.xft_font).ascent }
    }

    /// Pixel width of the rendered string.
    pub fn text_width(&self, text: &str) -> i32 {
        unsafe {
            let mut extents = std::mem::zeroed();
            x11::xft::XftTextExtentsUtf8(
                self.display,
                self.xft_font,
                text.as_ptr(),
                text.len() as i32,
                &mut extents,
            );
            extents.xOff as i32
        }
    }
}

impl Drop for Font {
    fn drop(&mut self) {
        unsafe {
            if !self.xft_font.is_null() {
                x11::xft::XftFontClose(self.display, self.xft_font);
            }
        }
    }
}

/// Xft drawing surface bound to one window, with allocated colors cached
/// per RGB value for the lifetime of the surface.
pub struct FontDraw {
    xft_draw: *mut XftDraw,
    colors: HashMap<u32, XftColor>,
}

impl FontDraw {
    pub fn new(
        display: *mut Display,
        drawable: Drawable,
        visual: *mut Visual,
        colormap: Colormap,
    ) -> Result<Self, X11Error> {
        let xft_draw = unsafe { x11::xft::XftDrawCreate(display, drawable, visual, colormap) };
        if xft_draw.is_null() {
            return Err(X11Error::DrawCreateFailed);
        }

        Ok(FontDraw { xft_draw, colors: HashMap::new() })
    }

    fn color(&mut self, rgb: u32) -> XftColor {
        if let Some(color) = self.colors.get(&rgb) {
            return *color;
        }

        let red = ((rgb >> 16) & 0xff) as u16;
        let green = ((rgb >> 8) & 0xff) as u16;
        let blue = (rgb & 0xff) as u16;
        let render_color = XRenderColor {
            red: red << 8 | red,
            green: green << 8 | green,
            blue: blue << 8 | blue,
            alpha: 0xffff,
        };

        let mut xft_color: XftColor = unsafe { std::mem::zeroed() };
        unsafe {
            x11::xft::XftColorAllocValue(
                x11::xft::XftDrawDisplay(self.xft_draw),
                x11::xft::XftDrawVisual(self.xft_draw),
                x11::xft::XftDrawColormap(self.xft_draw),
                &render_color,
                &mut xft_color,
            );
        }
        self.colors.insert(rgb, xft_color);
        xft_color
    }

    pub fn draw_text(&mut self, font: &Font, rgb: u32, x: i32, y: i32, text: &str) {
        let color = self.color(rgb);
        unsafe {
            XftDrawStringUtf8(
                self.xft_draw,
                &color,
                font.xft_font,
                x,
                y,
                text.as_ptr(),
                text.len() as i32,
            );
        }
    }
}

impl Drop for FontDraw {
    fn drop(&mut self) {
        unsafe {
            if !self.xft_draw.is_null() {
                for color in self.colors.values_mut() {
                    x11::xft::XftColorFree(
                        x11::xft::XftDrawDisplay(self.xft_draw),
                        x11::xft::XftDrawVisual(self.xft_draw),
                        x11::xft::XftDrawColormap(self.xft_draw),
                        color,
                    );
                }
                x11::xft::XftDrawDestroy(self.xft_draw);
            }
        }
    }
}
