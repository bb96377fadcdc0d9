//!
//! This module backs the drawing surfaces with X11 windows: a software canvas is painted and copied through a pixmap onto the window.
use std::sync::Arc;

use image::RgbaImage;
use x11rb::{
    connection::Connection,
    protocol::xproto::{Gcontext, Pixmap, Window},
};

use crate::{
    connection::{ConnectionActionExt, ConnectionHandler},
    error::{Error, Res},
    render::{Canvas, Color, Measure, Rect, Surface, SurfaceFactory},
    text::TextHandler,
};

/// A mapped dock window with an offscreen copy of its pixels.
pub struct XSurface<C: Connection> {
    conn: Arc<ConnectionHandler<C>>,
    text: Arc<TextHandler>,
    canvas: Canvas,
    window: Window,
    pixmap: Pixmap,
    gc: Gcontext,
    baseline: i32,
}

impl<C: Connection + Send + Sync> XSurface<C> {
    /// Creates and maps a window covering `rect`, filled with `background`.
    ///
    /// The bar reserves its rows with `strut`; popups float over other windows.
    /// # Errors
    /// Returns an error if any of the X resources couldn't be created.
    pub fn new(
        conn: Arc<ConnectionHandler<C>>,
        text: Arc<TextHandler>,
        rect: Rect,
        background: Color,
        strut: bool,
        baseline: Option<i32>,
    ) -> Result<Self, Error> {
        // the pixmap holds the first frame before the window manager ever maps the window
        let canvas = Canvas::new(rect.width as u16, rect.height as u16, background);
        let pixmap = conn.create_backing_pixmap(rect)?;
        let gc = conn.create_gc(pixmap)?;
        let bounds = canvas.bounds();
        conn.draw_to_pixmap(pixmap, gc, bounds, &canvas.region(bounds))?;

        let window = conn.create_dock_window(rect, pixmap, strut)?;
        conn.flush()?;
        let baseline = baseline.unwrap_or_else(|| text.centered_baseline(rect.height as u16));
        log::debug!("window {window} ready with baseline {baseline}");

        Ok(Self {
            conn,
            text,
            canvas,
            window,
            pixmap,
            gc,
            baseline,
        })
    }

    #[must_use]
    pub const fn window(&self) -> Window {
        self.window
    }
}

impl<C: Connection + Send + Sync> Surface for XSurface<C> {
    fn bounds(&self) -> Rect {
        self.canvas.bounds()
    }

    fn baseline(&self) -> i32 {
        self.baseline
    }

    fn text_width(&self, text: &str) -> i32 {
        self.text.text_width(text)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.canvas.fill_rect(rect, color);
    }

    fn draw_text(&mut self, x: i32, baseline: i32, color: Color, text: &str) -> i32 {
        self.text.draw(&mut self.canvas, x, baseline, color, text)
    }

    fn draw_image(&mut self, x: i32, y: i32, image: &RgbaImage) {
        self.canvas.draw_image(x, y, image);
    }

    fn present(&mut self, rect: Rect) -> Res {
        let rect = rect.intersect(&self.canvas.bounds());
        if rect.is_empty() {
            return Ok(());
        }
        log::trace!("presenting {rect:?} of window {}", self.window);
        self.conn
            .draw_to_pixmap(self.pixmap, self.gc, rect, &self.canvas.region(rect))?;
        self.conn
            .copy_to_window(self.gc, self.pixmap, self.window, rect)
    }

    fn destroy(self: Box<Self>) -> Res {
        self.conn.destroy(self.window, self.pixmap, self.gc)
    }
}

/// Opens popup windows on the bar's connection.
pub struct XFactory<C: Connection> {
    conn: Arc<ConnectionHandler<C>>,
    text: Arc<TextHandler>,
}

impl<C: Connection> XFactory<C> {
    pub const fn new(conn: Arc<ConnectionHandler<C>>, text: Arc<TextHandler>) -> Self {
        Self { conn, text }
    }
}

impl<C: Connection + Send + Sync + 'static> SurfaceFactory for XFactory<C> {
    fn create(&self, rect: Rect, background: Color) -> Result<Box<dyn Surface>, Error> {
        Ok(Box::new(XSurface::new(
            Arc::clone(&self.conn),
            Arc::clone(&self.text),
            rect,
            background,
            false,
            None,
        )?))
    }
}
