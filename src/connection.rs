//!
//! This module wraps `x11rb`'s `Connection` to create the bar's windows, push pixels to them and read the window manager's properties.
use std::process::Command;
use std::sync::Arc;

use x11rb::{
    COPY_DEPTH_FROM_PARENT,
    connection::{Connection, RequestConnection},
    errors::ReplyOrIdError,
    protocol::xproto::{
        AtomEnum, ChangeWindowAttributesAux, ConfigureWindowAux, ConnectionExt as _, CreateGCAux,
        CreateWindowAux, EventMask, Gcontext, ImageFormat, Pixmap, PropMode, Screen, Window,
        WindowClass,
    },
    wrapper::ConnectionExt as _,
};

use crate::{
    atoms::Atoms,
    error::{Error, Res},
    render::Rect,
};

/// The name every window of the bar carries.
pub const WM_NAME: &str = "melonbar";

/// The attributes of every bar and popup window: clicks and exposures are reported, and `pixmap` is the background.
#[must_use]
pub fn dock_window_aux(pixmap: Pixmap) -> CreateWindowAux {
    CreateWindowAux::new()
        .background_pixmap(pixmap)
        .event_mask(EventMask::BUTTON_PRESS | EventMask::EXPOSURE)
}

/// Defines how the bar creates, paints and destroys its windows.
pub trait ConnectionActionExt {
    /// Creates and maps an undecorated dock window covering `rect`, visible on every desktop.
    ///
    /// `pixmap` becomes the window's background, so the server repaints exposed areas from it.
    /// If `strut` is set the window manager is asked to keep other windows out of its rows.
    /// # Errors
    /// Returns an error if the window couldn't be created.
    fn create_dock_window(&self, rect: Rect, pixmap: Pixmap, strut: bool) -> Result<Window, Error>;
    /// Creates a pixmap (an off screen window to draw to) the size of `rect`, with the depth of the root window.
    /// # Errors
    /// Returns an error if the connection broke.
    fn create_backing_pixmap(&self, rect: Rect) -> Result<Pixmap, ReplyOrIdError>;
    /// Creates a graphics context for drawing to `drawable`.
    /// # Errors
    /// Returns an error if the drawable does not exist.
    fn create_gc(&self, drawable: u32) -> Result<Gcontext, ReplyOrIdError>;
    /// Draws to a pixmap (offscreen window).
    ///
    /// Data is a BGRA byte sequence. The length of the array must be equal to Width*Height*4. Large images are split into several requests.
    /// # Errors
    /// Returns an error if the pixmap or graphics context doesn't exist, or the data is malformed.
    fn draw_to_pixmap(&self, pixmap: Pixmap, gc: Gcontext, rect: Rect, data: &[u8]) -> Res;
    /// Copies a region of a pixmap onto the same region of a window and flushes.
    /// # Errors
    /// Returns an error if the graphics context or the windows do not exist.
    fn copy_to_window(&self, gc: Gcontext, pixmap: Pixmap, window: Window, rect: Rect) -> Res;
    /// Frees the pixmap and graphics context and destroys the window.
    /// # Errors
    /// Returns an error if any of the resources doesn't exist.
    fn destroy(&self, window: Window, pixmap: Pixmap, gc: Gcontext) -> Res;
    /// Gets the current screen's width and height in pixels.
    fn get_screen_geometry(&self) -> (u16, u16);
}

/// Defines the methods used to read and set specific atoms and their data.
pub trait ConnectionAtomExt {
    /// Marks a window as a sticky dock on all desktops and names it.
    /// # Errors
    /// Returns an error if the window doesn't exist.
    fn set_dock_hints(&self, window: Window, rect: Rect, strut: bool) -> Res;
    /// Gets the UTF-8 name of the window (if it exists).
    /// # Errors
    /// Returns an error if the window doesn't exist.
    fn get_window_name(&self, window: Window) -> Result<String, Error>;
    /// Gets the window the window manager says is focused.
    /// # Errors
    /// Returns an error if the root window can't be queried.
    fn get_active_window(&self) -> Result<Option<Window>, Error>;
    /// Gets the index of the current desktop.
    /// # Errors
    /// Returns an error if the root window can't be queried.
    fn get_current_desktop(&self) -> Result<Option<u32>, Error>;
}

/// An implementation of the Connection traits, with the screen and atom list.
pub struct ConnectionHandler<C: Connection> {
    /// A connection to the X11 server, shared by every thread.
    pub conn: Arc<C>,
    /// The root window.
    root: Window,
    /// The depth of the root window, which every pixmap copies.
    root_depth: u8,
    /// The screen's width and height in pixels.
    geometry: (u16, u16),
    /// The atoms the bar uses.
    pub atoms: Atoms,
}

impl<C: Connection> ConnectionHandler<C> {
    /// Creates a new handler and starts listening to property changes on the root window.
    /// # Errors
    /// May return an error if the connection is faulty.
    pub fn new(conn: Arc<C>, screen_num: usize) -> Result<Self, Error> {
        let screen: &Screen = &conn.setup().roots[screen_num];
        log::trace!("screen num {screen_num} root {}", screen.root);

        let (root, root_depth) = (screen.root, screen.root_depth);
        let geometry = (screen.width_in_pixels, screen.height_in_pixels);
        let atoms = Atoms::new(conn.as_ref())?;

        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?
        .check()?;

        Ok(Self {
            conn,
            root,
            root_depth,
            geometry,
            atoms,
        })
    }

    /// Sends every buffered request to the server.
    /// # Errors
    /// Returns an error if the connection broke.
    pub fn flush(&self) -> Res {
        self.conn.flush()?;
        Ok(())
    }

    #[must_use]
    pub const fn root(&self) -> Window {
        self.root
    }

    fn get_cardinal(&self, window: Window, property: u32) -> Result<Option<u32>, Error> {
        Ok(self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, 1)?
            .reply()?
            .value32()
            .and_then(|mut v| v.next()))
    }
}

impl<C: Connection> ConnectionActionExt for ConnectionHandler<C> {
    fn create_dock_window(&self, rect: Rect, pixmap: Pixmap, strut: bool) -> Result<Window, Error> {
        let window = self.conn.generate_id()?;
        log::debug!("creating dock window {window} at {rect:?}");
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            self.root,
            rect.x as i16,
            rect.y as i16,
            rect.width as u16,
            rect.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &dock_window_aux(pixmap),
        )?;
        self.set_dock_hints(window, rect, strut)?;
        self.conn.map_window(window)?;
        // some window managers ignore the position given at creation
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().x(rect.x).y(rect.y),
        )?;
        Ok(window)
    }

    fn create_backing_pixmap(&self, rect: Rect) -> Result<Pixmap, ReplyOrIdError> {
        let pixmap = self.conn.generate_id()?;
        self.conn.create_pixmap(
            self.root_depth,
            pixmap,
            self.root,
            rect.width as u16,
            rect.height as u16,
        )?;
        Ok(pixmap)
    }

    fn create_gc(&self, drawable: u32) -> Result<Gcontext, ReplyOrIdError> {
        let gc = self.conn.generate_id()?;
        self.conn
            .create_gc(gc, drawable, &CreateGCAux::new().graphics_exposures(0))?;
        Ok(gc)
    }

    fn draw_to_pixmap(&self, pixmap: Pixmap, gc: Gcontext, rect: Rect, data: &[u8]) -> Res {
        if rect.is_empty() {
            return Ok(());
        }
        let row_bytes = rect.width as usize * 4;
        let rows_per_request = ((self.conn.maximum_request_bytes() - 64) / row_bytes).max(1);

        data.chunks(rows_per_request * row_bytes)
            .enumerate()
            .try_for_each(|(i, chunk)| {
                self.conn.put_image(
                    ImageFormat::Z_PIXMAP,
                    pixmap,
                    gc,
                    rect.width as u16,
                    (chunk.len() / row_bytes) as u16,
                    rect.x as i16,
                    (rect.y + (i * rows_per_request) as i32) as i16,
                    0,
                    self.root_depth,
                    chunk,
                )?;
                Ok::<(), Error>(())
            })
    }

    fn copy_to_window(&self, gc: Gcontext, pixmap: Pixmap, window: Window, rect: Rect) -> Res {
        self.conn.copy_area(
            pixmap,
            window,
            gc,
            rect.x as i16,
            rect.y as i16,
            rect.x as i16,
            rect.y as i16,
            rect.width as u16,
            rect.height as u16,
        )?;
        self.flush()
    }

    fn destroy(&self, window: Window, pixmap: Pixmap, gc: Gcontext) -> Res {
        log::debug!("destroying window {window}");
        self.conn.free_pixmap(pixmap)?;
        self.conn.free_gc(gc)?;
        self.conn.destroy_window(window)?;
        self.flush()
    }

    fn get_screen_geometry(&self) -> (u16, u16) {
        self.geometry
    }
}

impl<C: Connection> ConnectionAtomExt for ConnectionHandler<C> {
    fn set_dock_hints(&self, window: Window, rect: Rect, strut: bool) -> Res {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_window_type,
            AtomEnum::ATOM,
            &[self.atoms.net_wm_window_type_dock],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_state,
            AtomEnum::ATOM,
            &[self.atoms.net_wm_state_sticky],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_desktop,
            AtomEnum::CARDINAL,
            &[u32::MAX],
        )?;
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_name,
            self.atoms.utf8_string,
            WM_NAME.as_bytes(),
        )?;
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            WM_NAME.as_bytes(),
        )?;
        if strut {
            let (left, right) = (rect.x.max(0) as u32, (rect.right() - 1).max(0) as u32);
            self.conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_strut_partial,
                AtomEnum::CARDINAL,
                &[0, 0, rect.bottom().max(0) as u32, 0, 0, 0, 0, 0, left, right, 0, 0],
            )?;
        }
        Ok(())
    }

    fn get_window_name(&self, window: Window) -> Result<String, Error> {
        log::trace!("getting window name of {window}");

        let result = String::from_utf8(
            self.conn
                .get_property(
                    false,
                    window,
                    self.atoms.net_wm_name,
                    self.atoms.utf8_string,
                    0,
                    100,
                )?
                .reply()?
                .value,
        )
        .unwrap_or_default();

        if result.is_empty() {
            let result = String::from_utf8_lossy(
                &self
                    .conn
                    .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 100)?
                    .reply()?
                    .value,
            )
            .into_owned();
            Ok(result)
        } else {
            Ok(result)
        }
    }

    fn get_active_window(&self) -> Result<Option<Window>, Error> {
        Ok(self
            .get_cardinal(self.root, self.atoms.net_active_window)?
            .filter(|&w| w != x11rb::NONE))
    }

    fn get_current_desktop(&self) -> Result<Option<u32>, Error> {
        self.get_cardinal(self.root, self.atoms.net_current_desktop)
    }
}

/// Runs a shell command and waits for it to finish.
///
/// # Errors
/// Returns an error if the shell couldn't be spawned.
pub fn spawn_command(command: &str) -> Res {
    log::debug!("spawning command {command:?}");
    let status = Command::new("sh").arg("-c").arg(command).status()?;
    if !status.success() {
        log::warn!("command {command:?} exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_are_backed_by_their_pixmap() {
        let aux = dock_window_aux(42);
        assert_eq!(aux.background_pixmap, Some(42));
        assert_eq!(aux.background_pixel, None);
        let mask = aux.event_mask.map(EventMask::from);
        assert_eq!(mask, Some(EventMask::BUTTON_PRESS | EventMask::EXPOSURE));
    }
}
