use std::sync::{Arc, mpsc::Receiver};

use x11rb::connection::Connection;

use crate::{
    connection::{ConnectionAtomExt, ConnectionHandler},
    error::{Error, Res},
    feeds::Feed,
    registry::{BlockHandle, Registry},
};

/// Shows the title of the focused window.
pub struct WindowTitle<C: Connection> {
    pub registry: Arc<Registry>,
    pub block: BlockHandle,
    pub conn: Arc<ConnectionHandler<C>>,
    /// Fires when `_NET_ACTIVE_WINDOW` changes.
    pub changes: Receiver<()>,
    /// Longer titles are cut to this many characters.
    pub max_length: usize,
}

/// Cuts `title` to at most `max_length` characters.
#[must_use]
pub fn truncate(title: &str, max_length: usize) -> String {
    title.chars().take(max_length).collect()
}

impl<C: Connection> WindowTitle<C> {
    fn title(&self) -> Result<String, Error> {
        match self.conn.get_active_window()? {
            Some(window) => self.conn.get_window_name(window),
            None => Ok(String::new()),
        }
    }
}

impl<C: Connection + Send + Sync> Feed for WindowTitle<C> {
    fn name(&self) -> &'static str {
        "window"
    }

    fn run(self: Box<Self>) -> Res {
        loop {
            match self.title() {
                Ok(title) => self
                    .registry
                    .update_text(&self.block, &truncate(&title, self.max_length))?,
                // the window may be gone before its name is read
                Err(e) => log::debug!("couldn't read active window title: {e}"),
            }
            if self.changes.recv().is_err() {
                return Ok(());
            }
            // coalesce changes that piled up while reading
            self.changes.try_iter().for_each(drop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_on_characters() {
        assert_eq!(truncate("short", 30), "short");
        assert_eq!(truncate("ünïcödé title", 7), "ünïcödé");
        assert_eq!(truncate("", 3), "");
    }
}
