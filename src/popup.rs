//!
//! This module manages popups, windows below the bar that a block opens and closes on click.
use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    block::{Align, Block},
    engine::origin_x,
    error::{Error, Res},
    render::{Color, Rect, Surface, SurfaceFactory},
};

/// What a popup shows.
pub trait PopupContent: Send {
    /// Gathers fresh data and repaints the whole surface from a blank background.
    ///
    /// Implementations fetch everything before drawing anything, so a failure leaves the old content on screen.
    /// # Errors
    /// Returns an error if the data source is unavailable or returned garbage.
    fn update(&mut self, surface: &mut dyn Surface) -> Res;
}

/// Whether a popup currently has a window.
pub enum PopupState {
    Closed,
    Open(Box<dyn Surface>),
}

struct Inner {
    state: PopupState,
    content: Box<dyn PopupContent>,
}

/// A popup window owned by one block.
///
/// Opening, closing and updating are serialized: a click arriving while an update is in flight waits for it to finish.
pub struct Popup {
    name: String,
    rect: Rect,
    background: Color,
    factory: Arc<dyn SurfaceFactory>,
    inner: Mutex<Inner>,
}

impl Popup {
    /// Places a popup of the given size right below `block`, aligned the way the block's text is and kept on the bar's width.
    ///
    /// # Errors
    /// Returns an error if the block's alignment is invalid.
    pub fn geometry(block: &Block, bar: Rect, width: u16, height: u16) -> Result<Rect, Error> {
        let width = i32::from(width);
        let x = origin_x(
            Align::try_from(block.align())?,
            block.x(),
            block.w(),
            bar.width,
            width,
            0,
        );
        Ok(Rect::new(
            bar.x + x.clamp(0, (bar.width - width).max(0)),
            bar.bottom(),
            width,
            i32::from(height),
        ))
    }

    pub fn new(
        name: &str,
        rect: Rect,
        background: Color,
        factory: Arc<dyn SurfaceFactory>,
        content: Box<dyn PopupContent>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            rect,
            background,
            factory,
            inner: Mutex::new(Inner {
                state: PopupState::Closed,
                content,
            }),
        }
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        matches!(self.lock().state, PopupState::Open(_))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the popup if it is closed, closes it if it is open. Returns whether it is open afterwards.
    ///
    /// A freshly opened popup is painted once before this returns; if that fails the popup stays open with a blank background.
    /// # Errors
    /// Returns an error if the window couldn't be created or destroyed.
    pub fn toggle(&self) -> Result<bool, Error> {
        let mut inner = self.lock();
        match std::mem::replace(&mut inner.state, PopupState::Closed) {
            PopupState::Closed => {
                log::debug!("opening popup {} at {:?}", self.name, self.rect);
                let mut surface = self.factory.create(self.rect, self.background)?;
                if let Err(e) = paint(inner.content.as_mut(), surface.as_mut()) {
                    log::error!("couldn't paint popup {}: {e}", self.name);
                }
                inner.state = PopupState::Open(surface);
                Ok(true)
            }
            PopupState::Open(surface) => {
                log::debug!("closing popup {}", self.name);
                surface.destroy()?;
                Ok(false)
            }
        }
    }

    /// Repaints the popup if it is open. Returns whether it was open.
    ///
    /// # Errors
    /// Returns an error if the content couldn't be refreshed; the old content stays visible.
    pub fn update(&self) -> Result<bool, Error> {
        let mut inner = self.lock();
        let Inner { state, content } = &mut *inner;
        match state {
            PopupState::Closed => Ok(false),
            PopupState::Open(surface) => {
                paint(content.as_mut(), surface.as_mut())?;
                Ok(true)
            }
        }
    }
}

fn paint(content: &mut dyn PopupContent, surface: &mut dyn Surface) -> Res {
    content.update(surface)?;
    let bounds = surface.bounds();
    surface.present(bounds)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc,
    };

    use super::*;
    use crate::{
        block::BlockSpec,
        registry::{REDRAW_DEPTH, Registry},
        render::testing::{Op, RecordingFactory},
    };

    #[derive(Default)]
    struct Counter {
        updates: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    impl PopupContent for Counter {
        fn update(&mut self, surface: &mut dyn Surface) -> Res {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Mpd(String::from("offline")));
            }
            let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
            surface.fill_rect(surface.bounds(), Color::default());
            surface.draw_text(0, 10, Color::default(), &n.to_string());
            Ok(())
        }
    }

    fn popup() -> (Popup, Arc<RecordingFactory>, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let factory = Arc::new(RecordingFactory::default());
        let content = Counter::default();
        let (updates, fail) = (Arc::clone(&content.updates), Arc::clone(&content.fail));
        let popup = Popup::new(
            "test",
            Rect::new(0, 20, 100, 50),
            Color::default(),
            Arc::clone(&factory) as Arc<dyn SurfaceFactory>,
            Box::new(content),
        );
        (popup, factory, updates, fail)
    }

    #[test]
    fn toggling_twice_releases_the_window() {
        let (popup, factory, updates, _) = popup();
        assert!(popup.toggle().expect("opens"));
        assert!(popup.is_open());
        assert_eq!(factory.live(), 1);
        assert_eq!(updates.load(Ordering::SeqCst), 1);

        assert!(!popup.toggle().expect("closes"));
        assert!(!popup.is_open());
        assert_eq!(factory.live(), 0);

        assert!(popup.toggle().expect("reopens"));
        assert!(!popup.toggle().expect("closes"));
        assert_eq!(factory.live(), 0);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn updates_only_reach_open_popups() {
        let (popup, _factory, updates, _) = popup();
        assert!(!popup.update().expect("closed is fine"));
        assert_eq!(updates.load(Ordering::SeqCst), 0);

        popup.toggle().expect("opens");
        assert!(popup.update().expect("open"));
        assert!(popup.update().expect("open"));
        assert_eq!(updates.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failed_updates_keep_the_old_content() {
        let (popup, factory, updates, fail) = popup();
        popup.toggle().expect("opens");
        let before = factory.log.lock().expect("not poisoned").ops.len();

        fail.store(true, Ordering::SeqCst);
        assert!(popup.update().is_err());
        assert!(popup.is_open());
        assert_eq!(factory.log.lock().expect("not poisoned").ops.len(), before);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_first_paint_still_opens() {
        let (popup, factory, _, fail) = popup();
        fail.store(true, Ordering::SeqCst);
        assert!(popup.toggle().expect("opens"));
        assert_eq!(factory.live(), 1);
        let ops = factory.log.lock().expect("not poisoned").ops.clone();
        assert!(matches!(ops.as_slice(), [Op::Fill(..), Op::Present(..)]));
    }

    #[test]
    fn blocks_keep_their_first_popup() {
        let (tx, _rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Registry::new(tx);
        let block = registry.register(BlockSpec::new("clock", 100)).expect("unique");
        let (first, ..) = popup();
        let first = Arc::new(first);
        let (second, ..) = popup();
        let second = Arc::new(second);

        assert!(block.set_popup(Arc::clone(&first)).is_none());
        let refused = block.set_popup(Arc::clone(&second)).expect("handed back");
        assert!(Arc::ptr_eq(&refused, &second));
        assert!(Arc::ptr_eq(block.popup().expect("attached"), &first));
    }

    #[test]
    fn popups_sit_below_their_block() {
        let (tx, _rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Registry::new(tx);
        registry.register(BlockSpec::new("pad", 1000)).expect("unique");
        let music = registry
            .register(BlockSpec {
                align: 'r',
                ..BlockSpec::new("music", 660)
            })
            .expect("unique");
        let clock = registry
            .register(BlockSpec {
                align: 'a',
                ..BlockSpec::new("clock", 100)
            })
            .expect("unique");
        let edge = registry
            .register(BlockSpec {
                align: 'c',
                ..BlockSpec::new("edge", 20)
            })
            .expect("unique");
        let bar = Rect::new(0, 0, 1920, 29);

        assert_eq!(
            Popup::geometry(&music, bar, 300, 140).ok(),
            Some(Rect::new(1360, 29, 300, 140))
        );
        assert_eq!(
            Popup::geometry(&clock, bar, 200, 100).ok(),
            Some(Rect::new(860, 29, 200, 100))
        );
        assert_eq!(
            Popup::geometry(&edge, bar, 300, 100).ok(),
            Some(Rect::new(1620, 29, 300, 100))
        );
    }
}
