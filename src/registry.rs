//!
//! This module keeps every block of the bar in registration order and turns block changes into redraw requests.
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, mpsc::SyncSender},
};

use crate::{
    block::{Block, BlockSpec, BlockState},
    error::{Error, Res},
    render::Color,
};

/// A shared reference to a registered block.
pub type BlockHandle = Arc<Block>;

/// How many redraw requests may wait for the draw engine before senders block.
pub const REDRAW_DEPTH: usize = 1;

#[derive(Default)]
struct Blocks {
    /// Left to right.
    order: Vec<BlockHandle>,
    names: HashMap<String, usize>,
    /// The sum of all registered widths, where the next block starts.
    xsum: i32,
}

/// An ordered, name addressable set of blocks.
///
/// Any thread may look blocks up. Changes go through `update_*`, which enqueue the changed block on the redraw channel.
pub struct Registry {
    blocks: RwLock<Blocks>,
    redraw: SyncSender<BlockHandle>,
}

impl Registry {
    #[must_use]
    pub fn new(redraw: SyncSender<BlockHandle>) -> Self {
        Self {
            blocks: RwLock::default(),
            redraw,
        }
    }

    /// Places a block right of the previously registered one.
    ///
    /// # Errors
    /// Returns an error if the name is already taken.
    pub fn register(&self, spec: BlockSpec) -> Result<BlockHandle, Error> {
        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        if blocks.names.contains_key(&spec.name) {
            return Err(Error::DuplicateBlock(spec.name));
        }

        let width = i32::from(spec.width);
        let block = Arc::new(Block::new(spec, blocks.xsum));
        log::debug!(
            "registered block {} at x {} w {width}",
            block.name(),
            block.x()
        );

        blocks.xsum += width;
        let index = blocks.order.len();
        blocks.names.insert(block.name().to_owned(), index);
        blocks.order.push(Arc::clone(&block));
        Ok(block)
    }

    /// Looks a block up by name.
    ///
    /// # Errors
    /// Returns `NotFound` if no block has that name.
    pub fn get(&self, name: &str) -> Result<BlockHandle, Error> {
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        blocks
            .names
            .get(name)
            .map(|&i| Arc::clone(&blocks.order[i]))
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// Every block, left to right.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockHandle> {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    /// The combined width of all blocks.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .xsum
    }

    /// Sets the text and requests a redraw if it changed.
    ///
    /// Blocks while the draw engine is busy with earlier requests.
    /// # Errors
    /// Returns an error if the draw engine is gone.
    pub fn update_text(&self, block: &BlockHandle, text: &str) -> Res {
        self.update(block, |s| {
            if s.text != text {
                text.clone_into(&mut s.text);
            }
        })
    }

    /// Sets the background and requests a redraw if it changed.
    ///
    /// # Errors
    /// Returns an error if the draw engine is gone.
    pub fn update_bg(&self, block: &BlockHandle, bg: Color) -> Res {
        self.update(block, |s| s.bg = bg)
    }

    /// Sets the foreground and requests a redraw if it changed.
    ///
    /// # Errors
    /// Returns an error if the draw engine is gone.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn update_fg(&self, block: &BlockHandle, fg: Color) -> Res {
        self.update(block, |s| s.fg = fg)
    }

    fn update(&self, block: &BlockHandle, change: impl FnOnce(&mut BlockState)) -> Res {
        if block.modify(change) {
            self.redraw(block)
        } else {
            log::trace!("block {} unchanged, skipping redraw", block.name());
            Ok(())
        }
    }

    /// Requests a redraw whether or not anything changed.
    ///
    /// # Errors
    /// Returns an error if the draw engine is gone.
    pub fn redraw(&self, block: &BlockHandle) -> Res {
        self.redraw
            .send(Arc::clone(block))
            .map_err(|_| Error::RedrawClosed)
    }

    /// Requests a redraw of every block, left to right.
    ///
    /// # Errors
    /// Returns an error if the draw engine is gone.
    pub fn redraw_all(&self) -> Res {
        self.blocks().iter().try_for_each(|b| self.redraw(b))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use super::*;

    fn registry() -> (Registry, Receiver<BlockHandle>) {
        let (tx, rx) = mpsc::sync_channel(REDRAW_DEPTH);
        (Registry::new(tx), rx)
    }

    #[test]
    fn blocks_are_placed_by_running_width_sum() {
        let (registry, _rx) = registry();
        for (name, width) in [("a", 50), ("b", 100), ("c", 30)] {
            registry
                .register(BlockSpec::new(name, width))
                .expect("unique name");
        }

        let xs: Vec<(String, i32)> = registry
            .blocks()
            .iter()
            .map(|b| (b.name().to_owned(), b.x()))
            .collect();
        assert_eq!(
            xs,
            vec![
                (String::from("a"), 0),
                (String::from("b"), 50),
                (String::from("c"), 150)
            ]
        );
        assert_eq!(registry.width(), 180);
        assert_eq!(registry.get("b").map(|b| b.x()).ok(), Some(50));
    }

    #[test]
    fn unknown_and_duplicate_names_fail() {
        let (registry, _rx) = registry();
        registry.register(BlockSpec::new("a", 10)).expect("unique name");
        assert!(matches!(registry.get("nope"), Err(Error::NotFound(n)) if n == "nope"));
        assert!(matches!(
            registry.register(BlockSpec::new("a", 10)),
            Err(Error::DuplicateBlock(_))
        ));
        assert_eq!(registry.width(), 10);
    }

    #[test]
    fn unchanged_values_do_not_redraw() {
        let (registry, rx) = registry();
        let block = registry.register(BlockSpec::new("a", 10)).expect("unique name");

        registry.update_text(&block, "hello").expect("engine alive");
        registry.update_text(&block, "hello").expect("engine alive");
        assert_eq!(rx.try_iter().count(), 1);

        registry.update_bg(&block, Color::default()).expect("engine alive");
        assert_eq!(rx.try_iter().count(), 0);

        registry
            .update_fg(&block, Color::rgb(1, 2, 3))
            .expect("engine alive");
        let queued = rx.try_recv().expect("one redraw");
        assert!(Arc::ptr_eq(&queued, &block));
        assert_eq!(queued.snapshot().fg, Color::rgb(1, 2, 3));
    }

    #[test]
    fn updates_fail_once_the_engine_is_gone() {
        let (registry, rx) = registry();
        let block = registry.register(BlockSpec::new("a", 10)).expect("unique name");
        drop(rx);
        assert!(matches!(
            registry.update_text(&block, "x"),
            Err(Error::RedrawClosed)
        ));
    }
}
