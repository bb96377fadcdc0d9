//!
//! This module maps clicks on the bar to the block under the pointer and runs that block's action.
use std::{sync::Arc, thread};

use crate::{
    block::{Block, Button, HitRegion},
    registry::{BlockHandle, Registry},
    render::Measure,
};

/// Whether a click at `ev_x` lands on `block`, given the width of its text.
#[must_use]
pub fn hit(block: &Block, ev_x: i32, bar_width: i32, text_width: i32) -> bool {
    let (start, end) = match block.hit() {
        HitRegion::Span => (block.x(), block.x() + block.w()),
        HitRegion::TextTail => (
            block.x() + (block.w() - text_width + 2 * block.xoff()),
            block.x() + block.w(),
        ),
        HitRegion::BarCenter { margin } => (
            bar_width / 2 - text_width / 2 - margin,
            bar_width / 2 + text_width / 2 + margin,
        ),
    };
    (start..end).contains(&ev_x)
}

/// Routes button presses to block actions.
pub struct Dispatcher {
    registry: Arc<Registry>,
    measure: Arc<dyn Measure>,
    bar_width: i32,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, measure: Arc<dyn Measure>, bar_width: i32) -> Self {
        Self {
            registry,
            measure,
            bar_width,
        }
    }

    /// The leftmost block whose hit region contains `ev_x`.
    #[must_use]
    pub fn find(&self, ev_x: i32) -> Option<BlockHandle> {
        self.registry.blocks().into_iter().find(|block| {
            let text_width = match block.hit() {
                HitRegion::Span => 0,
                HitRegion::TextTail | HitRegion::BarCenter { .. } => {
                    self.measure.text_width(&block.text())
                }
            };
            hit(block, ev_x, self.bar_width, text_width)
        })
    }

    /// Runs the action bound to `detail` on the clicked block on its own thread.
    ///
    /// The thread is never joined. Clicks outside every block and unbound buttons do nothing.
    pub fn dispatch(&self, ev_x: i32, detail: u8) -> Option<thread::JoinHandle<()>> {
        let button = Button::from_detail(detail)?;
        let Some(block) = self.find(ev_x) else {
            log::trace!("click at {ev_x} hit no block");
            return None;
        };
        let action = block.action(button)?;
        log::debug!("running {button:?} action of block {}", block.name());

        let name = block.name().to_owned();
        let spawned = thread::Builder::new()
            .name(format!("{name}-action"))
            .spawn(move || {
                if let Err(e) = action() {
                    log::error!("{button:?} action of block {name} failed: {e}");
                }
            });
        spawned
            .inspect_err(|e| log::error!("couldn't start action thread: {e}"))
            .ok()
    }
}
