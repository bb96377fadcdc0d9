use std::sync::{Arc, mpsc::Receiver};

use x11rb::connection::Connection;

use crate::{
    connection::{ConnectionAtomExt, ConnectionHandler},
    error::Res,
    feeds::Feed,
    registry::{BlockHandle, Registry},
    render::Color,
};

/// Highlights the block of the current desktop.
pub struct Workspaces<C: Connection> {
    pub registry: Arc<Registry>,
    /// One block per desktop, in desktop order.
    pub blocks: Vec<BlockHandle>,
    pub active: Color,
    pub inactive: Color,
    pub conn: Arc<ConnectionHandler<C>>,
    /// Fires when `_NET_CURRENT_DESKTOP` changes.
    pub changes: Receiver<()>,
}

/// Gives the block at index `current` the active background and every other block the inactive one.
///
/// # Errors
/// Returns an error if the draw engine is gone.
pub fn highlight(
    registry: &Registry,
    blocks: &[BlockHandle],
    current: u32,
    active: Color,
    inactive: Color,
) -> Res {
    blocks.iter().enumerate().try_for_each(|(i, block)| {
        let bg = if i as u32 == current { active } else { inactive };
        registry.update_bg(block, bg)
    })
}

impl<C: Connection + Send + Sync> Feed for Workspaces<C> {
    fn name(&self) -> &'static str {
        "workspace"
    }

    fn run(self: Box<Self>) -> Res {
        loop {
            match self.conn.get_current_desktop() {
                Ok(Some(current)) => highlight(
                    &self.registry,
                    &self.blocks,
                    current,
                    self.active,
                    self.inactive,
                )?,
                Ok(None) => log::debug!("window manager doesn't set _NET_CURRENT_DESKTOP"),
                Err(e) => log::error!("couldn't read current desktop: {e}"),
            }
            if self.changes.recv().is_err() {
                return Ok(());
            }
            self.changes.try_iter().for_each(drop);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::block::BlockSpec;

    #[test]
    fn only_changed_blocks_are_redrawn() {
        let (tx, rx) = mpsc::sync_channel(16);
        let registry = Registry::new(tx);
        let blocks: Vec<_> = ["www", "irc", "src"]
            .iter()
            .map(|name| registry.register(BlockSpec::new(name, 70)).expect("unique"))
            .collect();
        let (active, inactive) = (Color::rgb(0x72, 0xa7, 0xd3), Color::rgb(0x53, 0x94, 0xc9));

        highlight(&registry, &blocks, 1, active, inactive).expect("engine alive");
        let bgs: Vec<_> = blocks.iter().map(|b| b.snapshot().bg).collect();
        assert_eq!(bgs, vec![inactive, active, inactive]);
        assert_eq!(rx.try_iter().count(), 3);

        highlight(&registry, &blocks, 2, active, inactive).expect("engine alive");
        let redrawn: Vec<_> = rx.try_iter().map(|b| b.name().to_owned()).collect();
        assert_eq!(redrawn, vec![String::from("irc"), String::from("src")]);
    }

    #[test]
    fn unknown_desktops_clear_every_highlight() {
        let (tx, _rx) = mpsc::sync_channel(16);
        let registry = Registry::new(tx);
        let block = registry.register(BlockSpec::new("www", 70)).expect("unique");
        let (active, inactive) = (Color::rgb(1, 1, 1), Color::rgb(2, 2, 2));
        highlight(&registry, &[Arc::clone(&block)], 0, active, inactive).expect("engine alive");
        highlight(&registry, &[Arc::clone(&block)], 7, active, inactive).expect("engine alive");
        assert_eq!(block.snapshot().bg, inactive);
    }
}
