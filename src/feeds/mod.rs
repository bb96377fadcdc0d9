//!
//! Feeds are the threads that watch a data source and write what they see into blocks.
use std::{process, thread};

use crate::error::{Error, Res};

pub mod clock;
pub mod music;
pub mod todo;
pub mod window;
pub mod workspace;

/// A long running producer of block updates.
pub trait Feed: Send {
    fn name(&self) -> &'static str;
    /// Runs until the source goes away for good.
    ///
    /// # Errors
    /// Returns an error if the source couldn't be set up, or the draw engine stopped.
    fn run(self: Box<Self>) -> Res;
}

/// Starts a feed on its own thread.
///
/// A feed that fails takes the whole bar down; a bar that silently stops updating is worse.
/// # Errors
/// Returns an error if the thread couldn't be spawned.
pub fn spawn(feed: Box<dyn Feed>) -> Result<thread::JoinHandle<()>, Error> {
    let name = feed.name();
    log::info!("starting feed {name}");
    let handle = thread::Builder::new()
        .name(format!("{name}-feed"))
        .spawn(move || match feed.run() {
            Ok(()) => log::info!("feed {name} finished"),
            Err(e) => {
                log::error!("feed {name} failed: {e}");
                process::exit(1);
            }
        })?;
    Ok(handle)
}
