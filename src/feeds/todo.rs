use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    sync::Arc,
};

use inotify::{EventMask, Inotify, WatchMask};

use crate::{
    error::{Error, Res},
    feeds::Feed,
    registry::{BlockHandle, Registry},
};

/// Shows how many lines a file has, re-counting whenever it is written.
pub struct Todo {
    pub registry: Arc<Registry>,
    pub block: BlockHandle,
    pub path: PathBuf,
}

/// The number of lines, counting a last line without a newline.
///
/// # Errors
/// Returns an error if reading fails.
pub fn count_lines(reader: impl BufRead) -> Result<usize, Error> {
    reader
        .lines()
        .try_fold(0, |count, line| line.map(|_| count + 1))
        .map_err(Error::from)
}

/// What a batch of watch events means for the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Change {
    /// The contents may differ.
    pub written: bool,
    /// The watched file was replaced or removed, so the watch is gone.
    pub replaced: bool,
}

impl Change {
    /// Folds one event's mask into the batch.
    #[must_use]
    pub fn with(self, mask: EventMask) -> Self {
        Self {
            written: self.written || mask.intersects(EventMask::MODIFY | EventMask::CLOSE_WRITE),
            replaced: self.replaced
                || mask.intersects(EventMask::DELETE_SELF | EventMask::MOVE_SELF | EventMask::IGNORED),
        }
    }
}

impl Todo {
    fn watch(&self, inotify: &Inotify) -> Res {
        inotify.watches().add(
            &self.path,
            WatchMask::MODIFY | WatchMask::CLOSE_WRITE | WatchMask::DELETE_SELF | WatchMask::MOVE_SELF,
        )?;
        Ok(())
    }

    fn refresh(&self) -> Res {
        let count = count_lines(BufReader::new(File::open(&self.path)?))?;
        log::trace!("{} has {count} lines", self.path.display());
        self.registry.update_text(&self.block, &count.to_string())
    }
}

impl Feed for Todo {
    fn name(&self) -> &'static str {
        "todo"
    }

    fn run(self: Box<Self>) -> Res {
        let mut inotify = Inotify::init()?;
        self.watch(&inotify)?;
        self.refresh()?;

        let mut buffer = [0; 1024];
        loop {
            let change = inotify
                .read_events_blocking(&mut buffer)?
                .fold(Change::default(), |change, event| change.with(event.mask));
            log::trace!("{} changed: {change:?}", self.path.display());

            // editors that save by renaming leave the old inode behind
            if change.replaced {
                if let Err(e) = self.watch(&inotify) {
                    log::error!("couldn't watch {} again: {e}", self.path.display());
                    continue;
                }
            }
            if change.written || change.replaced {
                match self.refresh() {
                    Err(Error::RedrawClosed) => return Err(Error::RedrawClosed),
                    Err(e) => log::error!("couldn't count {}: {e}", self.path.display()),
                    Ok(()) => (),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        io::{Cursor, Write},
        sync::mpsc,
        time::Duration,
    };

    use super::*;
    use crate::{block::BlockSpec, feeds, registry::REDRAW_DEPTH};

    #[test]
    fn counts_lines() {
        let count = |s: &str| count_lines(Cursor::new(s)).expect("in memory");
        assert_eq!(count(""), 0);
        assert_eq!(count("milk\n"), 1);
        assert_eq!(count("milk\neggs"), 2);
        assert_eq!(count("milk\n\neggs\n"), 3);
    }

    #[test]
    fn classifies_events() {
        let none = Change::default();
        assert_eq!(none.with(EventMask::ACCESS), none);
        assert!(none.with(EventMask::CLOSE_WRITE).written);
        let moved = none.with(EventMask::MOVE_SELF).with(EventMask::IGNORED);
        assert!(moved.replaced);
        assert!(!moved.written);
    }

    #[test]
    fn writes_are_picked_up_immediately() {
        let path = std::env::temp_dir().join(format!("melonbar-todo-{}", std::process::id()));
        fs::write(&path, "milk\n").expect("temp dir is writable");

        let (tx, rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Arc::new(Registry::new(tx));
        let block = registry.register(BlockSpec::new("todo", 29)).expect("unique");
        feeds::spawn(Box::new(Todo {
            registry: Arc::clone(&registry),
            block: Arc::clone(&block),
            path: path.clone(),
        }))
        .expect("thread spawns");

        let first = rx.recv_timeout(Duration::from_secs(2)).expect("initial count");
        assert_eq!(first.text(), "1");

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("file exists");
        file.write_all(b"eggs\n").expect("append");
        drop(file);

        let second = rx
            .recv_timeout(Duration::from_millis(500))
            .expect("write noticed without a timer");
        assert_eq!(second.text(), "2");
        fs::remove_file(&path).expect("cleanup");
    }
}
