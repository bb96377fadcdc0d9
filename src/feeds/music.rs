use std::{net::TcpStream, sync::Arc, thread, time::Duration};

use crate::{
    error::{Error, Res},
    feeds::Feed,
    mpd::{Attrs, Client},
    popup::Popup,
    registry::{BlockHandle, Registry},
};

/// Shows the current song, waking up on every MPD player event.
pub struct Music {
    pub registry: Arc<Registry>,
    pub block: BlockHandle,
    /// The `host:port` MPD listens on.
    pub address: String,
    /// How long to wait before reconnecting after an error.
    pub retry: Duration,
    /// Repainted after each event while it is open.
    pub popup: Option<Arc<Popup>>,
}

/// `[playing] Artist - Title`, from the answers to `status` and `currentsong`.
#[must_use]
pub fn now_playing(status: &Attrs, song: &Attrs) -> String {
    let state = match status.get("state").map(String::as_str) {
        Some("play") => "[playing] ",
        _ => "[paused] ",
    };
    let tag = |key: &str| song.get(key).map_or("", String::as_str);
    format!("{state}{} - {}", tag("Artist"), tag("Title"))
}

impl Music {
    fn refresh(&self, client: &mut Client<TcpStream>) -> Res {
        let status = client.status()?;
        let song = client.current_song()?;
        self.registry
            .update_text(&self.block, &now_playing(&status, &song))?;

        if let Some(popup) = &self.popup {
            if let Err(e) = popup.update() {
                log::error!("couldn't refresh music popup: {e}");
            }
        }
        Ok(())
    }
}

impl Feed for Music {
    fn name(&self) -> &'static str {
        "music"
    }

    fn run(self: Box<Self>) -> Res {
        let mut client = Some(Client::connect(&self.address)?);
        loop {
            let Some(conn) = client.as_mut() else {
                thread::sleep(self.retry);
                client = Client::connect(&self.address)
                    .inspect_err(|e| log::error!("couldn't reconnect to mpd: {e}"))
                    .ok();
                continue;
            };

            let result = self
                .refresh(conn)
                .and_then(|()| conn.idle(&["player"]).map(drop));
            match result {
                Ok(()) => (),
                Err(Error::RedrawClosed) => return Err(Error::RedrawClosed),
                Err(e) => {
                    log::error!("lost mpd: {e}");
                    client = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attrs {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn formats_the_player_state() {
        let song = attrs(&[("Artist", "Boards of Canada"), ("Title", "Roygbiv")]);
        assert_eq!(
            now_playing(&attrs(&[("state", "play")]), &song),
            "[playing] Boards of Canada - Roygbiv"
        );
        assert_eq!(
            now_playing(&attrs(&[("state", "pause")]), &song),
            "[paused] Boards of Canada - Roygbiv"
        );
    }

    #[test]
    fn missing_tags_stay_empty() {
        assert_eq!(
            now_playing(&attrs(&[("state", "stop")]), &Attrs::new()),
            "[paused]  - "
        );
    }
}
