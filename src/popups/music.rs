//!
//! The music block's popup: album details, album art and a progress bar of the current song.
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::{
    error::{Error, Res},
    mpd::{Attrs, Client},
    popup::PopupContent,
    render::{Color, Surface},
};

/// Longer lines are cut.
const LINE_LENGTH: usize = 32;
/// The column album details are centered on.
const TEXT_CENTER: i32 = 82;
const PROGRESS_DASHES: usize = 29;

pub struct Music {
    pub address: String,
    /// The directory MPD's file paths are relative to.
    pub music_directory: PathBuf,
    /// The file name of the album art next to a track.
    pub cover: String,
    pub bg: Color,
    pub fg: Color,
    /// The color of the part of the song still to come.
    pub remaining: Color,
}

/// Cuts `text` to `max` characters, marking the cut with an ellipsis.
#[must_use]
pub fn trim(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut trimmed: String = text.chars().take(max.saturating_sub(1)).collect();
    trimmed.push('…');
    trimmed
}

/// Splits the progress bar into played and unplayed dashes from MPD's `elapsed` and `duration`.
///
/// # Errors
/// Returns an error if either is missing, unparsable, or the duration isn't positive.
pub fn progress(status: &Attrs) -> Result<(usize, usize), Error> {
    let seconds = |key: &str| {
        status
            .get(key)
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| Error::Mpd(format!("status has no usable {key}")))
    };
    let (elapsed, duration) = (seconds("elapsed")?, seconds("duration")?);
    if duration <= 0.0 {
        return Err(Error::Mpd(String::from("song has no duration")));
    }
    let played = ((elapsed / duration * PROGRESS_DASHES as f64).round() as usize).min(PROGRESS_DASHES);
    Ok((played, PROGRESS_DASHES - played))
}

impl Music {
    /// Where the album art of `song` would be.
    fn cover_path(&self, song: &Attrs) -> Option<PathBuf> {
        let file = song.get("file")?;
        let dir = Path::new(file).parent().unwrap_or_else(|| Path::new(""));
        Some(self.music_directory.join(dir).join(&self.cover))
    }

    fn load_cover(&self, song: &Attrs) -> Result<Option<RgbaImage>, Error> {
        match self.cover_path(song) {
            Some(path) if path.exists() => {
                log::debug!("loading cover {}", path.display());
                Ok(Some(image::open(path)?.to_rgba8()))
            }
            _ => Ok(None),
        }
    }

    fn draw_centered(&self, surface: &mut dyn Surface, baseline: i32, text: &str) {
        let text = trim(text, LINE_LENGTH);
        let x = TEXT_CENTER - surface.text_width(&text) / 2;
        surface.draw_text(x, baseline, self.fg, &text);
    }
}

impl PopupContent for Music {
    fn update(&mut self, surface: &mut dyn Surface) -> Res {
        let mut client = Client::connect(&self.address)?;
        let song = client.current_song()?;
        let status = client.status()?;
        let (played, unplayed) = progress(&status)?;
        let cover = self.load_cover(&song)?;
        let tag = |key: &str| song.get(key).map_or("", String::as_str);

        surface.fill_rect(surface.bounds(), self.bg);
        self.draw_centered(surface, 48, tag("Album"));
        self.draw_centered(surface, 74, &format!("Artist: {}", tag("AlbumArtist")));
        self.draw_centered(surface, 90, &format!("Release date: {}", tag("Date")));

        match &cover {
            Some(cover) => surface.draw_image(166, 10, cover),
            None => {
                surface.draw_text(200, 78, self.fg, "No cover found!");
            }
        }

        let x = 10 + surface.draw_text(10, 132, self.fg, &"-".repeat(played));
        surface.draw_text(x, 132, self.remaining, &"-".repeat(unplayed));
        Ok(())
    }
}
