//!
//! Errors found throughout the bar.
use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// A shorthand for `Result<(), Error>`.
///
/// Most drawing and feed functions only report success, so they return this type to be able to use the `?` syntax and bubble the error.
pub type Res = Result<(), Error>;

/// Everything that can go wrong while running the bar.
#[derive(Debug, Error)]
pub enum Error {
    /// A block was looked up by a name that was never registered.
    #[error("no block named {0:?} was registered")]
    NotFound(String),

    /// A block name was registered twice.
    #[error("a block named {0:?} is already registered")]
    DuplicateBlock(String),

    /// The alignment tag of a block is none of `l`, `c`, `r` or `a`.
    #[error("{0:?} is not a valid alignment")]
    InvalidAlignment(char),

    /// The draw engine stopped listening.
    #[error("the redraw channel is closed")]
    RedrawClosed,

    /// A color string could not be parsed.
    #[error("{0:?} is not a #rrggbb color")]
    Color(String),

    /// The font file was read but could not be parsed.
    #[error("couldn't load font: {0}")]
    Font(&'static str),

    /// The MPD server answered with an error or something unexpected.
    #[error("mpd: {0}")]
    Mpd(String),

    /// A popup's data source returned something unusable.
    #[error("bad data from {source_name}: {reason}")]
    Data {
        /// Where the data came from.
        source_name: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Failure to connect to the server.
    #[error("failed to connect to the X11 server: {0}")]
    Connect(#[from] ConnectError),

    /// The connection to the server broke.
    #[error("x11 connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The server answered a request with an error.
    #[error("x11 reply error: {0}")]
    Reply(#[from] ReplyError),

    /// The server answered a request with an error or ran out of ids.
    #[error("x11 error: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("http error: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Self::Http(Box::new(e))
    }
}
