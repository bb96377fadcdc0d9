//!
//! A small client for MPD's line based text protocol, just enough to show what is playing.
use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Read, Write},
    net::TcpStream,
};

use crate::error::Error;

/// The key/value pairs of one response, later keys win.
pub type Attrs = HashMap<String, String>;

/// A connection to an MPD server.
pub struct Client<S: Read + Write> {
    stream: BufReader<S>,
}

impl Client<TcpStream> {
    /// Connects to `address` (`host:port`) and reads the greeting.
    ///
    /// # Errors
    /// Returns an error if the server is unreachable or isn't MPD.
    pub fn connect(address: &str) -> Result<Self, Error> {
        log::debug!("connecting to mpd at {address}");
        Self::from_stream(TcpStream::connect(address)?)
    }
}

impl<S: Read + Write> Client<S> {
    /// Wraps an already open stream and reads the greeting.
    ///
    /// # Errors
    /// Returns an error if the greeting isn't `OK MPD <version>`.
    pub fn from_stream(stream: S) -> Result<Self, Error> {
        let mut stream = BufReader::new(stream);
        let mut greeting = String::new();
        stream.read_line(&mut greeting)?;
        let Some(version) = greeting.trim_end().strip_prefix("OK MPD ") else {
            return Err(Error::Mpd(format!("unexpected greeting {greeting:?}")));
        };
        log::trace!("mpd protocol version {version}");
        Ok(Self { stream })
    }

    /// Sends a command and collects the key/value pairs of its answer.
    ///
    /// # Errors
    /// Returns an error if the server answered with `ACK` or the connection broke.
    pub fn command(&mut self, command: &str) -> Result<Attrs, Error> {
        log::trace!("mpd command {command:?}");
        let writer = self.stream.get_mut();
        writer.write_all(command.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        read_response(&mut self.stream)
    }

    /// `state`, `elapsed`, `duration` and the rest of the player status.
    ///
    /// # Errors
    /// Returns an error if the command failed.
    pub fn status(&mut self) -> Result<Attrs, Error> {
        self.command("status")
    }

    /// The tags of the current song, empty when nothing is queued.
    ///
    /// # Errors
    /// Returns an error if the command failed.
    pub fn current_song(&mut self) -> Result<Attrs, Error> {
        self.command("currentsong")
    }

    /// Blocks until one of the subsystems changes.
    ///
    /// # Errors
    /// Returns an error if the command failed.
    pub fn idle(&mut self, subsystems: &[&str]) -> Result<Attrs, Error> {
        self.command(&format!("idle {}", subsystems.join(" ")))
    }
}

/// Reads `key: value` lines up to the closing `OK`.
///
/// # Errors
/// Returns an error on `ACK`, on a closed stream or on a line that is neither.
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Attrs, Error> {
    let mut attrs = Attrs::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::Mpd(String::from("connection closed")));
        }
        let line = line.trim_end_matches('\n');
        if line == "OK" {
            return Ok(attrs);
        }
        if let Some(ack) = line.strip_prefix("ACK ") {
            return Err(Error::Mpd(ack.to_owned()));
        }
        let Some((key, value)) = line.split_once(": ") else {
            return Err(Error::Mpd(format!("malformed line {line:?}")));
        };
        attrs.insert(key.to_owned(), value.to_owned());
    }
}

#[cfg(test)]
pub mod testing {
    //! A scripted MPD server.
    use std::io::{Cursor, Read, Write};

    /// Replays `input` as the server's side and records what the client wrote.
    pub struct Script {
        input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
    }

    impl Script {
        pub fn new(input: &str) -> Self {
            Self {
                input: Cursor::new(input.as_bytes().to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{testing::Script, *};

    #[test]
    fn parses_pairs_until_ok() {
        let mut reader = Cursor::new("state: play\nelapsed: 12.5\nTitle: a: b\nOK\nleftover\n");
        let attrs = read_response(&mut reader).expect("well formed");
        assert_eq!(attrs["state"], "play");
        assert_eq!(attrs["elapsed"], "12.5");
        assert_eq!(attrs["Title"], "a: b");
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn ack_and_eof_are_errors() {
        let mut ack = Cursor::new("ACK [5@0] {nope} unknown command \"nope\"\n");
        assert!(matches!(
            read_response(&mut ack),
            Err(Error::Mpd(msg)) if msg.contains("unknown command")
        ));
        let mut eof = Cursor::new("state: play\n");
        assert!(read_response(&mut eof).is_err());
        let mut garbage = Cursor::new("what\nOK\n");
        assert!(read_response(&mut garbage).is_err());
    }

    #[test]
    fn client_writes_commands_and_reads_answers() {
        let script = Script::new("OK MPD 0.23.5\nstate: pause\nOK\nchanged: player\nOK\n");
        let mut client = Client::from_stream(script).expect("greeting");
        assert_eq!(client.status().expect("answer")["state"], "pause");
        assert_eq!(
            client.idle(&["player"]).expect("answer")["changed"],
            "player"
        );
        assert_eq!(
            client.stream.get_ref().output,
            b"status\nidle player\n".to_vec()
        );
    }

    #[test]
    fn rejects_other_servers() {
        assert!(Client::from_stream(Script::new("SSH-2.0-OpenSSH\n")).is_err());
    }
}
