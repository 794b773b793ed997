//! Line transport to the leader device.
//!
//! The leader is a USB serial port (`/dev/ttyACM*` and friends) that prints
//! telemetry lines and accepts commands. It is opened at the configured
//! baud rate with 8 data bits, no parity and one stop bit. Two replay modes
//! bypass the serial layer: a regular file is read as a capture (commands
//! are discarded), and `-` reads standard input and writes commands to
//! standard output.
//!
//! Reads are blocking and run on a dedicated thread. The serial port is
//! opened with a read timeout so the thread notices a closed line channel
//! and exits on its own.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use meshscope_core::config::{TransportConfig, STDIN_DEVICE};
use meshscope_core::parser::decode_line;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the channel carrying decoded lines to the ingest loop.
pub const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Serial read timeout. Bounds how long the reader thread takes to notice
/// that nobody is listening any more.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors raised by the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A capture file could not be opened.
    #[error("failed to open {device}: {source}")]
    Open {
        /// The configured device path.
        device: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The serial port could not be opened or configured.
    #[error("failed to open serial port {device}: {source}")]
    Serial {
        /// The configured device path.
        device: String,
        /// The underlying serial port error.
        source: serialport::Error,
    },

    /// Reading from the device failed.
    #[error("read failed: {source}")]
    Read {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Writing a command to the device failed.
    #[error("write failed: {source}")]
    Write {
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Boxed blocking byte source.
pub type LineSource = Box<dyn Read + Send>;

/// Writes framed commands to the device.
///
/// Writes are blocking, so each one is handed to the blocking pool.
#[derive(Clone)]
pub struct CommandWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl CommandWriter {
    /// Wrap any blocking writer.
    pub fn new(inner: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(inner))),
        }
    }

    /// Write one already framed command and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Write`] if the device rejects the bytes.
    pub async fn send(&self, framed: &str) -> Result<(), TransportError> {
        let inner = Arc::clone(&self.inner);
        let bytes = framed.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || {
            let mut writer = inner
                .lock()
                .map_err(|e| io::Error::other(e.to_string()))?;
            writer.write_all(&bytes)?;
            writer.flush()
        })
        .await
        .map_err(|e| TransportError::Write {
            source: io::Error::other(e),
        })?
        .map_err(|source| TransportError::Write { source })
    }
}

/// An opened device, split into its read and write halves.
pub struct Transport {
    /// Raw telemetry bytes.
    pub reader: LineSource,
    /// Outbound command sink.
    pub writer: CommandWriter,
}

/// Open the configured device.
///
/// # Errors
///
/// Returns [`TransportError::Serial`] if the serial port cannot be opened
/// or configured, and [`TransportError::Open`] if a capture file cannot be
/// read.
pub fn open(config: &TransportConfig) -> Result<Transport, TransportError> {
    if config.device == STDIN_DEVICE {
        info!("Transport replaying standard input");
        return Ok(Transport {
            reader: Box::new(io::stdin()),
            writer: CommandWriter::new(io::stdout()),
        });
    }

    let is_capture = std::fs::metadata(&config.device).is_ok_and(|meta| meta.is_file());
    if is_capture {
        return open_capture(&config.device);
    }
    open_serial(config)
}

fn open_capture(device: &str) -> Result<Transport, TransportError> {
    let file = std::fs::File::open(device).map_err(|source| TransportError::Open {
        device: device.to_owned(),
        source,
    })?;
    info!(device, "Transport replaying capture file, commands will be discarded");
    Ok(Transport {
        reader: Box::new(file),
        writer: CommandWriter::new(io::sink()),
    })
}

fn open_serial(config: &TransportConfig) -> Result<Transport, TransportError> {
    let serial_err = |source: serialport::Error| TransportError::Serial {
        device: config.device.clone(),
        source,
    };

    let mut port = serialport::new(config.device.as_str(), config.baud_rate)
        .timeout(READ_TIMEOUT)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .open()
        .map_err(serial_err)?;

    // USB CDC boards only start talking once DTR is raised.
    if let Err(e) = port.write_data_terminal_ready(true) {
        debug!(error = %e, "Could not raise DTR");
    }
    let write_half = port.try_clone().map_err(serial_err)?;

    info!(
        device = %config.device,
        baud_rate = config.baud_rate,
        "Serial port opened"
    );
    Ok(Transport {
        reader: Box::new(port),
        writer: CommandWriter::new(write_half),
    })
}

/// Run [`read_lines`] on the blocking pool, logging how it ended.
pub fn spawn_reader(reader: LineSource, tx: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match read_lines(reader, &tx) {
        Ok(forwarded) => info!(forwarded, "Transport reader finished"),
        Err(e) => warn!(error = %e, "Transport reader stopped"),
    })
}

/// Read newline-terminated lines from `reader` and forward them, decoded
/// and trimmed, to `tx`. Empty lines are skipped.
///
/// A read that times out keeps the partial line and checks whether `tx`
/// is still wanted. Returns the number of lines forwarded once the source
/// reaches end of input or the receiving side goes away.
///
/// Must be called outside the async runtime (it uses
/// [`mpsc::Sender::blocking_send`]).
///
/// # Errors
///
/// Returns [`TransportError::Read`] if the source fails.
pub fn read_lines<R>(reader: R, tx: &mpsc::Sender<String>) -> Result<u64, TransportError>
where
    R: Read,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarded: u64 = 0;

    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(read) => {
                let line = decode_line(&buf);
                buf.clear();
                if !line.is_empty() {
                    if tx.blocking_send(line).is_err() {
                        debug!("Line receiver dropped, stopping reader");
                        return Ok(forwarded);
                    }
                    forwarded = forwarded.saturating_add(1);
                }
                if read == 0 {
                    debug!(forwarded, "Transport reached end of input");
                    return Ok(forwarded);
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if tx.is_closed() {
                    debug!("Line receiver dropped, stopping reader");
                    return Ok(forwarded);
                }
            }
            Err(source) => return Err(TransportError::Read { source }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use super::*;

    /// Source that replays a fixed sequence of chunks and timeouts, then
    /// times out forever like a silent serial port.
    struct Scripted(VecDeque<Option<&'static [u8]>>);

    impl Read for Scripted {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Some(chunk)) => {
                    out.get_mut(..chunk.len()).unwrap().copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                Some(None) | None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    /// Writer whose bytes the test can inspect after the writer is moved.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn forwards_decoded_non_empty_lines() {
        let input = Cursor::new(b"Received from fd00::1 hi\r\n\r\n   \nboot\xff ok\nlast line".to_vec());
        let (tx, mut rx) = mpsc::channel(8);

        let forwarded = read_lines(input, &tx).unwrap();
        drop(tx);
        assert_eq!(forwarded, 3);
        assert_eq!(rx.blocking_recv().unwrap(), "Received from fd00::1 hi");
        assert_eq!(rx.blocking_recv().unwrap(), "boot ok");
        assert_eq!(rx.blocking_recv().unwrap(), "last line");
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert_eq!(read_lines(Cursor::new(b"one\ntwo\n".to_vec()), &tx).unwrap(), 0);
    }

    #[test]
    fn timeouts_keep_the_partial_line() {
        let source = Scripted(VecDeque::from([
            Some(&b"Received from fd00::1 te"[..]),
            None,
            Some(&b"mp=21\nsecond"[..]),
            None,
            Some(&b" line\n"[..]),
        ]));
        let (tx, mut rx) = mpsc::channel(8);

        let reader = std::thread::spawn(move || read_lines(source, &tx));
        assert_eq!(rx.blocking_recv().unwrap(), "Received from fd00::1 temp=21");
        assert_eq!(rx.blocking_recv().unwrap(), "second line");

        // The source now times out forever; dropping the receiver ends it.
        drop(rx);
        assert_eq!(reader.join().unwrap().unwrap(), 2);
    }

    #[test]
    fn silent_source_exits_once_the_receiver_closes() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(rx);
        let forwarded = read_lines(Scripted(VecDeque::new()), &tx).unwrap();
        assert_eq!(forwarded, 0);
    }

    #[test]
    fn read_errors_other_than_timeouts_are_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _out: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
            }
        }

        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            read_lines(Broken, &tx),
            Err(TransportError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn command_writer_sends_bytes_verbatim() {
        let sink = SharedBuf::default();
        let writer = CommandWriter::new(sink.clone());
        writer.send("ping fd00::1\r\n").await.unwrap();
        writer.send("ipaddr\r\n").await.unwrap();

        let written = sink.0.lock().unwrap().clone();
        assert_eq!(written, b"ping fd00::1\r\nipaddr\r\n");
    }

    #[test]
    fn replays_a_capture_file() {
        let path = std::env::temp_dir().join(format!(
            "meshscope-transport-{}.log",
            std::process::id()
        ));
        std::fs::write(&path, "from fd00::2 temp=20\n").unwrap();

        let config = TransportConfig {
            device: path.to_string_lossy().into_owned(),
            baud_rate: 115_200,
        };
        let transport = open(&config).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        read_lines(transport.reader, &tx).unwrap();
        assert_eq!(rx.blocking_recv().unwrap(), "from fd00::2 temp=20");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_device_is_a_serial_error() {
        let config = TransportConfig {
            device: "/nonexistent/meshscope/tty".to_owned(),
            baud_rate: 115_200,
        };
        assert!(matches!(open(&config), Err(TransportError::Serial { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn non_tty_character_device_is_not_replayed() {
        let config = TransportConfig {
            device: "/dev/null".to_owned(),
            baud_rate: 115_200,
        };
        assert!(matches!(open(&config), Err(TransportError::Serial { .. })));
    }
}
