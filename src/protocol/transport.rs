use std::{
    cmp,
    io::{self, ErrorKind, Read, Write},
    net::{Shutdown, TcpStream},
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace};
use strum::Display;
use thiserror::Error;

use super::{
    ShutdownSignal,
    frame::{self, Content, ContentType, HEADER_LEN_SIZE, Header, ValidationError},
};

/// Maximum number of bytes pulled from the stream per read.
const READ_CHUNK_SIZE: usize = 1024;

/// Longest a blocking socket read may park before deadlines and the shutdown
/// signal are checked again.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sections of a frame, read strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    #[strum(to_string = "header length")]
    HeaderLength,
    #[strum(to_string = "header")]
    Header,
    #[strum(to_string = "content")]
    Content,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("connection fault: {0}")]
    ConnectionFault(#[from] io::Error),
    #[error("timed out while reading {0}")]
    Timeout(Phase),
    #[error("cancelled while reading {0}")]
    Cancelled(Phase),
}

/// A byte stream that can be torn down in both directions.
pub trait Connection: Read + Write {
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Deadline applied to each read phase separately.
    pub phase_timeout: Option<Duration>,
    /// Artificial pause after every successful read, used to exercise partial
    /// frames.
    pub latency: Option<Duration>,
    pub shutdown: Option<ShutdownSignal>,
}

impl TransportOptions {
    fn poll_interval(&self) -> Option<Duration> {
        let interval = match (self.phase_timeout, &self.shutdown) {
            (Some(timeout), _) => cmp::min(timeout, READ_POLL_INTERVAL),
            (None, Some(_)) => READ_POLL_INTERVAL,
            (None, None) => return None,
        };
        Some(cmp::max(interval, Duration::from_millis(1)))
    }
}

/// Prepare a socket so blocking reads wake up often enough to honour the
/// configured deadlines and shutdown signal.
pub fn configure_stream(stream: &TcpStream, options: &TransportOptions) -> io::Result<()> {
    stream.set_read_timeout(options.poll_interval())
}

/// Reads and writes whole frames over a byte stream.
///
/// Incoming bytes are accumulated in a buffer owned by this transport; each
/// frame section is sliced off the front once enough bytes have arrived, so
/// surplus bytes read along with one section are kept for the next.
pub struct ProtocolTransport<T: Connection> {
    stream: T,
    buffer: Vec<u8>,
    options: TransportOptions,
    closed: bool,
}

impl<T: Connection> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self::with_options(stream, TransportOptions::default())
    }

    pub fn with_options(stream: T, options: TransportOptions) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK_SIZE),
            options,
            closed: false,
        }
    }

    /// Encode and send one frame.
    ///
    /// A frame that fails validation is never written; the connection is
    /// closed before the error is returned.
    pub fn write_frame(
        &mut self,
        content_type: &ContentType,
        encoding: &str,
        content: &Content,
    ) -> Result<(), TransportError> {
        let frame = match frame::encode(content_type, encoding, content) {
            Ok(frame) => frame,
            Err(e) => {
                self.close();
                return Err(e.into());
            }
        };

        debug!("sending {} frame of {} bytes", content_type, frame.len());
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Receive one frame, reading as many times as the stream requires.
    pub fn read_frame(&mut self) -> Result<(Header, Content), TransportError> {
        let header_len = self.read_header_len()?;
        let header = self.read_header(header_len)?;
        let content = self.read_content(&header)?;
        Ok((header, content))
    }

    /// Tear the connection down. Only the first call reaches the stream.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.stream.shutdown() {
            Ok(()) => debug!("connection closed"),
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => debug!("failed to shut down connection: {e}"),
        }
    }

    /// A peer that closes before sending anything yields a length of zero.
    fn read_header_len(&mut self) -> Result<usize, TransportError> {
        let deadline = self.deadline();
        while self.buffer.len() < HEADER_LEN_SIZE {
            if self.fill(Phase::HeaderLength, deadline)? == 0 {
                if self.buffer.is_empty() {
                    return Ok(0);
                }
                return Err(unexpected_eof(Phase::HeaderLength));
            }
        }

        let len = frame::decode_header_len(&self.buffer[..HEADER_LEN_SIZE])?;
        self.buffer.drain(..HEADER_LEN_SIZE);
        Ok(len as usize)
    }

    fn read_header(&mut self, header_len: usize) -> Result<Header, TransportError> {
        if header_len == 0 {
            return Err(ValidationError::EmptyHeader.into());
        }

        self.fill_to(header_len, Phase::Header)?;
        let header = frame::decode_header(&self.buffer[..header_len])?;
        self.buffer.drain(..header_len);
        Ok(header)
    }

    fn read_content(&mut self, header: &Header) -> Result<Content, TransportError> {
        let len = header.content_length;

        self.fill_to(len, Phase::Content)?;
        let content = frame::decode_content(header, &self.buffer[..len])?;
        self.buffer.drain(..len);
        Ok(content)
    }

    fn fill_to(&mut self, len: usize, phase: Phase) -> Result<(), TransportError> {
        let deadline = self.deadline();
        while self.buffer.len() < len {
            if self.fill(phase, deadline)? == 0 {
                return Err(unexpected_eof(phase));
            }
        }
        Ok(())
    }

    /// Perform a single successful read into the buffer, returning the number
    /// of bytes received. Zero means the peer closed its side.
    fn fill(&mut self, phase: Phase, deadline: Option<Instant>) -> Result<usize, TransportError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(signal) = &self.options.shutdown {
                if signal.is_triggered() {
                    return Err(TransportError::Cancelled(phase));
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(TransportError::Timeout(phase));
                }
            }

            match self.stream.read(&mut chunk) {
                Ok(n) => {
                    trace!("read {n} bytes during {phase} phase");
                    if let Some(latency) = self.options.latency {
                        thread::sleep(latency);
                    }
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.options.phase_timeout.map(|t| Instant::now() + t)
    }
}

impl<T: Connection> Drop for ProtocolTransport<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn unexpected_eof(phase: Phase) -> TransportError {
    TransportError::ConnectionFault(io::Error::new(
        ErrorKind::UnexpectedEof,
        format!("peer closed the connection while sending {phase}"),
    ))
}
