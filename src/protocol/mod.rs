//! Client-server communication protocol.
//!
//! This module defines the framing protocol spoken between Kino clients and
//! servers, the connection lifecycle on both ends, and the request/response
//! types exchanged over it.
//!
//! # Overview
//!
//! Every exchange uses a fresh TCP connection: the client sends exactly one
//! request frame, the server answers with exactly one response frame, and the
//! connection is closed. There is no connection reuse and no multiplexing.
//!
//! # Binary Format
//!
//! - Each frame begins with a 2 byte big-endian header length.
//! - The header follows: a UTF-8 JSON object naming the content type
//!   (`text`, `json` or `binary`), the content encoding (`utf-8` or `ascii`)
//!   and the content length.
//! - The content follows, `content_length` bytes interpreted per content type.
//!
//! Responses are always `json` content of the shape `{"answer": ...}`.
//!
//! # Key Components
//!
//! - [`frame`]: Pure encoding and decoding of frames.
//! - [`ProtocolTransport`]: Reads frames from a stream that may deliver them in
//!   arbitrary pieces, and writes validated frames.
//! - [`QueryClient`] / [`QueryServer`]: The two ends of an exchange.
//! - [`Request`] / [`Response`]: Logical messages carried inside frames.
//!
//! # See Also
//!
//! - [`dispatch`](crate::dispatch): Turns requests into responses.
mod client;
pub mod frame;
pub mod request;
mod response;
mod server;
mod signal;
mod thread;
pub mod transport;

use thread::ThreadPool;

pub use client::QueryClient;
pub use frame::{Content, ContentType, Encoding, Header, ValidationError};
pub use request::{Category, Request};
pub use response::{Answer, Response, Row};
pub use server::{QueryServer, RESPONSE_ENCODING, ServerError};
pub use signal::ShutdownSignal;
pub use transport::{Phase, ProtocolTransport, TransportError, TransportOptions};
