use std::net::TcpStream;

use log::{debug, error};

use super::{
    Content, ContentType, Header,
    transport::{ProtocolTransport, TransportError, TransportOptions, configure_stream},
};

/// Sends one request per connection and waits for its answer.
#[derive(Debug, Clone)]
pub struct QueryClient {
    address: String,
    options: TransportOptions,
}

impl QueryClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_options(address, TransportOptions::default())
    }

    pub fn with_options(address: impl Into<String>, options: TransportOptions) -> Self {
        Self {
            address: address.into(),
            options,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Open a connection, send `request`, read one response frame and close.
    ///
    /// The connection is closed exactly once whichever way the exchange ends.
    pub fn exchange(
        &self,
        request: &Content,
        content_type: &ContentType,
        encoding: &str,
    ) -> Result<(Header, Content), TransportError> {
        let stream = TcpStream::connect(&self.address)?;
        configure_stream(&stream, &self.options)?;
        debug!("connected to {}", self.address);

        let mut transport = ProtocolTransport::with_options(stream, self.options.clone());
        let result = transport
            .write_frame(content_type, encoding, request)
            .and_then(|()| transport.read_frame());
        transport.close();

        if let Err(e) = &result {
            error!("an error occurred when exchanging data with {}: {e}", self.address);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Read, net::TcpListener, thread};

    use super::*;
    use crate::protocol::frame::ValidationError;

    #[test]
    fn invalid_request_sends_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let client = QueryClient::new(address.to_string());
        let err = client
            .exchange(&Content::Binary(vec![1, 2, 3]), &ContentType::Json, "utf-8")
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::Validation(ValidationError::ContentMismatch { .. })
        ));
        assert!(peer.join().unwrap().is_empty());
    }

    #[test]
    fn unsupported_encoding_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = QueryClient::new(listener.local_addr().unwrap().to_string());

        let err = client
            .exchange(&Content::Text("x".into()), &ContentType::Text, "utf-16")
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Validation(ValidationError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn peer_closing_without_answer_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let client = QueryClient::new(address.to_string());
        let result = client.exchange(&Content::Text("title, Heat".into()), &ContentType::Text, "utf-8");
        peer.join().unwrap();

        assert!(result.is_err());
    }
}
