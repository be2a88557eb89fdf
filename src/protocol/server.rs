use std::{
    io::{self, ErrorKind},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{
    config::ServerConfig,
    dispatch::{Dispatcher, UNPROCESSABLE},
    executor::QueryExecutor,
    protocol::{
        ContentType, Response, ShutdownSignal, ThreadPool,
        transport::{ProtocolTransport, TransportError, TransportOptions, configure_stream},
    },
};

/// Responses are always JSON in this encoding.
pub const RESPONSE_ENCODING: &str = "utf-8";

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("listener error: {0}")]
    Listener(#[from] io::Error),
}

/// Accepts connections and answers exactly one request on each.
pub struct QueryServer<E> {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<E>>,
    options: TransportOptions,
    shutdown: ShutdownSignal,
    pool: ThreadPool,
}

impl<E: QueryExecutor + 'static> QueryServer<E> {
    pub fn bind(config: &ServerConfig, executor: E) -> Result<Self, ServerError> {
        if config.workers == 0 {
            return Err(ServerError::NoWorkers);
        }
        let listener = TcpListener::bind(config.address)?;

        let mut options = config.transport.clone();
        let shutdown = options.shutdown.get_or_insert_with(ShutdownSignal::new).clone();

        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(executor)),
            options,
            shutdown,
            pool: ThreadPool::new(config.workers),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Signal that stops the accept loop and cancels pending reads.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Serve until the shutdown signal is triggered, then wait for in-flight
    /// connections to finish.
    pub fn listen(self) -> Result<(), ServerError> {
        info!("listening at {}", self.local_addr()?);
        self.listener.set_nonblocking(true)?;

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("accepted connection from {peer}");
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let options = self.options.clone();
                    self.pool.execute(move || {
                        handle_connection(stream, peer, &*dispatcher, options)
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
                Err(e) => {
                    warn!("broken connection: {e:?}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("shutting down");
        Ok(())
    }
}

fn handle_connection<E: QueryExecutor>(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: &Dispatcher<E>,
    options: TransportOptions,
) {
    if let Err(e) = serve(stream, peer, dispatcher, options) {
        warn!("an error occurred: {e} when address {peer} connected");
    }
}

/// Read one request, answer it, close. A request that can not be read is
/// dropped without an answer.
fn serve<E: QueryExecutor>(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: &Dispatcher<E>,
    options: TransportOptions,
) -> Result<(), TransportError> {
    stream.set_nonblocking(false)?;
    configure_stream(&stream, &options)?;
    let mut transport = ProtocolTransport::with_options(stream, options);

    let (header, request) = transport.read_frame()?;
    info!(
        "received {} request of {} bytes from {peer}",
        header.content_type, header.content_length
    );

    let response = dispatcher.dispatch(&request).unwrap_or_else(|e| {
        error!("query for {peer} failed: {e}");
        Response::message(UNPROCESSABLE)
    });

    transport.write_frame(&ContentType::Json, RESPONSE_ENCODING, &response.into())?;
    transport.close();
    Ok(())
}
