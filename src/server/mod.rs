use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::protocol::serialise::{Error, WritableBuffer};
use crate::protocol::wire_types::*;
use crate::responder::handle_raw_message;
use crate::zones::ZoneStore;

/// Turns a request datagram into the reply to send, or `None` to send
/// nothing.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, octets: &[u8]) -> Option<Message>;
}

/// Answers queries from a zone.
#[derive(Debug, Clone)]
pub struct ZoneHandler {
    zone: ZoneStore,
}

impl ZoneHandler {
    pub fn new(zone: ZoneStore) -> Self {
        Self { zone }
    }
}

impl Handler for ZoneHandler {
    fn handle(&self, octets: &[u8]) -> Option<Message> {
        handle_raw_message(octets, &self.zone)
    }
}

/// A bound UDP socket and the handler for datagrams arriving on it.
pub struct Server<H> {
    socket: Arc<UdpSocket>,
    handler: Arc<H>,
}

impl<H: Handler> Server<H> {
    /// Bind the socket.
    ///
    /// # Errors
    ///
    /// If the socket cannot be bound.
    pub async fn bind<A: ToSocketAddrs>(addr: A, handler: H) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            handler: Arc::new(handler),
        })
    }

    /// # Errors
    ///
    /// If the socket has no local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve forever with `workers` tasks reading from the socket.
    ///
    /// Whenever a worker stops, including by panicking, a new one is
    /// started with the same number.  This only returns when the
    /// runtime is shutting down.
    pub async fn run(self, workers: usize) {
        let workers = if workers == 0 {
            tracing::warn!("asked for zero workers, starting one");
            1
        } else {
            workers
        };

        let mut join_set = JoinSet::new();
        for worker in 0..workers {
            self.spawn_worker(&mut join_set, worker);
        }

        tracing::info!(workers, "serving");

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((worker, Ok(()))) => {
                    tracing::warn!(worker, "worker stopped, restarting");
                    self.spawn_worker(&mut join_set, worker);
                }
                Ok((worker, Err(error))) if error.is_panic() => {
                    tracing::error!(worker, %error, "worker panicked, restarting");
                    self.spawn_worker(&mut join_set, worker);
                }
                Ok((worker, Err(error))) => {
                    tracing::debug!(worker, %error, "worker cancelled");
                    return;
                }
                Err(error) => {
                    tracing::debug!(%error, "supervisor task cancelled");
                    return;
                }
            }
        }
    }

    /// Serve until `shutdown` completes.  Dropping the future returned
    /// by `run` stops every worker, so nothing is left reading from the
    /// socket afterwards.
    pub async fn run_until<F: Future<Output = ()>>(self, workers: usize, shutdown: F) {
        tokio::select! {
            () = self.run(workers) => (),
            () = shutdown => tracing::info!("shutting down"),
        }
    }

    /// The worker runs in its own task, so a panic in it surfaces as a
    /// `JoinError` in the supervisor rather than losing the worker
    /// number.  The wrapper aborts the worker when it is itself
    /// aborted.
    fn spawn_worker(&self, join_set: &mut JoinSet<(usize, Result<(), JoinError>)>, worker: usize) {
        let socket = self.socket.clone();
        let handler = self.handler.clone();
        join_set.spawn(async move {
            let mut guard = AbortOnDrop(tokio::spawn(listen_udp(worker, socket, handler)));
            let result = (&mut guard.0).await;
            (worker, result)
        });
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Wait for a shutdown signal.  If listening for it fails this waits
/// forever, so the server keeps running.
pub async fn shutdown_on<F: Future<Output = io::Result<()>>>(signal: F) {
    if let Err(error) = signal.await {
        tracing::error!(?error, "could not listen for shutdown signal, serving until killed");
        std::future::pending::<()>().await;
    }
}

async fn listen_udp<H: Handler>(worker: usize, socket: Arc<UdpSocket>, handler: Arc<H>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut reply = WritableBuffer::with_limit(MAX_DATAGRAM_SIZE);

    tracing::debug!(worker, "listening");

    loop {
        let (size, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(error) => {
                tracing::warn!(worker, ?error, "udp recv error");
                continue;
            }
        };

        tracing::trace!(worker, %peer, size, "udp request");

        let Some(response) = handler.handle(&buf[..size]) else {
            tracing::debug!(worker, %peer, "dropping unanswerable datagram");
            continue;
        };

        reply.clear();
        if let Err(error) = serialise_reply(&response, &mut reply) {
            tracing::warn!(worker, %peer, ?error, "could not serialise reply");
            continue;
        }

        if let Err(error) = socket.send_to(&reply.octets, peer).await {
            tracing::warn!(worker, %peer, ?error, "udp send error");
        }
    }
}

/// Serialise a reply, falling back to a header-only `ServerFailure` if
/// it does not fit.  TC stays clear, as there is no TCP to retry over.
///
/// # Errors
///
/// If even the header does not fit.
pub fn serialise_reply(response: &Message, buffer: &mut WritableBuffer) -> Result<usize, Error> {
    match response.serialise(buffer) {
        Ok(len) => Ok(len),
        Err(error) => {
            tracing::warn!(id = response.header.id, %error, "reply does not fit, sending server failure");
            let failure = Message {
                header: Header {
                    is_truncated: false,
                    is_authoritative: false,
                    rcode: Rcode::ServerFailure,
                    ..response.header
                },
                questions: Vec::new(),
                answers: Vec::new(),
                authority: Vec::new(),
                additional: Vec::new(),
            };
            failure.serialise(buffer)
        }
    }
}
