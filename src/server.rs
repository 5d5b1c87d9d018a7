//! The TCP serving core: a polled listener, an admission filter, a
//! bounded work queue feeding a pool of worker threads, and the pools of
//! connections and I/O buffers the workers borrow from.

use crate::buffer::{ReadBuffer, WriteBuffer, READBUF_SIZE, WRITEBUF_SIZE};
use crate::connection::{Connection, Stream};
use crate::error::{AppError, Error, Result};
use crate::pool::{Pool, Pooled};
use crate::Lifecycle;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::warn;
use mio::net::TcpListener;
use regex::Regex;
use std::net::{SocketAddr, ToSocketAddrs};
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Performance counters, shared between the accept loop, the work queue
/// and every connection's retry machinery.
#[derive(Default)]
pub struct Counters {
    sum_poll_intr: AtomicU64,
    sum_poll_again: AtomicU64,
    sum_accept_failed: AtomicU64,
    sum_denied_clients: AtomicU64,
    sum_added: AtomicU64,
    sum_blocked: AtomicU64,
    sum_discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn bump_poll_intr(&self) {
        self.sum_poll_intr.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_poll_again(&self) {
        self.sum_poll_again.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_accept_failed(&self) {
        self.sum_accept_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_denied_clients(&self) {
        self.sum_denied_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_added(&self) {
        self.sum_added.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_blocked(&self) {
        self.sum_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_discarded(&self) {
        self.sum_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll_intr(&self) -> u64 {
        self.sum_poll_intr.load(Ordering::Relaxed)
    }

    pub fn poll_again(&self) -> u64 {
        self.sum_poll_again.load(Ordering::Relaxed)
    }

    pub fn accept_failed(&self) -> u64 {
        self.sum_accept_failed.load(Ordering::Relaxed)
    }

    pub fn denied_clients(&self) -> u64 {
        self.sum_denied_clients.load(Ordering::Relaxed)
    }

    pub fn added(&self) -> u64 {
        self.sum_added.load(Ordering::Relaxed)
    }

    pub fn blocked(&self) -> u64 {
        self.sum_blocked.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.sum_discarded.load(Ordering::Relaxed)
    }
}

/// The per-connection service function run on worker threads.
pub type ServiceFn = dyn Fn(&mut Connection) + Send + Sync;

const LISTENER_TOKEN: mio::Token = mio::Token(0);

/// Consecutive unclassified accept errors tolerated before the loop
/// gives up instead of spinning.
const MAX_UNKNOWN_ACCEPT_ERRORS: u32 = 100;

/// Multithreaded TCP server. Accepts connections on one thread, filters
/// them against the optional client allow-list, and queues them for the
/// worker pool.
pub struct TcpServer {
    host: Option<String>,
    port: u16,

    // Timeouts in milliseconds.
    timeout_read: u64,
    timeout_write: u64,
    timeout_accept: u64,

    // How many times to retry a read/write before giving up on a client.
    retries_read: u32,
    retries_write: u32,

    readbuf_size: usize,
    writebuf_size: usize,

    nworkers: usize,
    queue_size: usize,
    block_when_full: bool,

    tls_config: Option<Arc<rustls::ServerConfig>>,

    /// Precompiled allow-list matched against dotted-quad peer IPs.
    allowed_clients: Option<Regex>,

    service: Option<Arc<ServiceFn>>,

    shutting_down: Arc<AtomicBool>,
    counters: Arc<Counters>,

    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,

    connections: Option<Pool<Connection>>,
    read_buffers: Option<Pool<ReadBuffer>>,
    write_buffers: Option<Pool<WriteBuffer>>,
}

impl TcpServer {
    pub fn new() -> Self {
        TcpServer {
            host: None,
            port: 2000,
            timeout_read: 5000,
            timeout_write: 1000,
            timeout_accept: 800,
            retries_read: 0,
            retries_write: 10,
            readbuf_size: READBUF_SIZE,
            writebuf_size: WRITEBUF_SIZE,
            nworkers: num_cpus::get(),
            queue_size: 100,
            block_when_full: false,
            tls_config: None,
            allowed_clients: None,
            service: None,
            shutting_down: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            listener: None,
            local_addr: None,
            connections: None,
            read_buffers: None,
            write_buffers: None,
        }
    }

    // -- configuration ----------------------------------------------------

    pub fn set_hostname(&mut self, host: Option<&str>) {
        self.host = host.map(str::to_string);
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64, accept_ms: u64) {
        self.timeout_read = read_ms;
        self.timeout_write = write_ms;
        self.timeout_accept = accept_ms;
    }

    pub fn set_retries(&mut self, read: u32, write: u32) {
        self.retries_read = read;
        self.retries_write = write;
    }

    pub fn set_worker_threads(&mut self, count: usize) {
        self.nworkers = count.max(1);
    }

    pub fn worker_threads(&self) -> usize {
        self.nworkers
    }

    pub fn set_queue_size(&mut self, size: usize) {
        self.queue_size = size.max(1);
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn set_block_when_full(&mut self, block: bool) {
        self.block_when_full = block;
    }

    pub fn block_when_full(&self) -> bool {
        self.block_when_full
    }

    pub fn set_readbuf_size(&mut self, size: usize) {
        self.readbuf_size = size.max(1);
    }

    pub fn set_writebuf_size(&mut self, size: usize) {
        self.writebuf_size = size.max(1);
    }

    pub fn set_tls_config(&mut self, config: Option<Arc<rustls::ServerConfig>>) {
        self.tls_config = config;
    }

    /// Restrict which clients may connect. The pattern is matched against
    /// the peer's printed IP address.
    pub fn allow_clients(&mut self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|_| Error::App(AppError::Invalid))?;
        self.allowed_clients = Some(regex);
        Ok(())
    }

    pub fn clear_client_filter(&mut self) {
        self.allowed_clients = None;
    }

    pub fn set_service_function(&mut self, service: Arc<ServiceFn>) {
        self.service = Some(service);
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutting_down.clone()
    }

    /// The bound listener address, known after `get_root_resources`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    // -- resources --------------------------------------------------------

    /// Preallocate the connection pool and the worker buffer pools.
    /// Every queue entry and every running worker uses one connection,
    /// plus one extra for the connection currently being accepted.
    pub fn init(&mut self) -> Result<()> {
        if self.connections.is_some() {
            return Ok(());
        }

        let count = self.queue_size + self.nworkers + 1;
        let mut connections = Vec::with_capacity(count);
        for _ in 0..count {
            connections.push(Connection::new(
                self.timeout_read,
                self.timeout_write,
                self.retries_read,
                self.retries_write,
                self.counters.clone(),
            ));
        }
        self.connections = Some(Pool::with_objects(connections));

        // Only worker threads use read/write buffers.
        let mut read_buffers = Vec::with_capacity(self.nworkers);
        let mut write_buffers = Vec::with_capacity(self.nworkers);
        for _ in 0..self.nworkers {
            read_buffers.push(ReadBuffer::with_capacity(self.readbuf_size));
            write_buffers.push(WriteBuffer::with_capacity(self.writebuf_size));
        }
        self.read_buffers = Some(Pool::with_objects(read_buffers));
        self.write_buffers = Some(Pool::with_objects(write_buffers));

        Ok(())
    }

    fn bind_listener(&mut self) -> Result<()> {
        let host = self.host.as_deref().unwrap_or("0.0.0.0");
        let addr = (host, self.port)
            .to_socket_addrs()
            .map_err(Error::Os)?
            .next()
            .ok_or_else(|| {
                Error::Os(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "hostname resolved to no addresses",
                ))
            })?;

        let listener = TcpListener::bind(&addr).map_err(Error::Tcp)?;
        self.local_addr = listener.local_addr().ok();
        self.listener = Some(listener);
        Ok(())
    }

    // -- serving ----------------------------------------------------------

    /// Run the accept loop until shutdown. Worker threads are spawned
    /// here and joined before this returns.
    pub fn run(&mut self) -> Result<()> {
        self.init()?;

        if self.listener.is_none() {
            self.bind_listener()?;
        }

        let service = self.service.clone().ok_or(Error::App(AppError::Invalid))?;
        let read_buffers = self.read_buffers.clone().ok_or(Error::App(AppError::Invalid))?;
        let write_buffers = self.write_buffers.clone().ok_or(Error::App(AppError::Invalid))?;

        let (tx, rx) = bounded::<Pooled<Connection>>(self.queue_size);

        let mut workers = Vec::with_capacity(self.nworkers);
        for _ in 0..self.nworkers {
            let rx = rx.clone();
            let read_buffers = read_buffers.clone();
            let write_buffers = write_buffers.clone();
            let service = service.clone();
            workers.push(std::thread::spawn(move || {
                worker_loop(rx, read_buffers, write_buffers, service);
            }));
        }
        drop(rx);

        let result = self.accept_loop(&tx);

        // Closing the queue lets the workers drain and exit.
        drop(tx);
        for worker in workers {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }

        self.listener = None;
        result
    }

    fn accept_loop(&mut self, tx: &Sender<Pooled<Connection>>) -> Result<()> {
        let listener = self.listener.take().ok_or(Error::App(AppError::Invalid))?;

        let poll = mio::Poll::new().map_err(Error::Tcp)?;
        poll.register(&listener, LISTENER_TOKEN, mio::Ready::readable(), mio::PollOpt::level())
            .map_err(Error::Tcp)?;

        let mut events = mio::Events::with_capacity(16);
        let timeout = Duration::from_millis(self.timeout_accept.max(1));
        let mut unknown_errors = 0u32;

        while !self.shutting_down() {
            match poll.poll(&mut events, Some(timeout)) {
                Ok(_) => {}
                Err(err) => match err.kind() {
                    std::io::ErrorKind::Interrupted => {
                        self.counters.bump_poll_intr();
                        continue;
                    }
                    std::io::ErrorKind::WouldBlock => {
                        self.counters.bump_poll_again();
                        continue;
                    }
                    _ => return Err(Error::Tcp(err)),
                },
            }

            if events.iter().next().is_none() {
                // Poll timeout; recheck the shutdown flag.
                continue;
            }

            match listener.accept_std() {
                Ok((sock, addr)) => {
                    unknown_errors = 0;
                    self.dispatch(sock, addr, tx)?;
                }
                Err(err) => {
                    if is_transient_accept_error(&err) {
                        self.counters.bump_accept_failed();
                    } else {
                        // Unknown errno values: survive them, but not forever.
                        self.counters.bump_accept_failed();
                        unknown_errors += 1;
                        warn!("accept failed: {}", err);
                        if unknown_errors > MAX_UNKNOWN_ACCEPT_ERRORS {
                            return Err(Error::Tcp(err));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Admit, wrap and queue one accepted socket.
    fn dispatch(
        &self,
        sock: std::net::TcpStream,
        addr: SocketAddr,
        tx: &Sender<Pooled<Connection>>,
    ) -> Result<()> {
        // The listener is non-blocking; workers want blocking sockets
        // with per-operation timeouts.
        if let Err(err) = sock.set_nonblocking(false) {
            warn!("cannot configure accepted socket: {}", err);
            return Ok(());
        }

        if let Some(filter) = &self.allowed_clients {
            if !filter.is_match(&addr.ip().to_string()) {
                self.counters.bump_denied_clients();
                return Ok(());
            }
        }

        let stream = match &self.tls_config {
            Some(config) => {
                let session = rustls::ServerSession::new(config);
                Stream::Tls(Box::new(rustls::StreamOwned::new(session, sock)))
            }
            None => Stream::Plain(sock),
        };

        // The pool is sized so that a connection is always available.
        let connections = self.connections.as_ref().ok_or(Error::App(AppError::Invalid))?;
        let mut conn = match connections.try_get() {
            Some(conn) => conn,
            None => {
                warn!("connection pool exhausted");
                return Err(Error::App(AppError::Overflow));
            }
        };

        conn.set_params(stream, addr);

        if self.block_when_full {
            match tx.try_send(conn) {
                Ok(()) => self.counters.bump_added(),
                Err(TrySendError::Full(conn)) => {
                    self.counters.bump_blocked();
                    match tx.send(conn) {
                        Ok(()) => self.counters.bump_added(),
                        Err(send_err) => {
                            let mut conn = send_err.into_inner();
                            conn.discard();
                        }
                    }
                }
                Err(TrySendError::Disconnected(mut conn)) => {
                    conn.discard();
                }
            }
        } else {
            match tx.try_send(conn) {
                Ok(()) => self.counters.bump_added(),
                Err(TrySendError::Full(mut conn)) => {
                    // The queue was full; close and recycle the connection.
                    self.counters.bump_discarded();
                    let _ = conn.close();
                }
                Err(TrySendError::Disconnected(mut conn)) => {
                    conn.discard();
                }
            }
        }

        Ok(())
    }
}

impl Default for TcpServer {
    fn default() -> Self {
        TcpServer::new()
    }
}

impl Lifecycle for TcpServer {
    fn get_root_resources(&mut self) -> Result<()> {
        self.bind_listener()
    }

    fn free_root_resources(&mut self) -> Result<()> {
        self.listener = None;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.run()
    }

    fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}

fn worker_loop(
    rx: Receiver<Pooled<Connection>>,
    read_buffers: Pool<ReadBuffer>,
    write_buffers: Pool<WriteBuffer>,
    service: Arc<ServiceFn>,
) {
    while let Ok(mut conn) = rx.recv() {
        conn.assign_buffers(read_buffers.get(), write_buffers.get());

        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| service(&mut *conn)));
        if outcome.is_err() {
            warn!("service function panicked; dropping the connection");
        }

        // Buffers go back to their pools first, then the connection; its
        // guard returns it to the connection pool on drop.
        drop(conn.reclaim_read_buffer());
        drop(conn.reclaim_write_buffer());
    }
}

/// Accept errors the man pages tell us to treat as "try again": the
/// client vanished between poll and accept, or the network briefly did.
fn is_transient_accept_error(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::WouldBlock {
        return true;
    }

    match err.raw_os_error() {
        Some(code) => matches!(
            code,
            libc::EPROTO
                | libc::ENONET
                | libc::ENOTCONN
                | libc::EAGAIN
                | libc::ENETDOWN
                | libc::ENOPROTOOPT
                | libc::EHOSTDOWN
                | libc::EHOSTUNREACH
                | libc::EOPNOTSUPP
                | libc::ENETUNREACH
        ),
        None => false,
    }
}
