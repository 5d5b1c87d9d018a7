use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{AppError, Error, Result};
use crate::pool::{Pooled, Recycle};
use crate::server::Counters;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// A plain or TLS-wrapped client socket.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<rustls::StreamOwned<rustls::ServerSession, TcpStream>>),
}

impl Stream {
    fn socket(&self) -> &TcpStream {
        match self {
            Stream::Plain(sock) => sock,
            Stream::Tls(stream) => &stream.sock,
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(sock) => sock.read(buf),
            Stream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(sock) => sock.write(buf),
            Stream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Plain(sock) => sock.flush(),
            Stream::Tls(stream) => stream.flush(),
        }
    }
}

/// One client connection: the socket, its peer address, the read/write
/// buffers borrowed from the server pools, and the I/O policy (timeouts
/// in milliseconds plus retry counts). Connections are pooled; the server
/// parameterizes one per accepted socket and recycles it afterwards.
pub struct Connection {
    stream: Option<Stream>,
    peer_addr: Option<SocketAddr>,
    timeout_read: u64,
    timeout_write: u64,
    retries_read: u32,
    retries_write: u32,
    persistent: bool,
    readbuf: Option<Pooled<ReadBuffer>>,
    writebuf: Option<Pooled<WriteBuffer>>,
    counters: Arc<Counters>,
}

impl Connection {
    pub fn new(
        timeout_read: u64,
        timeout_write: u64,
        retries_read: u32,
        retries_write: u32,
        counters: Arc<Counters>,
    ) -> Self {
        Connection {
            stream: None,
            peer_addr: None,
            timeout_read,
            timeout_write,
            retries_read,
            retries_write,
            persistent: false,
            readbuf: None,
            writebuf: None,
            counters,
        }
    }

    /// A connection for client-side use, with buffers of its own instead of
    /// pool-borrowed ones.
    pub fn client(stream: Stream, peer_addr: SocketAddr, timeout_read: u64, timeout_write: u64) -> Self {
        let counters = Arc::new(Counters::default());
        let read_pool = crate::pool::Pool::with_objects(vec![ReadBuffer::with_capacity(crate::buffer::READBUF_SIZE)]);
        let write_pool = crate::pool::Pool::with_objects(vec![WriteBuffer::with_capacity(crate::buffer::WRITEBUF_SIZE)]);
        let mut conn = Connection::new(timeout_read, timeout_write, 0, 3, counters);
        conn.set_params(stream, peer_addr);
        conn.assign_buffers(read_pool.get(), write_pool.get());
        conn
    }

    /// Attach an accepted socket. Called once per accept before the
    /// connection is queued for a worker.
    pub fn set_params(&mut self, stream: Stream, peer_addr: SocketAddr) {
        self.stream = Some(stream);
        self.peer_addr = Some(peer_addr);
        self.persistent = false;
    }

    pub fn assign_buffers(&mut self, readbuf: Pooled<ReadBuffer>, writebuf: Pooled<WriteBuffer>) {
        self.readbuf = Some(readbuf);
        self.writebuf = Some(writebuf);
    }

    /// Surrender the read buffer to the caller. Dropping the returned guard
    /// sends the buffer back to its pool.
    pub fn reclaim_read_buffer(&mut self) -> Option<Pooled<ReadBuffer>> {
        self.readbuf.take()
    }

    pub fn reclaim_write_buffer(&mut self) -> Option<Pooled<WriteBuffer>> {
        self.writebuf.take()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// True when buffered request bytes are already waiting.
    pub fn has_buffered_input(&self) -> bool {
        match &self.readbuf {
            Some(rb) => rb.unread() > 0,
            None => false,
        }
    }

    /// Block until request data is readable, up to the read timeout.
    pub fn wait_for_data(&mut self) -> Result<()> {
        if self.has_buffered_input() {
            return Ok(());
        }

        match self.fill()? {
            0 => Err(Error::Tcp(std::io::Error::new(ErrorKind::UnexpectedEof, "peer closed connection"))),
            _ => Ok(()),
        }
    }

    /// Read a single byte, refilling the read buffer as needed.
    pub fn read_byte(&mut self) -> Result<u8> {
        loop {
            if let Some(rb) = &mut self.readbuf {
                if let Some(b) = rb.next_byte() {
                    return Ok(b);
                }
            }

            if self.fill()? == 0 {
                return Err(Error::Tcp(std::io::Error::new(ErrorKind::UnexpectedEof, "peer closed connection")));
            }
        }
    }

    /// Read one CRLF-terminated line of at most `max_len` bytes and strip
    /// the terminator. A CR not followed by LF is a protocol error; an
    /// overlong line is an application overflow, which callers remap to the
    /// status code that fits their context.
    pub fn read_line(&mut self, max_len: usize) -> Result<String> {
        let mut line: Vec<u8> = Vec::new();

        loop {
            let b = self.read_byte()?;
            match b {
                b'\r' => {
                    let next = self.read_byte()?;
                    if next != b'\n' {
                        return Err(Error::Http(400));
                    }
                    break;
                }
                b'\n' => break,
                _ => {
                    if line.len() >= max_len {
                        return Err(Error::App(AppError::Overflow));
                    }
                    line.push(b);
                }
            }
        }

        String::from_utf8(line).map_err(|_| Error::Http(400))
    }

    /// Lenient line read used for chunk-length lines: reads through LF,
    /// strips the trailing CRLF, tolerates stray carriage returns.
    pub fn gets(&mut self, max_len: usize) -> Result<String> {
        let mut line: Vec<u8> = Vec::new();

        loop {
            let b = self.read_byte()?;
            if b == b'\n' {
                break;
            }
            if line.len() >= max_len {
                return Err(Error::App(AppError::Overflow));
            }
            line.push(b);
        }

        while line.last() == Some(&b'\r') {
            line.pop();
        }

        String::from_utf8(line).map_err(|_| Error::Http(400))
    }

    /// Read up to `dest.len()` bytes. Stops early only when the peer closes
    /// the connection; returns the number of bytes placed in `dest`.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize> {
        let mut total = 0;

        if let Some(rb) = &mut self.readbuf {
            total += rb.drain_into(dest);
        }

        while total < dest.len() {
            let n = self.fill()?;
            if n == 0 {
                break;
            }
            if let Some(rb) = &mut self.readbuf {
                total += rb.drain_into(&mut dest[total..]);
            }
        }

        Ok(total)
    }

    /// Append `data` to the write buffer, flushing transparently when it
    /// would overflow. Writes bigger than the buffer itself take the
    /// big-buffer path: chunked, each chunk flushed with its own retry
    /// budget so large payloads cannot exhaust the per-write retries.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let capacity = match &self.writebuf {
            Some(wb) => wb.capacity(),
            None => return Err(Error::App(AppError::Invalid)),
        };

        if data.len() > capacity {
            self.flush()?;
            let retries = (data.len() / 1024).max(1) as u32;
            return self.write_big_buffer(data, 1000, retries);
        }

        let room = match &self.writebuf {
            Some(wb) => wb.room(),
            None => return Err(Error::App(AppError::Invalid)),
        };

        if data.len() > room {
            self.flush()?;
        }

        if let Some(wb) = &mut self.writebuf {
            wb.append(data);
        }

        Ok(())
    }

    /// Write a large payload directly, in write-buffer-sized chunks.
    pub fn write_big_buffer(&mut self, data: &[u8], timeout_ms: u64, retries: u32) -> Result<()> {
        let chunk_size = match &self.writebuf {
            Some(wb) => wb.capacity(),
            None => crate::buffer::WRITEBUF_SIZE,
        };

        let stream = match &mut self.stream {
            Some(stream) => stream,
            None => return Err(Error::Tcp(std::io::Error::new(ErrorKind::NotConnected, "connection closed"))),
        };

        for chunk in data.chunks(chunk_size) {
            timed_write_all(stream, &self.counters, timeout_ms, retries, chunk)?;
        }

        Ok(())
    }

    /// Drain the write buffer onto the socket.
    pub fn flush(&mut self) -> Result<()> {
        let wb = match &mut self.writebuf {
            Some(wb) => wb,
            None => return Ok(()),
        };

        if wb.is_empty() {
            return Ok(());
        }

        let stream = match &mut self.stream {
            Some(stream) => stream,
            None => return Err(Error::Tcp(std::io::Error::new(ErrorKind::NotConnected, "connection closed"))),
        };

        timed_write_all(stream, &self.counters, self.timeout_write, self.retries_write, wb.as_slice())?;
        wb.clear();
        Ok(())
    }

    /// Flush pending output, then close the socket.
    pub fn close(&mut self) -> Result<()> {
        let flushed = if self.stream.is_some() { self.flush() } else { Ok(()) };

        if let Some(stream) = self.stream.take() {
            let _ = stream.socket().shutdown(Shutdown::Both);
        }

        flushed
    }

    /// Close without flushing. Used when a client-caused TCP error forbids
    /// writing anything more to the socket.
    pub fn discard(&mut self) {
        if let Some(wb) = &mut self.writebuf {
            wb.clear();
        }

        if let Some(stream) = self.stream.take() {
            let _ = stream.socket().shutdown(Shutdown::Both);
        }
    }

    fn fill(&mut self) -> Result<usize> {
        let stream = match &mut self.stream {
            Some(stream) => stream,
            None => return Err(Error::Tcp(std::io::Error::new(ErrorKind::NotConnected, "connection closed"))),
        };

        let rb = match &mut self.readbuf {
            Some(rb) => rb,
            None => return Err(Error::App(AppError::Invalid)),
        };

        timed_refill(stream, &self.counters, self.timeout_read, self.retries_read, &mut **rb)
    }
}

impl Recycle for Connection {
    fn recycle(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.socket().shutdown(Shutdown::Both);
        }
        self.peer_addr = None;
        self.persistent = false;
        // Dropping the guards returns any still-assigned buffers.
        self.readbuf = None;
        self.writebuf = None;
    }
}

fn apply_timeout(sock: &TcpStream, timeout_ms: u64, write: bool) -> std::io::Result<()> {
    let timeout = if timeout_ms == 0 {
        None
    } else {
        Some(Duration::from_millis(timeout_ms))
    };

    if write {
        sock.set_write_timeout(timeout)
    } else {
        sock.set_read_timeout(timeout)
    }
}

fn timed_refill(
    stream: &mut Stream,
    counters: &Arc<Counters>,
    timeout_ms: u64,
    retries: u32,
    rb: &mut ReadBuffer,
) -> Result<usize> {
    apply_timeout(stream.socket(), timeout_ms, false).map_err(Error::Tcp)?;

    let mut attempts = 0u32;
    loop {
        match rb.refill(stream) {
            Ok(n) => return Ok(n),
            Err(err) => match err.kind() {
                ErrorKind::Interrupted => {
                    counters.bump_poll_intr();
                }
                ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                    counters.bump_poll_again();
                    if attempts >= retries {
                        return Err(Error::Tcp(err));
                    }
                    attempts += 1;
                }
                _ => return Err(Error::Tcp(err)),
            },
        }
    }
}

fn timed_write_all(
    stream: &mut Stream,
    counters: &Arc<Counters>,
    timeout_ms: u64,
    retries: u32,
    mut data: &[u8],
) -> Result<()> {
    apply_timeout(stream.socket(), timeout_ms, true).map_err(Error::Tcp)?;

    let mut attempts = 0u32;
    while !data.is_empty() {
        match stream.write(data) {
            Ok(0) => {
                return Err(Error::Tcp(std::io::Error::new(ErrorKind::WriteZero, "socket accepted no bytes")));
            }
            Ok(n) => {
                data = &data[n..];
            }
            Err(err) => match err.kind() {
                ErrorKind::Interrupted => {
                    counters.bump_poll_intr();
                }
                ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                    counters.bump_poll_again();
                    if attempts >= retries {
                        return Err(Error::Tcp(err));
                    }
                    attempts += 1;
                }
                _ => return Err(Error::Tcp(err)),
            },
        }
    }

    Ok(())
}
