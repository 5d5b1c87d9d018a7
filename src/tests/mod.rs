mod admission;
mod connection;
mod post_form;
mod properties;
mod response;

use crate::connection::{Connection, Stream};
use crate::http_server::HttpServer;
use crate::Lifecycle;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// A server running on a loopback port in a background thread.
pub(crate) struct TestServer {
    pub addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl TestServer {
    /// Bind the server to an ephemeral loopback port and serve in the
    /// background. Timeouts are lowered so tests finish quickly.
    pub fn start(mut server: HttpServer) -> TestServer {
        server.set_hostname(Some("127.0.0.1"));
        server.set_port(0);
        server.set_timeout_accept(50);
        server.set_timeout_read(300);
        server.set_timeout_write(1000);
        server.set_worker_threads(2);
        server.set_queue_size(4);

        server.get_root_resources().unwrap();
        let addr = server.local_addr().unwrap();
        let stop = server.shutdown_flag();

        let thread = std::thread::spawn(move || {
            let _ = server.run();
        });

        TestServer { addr, stop, thread }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.thread.join();
    }
}

/// Write raw request bytes, then collect everything the server sends
/// until it closes the connection or goes quiet.
pub(crate) fn roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(request).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(2000))).unwrap();

    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }

    response
}

/// A connected [`Connection`] plus the raw peer socket driving it.
pub(crate) fn connection_pair() -> (Connection, TcpStream) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (peer, _) = listener.accept().unwrap();

    let conn = Connection::client(Stream::Plain(client), addr, 1000, 1000);
    (conn, peer)
}

pub(crate) fn bytes_contain(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
