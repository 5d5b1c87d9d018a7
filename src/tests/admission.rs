use crate::http_server::HttpServer;
use crate::tests::{roundtrip, TestServer};
use std::io::Read;
use std::net::TcpStream;
use std::time::{Duration, Instant};

#[test]
fn denied_clients_are_closed_without_a_byte() {
    let mut server = HttpServer::new();
    server.allow_clients("^10\\.").unwrap();
    let counters = server.counters();

    let server = TestServer::start(server);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(2000))).unwrap();

    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);

    // The accept loop runs in another thread; give the counter a moment.
    let deadline = Instant::now() + Duration::from_secs(2);
    while counters.denied_clients() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(counters.denied_clients(), 1);

    server.stop();
}

#[test]
fn matching_clients_are_served() {
    let mut server = HttpServer::new();
    server.allow_clients("^127\\.").unwrap();
    server
        .add_page(
            "/",
            |_request, response| {
                response.add("ok");
                200
            },
            None,
        )
        .unwrap();
    let counters = server.counters();

    let server = TestServer::start(server);
    let reply = roundtrip(server.addr, b"GET / HTTP/1.0\r\n\r\n");
    server.stop();

    assert!(reply.starts_with(b"HTTP/1.0 200 OK\r\n"));
    assert_eq!(counters.denied_clients(), 0);
    assert_eq!(counters.added(), 1);
}
