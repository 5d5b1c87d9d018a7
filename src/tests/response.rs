use crate::error::{AppError, Error};
use crate::request::Version;
use crate::response::Response;
use crate::tests::connection_pair;
use std::io::{Read, Write};

#[test]
fn emission_order_is_stable() {
    let (mut conn, mut peer) = connection_pair();

    let mut response = Response::new();
    response.set_version(Version::Http11);
    response.set_status(200);
    response.headers.set_server("longhouse");
    response.set_cookie(crate::cookie::Cookie::new("sid", "abc"));
    response.add("body");

    response.send(&mut conn).unwrap();
    conn.close().unwrap();

    let mut raw = Vec::new();
    peer.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8(raw).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    let date = text.find("Date: ").unwrap();
    let length = text.find("Content-Length: 4\r\n").unwrap();
    let ctype = text.find("Content-Type: text/html\r\n").unwrap();
    let server = text.find("Server: longhouse\r\n").unwrap();
    let cookie = text.find("Set-Cookie: sid=abc;Version=1;Secure=0\r\n").unwrap();
    assert!(date < length && length < ctype && ctype < server && server < cookie);
    assert!(text.ends_with("\r\n\r\nbody"));
}

#[test]
fn moved_status_carries_its_body() {
    // Statuses other than 1xx/204/304 emit their configured entity.
    let (mut conn, mut peer) = connection_pair();

    let mut response = Response::new();
    response.set_version(Version::Http11);
    response.set_status(301);
    response.headers.set_location("/elsewhere");
    response.add("gone");

    response.send(&mut conn).unwrap();
    conn.close().unwrap();

    let mut raw = Vec::new();
    peer.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8(raw).unwrap();

    assert!(text.starts_with("HTTP/1.1 301 Moved Permanently\r\n"));
    assert!(text.contains("Location: /elsewhere\r\n"));
    assert!(text.ends_with("\r\n\r\ngone"));
}

#[test]
fn no_content_suppresses_the_body() {
    let (mut conn, mut peer) = connection_pair();

    let mut response = Response::new();
    response.set_version(Version::Http11);
    response.set_status(204);
    response.add("should not appear");

    response.send(&mut conn).unwrap();
    conn.close().unwrap();

    let mut raw = Vec::new();
    peer.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8(raw).unwrap();

    assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
    assert!(!text.contains("should not appear"));
}

#[test]
fn receive_honors_content_length() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
        .unwrap();

    let mut response = Response::new();
    response.receive(&mut conn, 1024).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.version(), Version::Http11);
    assert_eq!(response.content(), Some(&b"hello"[..]));
}

#[test]
fn receive_rejects_oversize_content() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 64\r\n\r\n")
        .unwrap();

    let mut response = Response::new();
    match response.receive(&mut conn, 8) {
        Err(Error::App(AppError::Overflow)) => {}
        other => panic!("expected overflow, got {:?}", other.err()),
    }
}

#[test]
fn receive_reassembles_chunked_bodies() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    )
    .unwrap();

    let mut response = Response::new();
    response.receive(&mut conn, 1024).unwrap();
    assert_eq!(response.content(), Some(&b"Wikipedia"[..]));
}

#[test]
fn receive_caps_chunked_growth() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nff\r\n")
        .unwrap();

    let mut response = Response::new();
    match response.receive(&mut conn, 16) {
        Err(Error::App(AppError::Overflow)) => {}
        other => panic!("expected overflow, got {:?}", other.err()),
    }
}

#[test]
fn receive_reads_to_close_without_framing() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"HTTP/1.0 200 OK\r\n\r\nold-school body").unwrap();
    drop(peer);

    let mut response = Response::new();
    response.receive(&mut conn, 1024).unwrap();
    assert_eq!(response.content(), Some(&b"old-school body"[..]));
}

#[test]
fn receive_skips_bodies_of_not_modified() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"HTTP/1.1 304 Not Modified\r\nContent-Length: 5\r\n\r\n")
        .unwrap();

    let mut response = Response::new();
    response.receive(&mut conn, 1024).unwrap();
    assert_eq!(response.status(), 304);
    assert!(response.content().is_none());
}

#[test]
fn receive_rejects_malformed_status_lines() {
    for line in [
        &b"HTTP/2 200 OK\r\n\r\n"[..],
        &b"HTTP/1.1 20 OK\r\n\r\n"[..],
        &b"HTTP/1.1 200\r\n\r\n"[..],
        &b"200 OK\r\n\r\n"[..],
    ]
    .iter()
    .copied()
    {
        let (mut conn, mut peer) = connection_pair();
        peer.write_all(line).unwrap();

        let mut response = Response::new();
        match response.receive(&mut conn, 1024) {
            Err(Error::Http(400)) => {}
            other => panic!("expected 400 for {:?}, got {:?}", line, other.err()),
        }
    }
}

#[test]
fn file_bodies_are_streamed() {
    let dir = std::env::temp_dir().join("longhouse-resp-file");
    let _ = std::fs::create_dir_all(&dir);
    let path = dir.join("payload.bin");
    let payload = vec![42u8; 20_000];
    std::fs::write(&path, &payload).unwrap();

    let (mut conn, mut peer) = connection_pair();

    let reader = std::thread::spawn(move || {
        let mut collected = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match peer.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        collected
    });

    let mut response = Response::new();
    response.set_version(Version::Http11);
    response.set_status(200);
    response.send_file(path.to_str().unwrap(), "application/octet-stream").unwrap();
    let sent = response.send(&mut conn).unwrap();
    conn.close().unwrap();

    assert_eq!(sent, 20_000);

    let collected = reader.join().unwrap();
    let text_end = collected.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    assert_eq!(&collected[text_end..], &payload[..]);

    let head = String::from_utf8_lossy(&collected[..text_end]);
    assert!(head.contains("Content-Length: 20000\r\n"));
    assert!(head.contains("Content-Type: application/octet-stream\r\n"));
}
