use crate::error::{AppError, Error};
use crate::tests::connection_pair;
use std::io::{Read, Write};

#[test]
fn read_line_strips_crlf() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"hello\r\nworld\r\n").unwrap();

    assert_eq!(conn.read_line(128).unwrap(), "hello");
    assert_eq!(conn.read_line(128).unwrap(), "world");
}

#[test]
fn cr_without_lf_is_a_protocol_error() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"bad\rline\r\n").unwrap();

    match conn.read_line(128) {
        Err(Error::Http(400)) => {}
        other => panic!("expected 400, got {:?}", other),
    }
}

#[test]
fn overlong_lines_overflow() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"0123456789\r\n").unwrap();

    match conn.read_line(4) {
        Err(Error::App(AppError::Overflow)) => {}
        other => panic!("expected overflow, got {:?}", other),
    }
}

#[test]
fn gets_tolerates_bare_lf() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"chunky\n4\r\n").unwrap();

    assert_eq!(conn.gets(64).unwrap(), "chunky");
    assert_eq!(conn.gets(64).unwrap(), "4");
}

#[test]
fn read_byte_and_peeked_buffering() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"ab").unwrap();

    assert_eq!(conn.read_byte().unwrap(), b'a');
    assert!(conn.has_buffered_input());
    assert_eq!(conn.read_byte().unwrap(), b'b');
}

#[test]
fn read_collects_across_refills() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"0123456789").unwrap();

    let mut dest = [0u8; 10];
    assert_eq!(conn.read(&mut dest).unwrap(), 10);
    assert_eq!(&dest, b"0123456789");
}

#[test]
fn read_stops_at_peer_close() {
    let (mut conn, mut peer) = connection_pair();
    peer.write_all(b"abc").unwrap();
    drop(peer);

    let mut dest = [0u8; 16];
    assert_eq!(conn.read(&mut dest).unwrap(), 3);
    assert_eq!(&dest[..3], b"abc");
}

#[test]
fn buffered_writes_arrive_after_flush() {
    let (mut conn, mut peer) = connection_pair();

    conn.write(b"part one, ").unwrap();
    conn.write(b"part two").unwrap();
    conn.flush().unwrap();

    let mut buf = [0u8; 64];
    let n = peer.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"part one, part two");
}

#[test]
fn big_writes_take_the_chunked_path() {
    let (mut conn, mut peer) = connection_pair();

    let payload = vec![7u8; 100_000];
    let expected = payload.clone();

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

    conn.write(&payload).unwrap();
    conn.flush().unwrap();
    conn.close().unwrap();

    let collected = reader.join().unwrap();
    assert_eq!(collected, expected);
}

#[test]
fn discard_drops_pending_output() {
    let (mut conn, mut peer) = connection_pair();

    conn.write(b"never sent").unwrap();
    conn.discard();

    let mut buf = [0u8; 64];
    let n = peer.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);
}

#[test]
fn close_flushes_pending_output() {
    let (mut conn, mut peer) = connection_pair();

    conn.write(b"goodbye").unwrap();
    conn.close().unwrap();

    let mut collected = Vec::new();
    peer.read_to_end(&mut collected).unwrap();
    assert_eq!(collected, b"goodbye");
}

#[test]
fn persistence_flag_round_trip() {
    let (mut conn, _peer) = connection_pair();
    assert!(!conn.is_persistent());
    conn.set_persistent(true);
    assert!(conn.is_persistent());
}
