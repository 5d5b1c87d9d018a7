//! A toy user-directory service speaking the tagged binary frame format
//! over raw TCP. Frames travel with a four-byte length prefix; each frame
//! starts with the header (version, request code) followed by the user
//! record fields.

use byteorder::{BigEndian, ByteOrder};
use longhouse::codec::{FrameHeader, ReadBuf, WriteBuf, EMAIL_MAX, FRAME_VERSION, NAME_MAX, NICKNAME_MAX, USER_ADD};
use longhouse::connection::Connection;
use longhouse::server::TcpServer;
use std::sync::Arc;

fn handle_frame(conn: &mut Connection) {
    let mut len_prefix = [0u8; 4];
    match conn.read(&mut len_prefix) {
        Ok(4) => {}
        _ => return,
    }

    let frame_len = BigEndian::read_u32(&len_prefix) as usize;
    let mut frame = vec![0u8; frame_len];
    match conn.read(&mut frame) {
        Ok(n) if n == frame_len => {}
        _ => return,
    }

    let mut rb = ReadBuf::new(&frame);
    let ok = parse_user_add(&mut rb).is_some();

    let mut reply = WriteBuf::new(16, true);
    let _ = reply.write_header(&FrameHeader { version: FRAME_VERSION, request: USER_ADD });
    let _ = reply.write_bool(ok);

    let mut out = [0u8; 4];
    BigEndian::write_u32(&mut out, reply.len() as u32);
    let _ = conn.write(&out);
    let _ = conn.write(reply.as_slice());
    let _ = conn.flush();
}

fn parse_user_add(rb: &mut ReadBuf) -> Option<(u64, String, String, String)> {
    let header = rb.read_header().ok()?;
    if header.version != FRAME_VERSION || header.request != USER_ADD {
        return None;
    }

    let id = rb.read_uint64().ok()?;
    let name = rb.read_string(NAME_MAX).ok()?;
    let nickname = rb.read_string(NICKNAME_MAX).ok()?;
    let email = rb.read_string(EMAIL_MAX).ok()?;

    println!("USER_ADD {} name={:?} nick={:?} email={:?}", id, name, nickname, email);
    Some((id, name, nickname, email))
}

fn main() {
    env_logger::init();

    let mut server = TcpServer::new();
    server.set_hostname(Some("127.0.0.1"));
    server.set_port(2000);
    server.set_service_function(Arc::new(|conn: &mut Connection| {
        handle_frame(conn);
        let _ = conn.close();
    }));

    println!("user directory on 127.0.0.1:2000");
    server.run().unwrap();
}
