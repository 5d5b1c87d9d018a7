use crate::http_server::HttpServer;
use crate::tests::{roundtrip, TestServer};

#[test]
fn form_fields_are_decoded() {
    let mut server = HttpServer::new();
    server
        .add_page(
            "/f",
            |request, response| {
                assert_eq!(request.field_count(), 2);
                let a = request.field_value_by_name("a").unwrap_or_default();
                let name = request.field_value_by_name("name").unwrap_or_default();
                response.add(&format!("{}|{}", a, name));
                200
            },
            None,
        )
        .unwrap();

    let server = TestServer::start(server);
    let body = b"a=1&name=A%2BB%20C";
    let mut request = format!(
        "POST /f HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(body);

    let reply = roundtrip(server.addr, &request);
    server.stop();

    assert!(reply.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(reply.ends_with(b"\r\n\r\n1|A+B C"));
}

#[test]
fn plus_decodes_to_space_in_form_fields() {
    let mut server = HttpServer::new();
    server
        .add_page(
            "/f",
            |request, response| {
                response.add(&request.field_value_by_name("q").unwrap_or_default());
                200
            },
            None,
        )
        .unwrap();

    let server = TestServer::start(server);
    let body = b"q=hello+wide+world";
    let mut request = format!(
        "POST /f HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(body);

    let reply = roundtrip(server.addr, &request);
    server.stop();

    assert!(reply.ends_with(b"\r\n\r\nhello wide world"));
}

#[test]
fn handler_sees_raw_content() {
    let mut server = HttpServer::new();
    server
        .add_page(
            "/raw",
            |request, response| {
                let body = request.content().unwrap_or(b"");
                response.add(&format!("{}b", body.len()));
                200
            },
            None,
        )
        .unwrap();

    let server = TestServer::start(server);
    let reply = roundtrip(
        server.addr,
        b"POST /raw HTTP/1.1\r\nHost: x\r\nContent-Length: 4\r\n\r\nwxyz",
    );
    server.stop();

    assert!(reply.ends_with(b"\r\n\r\n4b"));
}
