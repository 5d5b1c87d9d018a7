use longhouse::http_server::HttpServer;

fn main() {
    env_logger::init();

    let docroot = std::env::args().nth(1).unwrap_or_else(|| "./www".to_string());

    let mut server = HttpServer::new();
    server.set_hostname(Some("127.0.0.1"));
    server.set_port(8080);
    server.set_documentroot(&docroot).unwrap();
    server.set_can_read_files(true);
    server.set_logfile("access.log").unwrap();
    server.set_logrotate(10_000);

    println!("serving {} on http://127.0.0.1:8080/", docroot);
    server.run().unwrap();
}
