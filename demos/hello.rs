use longhouse::http_server::HttpServer;

fn main() {
    env_logger::init();

    let mut server = HttpServer::new();
    server.set_hostname(Some("127.0.0.1"));
    server.set_port(8080);

    server
        .add_page(
            "/",
            |_request, response| {
                response.h1("hello");
                response.p("served by longhouse");
                200
            },
            None,
        )
        .unwrap();

    server
        .add_page(
            "/greet",
            |request, response| {
                let name = request.param_value("name").unwrap_or("stranger");
                response.p(&format!("hello, {}", name));
                200
            },
            None,
        )
        .unwrap();

    println!("listening on http://127.0.0.1:8080/");
    server.run().unwrap();
}
