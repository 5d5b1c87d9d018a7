//! The HTTP server: the TCP core of [`crate::server`] composed with
//! request/response pools, the page dispatcher and the access log. The
//! per-connection service loop lives here.

use crate::access_log::AccessLog;
use crate::config::{ConfigFile, ProcessSettings};
use crate::connection::Connection;
use crate::error::{AppError, Error, Result};
use crate::page::{DynamicPage, PageAttributes, PageHandler};
use crate::pool::{Pool, Recycle};
use crate::request::{Request, Version};
use crate::response::{is_http_status, Response};
use crate::server::{Counters, TcpServer};
use crate::static_files;
use crate::Lifecycle;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DOCUMENTROOT_MAX: usize = 10240;
const LOGFILE_MAX: usize = 10240;

/// Everything the worker-side service loop needs, frozen at start.
struct SharedState {
    pages: Vec<DynamicPage>,
    default_handler: Option<Arc<PageHandler>>,
    default_attributes: Option<PageAttributes>,
    can_read_files: bool,
    documentroot: String,
    post_limit: usize,
    deferred_read: bool,
    requests: Pool<Request>,
    responses: Pool<Response>,
    log: Arc<AccessLog>,
    shutting_down: Arc<AtomicBool>,
}

/// An HTTP server over the TCP serving core.
pub struct HttpServer {
    engine: TcpServer,

    max_pages: usize,
    pages: Vec<DynamicPage>,
    default_handler: Option<Arc<PageHandler>>,
    default_attributes: Option<PageAttributes>,

    can_read_files: bool,
    documentroot: String,

    /// Largest POST body we accept, in bytes.
    post_limit: usize,

    /// Leave POST bodies on the socket for the handler to read.
    deferred_read: bool,

    // The engine takes timeouts and retries as tuples; remember the last
    // values so the per-field setters can reconfigure it.
    timeouts: (u64, u64, u64),
    retries: (u32, u32),

    log: Arc<AccessLog>,
}

impl HttpServer {
    pub fn new() -> Self {
        let mut engine = TcpServer::new();
        engine.set_port(80);
        engine.set_timeouts(5000, 500, 5000);
        engine.set_retries(0, 3);
        engine.set_worker_threads(8);
        engine.set_queue_size(100);

        HttpServer {
            engine,
            max_pages: 100,
            pages: Vec::new(),
            default_handler: None,
            default_attributes: None,
            can_read_files: false,
            documentroot: "./".to_string(),
            post_limit: 100 * 1024,
            deferred_read: false,
            timeouts: (5000, 500, 5000),
            retries: (0, 3),
            log: Arc::new(AccessLog::new()),
        }
    }

    // -- configuration ----------------------------------------------------

    pub fn set_hostname(&mut self, host: Option<&str>) {
        self.engine.set_hostname(host);
    }

    pub fn set_port(&mut self, port: u16) {
        self.engine.set_port(port);
    }

    pub fn port(&self) -> u16 {
        self.engine.port()
    }

    pub fn set_timeout_read(&mut self, ms: u64) {
        self.timeouts.0 = ms;
        self.apply_timeouts();
    }

    pub fn set_timeout_write(&mut self, ms: u64) {
        self.timeouts.1 = ms;
        self.apply_timeouts();
    }

    pub fn set_timeout_accept(&mut self, ms: u64) {
        self.timeouts.2 = ms;
        self.apply_timeouts();
    }

    fn apply_timeouts(&mut self) {
        self.engine.set_timeouts(self.timeouts.0, self.timeouts.1, self.timeouts.2);
    }

    pub fn set_retries_read(&mut self, retries: u32) {
        self.retries.0 = retries;
        self.engine.set_retries(self.retries.0, self.retries.1);
    }

    pub fn set_retries_write(&mut self, retries: u32) {
        self.retries.1 = retries;
        self.engine.set_retries(self.retries.0, self.retries.1);
    }

    pub fn set_worker_threads(&mut self, count: usize) {
        self.engine.set_worker_threads(count);
    }

    pub fn worker_threads(&self) -> usize {
        self.engine.worker_threads()
    }

    pub fn set_queue_size(&mut self, size: usize) {
        self.engine.set_queue_size(size);
    }

    pub fn queue_size(&self) -> usize {
        self.engine.queue_size()
    }

    pub fn set_block_when_full(&mut self, block: bool) {
        self.engine.set_block_when_full(block);
    }

    pub fn set_tls_config(&mut self, config: Option<Arc<rustls::ServerConfig>>) {
        self.engine.set_tls_config(config);
    }

    pub fn allow_clients(&mut self, pattern: &str) -> Result<()> {
        self.engine.allow_clients(pattern)
    }

    pub fn clear_client_filter(&mut self) {
        self.engine.clear_client_filter();
    }

    pub fn set_max_pages(&mut self, max: usize) {
        self.max_pages = max;
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Register a handler for an exact URI.
    pub fn add_page(
        &mut self,
        uri: &str,
        handler: impl Fn(&Request, &mut Response) -> u16 + Send + Sync + 'static,
        attributes: Option<PageAttributes>,
    ) -> Result<()> {
        if self.pages.len() >= self.max_pages {
            return Err(Error::App(AppError::Overflow));
        }

        self.pages.push(DynamicPage::new(uri, Box::new(handler), attributes));
        Ok(())
    }

    /// Handler for URIs no page claims and no file covers.
    pub fn set_default_page_handler(
        &mut self,
        handler: impl Fn(&Request, &mut Response) -> u16 + Send + Sync + 'static,
    ) {
        self.default_handler = Some(Arc::new(handler));
    }

    pub fn set_default_page_attributes(&mut self, attributes: PageAttributes) {
        self.default_attributes = Some(attributes);
    }

    pub fn set_can_read_files(&mut self, can: bool) {
        self.can_read_files = can;
    }

    pub fn can_read_files(&self) -> bool {
        self.can_read_files
    }

    pub fn set_documentroot(&mut self, docroot: &str) -> Result<()> {
        if docroot.len() > DOCUMENTROOT_MAX {
            return Err(Error::App(AppError::Overflow));
        }
        self.documentroot = docroot.to_string();
        Ok(())
    }

    pub fn documentroot(&self) -> &str {
        &self.documentroot
    }

    pub fn set_post_limit(&mut self, bytes: usize) {
        self.post_limit = bytes;
    }

    pub fn post_limit(&self) -> usize {
        self.post_limit
    }

    pub fn set_deferred_read(&mut self, deferred: bool) {
        self.deferred_read = deferred;
    }

    pub fn deferred_read(&self) -> bool {
        self.deferred_read
    }

    pub fn set_logfile(&mut self, name: &str) -> Result<()> {
        if name.len() > LOGFILE_MAX {
            return Err(Error::App(AppError::Overflow));
        }
        self.log.set_logfile(name);
        Ok(())
    }

    pub fn set_logrotate(&mut self, rotate: u32) {
        self.log.set_rotate(rotate);
    }

    /// Apply a configuration file; the keys that belong to the process
    /// supervisor come back to the caller.
    pub fn configure(&mut self, path: &str) -> Result<ProcessSettings> {
        let cf = ConfigFile::read(path)?;

        if let Some(workers) = cf.get_uint("workers")? {
            self.set_worker_threads(workers as usize);
        }
        if let Some(size) = cf.get_uint("queuesize")? {
            self.set_queue_size(size as usize);
        }
        if let Some(block) = cf.get_bool("block_when_full")? {
            self.set_block_when_full(block);
        }
        if let Some(ms) = cf.get_uint("timeout_read")? {
            self.set_timeout_read(ms);
        }
        if let Some(ms) = cf.get_uint("timeout_write")? {
            self.set_timeout_write(ms);
        }
        if let Some(retries) = cf.get_uint("retries_read")? {
            self.set_retries_read(retries as u32);
        }
        if let Some(retries) = cf.get_uint("retries_write")? {
            self.set_retries_write(retries as u32);
        }
        if let Some(rotate) = cf.get_uint("logrotate")? {
            self.set_logrotate(rotate as u32);
        }
        if let Some(port) = cf.get_uint("port")? {
            self.set_port(port as u16);
        }
        if let Some(host) = cf.get_string("hostname") {
            self.set_hostname(Some(host));
        }
        if let Some(docroot) = cf.get_string("documentroot") {
            self.set_documentroot(docroot)?;
        }
        if let Some(logfile) = cf.get_string("logfile") {
            self.set_logfile(logfile)?;
        }

        Ok(cf.process_settings())
    }

    // -- counters ---------------------------------------------------------

    pub fn counters(&self) -> Arc<Counters> {
        self.engine.counters()
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.engine.local_addr()
    }

    /// The flag the accept loop polls; store `true` to stop serving.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.engine.shutdown_flag()
    }

    // -- serving ----------------------------------------------------------

    /// Wire the dispatcher into the TCP core and serve until shutdown.
    pub fn run(&mut self) -> Result<()> {
        let workers = self.engine.worker_threads();

        let mut requests = Vec::with_capacity(workers);
        let mut responses = Vec::with_capacity(workers);
        for _ in 0..workers {
            requests.push(Request::new());
            responses.push(Response::new());
        }

        let shared = Arc::new(SharedState {
            pages: std::mem::take(&mut self.pages),
            default_handler: self.default_handler.clone(),
            default_attributes: self.default_attributes.clone(),
            can_read_files: self.can_read_files,
            documentroot: self.documentroot.clone(),
            post_limit: self.post_limit,
            deferred_read: self.deferred_read,
            requests: Pool::with_objects(requests),
            responses: Pool::with_objects(responses),
            log: self.log.clone(),
            shutting_down: self.engine.shutdown_flag(),
        });

        self.engine
            .set_service_function(Arc::new(move |conn: &mut Connection| {
                service_connection(&shared, conn);
            }));

        self.engine.run()
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        HttpServer::new()
    }
}

impl Lifecycle for HttpServer {
    fn get_root_resources(&mut self) -> Result<()> {
        self.engine.get_root_resources()
    }

    fn free_root_resources(&mut self) -> Result<()> {
        self.engine.free_root_resources()
    }

    fn start(&mut self) -> Result<()> {
        self.run()
    }

    fn shutdown(&self) {
        self.engine.shutdown();
    }
}

/// Borrow a request and a response, run the service loop, and leave the
/// connection in the right state for recycling: discarded after TCP
/// errors, flushed and closed otherwise.
fn service_connection(shared: &SharedState, conn: &mut Connection) {
    let mut request = shared.requests.get();
    request.set_deferred_read(shared.deferred_read);
    let mut response = shared.responses.get();

    let result = service_loop(shared, conn, &mut request, &mut response);

    match result {
        Err(ref err) if err.is_tcp() => conn.discard(),
        _ => {
            let _ = conn.close();
        }
    }
}

/// One connection's request/response cycle, repeated while the
/// connection stays persistent.
fn service_loop(
    shared: &SharedState,
    conn: &mut Connection,
    request: &mut Request,
    response: &mut Response,
) -> Result<()> {
    while !shared.shutting_down.load(Ordering::SeqCst) {
        conn.wait_for_data()?;

        let mut outcome = request.receive(conn, shared.post_limit);
        if outcome.is_ok() {
            response.set_version(request.version());
            outcome = dispatch(shared, request, response);
        }

        if let Err(err) = outcome {
            // Protocol errors go back to the client as their status; OS
            // trouble becomes a 500 if the socket is still usable. TCP
            // errors emit nothing, the connection is past saving.
            let status = match &err {
                Error::Os(_) => Some(500),
                _ => err.http_status(),
            };

            if let Some(status) = status {
                response.set_status(status);
                response.set_connection("close");
                let sent = response.send(conn).unwrap_or(0);
                shared
                    .log
                    .add_entry(conn.peer_addr(), request.method().as_str(), request.uri(), status, sent);
            }
            return Err(err);
        }

        // Extra support for HTTP 1.0 clients: if the connection will not
        // persist and nothing was decided yet, say so, so clients like
        // Lynx can detect closure.
        if request.version() != Version::Http11
            && !conn.is_persistent()
            && response.connection().is_none()
        {
            response.set_connection("close");
        }

        let sent = response.send(conn)?;
        shared.log.add_entry(
            conn.peer_addr(),
            request.method().as_str(),
            request.uri(),
            response.status(),
            sent,
        );

        if response.connection() == Some("close") {
            return Ok(());
        }

        if !conn.is_persistent() {
            return Ok(());
        }

        conn.flush()?;
        request.recycle();
        request.set_deferred_read(shared.deferred_read);
        response.recycle();
    }

    // Shutdown was requested.
    Ok(())
}

/// Resolve the request to a dynamic page, a disk file, or the default
/// handler; 404 when none of them apply.
fn dispatch(shared: &SharedState, request: &Request, response: &mut Response) -> Result<()> {
    if let Some(page) = lookup(&shared.pages, request.uri()) {
        return run_page(shared, page, request, response);
    }

    if shared.can_read_files {
        return static_files::send_disk_file(
            &shared.documentroot,
            request,
            response,
            shared.default_attributes.as_ref(),
        );
    }

    if let Some(handler) = &shared.default_handler {
        let handler = handler.clone();
        let page = DynamicPage::new(request.uri(), Box::new(move |req, resp| handler(req, resp)), None);
        return run_page(shared, &page, request, response);
    }

    debug!("no handler for {}", request.uri());
    response.set_status(404);
    response.set_connection("close");
    Ok(())
}

fn lookup<'a>(pages: &'a [DynamicPage], uri: &str) -> Option<&'a DynamicPage> {
    pages.iter().find(|page| page.uri() == uri)
}

/// Run one page handler, honoring the attribute gate. Handlers return
/// the status code; zero means 200 and codes outside the legal range
/// collapse to 500.
fn run_page(
    shared: &SharedState,
    page: &DynamicPage,
    request: &Request,
    response: &mut Response,
) -> Result<()> {
    let attributes = page.attributes().or(shared.default_attributes.as_ref());
    if let Some(attributes) = attributes {
        if !attributes.accepted_by(request) {
            response.set_status(406);
            return Err(Error::Http(406));
        }
    }

    let mut status = page.run(request, response);
    if status == 0 {
        status = 200;
    } else if !is_http_status(status) {
        status = 500;
    }

    response.set_status(status);
    Ok(())
}
