//! HTTP request ingest and accessors. One request is read off a
//! connection in four steps: request line, header fields, and, for POST,
//! the entity body. URI parameters and form fields are exposed through
//! decoding accessors.

use crate::connection::Connection;
use crate::cookie::{parse_cookie_header, Cookie};
use crate::error::{AppError, Error, Result};
use crate::headers;
use crate::headers::{EntityHeaders, GeneralHeaders, RequestHeaders};
use crate::pool::Recycle;
use crate::query;
use chrono::{DateTime, Utc};
use log::debug;

/// Longest accepted request line, in bytes.
pub(crate) const MAX_REQUEST_LINE: usize = 10240;
/// Longest accepted request URI, in bytes.
pub(crate) const MAX_URI: usize = 10240;
/// Longest accepted header line, in bytes.
pub(crate) const MAX_HEADER_LINE: usize = 4096;

/// The request methods we serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Unknown,
    Get,
    Head,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Unknown => "unknown",
        }
    }
}

/// The protocol versions we understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Unknown,
    Http09,
    Http10,
    Http11,
}

impl Version {
    /// The version token used on response status lines. Unknown and 0.9
    /// requests are answered as HTTP/1.1.
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            _ => "HTTP/1.1",
        }
    }
}

/// One parsed HTTP request.
pub struct Request {
    method: Method,
    version: Version,
    uri: String,
    params: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    pub general: GeneralHeaders,
    pub entity: EntityHeaders,
    pub headers: RequestHeaders,
    body: Option<Vec<u8>>,
    deferred_read: bool,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            method: Method::Unknown,
            version: Version::Unknown,
            uri: String::new(),
            params: Vec::new(),
            cookies: Vec::new(),
            general: GeneralHeaders::default(),
            entity: EntityHeaders::default(),
            headers: RequestHeaders::default(),
            body: None,
            deferred_read: false,
        }
    }
}

impl Request {
    pub fn new() -> Self {
        Request::default()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
    }

    /// Postpone reading the POST body; the handler pulls it off the
    /// connection itself.
    pub fn set_deferred_read(&mut self, deferred: bool) {
        self.deferred_read = deferred;
    }

    pub fn deferred_read(&self) -> bool {
        self.deferred_read
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn param_name(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(|(name, _)| name.as_str())
    }

    /// Decoded value of the named URI parameter.
    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn add_param(&mut self, name: &str, value: &str) {
        self.params.push((name.to_string(), value.to_string()));
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    /// The raw entity body, when one was read.
    pub fn content(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn content_length(&self) -> usize {
        self.entity.content_length().unwrap_or(0) as usize
    }

    pub fn set_entity(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.host()
    }

    pub fn referer(&self) -> Option<&str> {
        self.headers.referer()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.user_agent()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.entity.content_type()
    }

    pub fn content_type_is(&self, value: &str) -> bool {
        self.entity.content_type() == Some(value)
    }

    pub fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        self.headers.if_modified_since()
    }

    /// True when the Accept header is unset, or when it mentions `value`.
    pub fn accepts_media_type(&self, value: &str) -> bool {
        match self.headers.accept() {
            Some(accept) => accept.contains(value),
            None => true,
        }
    }

    /// Word-match `lang` against the Accept-Language tokens.
    pub fn accepts_language(&self, lang: &str) -> bool {
        match self.headers.accept_language() {
            Some(value) => value
                .split_whitespace()
                .map(|word| word.trim_matches(','))
                .any(|word| word == lang),
            None => false,
        }
    }

    // -- form fields ------------------------------------------------------

    pub fn field_count(&self) -> usize {
        match &self.body {
            Some(body) => query::parse_form_fields(body).len(),
            None => 0,
        }
    }

    pub fn field_namelen(&self, idx: usize) -> usize {
        match &self.body {
            Some(body) => query::parse_form_fields(body)
                .get(idx)
                .map(|f| f.name.len())
                .unwrap_or(0),
            None => 0,
        }
    }

    pub fn field_valuelen(&self, idx: usize) -> usize {
        match &self.body {
            Some(body) => query::parse_form_fields(body)
                .get(idx)
                .map(|f| f.value.len())
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Decoded name of form field `idx`.
    pub fn field_name(&self, idx: usize) -> Option<String> {
        let body = self.body.as_ref()?;
        let fields = query::parse_form_fields(body);
        query::decode_form_value(fields.get(idx)?.name).ok()
    }

    /// Decoded value of form field `idx`.
    pub fn field_value(&self, idx: usize) -> Option<String> {
        let body = self.body.as_ref()?;
        let fields = query::parse_form_fields(body);
        query::decode_form_value(fields.get(idx)?.value).ok()
    }

    /// Decoded value of the form field with the given (raw) name.
    pub fn field_value_by_name(&self, name: &str) -> Option<String> {
        let body = self.body.as_ref()?;
        let fields = query::parse_form_fields(body);
        let field = fields.iter().find(|f| f.name == name.as_bytes())?;
        query::decode_form_value(field.value).ok()
    }

    // -- ingest -----------------------------------------------------------

    /// Read one complete request off the connection: request line, header
    /// fields, and the POST body unless deferred. HTTP/1.1 marks the
    /// connection persistent before the header fields can override it.
    pub fn receive(&mut self, conn: &mut Connection, max_post_content: usize) -> Result<()> {
        let line = match conn.read_line(MAX_REQUEST_LINE) {
            Ok(line) => line,
            Err(Error::App(AppError::Overflow)) => return Err(Error::Http(414)),
            Err(err) => return Err(err),
        };

        self.parse_request_line(&line)?;

        if self.version == Version::Http11 {
            conn.set_persistent(true);
        }

        self.read_header_fields(conn)?;

        if self.method == Method::Post && !self.deferred_read {
            return self.read_posted_content(conn, max_post_content);
        }

        Ok(())
    }

    fn parse_request_line(&mut self, line: &str) -> Result<()> {
        let mut words = line.split_whitespace();

        let method = words.next().ok_or(Error::Http(400))?;
        self.method = match method {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            _ => return Err(Error::Http(501)),
        };

        let uri = words.next().ok_or(Error::Http(400))?;
        if uri.len() >= MAX_URI {
            return Err(Error::Http(414));
        }
        self.parse_uri(uri)?;

        self.version = match words.next() {
            // No version at all means an HTTP/0.9 client.
            None => Version::Http09,
            Some("HTTP/1.0") => Version::Http10,
            Some("HTTP/1.1") => Version::Http11,
            Some(_) => return Err(Error::Http(505)),
        };

        Ok(())
    }

    fn parse_uri(&mut self, uri: &str) -> Result<()> {
        match uri.find('?') {
            None => {
                self.uri = uri.to_string();
            }
            Some(q) => {
                self.uri = uri[..q].to_string();
                let query = &uri[q + 1..];
                if query.is_empty() {
                    // Someone gave us just a URI and a '?'.
                    return Err(Error::Http(400));
                }
                self.params = query::parse_uri_params(query)?;
            }
        }

        Ok(())
    }

    fn read_header_fields(&mut self, conn: &mut Connection) -> Result<()> {
        loop {
            let line = conn.read_line(MAX_HEADER_LINE)?;
            if line.is_empty() {
                // The bare CRLF terminating the header section.
                return Ok(());
            }

            self.parse_header_field(conn, &line)?;
        }
    }

    fn parse_header_field(&mut self, conn: &mut Connection, line: &str) -> Result<()> {
        let (name, value) = headers::split_field_line(line)?;

        // The connection outlives the request, so persistence belongs to it.
        if name == "connection" {
            self.general.set_connection(value);
            if value.contains("keep-alive") || value.contains("Keep-Alive") {
                conn.set_persistent(true);
            }
            if value.contains("close") {
                conn.set_persistent(false);
            }
            return Ok(());
        }

        if name == "cookie" {
            if let Some(cookie) = parse_cookie_header(value)? {
                self.cookies.push(cookie);
            }
            return Ok(());
        }

        if let Some(idx) = headers::find_general_header(&name) {
            return headers::parse_general_header(idx, &mut self.general, value);
        }

        if let Some(idx) = headers::find_entity_header(&name) {
            return headers::parse_entity_header(idx, &mut self.entity, value);
        }

        if let Some(idx) = headers::find_request_header(&name) {
            return headers::parse_request_header(idx, &mut self.headers, value);
        }

        debug!("ignoring unknown header field: {}", name);
        Ok(())
    }

    fn read_posted_content(&mut self, conn: &mut Connection, max_post_content: usize) -> Result<()> {
        let content_length = self.content_length();
        if content_length == 0 {
            return Err(Error::Http(411));
        }

        if content_length > max_post_content {
            return Err(Error::Http(400));
        }

        let mut body = vec![0u8; content_length];
        let nread = conn.read(&mut body)?;

        // Short reads are not acceptable here.
        if nread != content_length {
            return Err(Error::Tcp(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "posted content shorter than declared",
            )));
        }

        self.body = Some(body);
        Ok(())
    }

    // -- client-side emission --------------------------------------------

    /// Serialize this request onto a connection: request line, general,
    /// entity and request header fields, blank line, flush.
    pub fn send(&self, conn: &mut Connection) -> Result<()> {
        let mut head = String::new();

        head.push_str(self.method.as_str());
        head.push(' ');
        head.push_str(&self.uri);
        if self.version != Version::Http09 {
            head.push(' ');
            head.push_str(self.version.as_str());
        }
        head.push_str("\r\n");

        self.general.append_fields(&mut head);
        self.entity.append_fields(&mut head);
        self.headers.append_fields(&mut head);
        head.push_str("\r\n");

        conn.write(head.as_bytes())?;
        conn.flush()
    }
}

impl Recycle for Request {
    fn recycle(&mut self) {
        self.method = Method::Unknown;
        self.version = Version::Unknown;
        self.uri.clear();
        self.params.clear();
        self.cookies.clear();
        self.general.clear();
        self.entity.clear();
        self.headers.clear();
        self.body = None;
        self.deferred_read = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_with_version() {
        let mut r = Request::new();
        r.parse_request_line("GET /index HTTP/1.1").unwrap();
        assert_eq!(r.method(), Method::Get);
        assert_eq!(r.uri(), "/index");
        assert_eq!(r.version(), Version::Http11);
    }

    #[test]
    fn request_line_without_version_is_http09() {
        let mut r = Request::new();
        r.parse_request_line("GET /").unwrap();
        assert_eq!(r.version(), Version::Http09);
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let mut r = Request::new();
        match r.parse_request_line("BREW /pot HTTP/1.1") {
            Err(Error::Http(501)) => {}
            other => panic!("expected 501, got {:?}", other.err()),
        }
    }

    #[test]
    fn unknown_version_is_unsupported() {
        let mut r = Request::new();
        match r.parse_request_line("GET / HTTP/1.5") {
            Err(Error::Http(505)) => {}
            other => panic!("expected 505, got {:?}", other.err()),
        }
    }

    #[test]
    fn uri_params_are_split_and_decoded() {
        let mut r = Request::new();
        r.parse_request_line("GET /page?name=Jo%20e&age=30 HTTP/1.1").unwrap();
        assert_eq!(r.uri(), "/page");
        assert_eq!(r.param_count(), 2);
        assert_eq!(r.param_value("name"), Some("Jo e"));
        assert_eq!(r.param_value("age"), Some("30"));
    }

    #[test]
    fn bare_question_mark_is_bad_request() {
        let mut r = Request::new();
        match r.parse_request_line("GET /page? HTTP/1.1") {
            Err(Error::Http(400)) => {}
            other => panic!("expected 400, got {:?}", other.err()),
        }
    }

    #[test]
    fn plus_is_not_decoded_in_uri_params() {
        let mut r = Request::new();
        r.parse_request_line("GET /p?v=a+b HTTP/1.1").unwrap();
        assert_eq!(r.param_value("v"), Some("a+b"));
    }

    #[test]
    fn oversize_uri_is_414() {
        let mut r = Request::new();
        let uri = format!("/{}", "x".repeat(MAX_URI));
        match r.parse_request_line(&format!("GET {} HTTP/1.1", uri)) {
            Err(Error::Http(414)) => {}
            other => panic!("expected 414, got {:?}", other.err()),
        }
    }

    #[test]
    fn form_fields_decode() {
        let mut r = Request::new();
        r.set_entity(b"a=1&name=A%2BB%20C".to_vec());
        assert_eq!(r.field_count(), 2);
        assert_eq!(r.field_value_by_name("a"), Some("1".to_string()));
        assert_eq!(r.field_value_by_name("name"), Some("A+B C".to_string()));
        assert_eq!(r.field_name(1), Some("name".to_string()));
        assert_eq!(r.field_valuelen(1), 9);
    }

    #[test]
    fn accept_checks() {
        let mut r = Request::new();
        assert!(r.accepts_media_type("text/html"));
        r.headers.add_accept("text/html");
        assert!(r.accepts_media_type("text/html"));
        assert!(!r.accepts_media_type("image/png"));

        assert!(!r.accepts_language("en"));
        r.headers.add_accept_language("en no");
        assert!(r.accepts_language("en"));
        assert!(r.accepts_language("no"));
        assert!(!r.accepts_language("de"));
    }

    #[test]
    fn recycle_clears_everything() {
        let mut r = Request::new();
        r.parse_request_line("POST /x?a=1 HTTP/1.1").unwrap();
        r.set_entity(b"a=1".to_vec());
        r.add_cookie(crate::cookie::Cookie::new("s", "v"));
        r.recycle();
        assert_eq!(r.method(), Method::Unknown);
        assert_eq!(r.uri(), "");
        assert_eq!(r.param_count(), 0);
        assert!(r.cookies().is_empty());
        assert!(r.content().is_none());
    }
}
