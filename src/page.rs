//! Dynamic pages: an exact URI, a handler function, and optional page
//! attributes gating which clients may run it.

use crate::request::Request;
use crate::response::Response;

/// A page handler produces the response and returns the HTTP status code.
/// Zero means 200; codes outside the legal range are mapped to 500.
pub type PageHandler = dyn Fn(&Request, &mut Response) -> u16 + Send + Sync;

/// Content attributes a page declares about itself.
#[derive(Debug, Default, Clone)]
pub struct PageAttributes {
    media_type: Option<String>,
    language: Option<String>,
    charset: Option<String>,
    encoding: Option<String>,
    authorization: Option<String>,
}

impl PageAttributes {
    pub fn new() -> Self {
        PageAttributes::default()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn set_media_type(&mut self, value: &str) {
        self.media_type = Some(value.to_string());
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, value: &str) {
        self.language = Some(value.to_string());
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn set_charset(&mut self, value: &str) {
        self.charset = Some(value.to_string());
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn set_encoding(&mut self, value: &str) {
        self.encoding = Some(value.to_string());
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn set_authorization(&mut self, value: &str) {
        self.authorization = Some(value.to_string());
    }

    /// See if the client understands us: when a media type is declared,
    /// the request's Accept header must cover it.
    pub fn accepted_by(&self, request: &Request) -> bool {
        match &self.media_type {
            Some(media_type) => request.accepts_media_type(media_type),
            None => true,
        }
    }
}

/// One registered page: exact URI, handler, optional attributes.
pub struct DynamicPage {
    uri: String,
    handler: Box<PageHandler>,
    attributes: Option<PageAttributes>,
}

impl DynamicPage {
    pub fn new(uri: &str, handler: Box<PageHandler>, attributes: Option<PageAttributes>) -> Self {
        DynamicPage {
            uri: uri.to_string(),
            handler,
            attributes,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn attributes(&self) -> Option<&PageAttributes> {
        self.attributes.as_ref()
    }

    pub fn run(&self, request: &Request, response: &mut Response) -> u16 {
        (self.handler)(request, response)
    }
}
