//! Typed header field sets shared by requests and responses. Each set is
//! a struct of optional values; a field is present exactly when its
//! option is set. Parsing goes through small linear tables mapping
//! lowercased field names to parse functions, and unknown names are
//! ignored. Emission walks a fixed field order.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// RFC 822 date as updated by RFC 1123: four-digit year, GMT only,
/// exactly 29 characters.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub fn format_http_date(value: &DateTime<Utc>) -> String {
    value.format(HTTP_DATE_FORMAT).to_string()
}

/// Strict date parse. Anything that deviates from the 29-character
/// RFC 1123 GMT form is a protocol error.
pub fn parse_http_date(s: &str) -> Result<DateTime<Utc>> {
    if s.len() != 29 || !s.ends_with("GMT") {
        return Err(Error::Http(400));
    }

    let naive = NaiveDateTime::parse_from_str(s, HTTP_DATE_FORMAT).map_err(|_| Error::Http(400))?;
    Ok(DateTime::<Utc>::from_utc(naive, Utc))
}

/// Split a header line at the first colon. Returns the lowercased field
/// name and the value with leading whitespace removed.
pub(crate) fn split_field_line(line: &str) -> Result<(String, &str)> {
    let colon = line.find(':').ok_or(Error::Http(400))?;
    let name = line[..colon].to_ascii_lowercase();
    let value = line[colon + 1..].trim_start();
    Ok((name, value))
}

fn put(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn append_token(slot: &mut Option<String>, token: &str) {
    match slot {
        Some(existing) => {
            existing.push_str(", ");
            existing.push_str(token);
        }
        None => *slot = Some(token.to_string()),
    }
}

/// Comma-separated tokens of a multi-valued field, trimmed, empties skipped.
fn tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Cache-Control

/// The Cache-Control directives, composed into one header field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub max_age: Option<u32>,
    /// `max-stale` may appear with or without a seconds argument.
    pub max_stale: Option<Option<u32>>,
    pub min_fresh: Option<u32>,
    pub no_transform: bool,
    pub only_if_cached: bool,
    pub public: bool,
    pub private: bool,
    pub must_revalidate: bool,
    pub proxy_revalidate: bool,
    pub s_maxage: Option<u32>,
}

impl CacheControl {
    pub fn is_empty(&self) -> bool {
        *self == CacheControl::default()
    }

    pub fn clear(&mut self) {
        *self = CacheControl::default();
    }

    /// Understand a single directive. Unknown directives are cache
    /// extensions and accepted without effect.
    pub fn parse_directive(&mut self, directive: &str) -> Result<()> {
        let directive = directive.trim();

        match directive {
            "no-cache" => self.no_cache = true,
            "no-store" => self.no_store = true,
            "no-transform" => self.no_transform = true,
            "only-if-cached" => self.only_if_cached = true,
            "public" => self.public = true,
            "private" => self.private = true,
            "must-revalidate" => self.must_revalidate = true,
            "proxy-revalidate" => self.proxy_revalidate = true,
            "max-stale" => self.max_stale = Some(None),
            _ => {
                if let Some(v) = directive.strip_prefix("max-age=") {
                    self.max_age = Some(parse_seconds(v)?);
                } else if let Some(v) = directive.strip_prefix("max-stale=") {
                    self.max_stale = Some(Some(parse_seconds(v)?));
                } else if let Some(v) = directive.strip_prefix("min-fresh=") {
                    self.min_fresh = Some(parse_seconds(v)?);
                } else if let Some(v) = directive.strip_prefix("s-maxage=") {
                    self.s_maxage = Some(parse_seconds(v)?);
                }
            }
        }

        Ok(())
    }

    /// The directives in their fixed emission order, `, `-separated,
    /// without a trailing separator.
    pub fn to_header_value(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.no_cache {
            parts.push("no-cache".to_string());
        }
        if self.no_store {
            parts.push("no-store".to_string());
        }
        if let Some(v) = self.max_age {
            parts.push(format!("max-age={}", v));
        }
        match self.max_stale {
            Some(Some(v)) => parts.push(format!("max-stale={}", v)),
            Some(None) => parts.push("max-stale".to_string()),
            None => {}
        }
        if let Some(v) = self.min_fresh {
            parts.push(format!("min-fresh={}", v));
        }
        if self.no_transform {
            parts.push("no-transform".to_string());
        }
        if self.only_if_cached {
            parts.push("only-if-cached".to_string());
        }
        if self.public {
            parts.push("public".to_string());
        }
        if self.private {
            parts.push("private".to_string());
        }
        if self.must_revalidate {
            parts.push("must-revalidate".to_string());
        }
        if self.proxy_revalidate {
            parts.push("proxy-revalidate".to_string());
        }
        if let Some(v) = self.s_maxage {
            parts.push(format!("s-maxage={}", v));
        }

        parts.join(", ")
    }
}

fn parse_seconds(v: &str) -> Result<u32> {
    v.trim().parse().map_err(|_| Error::Http(400))
}

// ---------------------------------------------------------------------------
// General headers

/// Header fields shared by requests and responses.
#[derive(Debug, Default)]
pub struct GeneralHeaders {
    pub cache_control: CacheControl,
    connection: Option<String>,
    date: Option<DateTime<Utc>>,
    pragma: Option<String>,
    trailer: Option<String>,
    transfer_encoding: Option<String>,
    upgrade: Option<String>,
    via: Option<String>,
    warning: Option<String>,
}

impl GeneralHeaders {
    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn set_connection(&mut self, value: &str) {
        self.connection = Some(value.to_string());
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn set_date(&mut self, value: DateTime<Utc>) {
        self.date = Some(value);
    }

    pub fn pragma(&self) -> Option<&str> {
        self.pragma.as_deref()
    }

    pub fn set_pragma(&mut self, value: &str) {
        self.pragma = Some(value.to_string());
    }

    pub fn trailer(&self) -> Option<&str> {
        self.trailer.as_deref()
    }

    pub fn set_trailer(&mut self, value: &str) {
        self.trailer = Some(value.to_string());
    }

    pub fn transfer_encoding(&self) -> Option<&str> {
        self.transfer_encoding.as_deref()
    }

    pub fn set_transfer_encoding(&mut self, value: &str) {
        self.transfer_encoding = Some(value.to_string());
    }

    pub fn upgrade(&self) -> Option<&str> {
        self.upgrade.as_deref()
    }

    pub fn set_upgrade(&mut self, value: &str) {
        self.upgrade = Some(value.to_string());
    }

    pub fn via(&self) -> Option<&str> {
        self.via.as_deref()
    }

    pub fn set_via(&mut self, value: &str) {
        self.via = Some(value.to_string());
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn set_warning(&mut self, value: &str) {
        self.warning = Some(value.to_string());
    }

    /// True when Transfer-Encoding announces a chunked message.
    pub fn is_chunked(&self) -> bool {
        match &self.transfer_encoding {
            Some(te) => te.eq_ignore_ascii_case("chunked"),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        *self = GeneralHeaders::default();
    }

    pub fn append_fields(&self, out: &mut String) {
        if let Some(v) = &self.pragma {
            put(out, "Pragma", v);
        }
        if let Some(d) = &self.date {
            put(out, "Date", &format_http_date(d));
        }
        if let Some(v) = &self.connection {
            put(out, "Connection", v);
        }
        if let Some(v) = &self.trailer {
            put(out, "Trailer", v);
        }
        if let Some(v) = &self.transfer_encoding {
            put(out, "Transfer-Encoding", v);
        }
        if let Some(v) = &self.upgrade {
            put(out, "Upgrade", v);
        }
        if let Some(v) = &self.via {
            put(out, "Via", v);
        }
        if let Some(v) = &self.warning {
            put(out, "Warning", v);
        }
        if !self.cache_control.is_empty() {
            put(out, "Cache-Control", &self.cache_control.to_header_value());
        }
    }
}

type GeneralParseFn = fn(&mut GeneralHeaders, &str) -> Result<()>;

const GENERAL_FIELDS: &[(&str, GeneralParseFn)] = &[
    ("cache-control", parse_cache_control),
    ("connection", parse_connection_field),
    ("date", parse_date),
    ("pragma", parse_pragma),
    ("trailer", parse_trailer),
    ("transfer-encoding", parse_transfer_encoding),
    ("upgrade", parse_upgrade),
    ("via", parse_via),
    ("warning", parse_warning),
];

/// Index of a general header parse function, by lowercased field name.
pub fn find_general_header(name: &str) -> Option<usize> {
    GENERAL_FIELDS.iter().position(|(field, _)| *field == name)
}

pub fn parse_general_header(idx: usize, gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    (GENERAL_FIELDS[idx].1)(gh, value)
}

fn parse_cache_control(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        gh.cache_control.parse_directive(token)?;
    }
    Ok(())
}

fn parse_connection_field(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_connection(value);
    Ok(())
}

fn parse_date(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_date(parse_http_date(value)?);
    Ok(())
}

fn parse_pragma(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_pragma(value);
    Ok(())
}

fn parse_trailer(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_trailer(value);
    Ok(())
}

fn parse_transfer_encoding(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_transfer_encoding(value);
    Ok(())
}

fn parse_upgrade(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_upgrade(value);
    Ok(())
}

fn parse_via(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_via(value);
    Ok(())
}

fn parse_warning(gh: &mut GeneralHeaders, value: &str) -> Result<()> {
    gh.set_warning(value);
    Ok(())
}

// ---------------------------------------------------------------------------
// Entity headers

/// Header fields describing the entity body.
#[derive(Debug, Default)]
pub struct EntityHeaders {
    allow: Option<String>,
    content_encoding: Option<String>,
    content_language: Option<String>,
    content_length: Option<u64>,
    content_location: Option<String>,
    content_md5: Option<String>,
    content_range: Option<String>,
    content_type: Option<String>,
    expires: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
}

impl EntityHeaders {
    pub fn allow(&self) -> Option<&str> {
        self.allow.as_deref()
    }

    pub fn set_allow(&mut self, value: &str) {
        self.allow = Some(value.to_string());
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn set_content_encoding(&mut self, value: &str) {
        self.content_encoding = Some(value.to_string());
    }

    pub fn content_language(&self) -> Option<&str> {
        self.content_language.as_deref()
    }

    /// Content-Language is multi-valued; every call appends one token.
    pub fn add_content_language(&mut self, value: &str) {
        append_token(&mut self.content_language, value);
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, value: u64) {
        self.content_length = Some(value);
    }

    pub fn content_location(&self) -> Option<&str> {
        self.content_location.as_deref()
    }

    pub fn set_content_location(&mut self, value: &str) {
        self.content_location = Some(value.to_string());
    }

    pub fn content_md5(&self) -> Option<&str> {
        self.content_md5.as_deref()
    }

    pub fn set_content_md5(&mut self, value: &str) {
        self.content_md5 = Some(value.to_string());
    }

    pub fn content_range(&self) -> Option<&str> {
        self.content_range.as_deref()
    }

    pub fn set_content_range(&mut self, value: &str) {
        self.content_range = Some(value.to_string());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, value: &str) {
        self.content_type = Some(value.to_string());
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    pub fn set_expires(&mut self, value: DateTime<Utc>) {
        self.expires = Some(value);
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn set_last_modified(&mut self, value: DateTime<Utc>) {
        self.last_modified = Some(value);
    }

    pub fn clear(&mut self) {
        *self = EntityHeaders::default();
    }

    pub fn append_fields(&self, out: &mut String) {
        if let Some(v) = &self.allow {
            put(out, "Allow", v);
        }
        if let Some(v) = &self.content_encoding {
            put(out, "Content-Encoding", v);
        }
        if let Some(v) = &self.content_language {
            put(out, "Content-Language", v);
        }
        if let Some(v) = self.content_length {
            put(out, "Content-Length", &v.to_string());
        }
        if let Some(v) = &self.content_location {
            put(out, "Content-Location", v);
        }
        if let Some(v) = &self.content_md5 {
            put(out, "Content-MD5", v);
        }
        if let Some(v) = &self.content_range {
            put(out, "Content-Range", v);
        }
        if let Some(v) = &self.content_type {
            put(out, "Content-Type", v);
        }
        if let Some(d) = &self.expires {
            put(out, "Expires", &format_http_date(d));
        }
        if let Some(d) = &self.last_modified {
            put(out, "Last-Modified", &format_http_date(d));
        }
    }
}

type EntityParseFn = fn(&mut EntityHeaders, &str) -> Result<()>;

const ENTITY_FIELDS: &[(&str, EntityParseFn)] = &[
    ("allow", parse_allow),
    ("content-encoding", parse_content_encoding),
    ("content-language", parse_content_language),
    ("content-length", parse_content_length),
    ("content-location", parse_content_location),
    ("content-md5", parse_content_md5),
    ("content-range", parse_content_range),
    ("content-type", parse_content_type),
    ("expires", parse_expires),
    ("last-modified", parse_last_modified),
];

pub fn find_entity_header(name: &str) -> Option<usize> {
    ENTITY_FIELDS.iter().position(|(field, _)| *field == name)
}

pub fn parse_entity_header(idx: usize, eh: &mut EntityHeaders, value: &str) -> Result<()> {
    (ENTITY_FIELDS[idx].1)(eh, value)
}

fn parse_allow(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_allow(value);
    Ok(())
}

fn parse_content_encoding(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_content_encoding(value);
    Ok(())
}

fn parse_content_language(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        eh.add_content_language(token);
    }
    Ok(())
}

fn parse_content_length(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    let n = value.trim().parse().map_err(|_| Error::Http(400))?;
    eh.set_content_length(n);
    Ok(())
}

fn parse_content_location(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_content_location(value);
    Ok(())
}

fn parse_content_md5(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_content_md5(value);
    Ok(())
}

fn parse_content_range(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_content_range(value);
    Ok(())
}

fn parse_content_type(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_content_type(value);
    Ok(())
}

fn parse_expires(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_expires(parse_http_date(value)?);
    Ok(())
}

fn parse_last_modified(eh: &mut EntityHeaders, value: &str) -> Result<()> {
    eh.set_last_modified(parse_http_date(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Request headers

/// Header fields only requests carry.
#[derive(Debug, Default)]
pub struct RequestHeaders {
    accept: Option<String>,
    accept_charset: Option<String>,
    accept_encoding: Option<String>,
    accept_language: Option<String>,
    authorization: Option<String>,
    expect: Option<String>,
    from: Option<String>,
    host: Option<String>,
    if_match: Option<String>,
    if_none_match: Option<String>,
    if_range: Option<String>,
    if_modified_since: Option<DateTime<Utc>>,
    if_unmodified_since: Option<DateTime<Utc>>,
    max_forwards: Option<u64>,
    proxy_authorization: Option<String>,
    range: Option<String>,
    referer: Option<String>,
    te: Option<String>,
    user_agent: Option<String>,
    mime_version: Option<(u32, u32)>,
}

impl RequestHeaders {
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn add_accept(&mut self, value: &str) {
        append_token(&mut self.accept, value);
    }

    pub fn accept_charset(&self) -> Option<&str> {
        self.accept_charset.as_deref()
    }

    pub fn add_accept_charset(&mut self, value: &str) {
        append_token(&mut self.accept_charset, value);
    }

    pub fn accept_encoding(&self) -> Option<&str> {
        self.accept_encoding.as_deref()
    }

    pub fn add_accept_encoding(&mut self, value: &str) {
        append_token(&mut self.accept_encoding, value);
    }

    pub fn accept_language(&self) -> Option<&str> {
        self.accept_language.as_deref()
    }

    pub fn add_accept_language(&mut self, value: &str) {
        append_token(&mut self.accept_language, value);
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn set_authorization(&mut self, value: &str) {
        self.authorization = Some(value.to_string());
    }

    pub fn expect(&self) -> Option<&str> {
        self.expect.as_deref()
    }

    pub fn set_expect(&mut self, value: &str) {
        self.expect = Some(value.to_string());
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn set_from(&mut self, value: &str) {
        self.from = Some(value.to_string());
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn set_host(&mut self, value: &str) {
        self.host = Some(value.to_string());
    }

    pub fn if_match(&self) -> Option<&str> {
        self.if_match.as_deref()
    }

    pub fn set_if_match(&mut self, value: &str) {
        self.if_match = Some(value.to_string());
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }

    pub fn set_if_none_match(&mut self, value: &str) {
        self.if_none_match = Some(value.to_string());
    }

    pub fn if_range(&self) -> Option<&str> {
        self.if_range.as_deref()
    }

    pub fn set_if_range(&mut self, value: &str) {
        self.if_range = Some(value.to_string());
    }

    pub fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        self.if_modified_since
    }

    pub fn set_if_modified_since(&mut self, value: DateTime<Utc>) {
        self.if_modified_since = Some(value);
    }

    pub fn if_unmodified_since(&self) -> Option<DateTime<Utc>> {
        self.if_unmodified_since
    }

    pub fn set_if_unmodified_since(&mut self, value: DateTime<Utc>) {
        self.if_unmodified_since = Some(value);
    }

    pub fn max_forwards(&self) -> Option<u64> {
        self.max_forwards
    }

    pub fn set_max_forwards(&mut self, value: u64) {
        self.max_forwards = Some(value);
    }

    pub fn proxy_authorization(&self) -> Option<&str> {
        self.proxy_authorization.as_deref()
    }

    pub fn set_proxy_authorization(&mut self, value: &str) {
        self.proxy_authorization = Some(value.to_string());
    }

    pub fn range(&self) -> Option<&str> {
        self.range.as_deref()
    }

    pub fn set_range(&mut self, value: &str) {
        self.range = Some(value.to_string());
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn set_referer(&mut self, value: &str) {
        self.referer = Some(value.to_string());
    }

    pub fn te(&self) -> Option<&str> {
        self.te.as_deref()
    }

    pub fn add_te(&mut self, value: &str) {
        append_token(&mut self.te, value);
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn set_user_agent(&mut self, value: &str) {
        self.user_agent = Some(value.to_string());
    }

    pub fn mime_version(&self) -> Option<(u32, u32)> {
        self.mime_version
    }

    pub fn set_mime_version(&mut self, major: u32, minor: u32) {
        self.mime_version = Some((major, minor));
    }

    pub fn clear(&mut self) {
        *self = RequestHeaders::default();
    }

    pub fn append_fields(&self, out: &mut String) {
        if let Some(v) = &self.accept {
            put(out, "Accept", v);
        }
        if let Some(v) = &self.accept_charset {
            put(out, "Accept-Charset", v);
        }
        if let Some(v) = &self.accept_encoding {
            put(out, "Accept-Encoding", v);
        }
        if let Some(v) = &self.accept_language {
            put(out, "Accept-Language", v);
        }
        if let Some(v) = &self.authorization {
            put(out, "Authorization", v);
        }
        if let Some(v) = &self.from {
            put(out, "From", v);
        }
        if let Some(v) = &self.referer {
            put(out, "Referer", v);
        }
        if let Some(v) = &self.user_agent {
            put(out, "User-Agent", v);
        }
        if let Some(v) = self.max_forwards {
            put(out, "Max-Forwards", &v.to_string());
        }
        if let Some(v) = &self.proxy_authorization {
            put(out, "Proxy-Authorization", v);
        }
        if let Some(v) = &self.range {
            put(out, "Range", v);
        }
        if let Some(v) = &self.te {
            put(out, "TE", v);
        }
        if let Some(v) = &self.expect {
            put(out, "Expect", v);
        }
        if let Some(v) = &self.host {
            put(out, "Host", v);
        }
        if let Some(v) = &self.if_match {
            put(out, "If-Match", v);
        }
        if let Some(v) = &self.if_none_match {
            put(out, "If-None-Match", v);
        }
        if let Some(v) = &self.if_range {
            put(out, "If-Range", v);
        }
        if let Some(d) = &self.if_modified_since {
            put(out, "If-Modified-Since", &format_http_date(d));
        }
        if let Some(d) = &self.if_unmodified_since {
            put(out, "If-Unmodified-Since", &format_http_date(d));
        }
        if let Some((major, minor)) = self.mime_version {
            put(out, "MIME-Version", &format!("{}.{}", major, minor));
        }
    }
}

type RequestParseFn = fn(&mut RequestHeaders, &str) -> Result<()>;

const REQUEST_FIELDS: &[(&str, RequestParseFn)] = &[
    ("user-agent", parse_user_agent),
    ("host", parse_host),
    ("from", parse_from),
    ("accept", parse_accept),
    ("accept-charset", parse_accept_charset),
    ("accept-encoding", parse_accept_encoding),
    ("accept-language", parse_accept_language),
    ("mime-version", parse_mime_version),
    ("authorization", parse_authorization),
    ("expect", parse_expect),
    ("if-match", parse_if_match),
    ("if-modified-since", parse_if_modified_since),
    ("if-none-match", parse_if_none_match),
    ("if-range", parse_if_range),
    ("if-unmodified-since", parse_if_unmodified_since),
    ("max-forwards", parse_max_forwards),
    ("proxy-authorization", parse_proxy_authorization),
    ("range", parse_range),
    ("referer", parse_referer),
    ("te", parse_te),
];

pub fn find_request_header(name: &str) -> Option<usize> {
    REQUEST_FIELDS.iter().position(|(field, _)| *field == name)
}

pub fn parse_request_header(idx: usize, rh: &mut RequestHeaders, value: &str) -> Result<()> {
    (REQUEST_FIELDS[idx].1)(rh, value)
}

fn parse_user_agent(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_user_agent(value);
    Ok(())
}

fn parse_host(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_host(value);
    Ok(())
}

fn parse_from(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_from(value);
    Ok(())
}

fn parse_accept(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        rh.add_accept(token);
    }
    Ok(())
}

fn parse_accept_charset(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        rh.add_accept_charset(token);
    }
    Ok(())
}

fn parse_accept_encoding(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        rh.add_accept_encoding(token);
    }
    Ok(())
}

fn parse_accept_language(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        rh.add_accept_language(token);
    }
    Ok(())
}

fn parse_mime_version(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    let mut parts = value.trim().splitn(2, '.');
    let major = parts.next().unwrap_or("");
    let minor = parts.next().ok_or(Error::Http(400))?;
    let major = major.parse().map_err(|_| Error::Http(400))?;
    let minor = minor.parse().map_err(|_| Error::Http(400))?;
    rh.set_mime_version(major, minor);
    Ok(())
}

fn parse_authorization(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_authorization(value);
    Ok(())
}

fn parse_expect(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_expect(value);
    Ok(())
}

fn parse_if_match(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_if_match(value);
    Ok(())
}

fn parse_if_modified_since(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_if_modified_since(parse_http_date(value)?);
    Ok(())
}

fn parse_if_none_match(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_if_none_match(value);
    Ok(())
}

fn parse_if_range(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_if_range(value);
    Ok(())
}

fn parse_if_unmodified_since(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_if_unmodified_since(parse_http_date(value)?);
    Ok(())
}

fn parse_max_forwards(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    let n = value.trim().parse().map_err(|_| Error::Http(400))?;
    rh.set_max_forwards(n);
    Ok(())
}

fn parse_proxy_authorization(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_proxy_authorization(value);
    Ok(())
}

fn parse_range(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_range(value);
    Ok(())
}

fn parse_referer(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    rh.set_referer(value);
    Ok(())
}

fn parse_te(rh: &mut RequestHeaders, value: &str) -> Result<()> {
    for token in tokens(value) {
        rh.add_te(token);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Response headers

/// Retry-After is either an absolute date or a delta in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    Date(DateTime<Utc>),
    Delta(u64),
}

/// Header fields only responses carry.
#[derive(Debug, Default)]
pub struct ResponseHeaders {
    accept_ranges: Option<bool>,
    age: Option<u64>,
    etag: Option<String>,
    location: Option<String>,
    proxy_authenticate: Option<String>,
    retry_after: Option<RetryAfter>,
    server: Option<String>,
    vary: Option<String>,
    www_authenticate: Option<String>,
}

impl ResponseHeaders {
    /// Some(true) means byte ranges are accepted, Some(false) none.
    pub fn accept_ranges(&self) -> Option<bool> {
        self.accept_ranges
    }

    pub fn set_accept_ranges(&mut self, value: bool) {
        self.accept_ranges = Some(value);
    }

    pub fn age(&self) -> Option<u64> {
        self.age
    }

    pub fn set_age(&mut self, value: u64) {
        self.age = Some(value);
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn set_etag(&mut self, value: &str) {
        self.etag = Some(value.to_string());
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_location(&mut self, value: &str) {
        self.location = Some(value.to_string());
    }

    pub fn proxy_authenticate(&self) -> Option<&str> {
        self.proxy_authenticate.as_deref()
    }

    pub fn set_proxy_authenticate(&mut self, value: &str) {
        self.proxy_authenticate = Some(value.to_string());
    }

    pub fn retry_after(&self) -> Option<RetryAfter> {
        self.retry_after
    }

    pub fn set_retry_after(&mut self, value: RetryAfter) {
        self.retry_after = Some(value);
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn set_server(&mut self, value: &str) {
        self.server = Some(value.to_string());
    }

    pub fn vary(&self) -> Option<&str> {
        self.vary.as_deref()
    }

    pub fn set_vary(&mut self, value: &str) {
        self.vary = Some(value.to_string());
    }

    pub fn www_authenticate(&self) -> Option<&str> {
        self.www_authenticate.as_deref()
    }

    pub fn set_www_authenticate(&mut self, value: &str) {
        self.www_authenticate = Some(value.to_string());
    }

    pub fn clear(&mut self) {
        *self = ResponseHeaders::default();
    }

    pub fn append_fields(&self, out: &mut String) {
        if let Some(v) = self.age {
            put(out, "Age", &v.to_string());
        }
        if let Some(v) = &self.etag {
            put(out, "ETag", v);
        }
        if let Some(v) = &self.location {
            put(out, "Location", v);
        }
        if let Some(v) = &self.proxy_authenticate {
            put(out, "Proxy-Authenticate", v);
        }
        if let Some(v) = &self.server {
            put(out, "Server", v);
        }
        if let Some(v) = &self.vary {
            put(out, "Vary", v);
        }
        if let Some(v) = &self.www_authenticate {
            put(out, "WWW-Authenticate", v);
        }
        if let Some(v) = self.accept_ranges {
            put(out, "Accept-Ranges", if v { "bytes" } else { "none" });
        }
        match &self.retry_after {
            Some(RetryAfter::Date(d)) => put(out, "Retry-After", &format_http_date(d)),
            Some(RetryAfter::Delta(secs)) => put(out, "Retry-After", &secs.to_string()),
            None => {}
        }
    }
}

type ResponseParseFn = fn(&mut ResponseHeaders, &str) -> Result<()>;

const RESPONSE_FIELDS: &[(&str, ResponseParseFn)] = &[
    ("accept-ranges", parse_accept_ranges),
    ("age", parse_age),
    ("etag", parse_etag),
    ("location", parse_location),
    ("proxy-authenticate", parse_proxy_authenticate),
    ("retry-after", parse_retry_after),
    ("server", parse_server),
    ("vary", parse_vary),
    ("www-authenticate", parse_www_authenticate),
];

pub fn find_response_header(name: &str) -> Option<usize> {
    RESPONSE_FIELDS.iter().position(|(field, _)| *field == name)
}

pub fn parse_response_header(idx: usize, rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    (RESPONSE_FIELDS[idx].1)(rh, value)
}

fn parse_accept_ranges(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    // Bytes is the only range unit HTTP 1.1 defines; others may be ignored.
    match value.trim() {
        "bytes" => rh.set_accept_ranges(true),
        "none" => rh.set_accept_ranges(false),
        _ => {}
    }
    Ok(())
}

fn parse_age(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    let n: u64 = value.trim().parse().map_err(|_| Error::Http(400))?;
    if n == 0 {
        return Err(Error::Http(400));
    }
    rh.set_age(n);
    Ok(())
}

fn parse_etag(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    rh.set_etag(value);
    Ok(())
}

fn parse_location(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    rh.set_location(value);
    Ok(())
}

fn parse_proxy_authenticate(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    rh.set_proxy_authenticate(value);
    Ok(())
}

fn parse_retry_after(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    if let Ok(date) = parse_http_date(value) {
        rh.set_retry_after(RetryAfter::Date(date));
        return Ok(());
    }

    let delta: i64 = value.trim().parse().map_err(|_| Error::Http(400))?;
    if delta <= 0 {
        return Err(Error::Http(400));
    }

    rh.set_retry_after(RetryAfter::Delta(delta as u64));
    Ok(())
}

fn parse_server(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    rh.set_server(value);
    Ok(())
}

fn parse_vary(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    rh.set_vary(value);
    Ok(())
}

fn parse_www_authenticate(rh: &mut ResponseHeaders, value: &str) -> Result<()> {
    rh.set_www_authenticate(value);
    Ok(())
}
