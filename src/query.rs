//! Decoding of URI parameters and URL-encoded form bodies. Both use
//! RFC 1738 percent escapes; only form fields additionally map `+` to a
//! space.

use crate::error::{Error, Result};
use percent_encoding::percent_decode;

/// Validate and percent-decode to UTF-8. A `%` not followed by two hex
/// digits, or a result that is not valid UTF-8, is a protocol error.
pub fn decode_uri_value(raw: &[u8]) -> Result<String> {
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if raw.len() < i + 3
                || !raw[i + 1].is_ascii_hexdigit()
                || !raw[i + 2].is_ascii_hexdigit()
            {
                return Err(Error::Http(400));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    match percent_decode(raw).decode_utf8() {
        Ok(decoded) => Ok(decoded.to_string()),
        Err(_) => Err(Error::Http(400)),
    }
}

/// Decode one form-field token: `+` becomes a space, then percent escapes
/// are resolved.
pub fn decode_form_value(raw: &[u8]) -> Result<String> {
    let spaced: Vec<u8> = raw.iter().map(|&b| if b == b'+' { b' ' } else { b }).collect();
    decode_uri_value(&spaced)
}

/// Split the part after `?` into `name=value` pairs. Pairs are separated
/// by `&`; tokens without `=` carry no value and are skipped. Values are
/// percent-decoded, names are taken verbatim.
pub fn parse_uri_params(query: &str) -> Result<Vec<(String, String)>> {
    let mut params = Vec::new();

    for token in query.split('&') {
        if token.is_empty() {
            continue;
        }

        let eq = match token.find('=') {
            Some(eq) => eq,
            None => continue,
        };

        let name = &token[..eq];
        if name.is_empty() {
            continue;
        }

        let value = decode_uri_value(token[eq + 1..].as_bytes())?;
        params.push((name.to_string(), value));
    }

    Ok(params)
}

/// A raw `name=value` form field inside a POST body.
#[derive(Debug, PartialEq, Eq)]
pub struct FormField<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// Split an `application/x-www-form-urlencoded` body into raw fields.
/// Nothing is decoded here; accessors decode on demand.
pub fn parse_form_fields(body: &[u8]) -> Vec<FormField<'_>> {
    let mut fields = Vec::new();

    for token in body.split(|&b| b == b'&') {
        if token.is_empty() {
            continue;
        }

        match token.iter().position(|&b| b == b'=') {
            Some(eq) => fields.push(FormField {
                name: &token[..eq],
                value: &token[eq + 1..],
            }),
            None => fields.push(FormField { name: token, value: b"" }),
        }
    }

    fields
}
