//! Serving files from the document root when no dynamic page matches.
//!
//! A few rules: the URI must not climb out of the tree, the document
//! root must be sane, and directories fall back to their `index.html`.

use crate::error::{Error, Result};
use crate::mime::mime_type_for_path;
use crate::page::PageAttributes;
use crate::request::Request;
use crate::response::Response;

fn docroot_is_valid(docroot: &str) -> bool {
    if docroot.is_empty() {
        return false;
    }
    if docroot.len() == 1 && docroot != "/" {
        return false;
    }
    if docroot.len() == 2 && docroot != "./" {
        return false;
    }
    if docroot.contains("..") {
        return false;
    }
    true
}

/// Resolve the request URI under `docroot` and stage the file as the
/// response body. The caller decides beforehand that no dynamic page
/// claimed the URI.
pub fn send_disk_file(
    docroot: &str,
    request: &Request,
    response: &mut Response,
    default_attributes: Option<&PageAttributes>,
) -> Result<()> {
    let uri = request.uri();
    if uri.is_empty() || uri.contains("..") {
        return Err(Error::Http(400));
    }

    if !docroot_is_valid(docroot) {
        return Err(Error::Http(400));
    }

    let mut filename = format!("{}/{}", docroot, uri);

    let mut meta = match std::fs::metadata(&filename) {
        Ok(meta) => meta,
        Err(_) => return Err(Error::Http(404)),
    };

    if meta.is_dir() {
        filename.push_str("/index.html");
        meta = match std::fs::metadata(&filename) {
            Ok(meta) => meta,
            Err(_) => return Err(Error::Http(404)),
        };
    }

    if !meta.is_file() {
        return Err(Error::Http(400));
    }

    // Page attributes apply to disk files too.
    if let Some(attributes) = default_attributes {
        if !attributes.accepted_by(request) {
            response.set_status(406);
            return Err(Error::Http(406));
        }
    }

    let content_type = mime_type_for_path(&filename);
    response.send_file(&filename, content_type)?;
    response.set_status(200);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn request_for(uri: &str) -> Request {
        let mut r = Request::new();
        r.set_uri(uri);
        r
    }

    #[test]
    fn docroot_rules() {
        assert!(docroot_is_valid("/"));
        assert!(docroot_is_valid("./"));
        assert!(docroot_is_valid("./www"));
        assert!(docroot_is_valid("/srv/www"));
        assert!(!docroot_is_valid(""));
        assert!(!docroot_is_valid("."));
        assert!(!docroot_is_valid(".."));
        assert!(!docroot_is_valid("/srv/../etc"));
    }

    #[test]
    fn dotdot_in_uri_is_rejected() {
        let request = request_for("/../etc/passwd");
        let mut response = Response::new();
        match send_disk_file("./www", &request, &mut response, None) {
            Err(Error::Http(400)) => {}
            other => panic!("expected 400, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_file_is_404() {
        let dir = std::env::temp_dir().join("longhouse-static-404");
        let _ = fs::create_dir_all(&dir);
        let docroot = dir.to_str().unwrap();

        let request = request_for("/definitely-not-there.txt");
        let mut response = Response::new();
        match send_disk_file(docroot, &request, &mut response, None) {
            Err(Error::Http(404)) => {}
            other => panic!("expected 404, got {:?}", other.err()),
        }
    }

    #[test]
    fn regular_file_is_staged_with_mime_type() {
        let dir = std::env::temp_dir().join("longhouse-static-ok");
        let _ = fs::create_dir_all(&dir);
        fs::write(dir.join("a.txt"), b"hi").unwrap();
        let docroot = dir.to_str().unwrap();

        let request = request_for("/a.txt");
        let mut response = Response::new();
        send_disk_file(docroot, &request, &mut response, None).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.entity.content_type(), Some("text/plain"));
        assert_eq!(response.content_length(), 2);
    }

    #[test]
    fn directory_serves_its_index() {
        let dir = std::env::temp_dir().join("longhouse-static-idx");
        let _ = fs::create_dir_all(&dir);
        fs::write(dir.join("index.html"), b"root").unwrap();
        let docroot = dir.to_str().unwrap();

        let request = request_for("/");
        let mut response = Response::new();
        send_disk_file(docroot, &request, &mut response, None).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.entity.content_type(), Some("text/html"));
        assert_eq!(response.content_length(), 4);
    }
}
