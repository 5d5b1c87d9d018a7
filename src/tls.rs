//! TLS server contexts built from PEM files. Contexts are TLS 1.3 only
//! and optionally verify client certificates against a CA directory.

use rustls::internal::pemfile;
use std::fs;
use std::io::BufReader;
use std::sync::Arc;

pub fn load_certs(filename: &str) -> Result<Vec<rustls::Certificate>, LoadCertificateError> {
    let cert_file = fs::File::open(filename)?;
    let mut reader = BufReader::new(cert_file);
    let certs = pemfile::certs(&mut reader).map_err(|_| LoadCertificateError::CannotExtractCertificates)?;

    if certs.is_empty() {
        return Err(LoadCertificateError::CannotExtractCertificates);
    }

    Ok(certs)
}

pub fn load_private_key(filename: &str) -> Result<rustls::PrivateKey, LoadPrivateKeyError> {
    // Prefer pkcs8 keys, fall back to RSA.
    let pkcs8_keys = {
        let key_file = fs::File::open(filename)?;
        let mut reader = BufReader::new(key_file);
        pemfile::pkcs8_private_keys(&mut reader).map_err(|_| LoadPrivateKeyError::MalformedKeyFile)?
    };

    if let Some(key) = pkcs8_keys.first() {
        return Ok(key.clone());
    }

    let rsa_keys = {
        let key_file = fs::File::open(filename)?;
        let mut reader = BufReader::new(key_file);
        pemfile::rsa_private_keys(&mut reader).map_err(|_| LoadPrivateKeyError::MalformedKeyFile)?
    };

    match rsa_keys.first() {
        Some(key) => Ok(key.clone()),
        None => Err(LoadPrivateKeyError::NoKeysFound),
    }
}

/// Where the server certificate, key and optional peer-verification
/// material live on disk.
#[derive(Debug, Default, Clone)]
pub struct TlsSettings {
    pub certificate_file: String,
    pub private_key_file: String,
    /// Overrides `certificate_file` when the deployment chains certs.
    pub certificate_chain_file: Option<String>,
    /// Directory of CA certificates for client verification.
    pub ca_directory: Option<String>,
}

/// Build a TLS 1.3-only server configuration.
pub fn server_config(settings: &TlsSettings) -> Result<Arc<rustls::ServerConfig>, TlsConfigError> {
    let verifier = match &settings.ca_directory {
        Some(dir) => {
            let mut roots = rustls::RootCertStore::empty();
            let entries = fs::read_dir(dir).map_err(TlsConfigError::CannotReadCaDirectory)?;
            for entry in entries {
                let entry = entry.map_err(TlsConfigError::CannotReadCaDirectory)?;
                let file = fs::File::open(entry.path()).map_err(TlsConfigError::CannotReadCaDirectory)?;
                let mut reader = BufReader::new(file);
                roots
                    .add_pem_file(&mut reader)
                    .map_err(|_| TlsConfigError::MalformedCaCertificate)?;
            }
            rustls::AllowAnyAnonymousOrAuthenticatedClient::new(roots)
        }
        None => rustls::NoClientAuth::new(),
    };

    let mut config = rustls::ServerConfig::new(verifier);
    config.versions = vec![rustls::ProtocolVersion::TLSv1_3];

    let cert_file = settings
        .certificate_chain_file
        .as_deref()
        .unwrap_or(&settings.certificate_file);
    let certs = load_certs(cert_file)?;
    let key = load_private_key(&settings.private_key_file)?;

    config
        .set_single_cert(certs, key)
        .map_err(|_| TlsConfigError::BadCertKeyPair)?;

    Ok(Arc::new(config))
}

#[derive(Debug)]
pub enum LoadCertificateError {
    CannotOpenFile(std::io::Error),
    CannotExtractCertificates,
}

impl From<std::io::Error> for LoadCertificateError {
    fn from(err: std::io::Error) -> Self {
        LoadCertificateError::CannotOpenFile(err)
    }
}

impl std::fmt::Display for LoadCertificateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadCertificateError::CannotOpenFile(err) => write!(f, "cannot open certificate file: {}", err),
            LoadCertificateError::CannotExtractCertificates => write!(f, "no certificates in file"),
        }
    }
}

impl std::error::Error for LoadCertificateError {}

#[derive(Debug)]
pub enum LoadPrivateKeyError {
    CannotOpenFile(std::io::Error),
    MalformedKeyFile,
    NoKeysFound,
}

impl From<std::io::Error> for LoadPrivateKeyError {
    fn from(err: std::io::Error) -> Self {
        LoadPrivateKeyError::CannotOpenFile(err)
    }
}

impl std::fmt::Display for LoadPrivateKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadPrivateKeyError::CannotOpenFile(err) => write!(f, "cannot open key file: {}", err),
            LoadPrivateKeyError::MalformedKeyFile => write!(f, "malformed key file"),
            LoadPrivateKeyError::NoKeysFound => write!(f, "no private keys in file"),
        }
    }
}

impl std::error::Error for LoadPrivateKeyError {}

#[derive(Debug)]
pub enum TlsConfigError {
    Certificate(LoadCertificateError),
    PrivateKey(LoadPrivateKeyError),
    CannotReadCaDirectory(std::io::Error),
    MalformedCaCertificate,
    BadCertKeyPair,
}

impl From<LoadCertificateError> for TlsConfigError {
    fn from(err: LoadCertificateError) -> Self {
        TlsConfigError::Certificate(err)
    }
}

impl From<LoadPrivateKeyError> for TlsConfigError {
    fn from(err: LoadPrivateKeyError) -> Self {
        TlsConfigError::PrivateKey(err)
    }
}

impl std::fmt::Display for TlsConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsConfigError::Certificate(err) => write!(f, "{}", err),
            TlsConfigError::PrivateKey(err) => write!(f, "{}", err),
            TlsConfigError::CannotReadCaDirectory(err) => write!(f, "cannot read CA directory: {}", err),
            TlsConfigError::MalformedCaCertificate => write!(f, "malformed CA certificate"),
            TlsConfigError::BadCertKeyPair => write!(f, "certificate and key do not match"),
        }
    }
}

impl std::error::Error for TlsConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_certificate_file() {
        match load_certs("/definitely/not/there.pem") {
            Err(LoadCertificateError::CannotOpenFile(_)) => {}
            other => panic!("expected open error, got {:?}", other.err()),
        }
    }

    #[test]
    fn empty_pem_has_no_certificates() {
        let path = std::env::temp_dir().join("longhouse-tls-empty.pem");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"not pem at all\n").unwrap();

        match load_certs(path.to_str().unwrap()) {
            Err(LoadCertificateError::CannotExtractCertificates) => {}
            other => panic!("expected extract error, got {:?}", other.err()),
        }
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn key_file_without_keys() {
        let path = std::env::temp_dir().join("longhouse-tls-nokey.pem");
        fs::write(&path, b"").unwrap();

        match load_private_key(path.to_str().unwrap()) {
            Err(LoadPrivateKeyError::NoKeysFound) => {}
            other => panic!("expected no-keys error, got {:?}", other.err()),
        }
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn server_config_reports_certificate_trouble() {
        let settings = TlsSettings {
            certificate_file: "/definitely/not/there.pem".to_string(),
            private_key_file: "/also/not/there.pem".to_string(),
            certificate_chain_file: None,
            ca_directory: None,
        };

        match server_config(&settings) {
            Err(TlsConfigError::Certificate(_)) => {}
            other => panic!("expected certificate error, got {:?}", other.err()),
        }
    }
}
