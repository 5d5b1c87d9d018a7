//! Flat key-value configuration files: one `key value` pair per line,
//! `#` starts a comment. The recognized keys each map onto one server
//! setter; unrecognized keys are configuration mistakes and rejected.

use crate::error::{AppError, Error, Result};

const KNOWN_KEYS: &[&str] = &[
    "workers",
    "queuesize",
    "block_when_full",
    "timeout_read",
    "timeout_write",
    "retries_read",
    "retries_write",
    "logrotate",
    "username",
    "rootdir",
    "documentroot",
    "port",
    "hostname",
    "logfile",
];

/// Identity settings that belong to the process supervisor, not the
/// server: dropping privileges and chroot'ing are only meaningful when
/// running as root and are the supervisor's job.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessSettings {
    pub username: Option<String>,
    pub rootdir: Option<String>,
}

/// A parsed configuration file.
#[derive(Debug, Default)]
pub struct ConfigFile {
    entries: Vec<(String, String)>,
}

impl ConfigFile {
    pub fn read(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(Error::Os)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for line in text.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or("");
            let value = parts.next().unwrap_or("").trim();

            if !KNOWN_KEYS.contains(&key) {
                return Err(Error::App(AppError::Invalid));
            }

            entries.push((key.to_string(), value.to_string()));
        }

        Ok(ConfigFile { entries })
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_uint(&self, key: &str) -> Result<Option<u64>> {
        match self.get_string(key) {
            None => Ok(None),
            Some(v) => v.parse().map(Some).map_err(|_| Error::App(AppError::Invalid)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get_uint(key)?.map(|v| v != 0))
    }

    /// The keys that are the supervisor's business.
    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings {
            username: self.get_string("username").map(str::to_string),
            rootdir: self.get_string("rootdir").map(str::to_string),
        }
    }
}
