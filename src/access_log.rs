//! Common-logfile-format access log with threshold-based rotation.
//!
//! One line per served request:
//! `IP - - [dd/Mon/yyyy:HH:MM:SS +zzzz] "METHOD URI" STATUS BYTES`
//!
//! The file opens lazily on first write. After `logrotate` entries the
//! current file is renamed with a timestamp suffix and a fresh one is
//! opened. Any failure disables logging for the rest of the process
//! lifetime rather than jeopardizing request serving.

use chrono::Local;
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Mutex;

#[derive(Default)]
struct LogState {
    name: String,
    file: Option<File>,
    entries: u32,
    rotate: u32,
    enabled: bool,
}

/// Thread-safe access log owned by an HTTP server.
#[derive(Default)]
pub struct AccessLog {
    state: Mutex<LogState>,
}

impl AccessLog {
    pub fn new() -> Self {
        AccessLog::default()
    }

    /// Name the logfile and enable logging. The file itself is opened on
    /// the first entry.
    pub fn set_logfile(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.name = name.to_string();
            state.enabled = true;
        }
    }

    /// Rotate after this many entries; 0 disables rotation.
    pub fn set_rotate(&self, rotate: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.rotate = rotate;
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self.state.lock() {
            Ok(state) => state.enabled,
            Err(_) => false,
        }
    }

    /// Append one entry. Never fails; on trouble it warns and disables
    /// itself.
    pub fn add_entry(&self, peer: Option<SocketAddr>, method: &str, uri: &str, status: u16, bytes_sent: u64) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => return,
        };

        if !state.enabled {
            return;
        }

        if state.file.is_none() {
            match File::create(&state.name) {
                Ok(file) => state.file = Some(file),
                Err(err) => {
                    state.enabled = false;
                    warn!("unable to open logfile {}: {}", state.name, err);
                    return;
                }
            }
        }

        if !rotate_if_needed(&mut state) {
            state.enabled = false;
            warn!("unable to rotate logfile {}", state.name);
            return;
        }

        let ip = match peer {
            Some(addr) => addr.ip().to_string(),
            None => "-".to_string(),
        };
        let timestamp = Local::now().format("%d/%b/%Y:%H:%M:%S %z");
        let line = format!("{} - - [{}] \"{} {}\" {} {}\n", ip, timestamp, method, uri, status, bytes_sent);

        let ok = match &mut state.file {
            Some(file) => file.write_all(line.as_bytes()).and_then(|_| file.flush()).is_ok(),
            None => false,
        };

        if ok {
            state.entries += 1;
        } else {
            state.enabled = false;
            state.file = None;
            warn!("unable to log to logfile {}; disabling logging", state.name);
        }
    }
}

/// Rename the full logfile aside and reopen. Assumes the state lock is held.
fn rotate_if_needed(state: &mut LogState) -> bool {
    if state.rotate == 0 {
        return true;
    }

    if state.entries < state.rotate {
        return true;
    }

    let suffix = Local::now().format(".%Y%m%d%H%M%S");
    let rotated = format!("{}{}", state.name, suffix);

    state.file = None;
    if std::fs::rename(&state.name, &rotated).is_err() {
        return false;
    }

    match OpenOptions::new().append(true).create(true).open(&state.name) {
        Ok(file) => {
            state.file = Some(file);
            state.entries = 0;
            true
        }
        Err(_) => false,
    }
}
