//! The per-chamber environment log: one JSON object per line, one file per chamber.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as Json};

use crate::record::Outcome;

/// Lighting levels are logged on a 0-100 scale, the controller reports them on 0-10000.
const LIGHTING_DIVISOR: f64 = 100.0;
const LIGHTING_CHANNELS: std::ops::RangeInclusive<u8> = 1..=7;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the log file at {1:?}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("could not write to the log file at {1:?}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("could not serialize a log entry")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Level {
    Info,
    Error,
}

pub struct EnvironmentLog {
    path: PathBuf,
    file: std::fs::File,
}

impl EnvironmentLog {
    pub fn path_for(directory: &Path, chamber_id: u32) -> PathBuf {
        directory.join(format!("chamber_{chamber_id}_environment.log"))
    }

    pub fn open(directory: &Path, chamber_id: u32) -> Result<Self, Error> {
        let path = Self::path_for(directory, chamber_id);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Open(e, path.clone()))?;
        Ok(Self { path, file })
    }

    /// Append the outcome of polling `chamber_id`, stamped with the current local time.
    pub fn append(&mut self, chamber_id: u32, outcome: &Outcome) -> Result<Level, Error> {
        let timestamp = timestamp(&jiff::Zoned::now());
        let (level, entry) = entry(chamber_id, outcome, &timestamp)?;
        let mut line = serde_json::to_vec(&entry).map_err(Error::Serialize)?;
        line.push(b'\n');
        self.file.write_all(&line).map_err(|e| Error::Write(e, self.path.clone()))?;
        Ok(level)
    }
}

/// `2024-05-01T13:07:59.123456Z`. The time is local, the `Z` is kept for compatibility with
/// existing log consumers.
pub fn timestamp(now: &jiff::Zoned) -> String {
    format!("{}.{:06}Z", now.strftime("%Y-%m-%dT%H:%M:%S"), now.subsec_nanosecond() / 1000)
}

/// Build a log entry: timestamp, level and the record, without the `env_var`/`env_val`
/// bookkeeping and with lighting levels rescaled to 0-100.
pub fn entry(
    chamber_id: u32,
    outcome: &Outcome,
    timestamp: &str,
) -> Result<(Level, Map<String, Json>), Error> {
    let level = match outcome {
        Outcome::Reply(_) => Level::Info,
        Outcome::ConnectionError => Level::Error,
    };
    let mut entry = Map::new();
    entry.insert("timestamp".into(), Json::from(timestamp));
    entry.insert("level".into(), Json::from(<&str>::from(level)));
    if let Json::Object(fields) = serde_json::to_value(outcome).map_err(Error::Serialize)? {
        entry.extend(fields);
    }
    if outcome.is_connection_error() {
        entry.insert("chamber_id".into(), Json::from(chamber_id));
    }
    entry.remove("env_var");
    entry.remove("env_val");
    for channel in LIGHTING_CHANNELS {
        let key = format!("lighting_{channel}");
        if let Some(raw) = entry.get(&key).and_then(Json::as_f64) {
            entry.insert(key, Json::from(raw / LIGHTING_DIVISOR));
        }
    }
    Ok((level, entry))
}
