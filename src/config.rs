use std::path::{Path, PathBuf};

pub const DEFAULT_CHAMBER_IDS: [u32; 7] = [1, 2, 3, 4, 6, 7, 8];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the configuration file at {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("could not parse the configuration file at {1:?}")]
    Parse(#[source] serde_yaml::Error, PathBuf),
}

/// Settings of the environment logger.
///
/// ```yaml
/// chamber_ids: [1, 2, 3]
/// log_directory: /var/log/chambers
/// ```
#[derive(serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    pub chamber_ids: Vec<u32>,
    pub log_directory: PathBuf,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { chamber_ids: DEFAULT_CHAMBER_IDS.to_vec(), log_directory: PathBuf::from(".") }
    }
}

impl LoggerConfig {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::Read(e, path.to_path_buf()))?;
        Self::from_yaml(&contents).map_err(|e| Error::Parse(e, path.to_path_buf()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = LoggerConfig::from_yaml("log_directory: /tmp/chambers\n").unwrap();
        assert_eq!(config.chamber_ids, DEFAULT_CHAMBER_IDS);
        assert_eq!(config.log_directory, PathBuf::from("/tmp/chambers"));
    }

    #[test]
    fn chamber_ids_are_read() {
        let config = LoggerConfig::from_yaml("chamber_ids: [5, 9]").unwrap();
        assert_eq!(config.chamber_ids, [5, 9]);
        assert_eq!(config.log_directory, PathBuf::from("."));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = Path::new("/nonexistent/growth-chamber.yaml");
        assert!(matches!(LoggerConfig::from_file(path), Err(Error::Read(_, _))));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(LoggerConfig::from_yaml("chamber_ids: one").is_err());
    }
}
