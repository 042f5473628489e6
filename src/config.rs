use crate::error::MarkingError;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/**
 * Settings of a marking deployment, read from a json file.
 *
 * Every key is optional, missing keys keep their default.
 */
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkingConfig {
    pub database_url: String,
    pub create_if_missing: bool,
    pub max_connections: u32,
    /// seconds a session stays valid without being used
    pub session_timeout_secs: i64,
}

impl Default for MarkingConfig {
    fn default() -> Self {
        MarkingConfig {
            database_url: "sqlite://marking.db".to_string(),
            create_if_missing: true,
            max_connections: 5,
            session_timeout_secs: 36000,
        }
    }
}

impl MarkingConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<MarkingConfig, MarkingError> {
        let path = path.as_ref();
        let reader = match File::open(path) {
            Ok(f) => std::io::BufReader::new(f),
            Err(e) => {
                return Err(MarkingError::not_found(format!(
                    "Couldnt open config file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match serde_json::from_reader(reader) {
            Ok(c) => Ok(c),
            Err(e) => Err(MarkingError::validation(format!(
                "Couldnt read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
