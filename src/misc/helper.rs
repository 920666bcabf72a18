// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use std::{fs::File, io::BufReader, path::Path};

use serde::de::DeserializeOwned;

use crate::core::track::ConfigError;

/// Read a JSON configuration file.
///
/// Any of the configuration structs of this crate can be loaded this way.
pub fn read_json<T, P>(file_path: P) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(file_path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::{egomotion, stereo};
    use std::io::Write;

    #[test]
    fn read_stereo_config() {
        let path = std::env::temp_dir().join(format!("egoflow-stereo-{}.json", std::process::id()));
        let mut file = File::create(&path).expect("temp file");
        write!(file, r#"{{ "window_width": 15, "max_level": 2 }}"#).expect("write");
        drop(file);
        let config: stereo::Config = read_json(&path).expect("valid configuration");
        std::fs::remove_file(&path).expect("cleanup");
        assert_eq!(15, config.window_width);
        assert_eq!(21, config.window_height);
        assert_eq!(2, config.max_level);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result: Result<egomotion::Config, _> = read_json("/nonexistent/egoflow.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn config_survives_json() {
        let config = egomotion::Config {
            convergence_threshold: 1e-10,
            max_iterations: 12,
        };
        let json = serde_json::to_string(&config).expect("serializable");
        let back: egomotion::Config = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(config, back);
    }
}
