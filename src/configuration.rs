use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
    color::Color,
    error::{ContextError, ErrorKind},
    recorder::PenSettings,
};

/// The settings of the grading tool, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraderConfiguration {
    /// Where the uploaded documents and the records are kept.
    pub storage_directory: PathBuf,
    /// Who the reviews are stamped with.
    #[serde(default = "default_reviewer")]
    pub reviewer: String,
    #[serde(default)]
    pub pen_color: Color,
    #[serde(default = "default_pen_width")]
    pub pen_width: f32,
    /// The `env_logger` filter used unless `RUST_LOG` says otherwise.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_reviewer() -> String {
    "grader".to_string()
}

fn default_pen_width() -> f32 {
    2.0
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for GraderConfiguration {
    fn default() -> Self {
        GraderConfiguration {
            storage_directory: PathBuf::from("grading-storage"),
            reviewer: default_reviewer(),
            pen_color: Color::default(),
            pen_width: default_pen_width(),
            log_filter: default_log_filter(),
        }
    }
}

impl GraderConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents =
            std::fs::read_to_string(configuration_file_path).map_err(|error| {
                ContextError::with_error(
                    ErrorKind::Configuration,
                    format!("Failed to read the configuration file {:?}", configuration_file_path),
                    &error,
                )
            })?;
        Self::from_json(&configuration_file_contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ContextError> {
        let configuration: GraderConfiguration = serde_json::from_str(json).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Configuration,
                "Failed to parse the configuration file",
                &error,
            )
        })?;

        if !(configuration.pen_width.is_finite() && configuration.pen_width > 0.0) {
            return Err(ContextError::with_context(
                ErrorKind::Configuration,
                format!("The pen width must be positive, not {}", configuration.pen_width),
            ));
        }

        Ok(configuration)
    }

    pub fn pen(&self) -> PenSettings {
        PenSettings {
            color: self.pen_color,
            width: self.pen_width,
        }
    }
}
