use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use std::fs;
use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::export::*;

pub const DEFAULT_OUTPUT_DIRECTORY: &str = "/tmp/evacs_export/confirmed_votes";
pub const DEFAULT_GROUPS_FILE: &str = "Groups.csv";
pub const DEFAULT_CANDIDATES_FILE: &str = "Candidates.csv";
pub const DEFAULT_PAPER_VERSIONS_FILE: &str = "Confirmed_Paper_Versions.csv";

/// The JSON configuration file. Every entry is optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(rename = "databasePath")]
    pub database_path: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "maxSeatCount")]
    pub max_seat_count: Option<u32>,
    #[serde(rename = "groupsFile")]
    pub groups_file: Option<String>,
    #[serde(rename = "candidatesFile")]
    pub candidates_file: Option<String>,
    #[serde(rename = "paperVersionsFile")]
    pub paper_versions_file: Option<String>,
    // Set to the directory of the file when read from disk.
    #[serde(skip)]
    pub root_directory: Option<PathBuf>,
}

/// The resolved settings of a run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportSettings {
    pub database_path: String,
    pub output_directory: PathBuf,
    pub max_seat_count: u32,
    pub groups_file: String,
    pub candidates_file: String,
    pub paper_versions_file: String,
    pub reference_directory: Option<PathBuf>,
}

pub fn read_config(path: &str) -> ExportResult<ExportConfig> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    let mut config: ExportConfig =
        serde_json::from_str(&contents).context(ParsingConfigSnafu { path })?;
    config.root_directory = Path::new(path).parent().map(|p| p.to_path_buf());
    debug!("read_config: {:?}", config);
    Ok(config)
}

// Paths in the configuration file are relative to the file itself.
fn resolve_path(config: &ExportConfig, path: &str) -> PathBuf {
    match config.root_directory.as_ref() {
        Some(root) => root.join(path),
        None => PathBuf::from(path),
    }
}

/// Merges the configuration file and the command line. The command line
/// takes precedence.
pub fn resolve_settings(config: Option<&ExportConfig>, args: &Args) -> ExportResult<ExportSettings> {
    let default_config = ExportConfig::default();
    let config = config.unwrap_or(&default_config);

    let database_path = match (args.database.as_ref(), config.database_path.as_ref()) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(config, p).display().to_string(),
        (None, None) => return MissingDatabaseSnafu {}.fail(),
    };

    let output_directory = match (args.out.as_ref(), config.output_directory.as_ref()) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => resolve_path(config, p),
        (None, None) => PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
    };

    let max_seat_count = config
        .max_seat_count
        .unwrap_or(ballot_rotation::builder::DEFAULT_MAX_SEAT_COUNT);
    ensure!(
        max_seat_count > 0 && max_seat_count <= ballot_rotation::preferences::MAX_VALUE,
        InvalidMaxSeatCountSnafu {
            value: max_seat_count
        }
    );

    Ok(ExportSettings {
        database_path,
        output_directory,
        max_seat_count,
        groups_file: config
            .groups_file
            .clone()
            .unwrap_or_else(|| DEFAULT_GROUPS_FILE.to_string()),
        candidates_file: config
            .candidates_file
            .clone()
            .unwrap_or_else(|| DEFAULT_CANDIDATES_FILE.to_string()),
        paper_versions_file: config
            .paper_versions_file
            .clone()
            .unwrap_or_else(|| DEFAULT_PAPER_VERSIONS_FILE.to_string()),
        reference_directory: args.reference.as_ref().map(PathBuf::from),
    })
}
