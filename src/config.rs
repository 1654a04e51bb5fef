// Configuration for ncaa-odds
// YAML file with input locations, search settings and output settings. Every field has a default,
// and command line flags override whatever the file says.

use crate::error::Result;
use crate::enumerator::SearchOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATHS: [&str; 3] = ["ncaa-odds.yaml", "ncaa-odds.yml", ".ncaa-odds.yaml"];

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inputs: InputSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// The first of the default config file names present in `dir`.
    pub fn find_in<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
        DEFAULT_PATHS
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|path| path.is_file())
    }

    /// Search options from the config, without a cancel token or progress bar attached.
    pub fn to_search_options(&self) -> SearchOptions {
        SearchOptions {
            ties_count_as_wins: self.search.ties_count_as_wins,
            threads: self.search.threads,
            progress_interval: self.search.progress_interval,
            cancel_check_interval: self.search.cancel_check_interval,
            cancel: None,
            progress: None,
        }
    }
}

/// Where the pool's files live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Team names in bracket order
    #[serde(default = "default_teams")]
    pub teams: PathBuf,

    /// Points per correct pick, one line per round
    #[serde(default = "default_points")]
    pub points: PathBuf,

    /// Winner of each game played so far
    #[serde(default = "default_results")]
    pub results: PathBuf,

    /// team,rating csv; when missing, ratings.csv is used if it exists
    #[serde(default)]
    pub ratings: Option<PathBuf>,

    /// Directory of rival brackets; defaults to the directory the target bracket is named in
    #[serde(default)]
    pub rivals: Option<PathBuf>,
}

impl Default for InputSettings {
    fn default() -> Self {
        InputSettings {
            teams: default_teams(),
            points: default_points(),
            results: default_results(),
            ratings: None,
            rivals: None,
        }
    }
}

fn default_teams() -> PathBuf {
    PathBuf::from("teams.txt")
}

fn default_points() -> PathBuf {
    PathBuf::from("points.txt")
}

fn default_results() -> PathBuf {
    PathBuf::from("results.txt")
}

/// Scenario search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Worker threads (0 = one per CPU)
    #[serde(default)]
    pub threads: usize,

    /// Candidates between progress updates
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Candidates between cancellation checks
    #[serde(default = "default_cancel_check_interval")]
    pub cancel_check_interval: u64,

    /// Count a tie with the best rival as a win
    #[serde(default)]
    pub ties_count_as_wins: bool,

    /// Stop the search after this many seconds and report what was checked
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            threads: 0,
            progress_interval: default_progress_interval(),
            cancel_check_interval: default_cancel_check_interval(),
            ties_count_as_wins: false,
            time_limit_secs: None,
        }
    }
}

fn default_progress_interval() -> u64 {
    10_000_000
}

fn default_cancel_check_interval() -> u64 {
    1 << 20
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Print the report as JSON instead of text
    #[serde(default)]
    pub json: bool,

    /// One of error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            json: false,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    r#"# ncaa-odds configuration
# All values shown are defaults - uncomment and modify as needed

# Input files
inputs:
  # Team names, one per line, in bracket order (teams 1 and 2 meet in the first game)
  teams: teams.txt
  # Points for a correct pick, one line per round
  points: points.txt
  # Winner of each game in game order; leave a line blank for a game not played yet
  results: results.txt
  # Optional team,rating csv used to weight scenarios by likelihood
  # ratings: ratings.csv
  # Directory of the other brackets in the pool (default: the directory in the bracket path)
  # rivals: brackets/

# Scenario search
search:
  # Worker threads (0 = one per CPU)
  threads: 0
  # Candidates between progress bar updates
  progress_interval: 10000000
  # Candidates between checks for a time limit
  cancel_check_interval: 1048576
  # Count finishing tied with the best rival as a win
  ties_count_as_wins: false
  # Stop after this many seconds and report partial results
  # time_limit_secs: 600

# Output
output:
  # Print the report as JSON
  json: false
  # error, warn, info, debug or trace
  log_level: info
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.inputs.teams, PathBuf::from("teams.txt"));
        assert_eq!(config.search.threads, 0);
        assert_eq!(config.search.progress_interval, 10_000_000);
        assert!(!config.search.ties_count_as_wins);
        assert_eq!(config.output.log_level, "info");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
inputs:
  results: live/results.txt
  ratings: ratings.csv
search:
  threads: 4
  ties_count_as_wins: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.inputs.results, PathBuf::from("live/results.txt"));
        assert_eq!(config.inputs.ratings, Some(PathBuf::from("ratings.csv")));
        assert_eq!(config.search.threads, 4);
        assert!(config.search.ties_count_as_wins);
        // Defaults should still work
        assert_eq!(config.inputs.teams, PathBuf::from("teams.txt"));
        assert_eq!(config.search.cancel_check_interval, 1 << 20);
        assert!(!config.output.json);
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config: Config = serde_yaml::from_str(&generate_sample_config()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_find_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::find_in(dir.path()), None);

        fs::write(dir.path().join("ncaa-odds.yml"), "search:\n  threads: 3\n").unwrap();
        let found = Config::find_in(dir.path()).unwrap();
        assert_eq!(Config::from_file(&found).unwrap().search.threads, 3);

        // the .yaml name wins over .yml
        fs::write(dir.path().join("ncaa-odds.yaml"), "output:\n  json: true\n").unwrap();
        assert_eq!(Config::find_in(dir.path()), Some(dir.path().join("ncaa-odds.yaml")));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ncaa-odds.yaml"), "search:\n  threads: [oops\n").unwrap();
        let found = Config::find_in(dir.path()).unwrap();
        let err = Config::from_file(found).unwrap_err();
        assert!(matches!(err, crate::error::BracketError::Yaml(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, crate::error::BracketError::Io(_)));
    }

    #[test]
    fn test_search_options() {
        let mut config = Config::default();
        config.search.threads = 2;
        let options = config.to_search_options();
        assert_eq!(options.threads, 2);
        assert!(options.cancel.is_none());
    }
}
