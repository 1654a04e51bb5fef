// Error type shared by every part of the library.
// Configuration problems and unknown team names are fatal and surface before any search starts.
// Inconsistent candidate scenarios are not errors; the enumerator just counts them as rejected.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BracketError {
    #[error("team count {0} must be a power of two between 2 and 64")]
    InvalidTeamCount(usize),

    #[error("duplicate team name '{0}'")]
    DuplicateTeam(String),

    #[error("expected {expected} point values (one per round), found {found}")]
    PointCountMismatch { expected: usize, found: usize },

    #[error("point values are too large: a perfect bracket's score doesn't fit in 32 bits")]
    PointsOverflow,

    #[error("invalid point value '{value}' on line {line}")]
    InvalidPointValue { line: usize, value: String },

    #[error("couldn't find team '{0}'")]
    UnknownTeam(String),

    #[error("{found} winners listed but the tournament only has {expected} games")]
    TooManyWinners { expected: usize, found: usize },

    #[error("bracket picks {found} winners but the tournament has {expected} games")]
    IncompleteBracket { expected: usize, found: usize },

    #[error("team '{team}' is listed {wins} times but the tournament only has {rounds} rounds")]
    TooManyWins { team: String, wins: usize, rounds: usize },

    #[error("team '{0}' conflicts with another listed winner")]
    ConflictingWinners(String),

    #[error("no rating for team still alive: '{0}'")]
    MissingRating(String),

    #[error("invalid rating for team '{team}': {value}")]
    InvalidRating { team: String, value: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BracketError {
    /// Unknown names are the only failures the winner encoder can be told to tolerate.
    pub fn is_unknown_team(&self) -> bool {
        matches!(self, BracketError::UnknownTeam(_))
    }
}

pub type Result<T> = std::result::Result<T, BracketError>;
