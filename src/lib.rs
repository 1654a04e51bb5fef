pub mod bracket;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod ingest;
pub mod probability;
pub mod report;
pub mod teams;
pub mod topology;
pub mod tournament;

pub use bracket::Bracket;
pub use enumerator::{CancelToken, Enumerator, ScenarioStats, SearchOptions, SearchSpace};
pub use error::{BracketError, Result};
pub use probability::ProbabilityModel;
pub use report::{Report, Signal, SignalKind};
pub use teams::{MatchMode, TeamList};
pub use topology::Topology;
pub use tournament::Tournament;
