pub mod matcher;
pub mod ranking;
pub mod types;

pub use matcher::DriverMatcher;
pub use ranking::{CandidateRanking, NearestDriverRanking};
pub use types::{MatchCandidate, NoMatchReason};
