//! Product matching: normalization, hybrid scoring, and match lifecycle

pub mod engine;
pub mod lifecycle;
pub mod normalizer;
pub mod scorer;
pub mod similarity;

pub use engine::{MatchEngine, RescanOutcome};
pub use lifecycle::{MatchError, MatchLifecycle};
pub use scorer::{BlacklistLookup, MatchScorer, ScoreBreakdown};
pub use similarity::{LexicalSimilarity, TitleSimilarity};
