pub mod clock;
pub mod engine;
pub mod identity;
pub mod insights;
pub mod ranking;
pub mod snapshot;
pub mod tags;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use engine::{EngineConfig, MemoryEngine};
pub use ranking::RankingWeights;
pub use tags::StoredTags;
pub use types::{
    DEFAULT_SESSION_ID, HybridMemoryQuery, MemoryQuery, MemoryRecord, MemoryUpsert, NewMemory,
    Page, RankedMemory, RestoreItem, RestoreMode, SessionSnapshot, SessionSummary, StatsOverview,
    TagSummary, UNNAMED_BLOCK,
};
