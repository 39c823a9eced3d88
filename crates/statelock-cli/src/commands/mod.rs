pub mod memory;
pub mod session;
pub mod stats;

pub use memory::MemoryCommand;
pub use session::SessionCommand;
pub use stats::{StatsCommand, TagsCommand};
