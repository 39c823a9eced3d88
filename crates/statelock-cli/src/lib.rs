pub mod commands;
pub mod context;
pub mod error;
pub mod output;

pub use commands::{MemoryCommand, SessionCommand, StatsCommand, TagsCommand};
pub use context::CliContext;
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_timestamp, truncate_string};
