use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Deserialize;
use statelock_server::memory::types::{
    Page, RestoreItem, RestoreMode, SessionSnapshot, SessionSummary,
};

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, format_optional_timestamp, format_timestamp};

#[derive(Parser)]
pub struct SessionCommand {
    #[clap(subcommand)]
    pub command: SessionSubcommand,
}

#[derive(Subcommand)]
pub enum SessionSubcommand {
    #[clap(about = "Export a session to a JSON snapshot file")]
    Export(ExportArgs),

    #[clap(about = "Import a snapshot file into a session")]
    Import(ImportArgs),

    #[clap(about = "Delete every memory in a session")]
    Delete(DeleteArgs),

    #[clap(about = "List sessions, most recently written first")]
    List(ListArgs),
}

#[derive(Parser)]
pub struct ExportArgs {
    #[clap(long, help = "Session to export")]
    pub session_id: String,

    #[clap(long, help = "Output file")]
    pub out: PathBuf,

    #[clap(long, default_value = "1000", help = "Maximum number of memories to export")]
    pub limit: usize,
}

#[derive(Parser)]
pub struct ImportArgs {
    #[clap(long, help = "Session to import into")]
    pub session_id: String,

    #[clap(long = "in", help = "Snapshot file to read")]
    pub input: PathBuf,

    #[clap(long, default_value = "append", help = "Restore mode (append or replace)")]
    pub mode: String,
}

#[derive(Parser)]
pub struct DeleteArgs {
    #[clap(long, help = "Session to delete")]
    pub session_id: String,
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(long, short, default_value = "50", help = "Maximum number of sessions")]
    pub limit: usize,

    #[clap(long, default_value = "0", help = "Number of sessions to skip")]
    pub offset: usize,
}

/// Import files are either a full snapshot or a bare list of items
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Snapshot { memories: Vec<RestoreItem> },
    Items(Vec<RestoreItem>),
}

pub fn parse_import(raw: &str) -> CliResult<Vec<RestoreItem>> {
    let payload: ImportPayload = serde_json::from_str(raw).map_err(CliError::Import)?;
    Ok(match payload {
        ImportPayload::Snapshot { memories } => memories,
        ImportPayload::Items(items) => items,
    })
}

impl SessionCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            SessionSubcommand::Export(args) => {
                let snapshot = Self::export(ctx, args).await?;
                match format {
                    OutputFormat::Json => {
                        let output = serde_json::json!({
                            "session_id": &snapshot.session_id,
                            "total": snapshot.total,
                            "file": args.out.display().to_string(),
                        });
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    }
                    OutputFormat::Table => println!(
                        "Exported {} memories from {} to {} at {}.",
                        snapshot.total,
                        snapshot.session_id,
                        args.out.display(),
                        format_timestamp(&snapshot.exported_at)
                    ),
                }
                Ok(())
            }
            SessionSubcommand::Import(args) => {
                let mode: RestoreMode = args.mode.parse()?;
                let restored = Self::import(ctx, &args.session_id, &args.input, mode).await?;
                match format {
                    OutputFormat::Json => {
                        let output = serde_json::json!({
                            "session_id": &args.session_id,
                            "mode": mode,
                            "restored": restored,
                        });
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    }
                    OutputFormat::Table => println!(
                        "Restored {restored} memories into {} ({}).",
                        args.session_id,
                        mode.as_str()
                    ),
                }
                Ok(())
            }
            SessionSubcommand::Delete(args) => {
                ctx.limits.check_session(&args.session_id)?;
                ctx.engine.delete_session(&args.session_id).await?;
                match format {
                    OutputFormat::Json => {
                        let output = serde_json::json!({
                            "deleted": true,
                            "session_id": &args.session_id,
                        });
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    }
                    OutputFormat::Table => {
                        println!("Deleted all memories in session {}.", args.session_id)
                    }
                }
                Ok(())
            }
            SessionSubcommand::List(args) => {
                if args.limit == 0 {
                    return Err(CliError::usage("--limit must be at least 1"));
                }
                let page = ctx.engine.list_sessions(args.limit, args.offset).await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
                    OutputFormat::Table => print!("{}", render_sessions(&page)),
                }
                Ok(())
            }
        }
    }

    /// Snapshot a session and write it as pretty JSON
    pub async fn export(ctx: &CliContext, args: &ExportArgs) -> CliResult<SessionSnapshot> {
        ctx.limits.check_session(&args.session_id)?;
        ctx.limits.check_snapshot_limit(args.limit)?;

        let snapshot = ctx.engine.snapshot(&args.session_id, args.limit).await?;
        std::fs::write(&args.out, serde_json::to_string_pretty(&snapshot)?).map_err(|source| {
            CliError::WriteOutput {
                path: args.out.clone(),
                source,
            }
        })?;
        Ok(snapshot)
    }

    pub async fn import(
        ctx: &CliContext,
        session_id: &str,
        input: &Path,
        mode: RestoreMode,
    ) -> CliResult<usize> {
        ctx.limits.check_session(session_id)?;

        let raw = std::fs::read_to_string(input).map_err(|source| CliError::ReadInput {
            path: input.to_path_buf(),
            source,
        })?;
        let items = parse_import(&raw)?;
        for item in &items {
            ctx.limits.check_restore_item(item)?;
        }

        Ok(ctx.engine.restore(session_id, mode, items).await?)
    }
}

pub fn render_sessions(page: &Page<SessionSummary>) -> String {
    if page.items.is_empty() {
        return "No sessions found.\n".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Session", "Memories", "Last Updated"]);

    for session in &page.items {
        table.add_row([
            session.session_id.clone(),
            session.memory_count.to_string(),
            format_optional_timestamp(session.last_updated.as_ref()),
        ]);
    }

    format!("{table}\n\nTotal: {} sessions\n", page.total)
}
