use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use statelock_server::memory::types::{MemoryRecord, NewMemory, Page};

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, format_optional_timestamp, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "List memories")]
    List(ListArgs),

    #[clap(about = "Show memory details")]
    Show(ShowArgs),

    #[clap(about = "Manually add a memory")]
    Add(AddArgs),

    #[clap(about = "Delete a memory")]
    Delete(DeleteArgs),
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(long, help = "Only list memories in this session")]
    pub session: Option<String>,

    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of memories to display"
    )]
    pub limit: usize,

    #[clap(long, default_value = "0", help = "Number of memories to skip")]
    pub offset: usize,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Memory ID")]
    pub id: String,
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(help = "Memory content text")]
    pub text: String,

    #[clap(long, default_value = "default", help = "Session to store the memory in")]
    pub session: String,

    #[clap(long, help = "Optional short label")]
    pub name: Option<String>,

    #[clap(long = "tag", help = "Tag to attach (repeatable)")]
    pub tags: Vec<String>,
}

#[derive(Parser)]
pub struct DeleteArgs {
    #[clap(help = "Memory ID to delete")]
    pub id: String,
}

impl MemoryCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::List(args) => Self::list(ctx, args, format).await,
            MemorySubcommand::Show(args) => Self::show(ctx, args, format).await,
            MemorySubcommand::Add(args) => Self::add(ctx, args, format).await.map(|_| ()),
            MemorySubcommand::Delete(args) => Self::delete(ctx, args, format).await,
        }
    }

    async fn list(ctx: &CliContext, args: &ListArgs, format: OutputFormat) -> CliResult<()> {
        if args.limit == 0 {
            return Err(CliError::usage("--limit must be at least 1"));
        }

        let page = ctx
            .engine
            .page(args.session.as_deref(), args.limit, args.offset)
            .await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
            OutputFormat::Table => print!("{}", render_page(&page)),
        }
        Ok(())
    }

    async fn show(ctx: &CliContext, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let memory = ctx.engine.get(&args.id).await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&memory)?),
            OutputFormat::Table => print!("{}", render_details(&memory)),
        }
        Ok(())
    }

    /// Validate with the configured limits, then store
    pub async fn add(
        ctx: &CliContext,
        args: &AddArgs,
        format: OutputFormat,
    ) -> CliResult<MemoryRecord> {
        let mut memory = NewMemory::new(args.text.as_str())
            .with_session(args.session.as_str())
            .with_tags(args.tags.iter().cloned());
        if let Some(name) = &args.name {
            memory = memory.with_name(name.as_str());
        }

        ctx.limits.check_new(&memory)?;
        let record = ctx.engine.add(memory).await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
            OutputFormat::Table => {
                println!("Memory added successfully.");
                println!("ID: {}", record.id);
                println!("Session: {}", record.session_id);
            }
        }
        Ok(record)
    }

    async fn delete(ctx: &CliContext, args: &DeleteArgs, format: OutputFormat) -> CliResult<()> {
        ctx.engine.delete_one(&args.id).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "deleted": true,
                    "id": &args.id,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => println!("Memory {} deleted.", args.id),
        }
        Ok(())
    }
}

pub fn render_page(page: &Page<MemoryRecord>) -> String {
    if page.items.is_empty() {
        return "No memories found.\n".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["ID", "Name", "Session", "Content", "Tags", "Updated"]);

    for memory in &page.items {
        table.add_row([
            truncate_string(&memory.id, 12),
            truncate_string(memory.name.as_deref().unwrap_or("-"), 20),
            truncate_string(&memory.session_id, 20),
            truncate_string(&memory.content, 50),
            truncate_string(&memory.tags.join(", "), 24),
            format_optional_timestamp(memory.last_written().as_ref()),
        ]);
    }

    format!(
        "{table}\n\nShowing {} of {} memories (offset {})\n",
        page.items.len(),
        page.total,
        page.offset
    )
}

pub fn render_details(memory: &MemoryRecord) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Field", "Value"]);

    table.add_row(["ID".to_string(), memory.id.clone()]);
    table.add_row([
        "Name".to_string(),
        memory.name.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(["Session".to_string(), memory.session_id.clone()]);
    if let Some(external_id) = &memory.external_id {
        table.add_row(["External ID".to_string(), external_id.clone()]);
    }
    table.add_row(["Tags".to_string(), memory.tags.join(", ")]);
    table.add_row([
        "Created".to_string(),
        format_optional_timestamp(memory.created_at.as_ref()),
    ]);
    table.add_row([
        "Updated".to_string(),
        format_optional_timestamp(memory.updated_at.as_ref()),
    ]);

    format!("{table}\n\nContent:\n{}\n", memory.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            content: "Remember to rotate the keys".to_string(),
            name: Some("keys".to_string()),
            session_id: "ops".to_string(),
            tags: vec!["security".to_string()],
            external_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_render_empty_page() {
        let page: Page<MemoryRecord> = Page::slice(Vec::new(), 20, 0);
        assert_eq!(render_page(&page), "No memories found.\n");
    }

    #[test]
    fn test_render_page_footer() {
        let page = Page::slice(vec![record("a"), record("b"), record("c")], 2, 1);
        let rendered = render_page(&page);
        assert!(rendered.contains("Showing 2 of 3 memories (offset 1)"));
        assert!(rendered.contains("security"));
    }

    #[test]
    fn test_render_details_includes_content() {
        let rendered = render_details(&record("a"));
        assert!(rendered.contains("Remember to rotate the keys"));
        assert!(rendered.contains("ops"));
        assert!(!rendered.contains("External ID"));
    }
}
