use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use statelock_server::memory::types::{Page, StatsOverview, TagSummary};

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct StatsCommand {
    #[clap(long, default_value = "5", help = "Number of top tags to show")]
    pub top_tags: usize,
}

impl StatsCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> CliResult<()> {
        let stats = ctx.engine.stats_overview(self.top_tags).await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            OutputFormat::Table => print!("{}", render_stats(&stats)),
        }
        Ok(())
    }
}

#[derive(Parser)]
pub struct TagsCommand {
    #[clap(long, short, default_value = "20", help = "Maximum number of tags")]
    pub limit: usize,

    #[clap(long, default_value = "0", help = "Number of tags to skip")]
    pub offset: usize,
}

impl TagsCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> CliResult<()> {
        if self.limit == 0 {
            return Err(CliError::usage("--limit must be at least 1"));
        }
        let page = ctx.engine.list_tags(self.limit, self.offset).await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
            OutputFormat::Table => print!("{}", render_tags(&page)),
        }
        Ok(())
    }
}

pub fn render_stats(stats: &StatsOverview) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Metric", "Value"]);

    table.add_row(["Memories".to_string(), stats.total_memories.to_string()]);
    table.add_row(["Sessions".to_string(), stats.total_sessions.to_string()]);
    table.add_row([
        "Recent writes".to_string(),
        stats.recent_writes_24h.to_string(),
    ]);

    let mut out = format!("StateLock Statistics\n====================\n\n{table}\n");
    if !stats.top_tags.is_empty() {
        let tags: Vec<String> = stats
            .top_tags
            .iter()
            .map(|t| format!("{} ({})", t.tag, t.count))
            .collect();
        out.push_str(&format!("\nTop tags: {}\n", tags.join(", ")));
    }
    out
}

pub fn render_tags(page: &Page<TagSummary>) -> String {
    if page.items.is_empty() {
        return "No tags found.\n".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Tag", "Count"]);

    for tag in &page.items {
        table.add_row([tag.tag.clone(), tag.count.to_string()]);
    }

    format!("{table}\n\nTotal: {} tags\n", page.total)
}
