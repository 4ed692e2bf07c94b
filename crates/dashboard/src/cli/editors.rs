//! `editors`: who edited how many items in a period.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, Color, ContentArrangement, Table};
use dashboard_db::{EditorActivity, ReportPeriod};
use serde::Serialize;

use super::{runtime, DatabaseArgs};

#[derive(Args, Debug)]
pub struct EditorsArgs {
    /// Report year
    #[arg(long)]
    pub year: i32,

    /// Month 1-12; 0 for the whole year
    #[arg(long, default_value_t = 0)]
    pub month: u32,

    /// Maximum editors to list
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

#[derive(Debug, Serialize)]
struct EditorsOutput {
    period: ReportPeriod,
    limit: u32,
    editors: Vec<EditorActivity>,
}

pub fn run(args: EditorsArgs) -> Result<()> {
    let period = ReportPeriod::new(args.year, args.month).context("Invalid report period")?;

    let rt = runtime()?;
    let editors = rt.block_on(async {
        let db = args.db.open().await?;
        let editors = db.edits_by_editor(&period, args.limit).await;
        db.close().await;
        editors.context("Failed to query editor activity")
    })?;

    if args.json {
        let output = EditorsOutput {
            period,
            limit: args.limit,
            editors,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Editor activity {} .. {}", period.start, period.end);
    if editors.is_empty() {
        println!("No edits recorded in this period.");
        return Ok(());
    }
    println!("{}", editors_table(&editors));
    Ok(())
}

fn editors_table(editors: &[EditorActivity]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(
        ["Editor", "Items", "Edits"]
            .iter()
            .map(|h| Cell::new(h).fg(Color::Cyan)),
    );

    for activity in editors {
        table.add_row(vec![
            Cell::new(&activity.editor),
            Cell::new(activity.items).set_alignment(CellAlignment::Right),
            Cell::new(activity.edits).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
