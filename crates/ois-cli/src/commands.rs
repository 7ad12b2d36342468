//! Command implementations.

use anyhow::Context;
use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use tracing::info;

use ois_infer::{InferConfig, extract_order, infer_schema};
use ois_model::{CanonicalField, validate_order};

use crate::cli::ExtractArgs;

pub fn run_extract(args: &ExtractArgs) -> anyhow::Result<()> {
    let mut config = InferConfig::default();
    if let Some(threshold) = args.threshold {
        config.accept_threshold = threshold;
    }

    let workbook = ois_ingest::load_workbook(&args.file)
        .with_context(|| format!("loading {}", args.file.display()))?;
    let inference = infer_schema(&workbook, &config)
        .with_context(|| format!("inferring schema of {}", args.file.display()))?;
    let order = extract_order(&workbook, &inference);
    info!(
        sheet = inference.sheet_name,
        fields = inference.mappings.len(),
        lines = order.lines.len(),
        "extraction finished"
    );

    if args.json {
        let payload = serde_json::json!({
            "inference": inference,
            "order": order,
            "issues": validate_order(&order),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(["Field", "Column", "Confidence", "Method", "Type"]);
    for mapping in &inference.mappings {
        let profile = inference.profiles.get(&mapping.column.column);
        table.add_row([
            Cell::new(mapping.field.key()),
            Cell::new(&mapping.column.header),
            Cell::new(format!("{:.2}", mapping.confidence)),
            Cell::new(format!("{:?}", mapping.method)),
            Cell::new(
                profile
                    .map(|p| format!("{:?}", p.detected))
                    .unwrap_or_default(),
            ),
        ]);
    }
    println!("{table}");
    println!(
        "sheet: {} (header row {}, {} data rows)",
        inference.sheet_name,
        inference.table.header_row + 1,
        inference.table.data_rows()
    );
    println!(
        "document confidence: {:.2} ({:?})",
        inference.score.value, inference.score.band
    );

    let issues = validate_order(&order);
    if issues.is_empty() {
        println!("order: {} line(s), no issues", order.lines.len());
    } else {
        println!("order: {} line(s), {} issue(s):", order.lines.len(), issues.len());
        for issue in issues {
            println!("  - {}", issue.message());
        }
    }
    Ok(())
}

pub fn run_fields() -> anyhow::Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(["Field", "Class", "Weight", "Allowed types"]);
    for field in CanonicalField::ALL {
        table.add_row([
            Cell::new(field.key()),
            Cell::new(format!("{:?}", field.class())),
            Cell::new(format!("{}", field.weight())),
            Cell::new(
                field
                    .allowed_types()
                    .iter()
                    .map(|t| format!("{t:?}"))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        ]);
    }
    println!("{table}");
    Ok(())
}
