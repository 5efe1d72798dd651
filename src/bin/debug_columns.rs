use anyhow::{Context, Result, anyhow};
use catalogue_pipeline::config::PipelineConfig;
use catalogue_pipeline::fetcher::{FileSource, fetch_raw_rows};
use catalogue_pipeline::processor::{
    CanonicalField, HeaderAliases, HeaderIndex, Resolution, normalize_header_key,
};
use std::env;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let mut csv_path = None;
    let mut config_path = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(args.next().ok_or_else(|| anyhow!("--config needs a path"))?);
        } else {
            csv_path = Some(arg);
        }
    }
    let csv_path =
        csv_path.ok_or_else(|| anyhow!("Usage: debug_columns <export.csv> [--config <path>]"))?;

    let aliases = match config_path {
        Some(path) => PipelineConfig::from_file(&path)?.header_aliases()?,
        None => HeaderAliases::new(),
    };

    println!("=== DEBUGGING COLUMN MAPPING: {} ===\n", csv_path);

    let rows = fetch_raw_rows(&FileSource::new(Path::new(&csv_path)))
        .await
        .context("Failed to read export")?;
    let Some(first) = rows.iter().find(|row| !row.is_blank()) else {
        println!("No populated rows found.");
        return Ok(());
    };

    println!("1. Raw headers:");
    for column in first.columns() {
        println!("   {:?} -> {:?}", column, normalize_header_key(column));
    }

    let index = HeaderIndex::build(first);
    if !index.collisions().is_empty() {
        println!("\n2. Header collisions (first column kept):");
        for collision in index.collisions() {
            println!(
                "   {:?}: kept {:?}, ignored {:?}",
                collision.key, collision.kept, collision.discarded
            );
        }
    }

    println!("\n3. Canonical field resolution:");
    let mut missing = 0;
    for field in CanonicalField::ALL {
        match index.resolve_field(field, &aliases) {
            Resolution::Found { column, alias } => {
                let sample = first.get(&column).unwrap_or("");
                println!(
                    "   ✅ {:<26} <- {:?} (alias {:?}, first value {:?})",
                    field.key(),
                    column,
                    alias,
                    sample
                );
            }
            Resolution::NotFound => {
                missing += 1;
                let tried: Vec<&str> = aliases.candidates(field).collect();
                println!("   ❌ {:<26} tried {:?}", field.key(), tried);
            }
        }
    }

    println!(
        "\n{} of {} fields resolved across {} data rows",
        CanonicalField::ALL.len() - missing,
        CanonicalField::ALL.len(),
        rows.len()
    );
    Ok(())
}
