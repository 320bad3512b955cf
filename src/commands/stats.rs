use colored::Colorize;

use qna::embeddings::{FileStore, RecordStore};
use qna::error::Result;
use qna::Config;

pub fn cmd_stats(config: &Config) -> Result<()> {
    let store = FileStore::open(&config.store_path, config.dimension)?;
    let stats = store.stats()?;

    println!("{} {}", "Store".green().bold(), store.path().display());
    println!("  Records:   {}", stats.total_records);
    match stats.dimension {
        Some(dimension) => println!("  Dimension: {}", dimension),
        None => println!("  Dimension: {}", "not established".dimmed()),
    }
    if let Some(bytes) = stats.disk_bytes {
        println!(
            "  Size:      {}",
            humansize::format_size(bytes, humansize::BINARY)
        );
    }
    Ok(())
}
