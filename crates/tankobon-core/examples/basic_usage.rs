//! Basic usage example - resolve a series and download its first chapter

use std::sync::Arc;
use tankobon_core::{ProgressCallback, Result, TankobonApi};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let query = args.next().unwrap_or_else(|| "Witch Hat Atelier".to_string());
    let root = args.next().unwrap_or_else(|| "./example-library".to_string());

    println!("Initializing TankobonApi with root: {}", root);
    let api = TankobonApi::builder(&root)
        .auto_create_dirs(true)
        .build()
        .await?;

    match api.resolve_series(&query).await {
        Ok(record) => println!("Resolved '{}' to {} ({})", query, record.display_name(), record.id),
        Err(e) => println!("Could not resolve '{}': {}", query, e),
    }

    let found = api.search_series(&query).await?;
    let Some(series) = found.first() else {
        println!("No series found for '{}'", query);
        return Ok(());
    };

    let chapters = api.list_chapters(&series.id, None).await?;
    println!("{} has {} chapters", series.title, chapters.len());

    if let Some(chapter) = chapters.first() {
        let progress: ProgressCallback = Arc::new(|message: &str| println!("  {}", message));
        let path = api
            .download_chapter(&series.id, &chapter.id, Some(progress))
            .await?;
        println!("Saved {}", path.display());
    }

    Ok(())
}
