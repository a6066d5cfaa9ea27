use crate::state::SharedState;

pub async fn cmd_trending(state: &SharedState, limit: Option<u64>) -> anyhow::Result<()> {
    if !state.recorder.is_enabled() {
        println!("Search counts are not being recorded (usage backend not configured).");
        return Ok(());
    }

    let limit = limit.unwrap_or(state.config.search.trending_limit).max(1);
    let records = state.recorder.top_trending(limit).await;

    if records.is_empty() {
        println!("No searches recorded yet.");
        return Ok(());
    }

    println!("Trending Searches:");
    println!("{:-<60}", "");

    for (rank, record) in records.iter().enumerate() {
        println!(
            "{:>2}. {:<30} {:>5} searches  → {}",
            rank + 1,
            record.query,
            record.count,
            record.movie.title
        );
    }

    Ok(())
}
