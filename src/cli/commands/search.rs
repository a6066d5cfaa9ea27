use crate::constants::limits::MAX_CLI_RESULTS;
use crate::services::{SearchOrchestrator, UiState};
use crate::state::SharedState;

pub async fn cmd_search(state: &SharedState, query: &str) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        println!("Listing popular movies from {}", state.catalog.name());
    } else {
        println!("Searching {} for: {query}", state.catalog.name());
    }

    let orchestrator = SearchOrchestrator::new(state.catalog.clone(), state.recorder.clone());
    let run = orchestrator.execute(query).await;

    match &run.state {
        UiState::Loaded { movies, .. } if movies.is_empty() => {
            println!("No movies found matching '{}'", query.trim());
        }
        UiState::Loaded { movies, .. } => {
            println!();
            println!("Results:");
            println!("{:-<60}", "");

            for movie in movies.iter().take(MAX_CLI_RESULTS) {
                let year = movie.release_year().unwrap_or("----");
                let rating = movie
                    .rating
                    .map_or_else(|| "N/A".to_string(), |r| format!("{r:.1}"));
                println!("• {} ({year})  ★ {rating}", movie.title);
                if let Some(language) = &movie.language {
                    println!("  Language: {language} | ID: {}", movie.id);
                } else {
                    println!("  ID: {}", movie.id);
                }
                println!();
            }
        }
        UiState::Error { error, .. } => {
            println!("{}", error.message);
            for step in &error.remediation {
                println!("  {step}");
            }
        }
        UiState::Loading { .. } => {}
    }

    // Let the search count land before the process exits.
    if let Some(usage) = run.usage {
        usage.await?;
    }

    Ok(())
}
