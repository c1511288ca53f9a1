use crate::config::Config;
use crate::services::FranchiseService;

use super::franchise_service;

pub async fn cmd_search(config: &Config, query: &str) -> anyhow::Result<()> {
    println!("Searching for: {query}");

    let service = franchise_service(config);
    let results = service.search(query).await?;

    if results.is_empty() {
        println!("No entries found matching '{query}'");
        return Ok(());
    }

    println!();
    println!("Search Results:");
    println!("{:-<60}", "");

    for candidate in results.iter().take(10) {
        let eps = candidate
            .episodes
            .map_or_else(|| "? eps".to_string(), |e| format!("{e} eps"));
        let format = candidate.format.map_or("?", |f| f.as_str());
        let started = candidate
            .start_date
            .map_or_else(|| "?".to_string(), |d| d.to_string());

        println!("• {} ({})", candidate.titles.preferred(), eps);
        if let Some(english) = candidate.titles.english.as_deref()
            && english != candidate.titles.preferred()
        {
            println!("  EN: {english}");
        }
        println!(
            "  ID: {} | Format: {} | Started: {}",
            candidate.id, format, started
        );
        println!();
    }

    println!("To fetch a franchise: franchise-sync fetch \"{query}\" --root-id <ID>");

    Ok(())
}
