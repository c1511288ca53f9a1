use crate::config::Config;
use crate::domain::AnilistId;
use crate::models::source::FranchiseSources;
use crate::services::FranchiseService;
use anyhow::Context;

use super::franchise_service;

pub async fn cmd_fetch(config: &Config, title: &str, root: Option<i32>) -> anyhow::Result<()> {
    println!("Fetching franchise: {title}");

    let service = franchise_service(config);
    let sources = service
        .fetch(title, root.map(AnilistId::new))
        .await
        .with_context(|| format!("Failed to fetch '{title}'"))?;

    print_fetch_summary(&sources);
    println!();
    println!("Next: franchise-sync process {}", sources.slug);

    Ok(())
}

pub(super) fn print_fetch_summary(sources: &FranchiseSources) {
    println!();
    println!("Fetched '{}' ({})", sources.name, sources.slug);
    println!("{:-<60}", "");
    println!("Root:      {}", sources.root);
    println!("Keywords:  {}", sources.keywords.join(", "));
    println!("AniList:   {} entries", sources.anilist.len());
    println!("MAL:       {} entries", sources.mal.len());
    println!("TVDB:      {} series", sources.tvdb.len());

    let rejected = sources
        .nodes
        .iter()
        .filter(|n| matches!(n.state, crate::consolidate::NodeState::Rejected { .. }))
        .count();
    if rejected > 0 {
        println!("Rejected:  {rejected} related entries");
    }
}
