use crate::config::Config;
use crate::domain::AnilistId;
use crate::services::FranchiseService;
use anyhow::Context;

use super::fetch::print_fetch_summary;
use super::franchise_service;
use super::process::print_build_summary;

pub async fn cmd_run(config: &Config, title: &str, root: Option<i32>) -> anyhow::Result<()> {
    let service = franchise_service(config);

    let sources = service
        .fetch(title, root.map(AnilistId::new))
        .await
        .with_context(|| format!("Failed to fetch '{title}'"))?;
    print_fetch_summary(&sources);
    println!();

    let generated = service
        .generate(&sources.slug)
        .await
        .with_context(|| format!("Failed to generate SQL for '{}'", sources.slug))?;
    print_build_summary(&generated.build);

    println!();
    println!(
        "✓ Wrote {} ({} bytes)",
        generated.path.display(),
        generated.bytes
    );

    Ok(())
}
