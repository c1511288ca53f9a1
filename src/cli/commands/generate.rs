use crate::config::Config;
use crate::services::FranchiseService;
use anyhow::Context;

use super::franchise_service;

pub async fn cmd_generate(config: &Config, slug: &str) -> anyhow::Result<()> {
    let service = franchise_service(config);
    let generated = service
        .generate(slug)
        .await
        .with_context(|| format!("Failed to generate SQL for '{slug}'"))?;

    let franchise = &generated.build.franchise;
    println!(
        "✓ Wrote {} ({} bytes): {} works, {} persons, {} characters, {} companies",
        generated.path.display(),
        generated.bytes,
        franchise.works.len(),
        franchise.persons.len(),
        franchise.characters.len(),
        franchise.companies.len()
    );

    if generated.build.report.unverified_seasons > 0 {
        println!(
            "⚠ {} seasons have no episode database match",
            generated.build.report.unverified_seasons
        );
    }

    Ok(())
}
