use crate::builder::Build;
use crate::config::Config;
use crate::resolve::ResolutionStats;
use crate::services::FranchiseService;
use anyhow::Context;

use super::franchise_service;

pub async fn cmd_process(config: &Config, slug: &str) -> anyhow::Result<()> {
    let service = franchise_service(config);
    let build = service
        .process(slug)
        .await
        .with_context(|| format!("Failed to process '{slug}'"))?;

    print_build_summary(&build);
    Ok(())
}

pub(super) fn print_build_summary(build: &Build) {
    let franchise = &build.franchise;
    let report = &build.report;

    println!("Franchise: {} ({})", franchise.name, franchise.slug);
    println!("{:-<60}", "");

    for work in &franchise.works {
        let format = work.format.map_or("?", |f| f.as_str());
        let eps = work
            .episode_count
            .map_or_else(|| "?".to_string(), |e| e.to_string());
        println!("• {} [{}] {} eps", work.title, format, eps);

        for season in &work.seasons {
            let verified = season
                .tvdb_season
                .map_or_else(|| "unverified".to_string(), |n| format!("TVDB S{n}"));
            let start = season
                .air_date_start
                .map_or_else(|| "?".to_string(), |d| d.to_string());
            println!("    Season {:<3} {}  ({})", season.number, start, verified);
        }
    }

    println!();
    print_stats("Persons", &report.persons);
    print_stats("Characters", &report.characters);
    print_stats("Companies", &report.companies);

    println!();
    println!(
        "Seasons:   {} verified, {} unverified",
        report.verified_seasons, report.unverified_seasons
    );
    for special in &report.specials {
        println!(
            "Special:   {} sits in {} TVDB S{}",
            special.special, special.series, special.tvdb_season
        );
    }
    println!("Relations: {}", franchise.relationships.len());
}

fn print_stats(label: &str, stats: &ResolutionStats) {
    println!(
        "{label:<11} {} primary, {} by id, {} exact, {} fuzzy, {} new",
        stats.primary, stats.known_id, stats.exact, stats.fuzzy, stats.created
    );
}
