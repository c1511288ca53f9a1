use crate::cache::SourceCache;
use crate::config::Config;

pub async fn cmd_list(config: &Config) -> anyhow::Result<()> {
    let cache = SourceCache::new(config.data_dir());
    let slugs = cache.list().await?;

    if slugs.is_empty() {
        println!("No cached franchises in {}", cache.root().display());
        return Ok(());
    }

    println!("Cached franchises:");
    println!("{:-<60}", "");
    for slug in &slugs {
        match cache.load(slug).await {
            Ok(Some(sources)) => println!(
                "• {:<30} {} entries, fetched {}",
                slug,
                sources.anilist.len(),
                sources.fetched_at.format("%Y-%m-%d %H:%M")
            ),
            Ok(None) => println!("• {slug}"),
            Err(e) => println!("• {slug} (unreadable: {e})"),
        }
    }

    Ok(())
}
