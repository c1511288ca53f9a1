mod fetch;
mod generate;
mod list;
mod process;
mod run;
mod search;

pub use fetch::cmd_fetch;
pub use generate::cmd_generate;
pub use list::cmd_list;
pub use process::cmd_process;
pub use run::cmd_run;
pub use search::cmd_search;

use crate::cache::SourceCache;
use crate::clients::anilist::AnilistClient;
use crate::clients::jikan::JikanClient;
use crate::clients::tvdb::TvdbClient;
use crate::clients::EpisodeCatalog;
use crate::config::Config;
use crate::services::CatalogFranchiseService;
use std::sync::Arc;
use tracing::info;

/// Wires the catalog clients from config into a service. TVDB is optional.
pub(crate) fn franchise_service(config: &Config) -> CatalogFranchiseService {
    let tvdb: Option<Arc<dyn EpisodeCatalog>> = if config.tvdb.enabled {
        Some(Arc::new(TvdbClient::new(&config.tvdb)))
    } else {
        info!("TVDB disabled, seasons will come from title grouping only");
        None
    };

    CatalogFranchiseService::new(
        Arc::new(AnilistClient::new(&config.anilist)),
        Arc::new(JikanClient::new(&config.jikan)),
        tvdb,
        SourceCache::new(config.data_dir()),
        config.output_dir(),
        config.matching.clone(),
    )
}
