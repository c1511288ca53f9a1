use crate::clients::MediaCatalog;
use crate::constants::thresholds::TRAVERSAL_KEYWORD_MATCH;
use crate::consolidate::WorkClass;
use crate::domain::AnilistId;
use crate::matching::NameMatcher;
use crate::models::source::{AnilistWork, MediaKind, RelationEdge, RelationType};
use crate::parser::title::{normalize_title, titles_match_franchise};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Why a discovered node did not make it into the franchise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum RejectReason {
    /// The catalog call failed after the client gave up retrying.
    FetchFailed(String),
    /// The catalog has no such entry.
    Missing,
    NotAnime,
}

/// Lifecycle of a node discovered while walking the relation graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum NodeState {
    Unvisited,
    Fetched,
    Classified { class: WorkClass },
    ConsolidatedSeason { work: String, season: u32 },
    SeparateWork { work: String },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: AnilistId,
    pub depth: usize,
    pub state: NodeState,
}

/// Output of one traversal: fetched entries in discovery order plus the final
/// state of every node that was queued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crawl {
    pub works: Vec<AnilistWork>,
    pub nodes: Vec<NodeRecord>,
}

impl Crawl {
    #[must_use]
    pub fn state(&self, id: AnilistId) -> Option<&NodeState> {
        self.nodes.iter().find(|n| n.id == id).map(|n| &n.state)
    }

    #[must_use]
    pub fn rejected(&self) -> Vec<&NodeRecord> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.state, NodeState::Rejected { .. }))
            .collect()
    }
}

/// Decides whether a relation edge stays inside the franchise.
///
/// Sequel and prequel edges are always followed. Side stories, parents and
/// alternatives are followed only when the related title matches a franchise
/// keyword. Everything else, and anything that is not anime, is left alone.
#[must_use]
pub fn should_follow(edge: &RelationEdge, keywords: &[String], matcher: &NameMatcher) -> bool {
    if edge.kind != MediaKind::Anime {
        return false;
    }

    match edge.relation_type {
        RelationType::Sequel | RelationType::Prequel => true,
        RelationType::SideStory | RelationType::Parent | RelationType::Alternative => {
            keyword_match(edge, keywords, matcher)
        }
        _ => false,
    }
}

fn keyword_match(edge: &RelationEdge, keywords: &[String], matcher: &NameMatcher) -> bool {
    let titles = &edge.titles;
    if titles_match_franchise(
        titles.english.as_deref(),
        titles.romaji.as_deref(),
        titles.native.as_deref(),
        keywords,
    ) {
        return true;
    }

    titles.all().any(|title| {
        let normalized = normalize_title(&title.replace('/', " "));
        keywords
            .iter()
            .any(|kw| matcher.score(kw, &normalized) >= TRAVERSAL_KEYWORD_MATCH)
    })
}

/// Walks the relation graph from `root` depth-first with an explicit stack.
///
/// Every node is queued at most once. Nodes deeper than `max_depth` are fetched
/// but their relations are not expanded. A failed fetch rejects that node and
/// the walk carries on with the rest of the stack.
pub async fn crawl(
    catalog: &dyn MediaCatalog,
    root: AnilistId,
    keywords: &[String],
    matcher: &NameMatcher,
    max_depth: usize,
) -> Crawl {
    let mut crawl = Crawl::default();
    let mut visited: HashSet<AnilistId> = HashSet::from([root]);
    let mut stack: Vec<(AnilistId, usize)> = vec![(root, 0)];
    let mut states: BTreeMap<AnilistId, (usize, NodeState)> =
        BTreeMap::from([(root, (0, NodeState::Unvisited))]);
    let mut order: Vec<AnilistId> = vec![root];

    while let Some((id, depth)) = stack.pop() {
        let state = match catalog.fetch_work(id).await {
            Ok(Some(work)) if work.kind != MediaKind::Anime => NodeState::Rejected {
                reason: RejectReason::NotAnime,
            },
            Ok(Some(work)) => {
                if depth < max_depth {
                    for edge in work.relations.iter().rev() {
                        if visited.contains(&edge.id) {
                            continue;
                        }
                        if !should_follow(edge, keywords, matcher) {
                            debug!(
                                from = %id,
                                to = %edge.id,
                                relation = ?edge.relation_type,
                                "Not following relation edge"
                            );
                            continue;
                        }

                        visited.insert(edge.id);
                        stack.push((edge.id, depth + 1));
                        states.insert(edge.id, (depth + 1, NodeState::Unvisited));
                        order.push(edge.id);
                    }
                } else {
                    info!(id = %id, depth, "Depth limit reached, relations not expanded");
                }

                let class = WorkClass::of(work.format);
                crawl.works.push(work);
                NodeState::Classified { class }
            }
            Ok(None) => {
                warn!(id = %id, "Related entry not found, treating as dead branch");
                NodeState::Rejected {
                    reason: RejectReason::Missing,
                }
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Fetch failed, treating as dead branch");
                NodeState::Rejected {
                    reason: RejectReason::FetchFailed(e.to_string()),
                }
            }
        };

        states.insert(id, (depth, state));
    }

    crawl.nodes = order
        .into_iter()
        .filter_map(|id| {
            states
                .remove(&id)
                .map(|(depth, state)| NodeRecord { id, depth, state })
        })
        .collect();

    info!(
        fetched = crawl.works.len(),
        rejected = crawl.rejected().len(),
        "Relation graph traversal finished"
    );

    crawl
}
