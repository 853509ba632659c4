// Retrieval context assembly against an abstract document store.
//
// The store holds two collections: one document per player and one per
// knowledge item (metric definitions, composite attributes, roles). Which
// searches run depends on the query intent.

use crate::intent::{ProcessedQuery, QueryEntities, QueryIntent};
use crate::ChatError;
use scout_core::config::{PresetCatalog, COMPOSITE_PREFIX};
use scout_core::dataset::Dataset;
use scout_core::scoring::percentile::player_stat_lines;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

const FINDER_TOP_K: usize = 10;
const KNOWLEDGE_TOP_K: usize = 5;
const UNKNOWN: &str = "Unknown";
const MISSING_PERCENTILE: f64 = 50.0;

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Players,
    Knowledge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub collection: Collection,
    /// Metadata constraints, interpreted by the store.
    pub filters: Map<String, Value>,
    pub top_k: usize,
}

/// Parallel lists: `metadatas[i]` describes `documents[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub documents: Vec<String>,
    pub metadatas: Vec<Map<String, Value>>,
}

impl SearchHits {
    fn pairs(&self) -> impl Iterator<Item = (&String, &Map<String, Value>)> {
        self.documents.iter().zip(self.metadatas.iter())
    }
}

/// Semantic search over the player and knowledge collections.
pub trait DocumentStore {
    fn search(&self, request: &SearchRequest) -> Result<SearchHits, ChatError>;
}

// ---------------------------------------------------------------------------
// Context types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStat {
    pub name: String,
    pub value: f64,
    pub percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub key: String,
    pub display_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerContext {
    pub name: String,
    pub team: String,
    pub position: String,
    pub age: u32,
    pub league: String,
    pub stats: Vec<PlayerStat>,
    pub composites: Vec<CompositeScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeItem {
    pub kind: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleContext {
    pub name: String,
    pub description: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalContext {
    pub intent: QueryIntent,
    pub players: Vec<PlayerContext>,
    pub knowledge: Vec<KnowledgeItem>,
    pub roles: Vec<RoleContext>,
}

impl RetrievalContext {
    pub fn empty(intent: QueryIntent) -> Self {
        RetrievalContext {
            intent,
            players: Vec::new(),
            knowledge: Vec::new(),
            roles: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata helpers
// ---------------------------------------------------------------------------

fn meta_str(meta: &Map<String, Value>, key: &str, default: &str) -> String {
    match meta.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

fn meta_u32(meta: &Map<String, Value>, key: &str) -> u32 {
    match meta.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn player_from_meta(name: String, meta: &Map<String, Value>) -> PlayerContext {
    PlayerContext {
        name,
        team: meta_str(meta, "team", UNKNOWN),
        position: meta_str(meta, "position", UNKNOWN),
        age: meta_u32(meta, "age"),
        league: meta_str(meta, "league", UNKNOWN),
        stats: Vec::new(),
        composites: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// ContextBuilder
// ---------------------------------------------------------------------------

/// Runs the intent-specific searches and collects their results.
///
/// With a dataset attached, retrieved players are enriched with their
/// statistics, percentiles and composite scores.
pub struct ContextBuilder<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    enrichment: Option<(&'a Dataset, &'a PresetCatalog)>,
}

impl<'a, S: DocumentStore + ?Sized> ContextBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ContextBuilder {
            store,
            enrichment: None,
        }
    }

    /// Attach a prepared dataset (percentile and composite columns present).
    pub fn with_dataset(mut self, dataset: &'a Dataset, catalog: &'a PresetCatalog) -> Self {
        self.enrichment = Some((dataset, catalog));
        self
    }

    pub fn build(&self, processed: &ProcessedQuery) -> Result<RetrievalContext, ChatError> {
        let entities = &processed.entities;
        let mut context = RetrievalContext::empty(processed.intent);

        match processed.intent {
            QueryIntent::PlayerLookup => context.players = self.lookup_players(entities)?,
            QueryIntent::PlayerFinder | QueryIntent::Comparison => {
                context.players = self.search_players(entities)?;
            }
            QueryIntent::RoleAnalysis => {
                context.players = self.search_players(entities)?;
                context.roles = self.role_context(entities)?;
            }
            QueryIntent::Explanation => {
                context.knowledge = self.search_knowledge(&processed.original_query)?;
            }
            QueryIntent::General => {}
        }

        if let Some((dataset, catalog)) = self.enrichment {
            for player in &mut context.players {
                enrich_player(player, dataset, catalog);
            }
        }

        debug!(
            "retrieved {} players, {} knowledge items, {} roles for {:?}",
            context.players.len(),
            context.knowledge.len(),
            context.roles.len(),
            processed.intent
        );
        Ok(context)
    }

    fn lookup_players(&self, entities: &QueryEntities) -> Result<Vec<PlayerContext>, ChatError> {
        let mut players = Vec::new();
        for name in &entities.players {
            let mut filters = Map::new();
            filters.insert("player_name".into(), Value::String(name.clone()));
            let hits = self.store.search(&SearchRequest {
                query: format!("Player: {name}"),
                collection: Collection::Players,
                filters,
                top_k: 1,
            })?;
            if let (Some(_), Some(meta)) = (hits.documents.first(), hits.metadatas.first()) {
                players.push(player_from_meta(name.clone(), meta));
            }
        }
        Ok(players)
    }

    fn search_players(&self, entities: &QueryEntities) -> Result<Vec<PlayerContext>, ChatError> {
        let mut filters = Map::new();
        if let Some(position) = &entities.position {
            filters.insert("position".into(), Value::String(position.clone()));
        }
        if let Some(min_age) = entities.min_age {
            filters.insert("min_age".into(), Value::from(min_age));
        }
        if let Some(max_age) = entities.max_age {
            filters.insert("max_age".into(), Value::from(max_age));
        }

        let mut query = String::from("Find players");
        if let Some(attr) = &entities.composite_attr {
            query.push_str(&format!(" with {attr} > 80"));
            filters.insert("composite_attr".into(), Value::String(attr.clone()));
        } else if let Some(threshold) = entities.threshold {
            query.push_str(&format!(" with score > {threshold}"));
        }

        let hits = self.store.search(&SearchRequest {
            query,
            collection: Collection::Players,
            filters,
            top_k: FINDER_TOP_K,
        })?;
        Ok(hits
            .pairs()
            .map(|(_, meta)| player_from_meta(meta_str(meta, "player_name", UNKNOWN), meta))
            .collect())
    }

    fn role_context(&self, entities: &QueryEntities) -> Result<Vec<RoleContext>, ChatError> {
        let Some(attr) = &entities.composite_attr else {
            return Ok(Vec::new());
        };
        let mut filters = Map::new();
        filters.insert("type".into(), Value::String("composite_attribute".into()));
        filters.insert("name".into(), Value::String(attr.clone()));
        let hits = self.store.search(&SearchRequest {
            query: format!("Role definition {attr}"),
            collection: Collection::Knowledge,
            filters,
            top_k: 1,
        })?;
        Ok(hits
            .documents
            .first()
            .map(|doc| RoleContext {
                name: attr.clone(),
                description: doc.clone(),
                kind: "composite_attribute".into(),
            })
            .into_iter()
            .collect())
    }

    fn search_knowledge(&self, query: &str) -> Result<Vec<KnowledgeItem>, ChatError> {
        let hits = self.store.search(&SearchRequest {
            query: query.to_string(),
            collection: Collection::Knowledge,
            filters: Map::new(),
            top_k: KNOWLEDGE_TOP_K,
        })?;
        Ok(hits
            .pairs()
            .map(|(doc, meta)| KnowledgeItem {
                kind: meta_str(meta, "type", "unknown"),
                name: meta_str(meta, "name", "unknown"),
                display_name: meta_str(meta, "display_name", ""),
                description: meta_str(meta, "description", ""),
                content: doc.clone(),
            })
            .collect())
    }
}

/// Fill stats and composite scores from the dataset, if the player is in it.
fn enrich_player(player: &mut PlayerContext, dataset: &Dataset, catalog: &PresetCatalog) {
    let Some(record) = dataset.find(&player.name) else {
        return;
    };
    if let Some(lines) = player_stat_lines(dataset, &player.name, &catalog.stat_columns()) {
        player.stats = lines
            .into_iter()
            .filter_map(|line| {
                Some(PlayerStat {
                    value: line.value?,
                    percentile: line.percentile.unwrap_or(MISSING_PERCENTILE),
                    name: line.stat,
                })
            })
            .collect();
    }
    player.composites = catalog
        .composites
        .iter()
        .filter_map(|(key, attribute)| {
            let score = record.stat(&format!("{COMPOSITE_PREFIX}{key}"))?;
            Some(CompositeScore {
                key: key.clone(),
                display_name: attribute.display_name.clone(),
                score,
            })
        })
        .collect();
}
