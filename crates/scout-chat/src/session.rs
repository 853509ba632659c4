// One chat conversation: parse, retrieve, prompt, complete, remember.

use crate::intent::{QueryIntent, QueryParser};
use crate::memory::{ChatMemory, Role};
use crate::prompt::{build_messages, TextCompletion};
use crate::retrieval::{ContextBuilder, DocumentStore, RetrievalContext};
use crate::ChatError;
use scout_core::config::PresetCatalog;
use scout_core::dataset::Dataset;
use serde::Serialize;
use tracing::info;

/// Words that never count as player mentions in an answer.
const MENTION_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "player", "players", "for", "with", "and", "who", "what", "show",
    "find", "best", "top", "list", "stats", "data",
];

/// Chart suggested alongside an answer. Rendering is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visualization {
    RadarProfile,
    ComparisonBar,
    ScatterSimilarity,
    RoleFit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub text: String,
    pub context: RetrievalContext,
    pub visualizations: Vec<Visualization>,
    pub players_mentioned: Vec<String>,
}

/// Charts worth showing for this query and context, without duplicates.
pub fn determine_visualizations(query: &str, context: &RetrievalContext) -> Vec<Visualization> {
    let lower = query.to_lowercase();
    let player_count = context.players.len();
    let mut out = Vec::new();

    if context.intent == QueryIntent::PlayerLookup && player_count == 1 {
        out.push(Visualization::RadarProfile);
    }
    if lower.contains("compare") && player_count > 1 {
        out.push(Visualization::ComparisonBar);
    }
    if lower.contains("similar") {
        out.push(Visualization::ScatterSimilarity);
    }
    if context.intent == QueryIntent::RoleAnalysis {
        out.push(Visualization::RoleFit);
    }
    let asks_for_chart = ["show", "display", "chart", "graph"]
        .iter()
        .any(|w| lower.contains(w));
    if asks_for_chart && player_count == 1 && !out.contains(&Visualization::RadarProfile) {
        out.push(Visualization::RadarProfile);
    }
    out
}

/// Capitalized words in an answer that look like player names.
pub fn players_mentioned(answer: &str) -> Vec<String> {
    answer
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 1)
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .filter(|w| !MENTION_STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

pub struct ChatSession<'a, S: DocumentStore + ?Sized, C: TextCompletion + ?Sized> {
    parser: QueryParser,
    retriever: ContextBuilder<'a, S>,
    completion: &'a C,
    memory: ChatMemory,
}

impl<'a, S: DocumentStore + ?Sized, C: TextCompletion + ?Sized> ChatSession<'a, S, C> {
    pub fn new(store: &'a S, completion: &'a C) -> Self {
        ChatSession {
            parser: QueryParser::default(),
            retriever: ContextBuilder::new(store),
            completion,
            memory: ChatMemory::default(),
        }
    }

    /// Enrich retrieved players from a prepared dataset.
    pub fn with_dataset(mut self, dataset: &'a Dataset, catalog: &'a PresetCatalog) -> Self {
        self.retriever = self.retriever.with_dataset(dataset, catalog);
        self
    }

    pub fn with_parser(mut self, parser: QueryParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_memory(mut self, memory: ChatMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    pub fn reset(&mut self) {
        self.memory.clear();
    }

    /// Answer one question. Memory is only updated when the completion
    /// succeeds.
    pub fn ask(&mut self, query: &str) -> Result<ChatResponse, ChatError> {
        let processed = self.parser.process(query);
        info!("chat query classified as {:?}", processed.intent);

        let context = self.retriever.build(&processed)?;
        let messages = build_messages(query, &context, &self.memory);
        let text = self.completion.complete(&messages)?;

        self.memory.add_message(Role::User, query);
        self.memory.add_message(Role::Assistant, text.clone());

        Ok(ChatResponse {
            visualizations: determine_visualizations(query, &context),
            players_mentioned: players_mentioned(&text),
            text,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::PlayerContext;

    fn player(name: &str) -> PlayerContext {
        PlayerContext {
            name: name.into(),
            team: "T".into(),
            position: "CB".into(),
            age: 25,
            league: "L".into(),
            stats: Vec::new(),
            composites: Vec::new(),
        }
    }

    #[test]
    fn lookup_with_chart_words_gets_one_radar() {
        let mut context = RetrievalContext::empty(QueryIntent::PlayerLookup);
        context.players.push(player("Saliba"));
        assert_eq!(
            determine_visualizations("show me Saliba", &context),
            vec![Visualization::RadarProfile]
        );
    }

    #[test]
    fn comparison_and_similarity_charts() {
        let mut context = RetrievalContext::empty(QueryIntent::Comparison);
        context.players.push(player("Rodri"));
        context.players.push(player("Rice"));
        assert_eq!(
            determine_visualizations("compare Rodri and Rice, are they similar?", &context),
            vec![Visualization::ComparisonBar, Visualization::ScatterSimilarity]
        );
        let empty = RetrievalContext::empty(QueryIntent::Comparison);
        assert!(determine_visualizations("compare them", &empty).is_empty());
    }

    #[test]
    fn role_analysis_always_gets_role_fit() {
        let context = RetrievalContext::empty(QueryIntent::RoleAnalysis);
        assert_eq!(determine_visualizations("role?", &context), vec![Visualization::RoleFit]);
    }

    #[test]
    fn mentions_skip_stop_words() {
        assert_eq!(
            players_mentioned("The best option is Saliba, with Gabriel close behind."),
            vec!["Saliba", "Gabriel"]
        );
    }
}
