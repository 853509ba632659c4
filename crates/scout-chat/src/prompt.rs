// Prompt construction for the scouting assistant.
//
// The final prompt is the system persona, the recent conversation, the
// retrieved context (players, knowledge, role definitions) and the current
// question, in that order.

use crate::intent::QueryIntent;
use crate::memory::{ChatMemory, ChatMessage};
use crate::retrieval::{KnowledgeItem, PlayerContext, RetrievalContext};
use crate::ChatError;

/// External text-completion service (an LLM behind some API).
pub trait TextCompletion {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Persona and answering guidelines shared by every request.
pub fn system_prompt() -> String {
    "You are an expert football scout and analyst with deep knowledge of:\n\
     - Advanced metrics (xA, xG, progressive passes, PAdj stats, percentiles)\n\
     - Composite attributes (Security, ProgPass, BallCarrying, Creativity, Finishing, etc.)\n\
     - Tactical roles (Ball Playing CB, Poacher, Box Crasher, Regista, etc.)\n\
     - Position-specific evaluation frameworks (CB, DM, AM, CF, Winger, etc.)\n\
     \n\
     Your Role:\n\
     1. Use provided player data to give accurate statistics and insights\n\
     2. Provide tactical assessments and role fit analysis\n\
     3. Compare players using percentiles when relevant\n\
     4. Explain composite attributes when asked\n\
     5. Scout-style analysis with practical context\n\
     \n\
     Guidelines:\n\
     - Reference percentiles (e.g., \"85th percentile for Finishing\")\n\
     - When comparing players, highlight strengths and weaknesses\n\
     - When suggesting roles, explain fit with key metrics\n\
     - If data is missing, acknowledge limitations\n\
     - Be concise but thorough\n\
     - Use football terminology naturally\n\
     \n\
     When asked about statistics, always mention percentiles for context and \
     highlight standout attributes (90+ percentile). When asked about players, \
     give a profile with key attributes and mention role fit if applicable. \
     When asked about roles or composite attributes, explain the tactical \
     concept, list the key metrics involved and name players who fit well."
        .to_string()
}

/// Extra instructions for the classified intent, if any.
pub fn intent_instructions(intent: QueryIntent) -> Option<&'static str> {
    match intent {
        QueryIntent::PlayerLookup => Some(
            "The user wants statistics and information about a specific player. \
             Give basic information (age, team, position, league), key statistics \
             with percentiles, composite attribute scores and role fit.",
        ),
        QueryIntent::PlayerFinder => Some(
            "The user wants players matching specific criteria (position, age range, \
             attribute thresholds). List the matching players with key stats, rank \
             them by fit and explain why each matches. Suggest alternatives if \
             nothing matches well.",
        ),
        QueryIntent::Comparison => Some(
            "The user wants to compare players. Compare key metrics and percentiles \
             side by side, highlight strengths and weaknesses and identify tactical \
             differences.",
        ),
        QueryIntent::RoleAnalysis => Some(
            "The user wants to know which players fit a tactical role. Name the best \
             fits, explain why each fits and point to the metrics that decide it.",
        ),
        QueryIntent::Explanation => Some(
            "The user wants a football concept explained. Give a clear definition, \
             its tactical significance, the metrics involved and players who \
             exemplify it.",
        ),
        QueryIntent::General => None,
    }
}

// ---------------------------------------------------------------------------
// Context formatting
// ---------------------------------------------------------------------------

pub fn format_player_context(player: &PlayerContext) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&format!(
        "\n**{}** ({}, {})\nTeam: {} | League: {}\n\nKey Statistics:\n",
        player.name, player.position, player.age, player.team, player.league
    ));
    for stat in &player.stats {
        out.push_str(&format!(
            "- {}: {:.2} (percentile: {:.1})\n",
            stat.name, stat.value, stat.percentile
        ));
    }
    if !player.composites.is_empty() {
        out.push_str("\nComposite Attributes:\n");
        for composite in &player.composites {
            out.push_str(&format!("- {}: {:.1}\n", composite.display_name, composite.score));
        }
    }
    out
}

pub fn format_knowledge_context(item: &KnowledgeItem) -> String {
    format!(
        "\n## {}: {}\n\n{}\n\n{}\n",
        item.kind, item.name, item.description, item.content
    )
}

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

/// Full system prompt for one question.
pub fn build_prompt(query: &str, context: &RetrievalContext, memory: &ChatMemory) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(&system_prompt());
    prompt.push_str("\n\n");

    if !memory.is_empty() {
        prompt.push_str(&memory.formatted_history());
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Retrieved Context\n\n");

    if !context.players.is_empty() {
        prompt.push_str("### Available Player Data\n\n");
        for player in &context.players {
            prompt.push_str(&format_player_context(player));
            prompt.push('\n');
        }
    }

    if !context.knowledge.is_empty() {
        prompt.push_str("### Knowledge Base\n\n");
        for item in &context.knowledge {
            prompt.push_str(&format_knowledge_context(item));
            prompt.push('\n');
        }
    }

    if !context.roles.is_empty() {
        prompt.push_str("### Role Definitions\n\n");
        for role in &context.roles {
            prompt.push_str(&format!("**{}**: {}\n", role.name, role.description));
        }
    }

    prompt.push_str(&format!("\n## Current Query\n{query}\n\n"));
    if let Some(instructions) = intent_instructions(context.intent) {
        prompt.push_str(&format!("## Task\n{instructions}\n\n"));
    }
    prompt.push_str("Provide a comprehensive, scout-style answer based on the data above.");
    prompt
}

/// Messages sent to the completion service: the built prompt as system
/// message, then the remembered turns, then the question.
pub fn build_messages(
    query: &str,
    context: &RetrievalContext,
    memory: &ChatMemory,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(memory.history().len() + 2);
    messages.push(ChatMessage::system(build_prompt(query, context, memory)));
    messages.extend(memory.history().iter().cloned());
    messages.push(ChatMessage::user(query));
    messages
}
