//! Prompt text and output schemas for the three model roles.

use chrono::Utc;
use serde_json::{Value, json};

fn today() -> String {
    Utc::now().format("%B %-d, %Y").to_string()
}

pub fn query_list_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "array",
                "items": { "type": "string" },
                "description": "A list of search queries to be used for web research."
            },
            "rationale": {
                "type": "string",
                "description": "A brief explanation of why these queries are relevant."
            }
        },
        "required": ["query", "rationale"]
    })
}

pub fn reflection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_sufficient": { "type": "boolean" },
            "knowledge_gap": {
                "type": "string",
                "description": "What information is missing or needs clarification."
            },
            "follow_up_queries": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["is_sufficient", "knowledge_gap", "follow_up_queries"]
    })
}

pub const QUERY_WRITER_SYSTEM: &str = "You write precise web search queries for a research \
assistant. Reply with a single JSON object and nothing else.";

pub fn initial_queries(question: &str, count: usize) -> String {
    format!(
        "Generate sophisticated and diverse web search queries for the research topic below.\n\
         \n\
         Instructions:\n\
         - Produce at most {count} queries. Prefer one query unless the topic has several aspects.\n\
         - Each query must target one specific aspect; never produce near-duplicates.\n\
         - Ask for the most recent information. The current date is {date}.\n\
         \n\
         Format your answer as JSON with exactly these keys:\n\
         - \"query\": list of query strings\n\
         - \"rationale\": why these queries are relevant\n\
         \n\
         Topic: {question}",
        date = today(),
    )
}

pub fn follow_up_queries(
    question: &str,
    gaps: &[String],
    suggested: &[String],
    count: usize,
) -> String {
    let gaps_block = if gaps.is_empty() {
        "- (the previous reflection did not name specific gaps)".to_string()
    } else {
        bullet_list(gaps)
    };
    let suggested_block = if suggested.is_empty() {
        String::new()
    } else {
        format!(
            "\nQueries suggested by the reviewer (reuse or improve them):\n{}\n",
            bullet_list(suggested)
        )
    };
    format!(
        "Earlier searches left knowledge gaps for the research topic below. Write at most \
         {count} follow-up web search queries that close these gaps.\n\
         \n\
         Knowledge gaps:\n{gaps_block}\n\
         {suggested_block}\
         \n\
         The current date is {date}. Make each query self-contained.\n\
         Format your answer as JSON with keys \"query\" (list of strings) and \"rationale\".\n\
         \n\
         Topic: {question}",
        date = today(),
    )
}

pub const REFLECTION_SYSTEM: &str = "You are an expert research assistant reviewing gathered \
evidence. Reply with a single JSON object and nothing else.";

pub fn reflection(question: &str, evidence_context: &str, max_follow_ups: usize) -> String {
    format!(
        "Decide whether the evidence below is sufficient to answer the research question.\n\
         \n\
         Instructions:\n\
         - If it is sufficient, set \"is_sufficient\" to true and leave the other fields empty.\n\
         - Otherwise describe the missing information in \"knowledge_gap\" and propose at most \
         {max_follow_ups} self-contained follow-up queries in \"follow_up_queries\".\n\
         - Focus on technical details, recent developments, or claims the evidence does not cover.\n\
         \n\
         Research question: {question}\n\
         \n\
         Evidence:\n{evidence_context}"
    )
}

pub const ANSWER_SYSTEM: &str = "You are a careful research assistant. Ground every claim in \
the numbered evidence you are given and cite it with bracketed indices like [1] or [2, 3]. \
Never invent sources.";

pub fn answer(question: &str, evidence_context: &str) -> String {
    format!(
        "Write a well-structured answer to the research question using only the evidence below.\n\
         \n\
         Instructions:\n\
         - The current date is {date}.\n\
         - Cite every factual statement with the index of its evidence item, e.g. [2].\n\
         - Only cite indices that appear in the evidence list.\n\
         - If the evidence is thin, say so plainly instead of speculating.\n\
         \n\
         Research question: {question}\n\
         \n\
         Evidence:\n{evidence_context}",
        date = today(),
    )
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}
