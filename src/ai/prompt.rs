//! Prompt construction shared by the direct backend, plus the SQL extractor
//! used when a model ignores the structured-output instruction.

use crate::ai::{ExplainRequest, GenerationRequest};

/// Rows of a result set included in an explanation prompt or payload.
pub const EXPLANATION_SAMPLE_ROWS: usize = 5;

pub const GENERATION_SYSTEM_PROMPT: &str = "You are an expert SQL developer. \
Generate a single read-only SQL statement for the user's question and respond \
with a JSON object containing \"sql\" and \"explanation\" keys.";

pub fn generation_prompt(request: &GenerationRequest<'_>) -> String {
    let mut prompt = format!(
        "### DATABASE SCHEMA\n{}\n\n### USER QUESTION\n{}\n",
        request.schema.trim_end(),
        request.question.trim()
    );

    if let Some(jira) = request.jira_context {
        prompt.push_str(&format!("\n### ISSUE CONTEXT\n{}\n", jira.trim()));
    }
    if let Some(extra) = request.additional_context {
        prompt.push_str(&format!("\n### ADDITIONAL CONTEXT\n{}\n", extra.trim()));
    }

    prompt.push_str(
        "\n### RULES\n\
         - Generate exactly one SELECT statement in DuckDB syntax\n\
         - Use the exact table and column names from the schema\n\
         - Use table aliases to prevent ambiguity in joins\n\
         - Never modify data: no INSERT, UPDATE, DELETE, or DDL\n",
    );

    prompt
}

pub fn explanation_prompt(request: &ExplainRequest<'_>) -> String {
    let sample = &request.rows[..request.rows.len().min(EXPLANATION_SAMPLE_ROWS)];
    let rows_json =
        serde_json::to_string_pretty(sample).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        "A user asked: \"{}\"\n\nThis SQL query was executed:\n{}\n\n\
         The first rows of the result were:\n{}\n",
        request.question.trim(),
        request.sql.trim(),
        rows_json
    );

    if let Some(jira) = request.jira_context {
        prompt.push_str(&format!("\nRelated issue context:\n{}\n", jira.trim()));
    }

    prompt.push_str(
        "\nExplain in two or three plain-English sentences what the query does \
         and what the results show. Do not repeat the SQL.",
    );

    prompt
}

/// Pulls a SQL statement out of free-form model output: fenced ```sql blocks
/// first, then bare fences, then a line scan for a SELECT-class statement.
pub fn extract_sql(content: &str) -> String {
    if let Some(start) = content.find("```sql") {
        if let Some(end) = content[start + 6..].find("```") {
            return content[start + 6..start + 6 + end].trim().to_string();
        }
    }

    if let Some(start) = content.find("```") {
        let after_fence = &content[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim().to_string();
        }
    }

    let lines: Vec<&str> = content.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let upper = line.trim().to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            let mut sql = line.trim().to_string();
            for next_line in &lines[i + 1..] {
                let next = next_line.trim();
                if next.starts_with("```") || next.is_empty() {
                    break;
                }
                sql.push(' ');
                sql.push_str(next);
                if next.ends_with(';') {
                    break;
                }
            }
            return sql;
        }
    }

    content.trim().to_string()
}
