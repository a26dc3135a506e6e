//! Output formatting.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use crate::refresh::CourseStatus;
use forumsearch_core::{PostHit, RefreshOutcome};
use serde::Serialize;

/// Maximum characters of a subject shown per line
const SUBJECT_MAX_LEN: usize = 80;

/// JSON output structure for search results
#[derive(Serialize)]
pub struct JsonOutput<'a> {
    pub course: &'a str,
    pub query: &'a str,
    pub results: &'a [PostHit],
}

/// Formats search results as JSON.
pub fn format_json(course: &str, query: &str, results: &[PostHit]) -> String {
    let output = JsonOutput {
        course,
        query,
        results,
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats search results for human-readable terminal output.
pub fn format_human(query: &str, results: &[PostHit]) -> String {
    if results.is_empty() {
        return format!("No results found for \"{}\"", query);
    }

    let mut output = format!(
        "Found {} post{} for \"{}\":\n\n",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        query
    );
    for (i, hit) in results.iter().enumerate() {
        output.push_str(&format!(
            "{}. @{} {} (score: {:.4})\n",
            i + 1,
            hit.post_id,
            truncate_text(&hit.subject, SUBJECT_MAX_LEN),
            hit.score
        ));
    }
    output.trim_end().to_string()
}

/// Formats the outcome of refreshing one course.
pub fn format_refresh(course: &str, outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Unchanged => format!("{}: index up to date", course),
        RefreshOutcome::Rebuilt(report) => {
            let mut line = format!(
                "{}: indexed {} posts, {} chunks ({} reused, {} embedded) in {}ms",
                course,
                report.posts,
                report.chunks,
                report.reused_chunks,
                report.embedded_chunks,
                report.elapsed_ms
            );
            if report.failed_captions > 0 {
                line.push_str(&format!(", {} images skipped", report.failed_captions));
            }
            line
        }
    }
}

#[derive(Serialize)]
struct JsonRefresh<'a> {
    course: &'a str,
    rebuilt: bool,
    #[serde(flatten)]
    report: Option<&'a forumsearch_core::processing::RebuildReport>,
}

/// Formats refresh outcomes as JSON.
pub fn format_refresh_json(outcomes: &[(String, RefreshOutcome)]) -> String {
    let rows: Vec<JsonRefresh<'_>> = outcomes
        .iter()
        .map(|(course, outcome)| JsonRefresh {
            course,
            rebuilt: matches!(outcome, RefreshOutcome::Rebuilt(_)),
            report: match outcome {
                RefreshOutcome::Rebuilt(report) => Some(report),
                RefreshOutcome::Unchanged => None,
            },
        })
        .collect();
    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

/// Formats course statuses as a table.
pub fn format_status(statuses: &[CourseStatus]) -> String {
    if statuses.is_empty() {
        return "No registered courses".to_string();
    }

    statuses
        .iter()
        .map(|status| match (&status.embedding_model, status.posts, status.chunks) {
            (Some(model), Some(posts), Some(chunks)) => format!(
                "{}: {} ({} posts, {} chunks, {}{})",
                status.course,
                status.state,
                posts,
                chunks,
                model,
                match status.stale {
                    Some(true) => ", stale",
                    Some(false) => "",
                    None => ", no posts.json",
                }
            ),
            _ => format!("{}: not indexed", status.course),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats course statuses as JSON.
pub fn format_status_json(statuses: &[CourseStatus]) -> String {
    serde_json::to_string_pretty(statuses).unwrap_or_else(|_| "[]".to_string())
}

/// Truncates text to a maximum length, adding ellipsis if needed.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_len).collect();
    match truncated.rfind(' ') {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}
