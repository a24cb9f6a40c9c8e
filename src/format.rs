//! Markdown output formatters for CLI commands

use crate::model::{CompletionCandidate, Detail, HoverResult, SearchResult, StatusReport};
use crate::scheduler::RefreshOutcome;

/// Format a RefreshOutcome as markdown
pub fn refresh(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Updated(summary) => format!(
            "Updated: {} deciders, {} experiments\n",
            summary.deciders, summary.experiments
        ),
        RefreshOutcome::Failed { reason } => format!("Refresh failed: {}\n", reason),
        RefreshOutcome::Skipped => "Refresh already in progress\n".to_string(),
    }
}

/// Format a StatusReport as markdown
pub fn status(report: &StatusReport) -> String {
    if !report.populated {
        return "Cache is empty. Run `decider-lens refresh` first.\n".to_string();
    }

    let mut md = String::new();
    md.push_str("# Cache\n\n");
    md.push_str(&format!("- Deciders: {}\n", report.deciders));
    md.push_str(&format!("- Experiments: {}\n", report.experiments));
    if let Some(updated) = &report.last_updated {
        md.push_str(&format!("- Last updated: {}\n", updated));
    }
    md
}

/// Format a SearchResult as markdown
pub fn search(result: &SearchResult) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Search: \"{}\"\n\n", result.query));

    if result.results.is_empty() {
        md.push_str("No results.\n");
    } else {
        for entry in &result.results {
            md.push_str(&format!(
                "- `{}` ({}, distance {:.2})\n",
                entry.key,
                entry.kind.as_str(),
                entry.distance,
            ));
        }
    }

    md
}

/// Format completion candidates, one per line
pub fn completions(candidates: &[CompletionCandidate]) -> String {
    candidates
        .iter()
        .map(|c| format!("{} ({})\n", c.key, c.kind.as_str()))
        .collect()
}

/// Format a Detail as markdown
pub fn detail(key: &str, detail: &Detail) -> String {
    format!(
        "# {}\n\n_{}_\n\n{}\n",
        key, detail.summary, detail.documentation
    )
}

/// Format a HoverResult as markdown
pub fn hover(result: &HoverResult) -> String {
    format!(
        "# {} ({})\n\n{}\n",
        result.key,
        result.kind.as_str(),
        result.documentation
    )
}
