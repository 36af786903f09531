//! Response → human/json string formatting.
//!
//! - **Human** (default): one line per build, e.g. `1.4 #12 931ad64…`
//! - **JSON** (`--json`): the response body, pretty-printed

use buildseq_executor::Response;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format a response.
pub fn format_response(response: &Response, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => response
            .to_json_pretty()
            .unwrap_or_else(|e| format!("{{\"status\": 500, \"message\": \"{}\"}}", e)),
        OutputMode::Human => format_human(response),
    }
}

fn format_human(response: &Response) -> String {
    if !response.is_success() && response.status != 409 {
        return format!("(error {}) {}", response.status, response.message);
    }

    let series = response.series.as_deref().unwrap_or("?");
    if let Some(builds) = &response.builds {
        if builds.is_empty() {
            return format!("{} (no builds)", series);
        }
        return builds
            .iter()
            .map(|b| format!("{} #{} {}", series, b.build_number, b.commit_hash))
            .collect::<Vec<_>>()
            .join("\n");
    }

    match (response.build_number, &response.commit_hash) {
        (Some(number), Some(commit)) => {
            format!("{} #{} {} ({})", series, number, commit, response.message)
        }
        _ => response.message.clone(),
    }
}
