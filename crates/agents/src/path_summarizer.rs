//! PathSummarizer agent: compresses the completed-plan log every N
//! steps (§4.6, §4.7).

use crate::sections::{parse_sections, section};

pub struct PathSummarizerResponse {
    pub summary: String,
}

pub fn parse(raw: &str) -> PathSummarizerResponse {
    let sections = parse_sections(raw);
    PathSummarizerResponse {
        summary: section(&sections, "Summary").to_string(),
    }
}

pub fn build_prompt(completed_plan_log: &[String]) -> String {
    format!(
        "Completed steps so far:\n{}\n\n\
         Respond with a Summary section. Compress the log, and for any dead-end \
         branch you explored, tag it with [Explored Component: \"<name>\", <summary>] \
         so the planner can exclude it next time.\n",
        completed_plan_log.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_section() {
        let raw = "### Summary ###\nOpened settings, then [Explored Component: \"dark mode toggle\", led nowhere]";
        let response = parse(raw);
        assert!(response.summary.contains("Explored Component"));
    }

    #[test]
    fn build_prompt_joins_log_entries() {
        let log = vec!["step one".to_string(), "step two".to_string()];
        let prompt = build_prompt(&log);
        assert!(prompt.contains("step one"));
        assert!(prompt.contains("step two"));
    }
}
