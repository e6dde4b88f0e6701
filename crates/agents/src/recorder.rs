//! Recorder agent: free-text durable notes (§4.6). May echo prior notes
//! verbatim when nothing new was learned.

use crate::sections::{parse_sections, section};

pub struct RecorderResponse {
    pub important_notes: String,
}

pub fn parse(raw: &str) -> RecorderResponse {
    let sections = parse_sections(raw);
    RecorderResponse {
        important_notes: section(&sections, "Important Notes").to_string(),
    }
}

pub fn build_prompt(prior_notes: &str, latest_description: &str) -> String {
    format!(
        "Prior notes:\n{prior_notes}\n\nLatest step: {latest_description}\n\n\
         Respond with an Important Notes section. If nothing new was learned, \
         repeat the prior notes verbatim.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_notes_section() {
        let raw = "### Important Notes ###\nThe login button is at the top right.";
        let response = parse(raw);
        assert_eq!(response.important_notes, "The login button is at the top right.");
    }

    #[test]
    fn missing_section_yields_empty_notes() {
        let response = parse("no headers here");
        assert_eq!(response.important_notes, "");
    }
}
