//! Reflector agent: judges the pre/post screenshot pair (§4.6).

use sa_domain::state::Outcome;

use crate::sections::{parse_sections, section};

pub struct ReflectorResponse {
    pub outcome: Outcome,
    pub error_description: String,
}

pub fn parse(raw: &str) -> ReflectorResponse {
    let sections = parse_sections(raw);
    let outcome = match section(&sections, "Outcome").trim() {
        "S" => Outcome::S,
        "B" => Outcome::B,
        "C" => Outcome::C,
        // An unparseable or missing outcome letter is treated as a
        // no-change verdict rather than silently defaulting to success.
        _ => Outcome::C,
    };
    ReflectorResponse {
        outcome,
        error_description: section(&sections, "Error Description").to_string(),
    }
}

pub fn build_prompt(last_action_description: &str) -> String {
    format!(
        "The last action was: {last_action_description}\n\
         Compare the before and after screenshots and respond with Outcome \
         (S success/partial, B wrong page, C no change) and Error Description sections.\n"
    )
}
