//! Tolerant `### <Section> ###`-delimited response parsing, shared by
//! every agent (§4.6): missing sections yield empty strings rather than
//! failing.

use std::collections::HashMap;

use regex::Regex;

/// Split a response into named sections keyed by header text. A
/// response with no headers at all yields an empty map.
pub fn parse_sections(raw: &str) -> HashMap<String, String> {
    let header = Regex::new(r"(?m)^\s*#{2,}\s*(.+?)\s*#{2,}\s*$").expect("static regex");
    let mut headers: Vec<(usize, usize, String)> = header
        .captures_iter(raw)
        .map(|caps| {
            let whole = caps.get(0).expect("capture 0 always present");
            (whole.start(), whole.end(), caps[1].trim().to_string())
        })
        .collect();

    let mut sections = HashMap::new();
    if headers.is_empty() {
        return sections;
    }
    headers.push((raw.len(), raw.len(), String::new()));

    for window in headers.windows(2) {
        let (_, end, name) = &window[0];
        let (start_next, _, _) = &window[1];
        if name.is_empty() {
            continue;
        }
        sections.insert(name.clone(), raw[*end..*start_next].trim().to_string());
    }
    sections
}

/// Look up a section, defaulting to an empty string when absent.
pub fn section<'a>(sections: &'a HashMap<String, String>, name: &str) -> &'a str {
    sections.get(name).map(String::as_str).unwrap_or("")
}
