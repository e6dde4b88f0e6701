//! UI-hierarchy XML parsing into a generic node tree (§4.4 step 1).

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    pub class: String,
    pub package: String,
    pub resource_id: String,
    pub content_desc: String,
    pub text: String,
    pub properties: HashSet<String>,
    pub bounds: [[i64; 2]; 2],
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn center(&self) -> [i64; 2] {
        [
            (self.bounds[0][0] + self.bounds[1][0]) / 2,
            (self.bounds[0][1] + self.bounds[1][1]) / 2,
        ]
    }

    pub fn area(&self) -> i64 {
        let w = (self.bounds[1][0] - self.bounds[0][0]).max(0);
        let h = (self.bounds[1][1] - self.bounds[0][1]).max(0);
        w * h
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    /// True when a clickable node carries enough identity to be worth a
    /// mark even if it covers most of the screen (§4.4 step 2).
    pub fn has_identity(&self) -> bool {
        !self.text.is_empty() || !self.resource_id.is_empty() || !self.content_desc.is_empty()
    }
}

const BOOL_PROPERTIES: &[&str] = &[
    "clickable",
    "scrollable",
    "checkable",
    "checked",
    "enabled",
    "focusable",
    "focused",
    "long-clickable",
    "password",
    "selected",
];

/// Parse a `bounds="[x1,y1][x2,y2]"` attribute (uiautomator/uitest convention).
fn parse_bounds(raw: &str) -> [[i64; 2]; 2] {
    let nums: Vec<i64> = raw
        .split(|c: char| !c.is_ascii_digit() && c != '-')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if nums.len() < 4 {
        return [[0, 0], [0, 0]];
    }
    [[nums[0], nums[1]], [nums[2], nums[3]]]
}

/// Parse a UI-hierarchy dump into its root node forest. Returns an empty
/// forest on unparseable XML rather than erroring — callers treat a dump
/// failure the same as "no marks found".
pub fn parse(xml: &str) -> Vec<UiNode> {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };
    doc.root()
        .children()
        .filter(|n| n.is_element())
        .map(build_node)
        .collect()
}

fn build_node(elem: roxmltree::Node) -> UiNode {
    let attr = |name: &str| elem.attribute(name).unwrap_or_default().to_string();

    let mut properties = HashSet::new();
    for &prop in BOOL_PROPERTIES {
        if elem.attribute(prop) == Some("true") {
            properties.insert(prop.to_string());
        }
    }

    let children = elem
        .children()
        .filter(|n| n.is_element())
        .map(build_node)
        .collect();

    UiNode {
        class: attr("class"),
        package: attr("package"),
        resource_id: attr("resource-id"),
        content_desc: attr("content-desc"),
        text: attr("text"),
        properties,
        bounds: parse_bounds(&attr("bounds")),
        children,
    }
}
