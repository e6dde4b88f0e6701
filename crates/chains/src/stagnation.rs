//! Stagnation checker: Jaccard similarity over UI-hierarchy token sets,
//! used to confirm or override a reflector's "no change" verdict (§4.8).

use std::collections::{HashMap, HashSet};

use sa_perception::hierarchy::{self, UiNode};

/// Extract one token per node in the plurality package, of the form
/// `class|resource-id|text[:80]|content-desc[:80]|bounds|flags`.
pub fn tokenize(xml: &str) -> HashSet<String> {
    let roots = hierarchy::parse(xml);
    let mut all_nodes = Vec::new();
    for root in &roots {
        collect(root, &mut all_nodes);
    }
    let plurality_package = plurality_package(&all_nodes);

    all_nodes
        .iter()
        .filter(|n| n.package == plurality_package)
        .map(|n| token_for(n))
        .collect()
}

fn collect<'a>(node: &'a UiNode, out: &mut Vec<&'a UiNode>) {
    out.push(node);
    for child in &node.children {
        collect(child, out);
    }
}

fn plurality_package(nodes: &[&UiNode]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in nodes {
        *counts.entry(node.package.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(package, _)| package.to_string())
        .unwrap_or_default()
}

fn token_for(node: &UiNode) -> String {
    let truncate = |s: &str| s.chars().take(80).collect::<String>();
    let mut flags: Vec<&str> = node.properties.iter().map(String::as_str).collect();
    flags.sort_unstable();
    format!(
        "{}|{}|{}|{}|{:?}|{}",
        node.class,
        node.resource_id,
        truncate(&node.text),
        truncate(&node.content_desc),
        node.bounds,
        flags.join(","),
    )
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Returns `(similarity, confirmed)` where `confirmed` means the two
/// dumps are similar enough (`>= threshold`) to call it genuine
/// stagnation rather than a pessimistic reflector verdict.
pub fn check(xml_before: &str, xml_after: &str, threshold: f64) -> (f64, bool) {
    let before = tokenize(xml_before);
    let after = tokenize(xml_after);
    let similarity = jaccard(&before, &after);
    (similarity, similarity >= threshold)
}
