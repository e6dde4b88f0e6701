//! Candidate selection and stable mark-index assignment (§4.4 steps 2-3).

use std::collections::HashSet;

use sa_domain::som::{MarkEntry, NodeType, SomMap};

use crate::hierarchy::UiNode;

const CLICKABLE_AREA_THRESHOLD: f64 = 0.85;

struct Candidate {
    node_type: NodeType,
    bounds: [[i64; 2]; 2],
    center: [i64; 2],
    area: i64,
    id_key: String,
}

/// Walk `roots`, select clickable/scrollable candidates, and assign
/// ascending mark indices ordered by (area ascending, lexicographic id)
/// so smaller boxes draw last and remain visible.
pub fn select_marks(
    roots: &[UiNode],
    target_package: Option<&str>,
    screen_width: u32,
    screen_height: u32,
) -> SomMap {
    let screen_area = (screen_width as i64 * screen_height as i64).max(1);
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    for root in roots {
        if let Some(pkg) = target_package {
            if !root.package.is_empty() && root.package != pkg {
                continue;
            }
        }
        walk(root, screen_area, &mut candidates, &mut seen);
    }

    candidates.sort_by(|a, b| a.area.cmp(&b.area).then_with(|| a.id_key.cmp(&b.id_key)));

    let mut map = SomMap::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        map.insert(
            (index + 1).to_string(),
            MarkEntry {
                center: candidate.center,
                bounds: candidate.bounds,
                node_type: candidate.node_type,
            },
        );
    }
    map
}

fn walk(
    node: &UiNode,
    screen_area: i64,
    out: &mut Vec<Candidate>,
    seen: &mut HashSet<(NodeType, [[i64; 2]; 2], [i64; 2])>,
) {
    let area = node.area();
    let center = node.center();

    if node.has_property("clickable")
        && (area < (CLICKABLE_AREA_THRESHOLD * screen_area as f64) as i64 || node.has_identity())
    {
        push_candidate(NodeType::Clickable, node, area, center, out, seen);
    }
    if node.has_property("scrollable") {
        push_candidate(NodeType::Scrollable, node, area, center, out, seen);
    }

    for child in &node.children {
        walk(child, screen_area, out, seen);
    }
}

fn push_candidate(
    node_type: NodeType,
    node: &UiNode,
    area: i64,
    center: [i64; 2],
    out: &mut Vec<Candidate>,
    seen: &mut HashSet<(NodeType, [[i64; 2]; 2], [i64; 2])>,
) {
    if !seen.insert((node_type, node.bounds, center)) {
        return;
    }
    let id_key = if !node.resource_id.is_empty() {
        node.resource_id.clone()
    } else if !node.content_desc.is_empty() {
        node.content_desc.clone()
    } else {
        format!("{:?}", node.bounds)
    };
    out.push(Candidate {
        node_type,
        bounds: node.bounds,
        center,
        area,
        id_key,
    });
}
