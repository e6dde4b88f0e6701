//! Set-of-Mark (SoM) map: the mark-index -> bounds/center mapping emitted
//! by the mark engine and consumed by the action service (§3, §4.4, §6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Clickable,
    Scrollable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkEntry {
    pub center: [i64; 2],
    pub bounds: [[i64; 2]; 2],
    pub node_type: NodeType,
}

impl MarkEntry {
    pub fn width(&self) -> i64 {
        (self.bounds[1][0] - self.bounds[0][0]).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.bounds[1][1] - self.bounds[0][1]).max(0)
    }
}

/// `{"<mark>": {center, bounds, node_type}, ...}` — persisted as JSON
/// next to each marked image (`*_mapping.json`).
pub type SomMap = HashMap<String, MarkEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_example_map() {
        let json = r#"{"3": {"center":[120,400], "bounds":[[100,380],[200,420]], "node_type":"clickable"}}"#;
        let map: SomMap = serde_json::from_str(json).unwrap();
        let entry = map.get("3").unwrap();
        assert_eq!(entry.center, [120, 400]);
        assert_eq!(entry.node_type, NodeType::Clickable);
    }

    #[test]
    fn width_and_height_from_bounds() {
        let entry = MarkEntry {
            center: [150, 400],
            bounds: [[100, 380], [200, 420]],
            node_type: NodeType::Clickable,
        };
        assert_eq!(entry.width(), 100);
        assert_eq!(entry.height(), 40);
    }
}
