use std::collections::HashMap;

use serde::Deserialize;

/// One message from the feed worker, drained once per rendered frame.
pub enum FeedMessage {
    Topology(Topology),
    Activations(ActivationFrame),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TopologyMetadata {
    #[serde(default)]
    pub total_nodes: usize,
    #[serde(default)]
    pub total_connections: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub layer: String,
    #[serde(default)]
    pub index: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopologyConnection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub metadata: TopologyMetadata,
    pub nodes: Vec<TopologyNode>,
    pub connections: Vec<TopologyConnection>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ActivationFrame {
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub label: String,
    pub activations: HashMap<String, f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_message_parses() {
        let raw = r#"{
            "metadata": {"total_nodes": 3, "total_connections": 2},
            "nodes": [
                {"id": "n1", "layer": "encoder.0", "index": 0},
                {"id": "n2", "layer": "encoder.0", "index": 1},
                {"id": "n3", "layer": "decoder.0", "index": 0}
            ],
            "connections": [
                {"source": "n1", "target": "n2", "weight": 0.5},
                {"source": "n2", "target": "n3", "weight": -0.9}
            ]
        }"#;

        let topology: Topology = serde_json::from_str(raw).unwrap();
        assert_eq!(topology.metadata.total_nodes, 3);
        assert_eq!(topology.nodes.len(), 3);
        assert_eq!(topology.connections.len(), 2);
        assert_eq!(topology.connections[1].weight, -0.9);
    }

    #[test]
    fn activation_frame_tolerates_missing_fields() {
        let frame: ActivationFrame =
            serde_json::from_str(r#"{"activations": {"n1": 0.8}}"#).unwrap();
        assert_eq!(frame.frame, 0);
        assert!(frame.label.is_empty());
        assert_eq!(frame.activations.get("n1"), Some(&0.8));
    }
}
