use std::collections::HashMap;
use std::fs;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;

use super::FeedConfig;
use super::messages::{
    ActivationFrame, FeedMessage, Topology, TopologyConnection, TopologyMetadata, TopologyNode,
};

const DEMO_LAYERS: [(&str, usize); 8] = [
    ("encoder.0", 48),
    ("encoder.2", 32),
    ("encoder.4", 16),
    ("encoder.6", 8),
    ("decoder.0", 8),
    ("decoder.2", 16),
    ("decoder.4", 32),
    ("decoder.6", 48),
];

pub(super) fn run_feed(config: &FeedConfig, tx: &Sender<FeedMessage>) -> Result<()> {
    let topology = match &config.topology_path {
        Some(path) => load_topology(path)?,
        None => demo_topology(),
    };

    tracing::info!(
        nodes = topology.nodes.len(),
        connections = topology.connections.len(),
        "feed: topology ready"
    );

    let node_ids: Vec<String> = topology.nodes.iter().map(|node| node.id.clone()).collect();
    if tx.send(FeedMessage::Topology(topology)).is_err() {
        return Ok(());
    }

    let interval = Duration::from_millis(config.frame_interval_ms.max(1));
    let mut frame = 0u64;
    loop {
        let activations = demo_activations(&node_ids, frame);
        let message = FeedMessage::Activations(ActivationFrame {
            frame,
            label: format!("sample {}", (frame / 40) % 10),
            activations,
        });

        if tx.send(message).is_err() {
            // Receiver dropped; the app is shutting down.
            return Ok(());
        }

        frame += 1;
        thread::sleep(interval);
    }
}

fn load_topology(path: &str) -> Result<Topology> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading topology {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing topology {path}"))
}

/// Small autoencoder-shaped network with dense connections between
/// consecutive layers, used when no topology file is supplied.
fn demo_topology() -> Topology {
    let mut rng = rand::thread_rng();
    let mut nodes = Vec::new();
    let mut connections = Vec::new();

    let mut previous_layer: Vec<String> = Vec::new();
    for (layer, width) in DEMO_LAYERS {
        let mut current_layer = Vec::with_capacity(width);
        for index in 0..width {
            let id = format!("{layer}.{index}");
            nodes.push(TopologyNode {
                id: id.clone(),
                layer: layer.to_string(),
                index,
            });
            current_layer.push(id);
        }

        for source in &previous_layer {
            for target in &current_layer {
                connections.push(TopologyConnection {
                    source: source.clone(),
                    target: target.clone(),
                    weight: rng.gen_range(-1.0..1.0),
                });
            }
        }

        previous_layer = current_layer;
    }

    Topology {
        metadata: TopologyMetadata {
            total_nodes: nodes.len(),
            total_connections: connections.len(),
        },
        nodes,
        connections,
    }
}

/// Synthetic per-node activity: a traveling wave over node order with a
/// little noise, kept in [0, 1].
fn demo_activations(node_ids: &[String], frame: u64) -> HashMap<String, f32> {
    let mut rng = rand::thread_rng();
    let time = frame as f32 * 0.08;

    node_ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let phase = index as f32 * 0.23;
            let wave = ((time - phase).sin() * 0.5 + 0.5).powi(2);
            let noise = rng.gen_range(0.0..0.1);
            (id.clone(), (wave * 0.9 + noise).clamp(0.0, 1.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_topology_connects_consecutive_layers() {
        let topology = demo_topology();
        let expected_nodes: usize = DEMO_LAYERS.iter().map(|(_, width)| width).sum();
        assert_eq!(topology.nodes.len(), expected_nodes);
        assert_eq!(topology.metadata.total_nodes, expected_nodes);

        let expected_connections: usize = DEMO_LAYERS
            .windows(2)
            .map(|pair| pair[0].1 * pair[1].1)
            .sum();
        assert_eq!(topology.connections.len(), expected_connections);
    }

    #[test]
    fn demo_activations_stay_in_unit_range() {
        let ids: Vec<String> = (0..16).map(|index| format!("n{index}")).collect();
        for frame in [0, 7, 311] {
            let activations = demo_activations(&ids, frame);
            assert_eq!(activations.len(), ids.len());
            for value in activations.values() {
                assert!((0.0..=1.0).contains(value));
            }
        }
    }
}
