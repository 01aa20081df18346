mod demo;
mod messages;

use std::sync::mpsc::{self, Receiver};
use std::thread;

pub use messages::{
    ActivationFrame, FeedMessage, Topology, TopologyConnection, TopologyMetadata, TopologyNode,
};

pub struct FeedConfig {
    pub topology_path: Option<String>,
    pub frame_interval_ms: u64,
}

/// Spawns the background feed worker. The returned receiver is drained once
/// per frame by the app; the worker never calls back into render state.
pub fn spawn_feed(config: FeedConfig) -> Receiver<FeedMessage> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        if let Err(error) = demo::run_feed(&config, &tx) {
            tracing::warn!(%error, "feed worker stopped");
        }
    });

    rx
}
