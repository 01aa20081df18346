mod app;
mod feed;
mod graph;
mod particles;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON topology file; when omitted a synthetic demo network is streamed
    #[arg(long)]
    topology: Option<String>,

    /// Interval between activation frames from the demo feed, in milliseconds
    #[arg(long, default_value_t = 50)]
    frame_interval_ms: u64,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let feed = feed::spawn_feed(feed::FeedConfig {
        topology_path: args.topology,
        frame_interval_ms: args.frame_interval_ms,
    });

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "rhizome-viz",
        options,
        Box::new(move |cc| Ok(Box::new(app::RhizomeApp::new(cc, feed)))),
    )
}
