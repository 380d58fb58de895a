//! Framecast probe: headless viewer.
//!
//! ```text
//! framecast-probe                          Connect to 127.0.0.1:3500
//! framecast-probe --addr 10.0.0.5:3500     Connect elsewhere
//! framecast-probe --frames 300             Exit after 300 frames
//! ```
//!
//! Validates the handshake, then receives frames and logs the received
//! frame rate and throughput once per second.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecast_core::{DEFAULT_PORT, FpsMeter, StreamViewer};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-probe", about = "Headless framecast viewer")]
struct Cli {
    /// Server address.
    #[arg(short, long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    addr: SocketAddr,

    /// Stop after this many frames (0 = until the stream ends).
    #[arg(short, long, default_value_t = 0)]
    frames: u64,

    /// Give up if the handshake takes longer than this many seconds.
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-probe v{}", env!("CARGO_PKG_VERSION"));

    let connect = StreamViewer::connect(cli.addr);
    let mut viewer = tokio::time::timeout(Duration::from_secs(cli.connect_timeout), connect)
        .await
        .map_err(|_| format!("no handshake from {} in time", cli.addr))??;

    let g = *viewer.geometry();
    info!(
        peer = %viewer.peer(),
        width = g.width,
        height = g.height,
        stride = g.stride_bytes,
        total_bytes = g.total_bytes,
        format = ?g.pixel_format,
        flags = ?g.attribute_flags,
        "handshake"
    );

    let mut meter = FpsMeter::new();
    let mut received: u64 = 0;
    let mut window_bytes: u64 = 0;

    loop {
        let frame = tokio::select! {
            frame = viewer.next_frame() => frame?,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, disconnecting");
                break;
            }
        };
        let Some(frame) = frame else {
            warn!("server closed the stream");
            break;
        };

        received += 1;
        window_bytes += frame.len() as u64;
        if let Some(fps) = meter.record_frame() {
            info!(
                fps = %format_args!("{fps:.2}"),
                mib_per_s = %format_args!("{:.2}", window_bytes as f64 / (1024.0 * 1024.0)),
                frames = received,
                "receiving"
            );
            window_bytes = 0;
        }

        if cli.frames != 0 && received >= cli.frames {
            break;
        }
    }

    info!(frames = received, "probe finished");
    Ok(())
}
