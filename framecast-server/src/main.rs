//! Framecast server: entry point.
//!
//! ```text
//! framecast-server                          Stream with framecast-server.toml (or defaults)
//! framecast-server --config <path>          Load a custom config TOML
//! framecast-server --gen-config             Write default config to stdout
//! framecast-server --output-dims=1920x1080 --scale=shortestxaspect
//! framecast-server --show-fps --port 3500
//! framecast-server --relay 10.0.0.2:3501    Push the stream to a relay
//! framecast-server --log-level debug       Override the configured log level
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use framecast_server::config::{Backend, ServerConfig};
use framecast_server::service::StreamService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-server", about = "Arcade frame streaming server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-server.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Target device dimensions, WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH")]
    output_dims: Option<String>,

    /// Scale mode: none or shortestxaspect.
    #[arg(long, value_name = "MODE")]
    scale: Option<String>,

    /// Log the server frame rate once per second.
    #[arg(long)]
    show_fps: bool,

    /// TCP port viewers connect to.
    #[arg(short, long)]
    port: Option<u16>,

    /// Deliver through a relay at this address instead of serving viewers.
    #[arg(long, value_name = "ADDR")]
    relay: Option<String>,

    /// Log level, overriding the config file.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// CLI values win over the file.
    fn apply(self, config: &mut ServerConfig) {
        if let Some(dims) = self.output_dims {
            config.output.dims = dims;
        }
        if let Some(scale) = self.scale {
            config.output.scale = scale;
        }
        if self.show_fps {
            config.logging.show_fps = true;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(relay) = self.relay {
            config.network.backend = Backend::Relay;
            config.network.relay_addr = relay;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

/// Install the subscriber at `level`. Returns a handle to change the level
/// later, or `None` when `RUST_LOG` is set and pins the filter.
fn init_tracing(level: &str) -> Option<reload::Handle<EnvFilter, Registry>> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return None;
    }
    let (filter, handle) = reload::Layer::new(EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    Some(handle)
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Init tracing before loading so config warnings are visible.
    let filter = init_tracing(cli.log_level.as_deref().unwrap_or("info"));

    let mut config = ServerConfig::load(&cli.config);
    cli.apply(&mut config);
    if let Some(handle) = filter {
        handle.reload(EnvFilter::new(&config.logging.level))?;
    }

    info!("framecast-server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "source: {}x{} ({}:{}) at {} fps",
        config.source.width,
        config.source.height,
        config.source.aspect_x,
        config.source.aspect_y,
        config.source.fps
    );
    match config.network.backend {
        Backend::Direct => info!("viewer port: {}", config.network.port),
        Backend::Relay => info!("relay: {}", config.network.relay_addr),
    }

    let service = StreamService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
