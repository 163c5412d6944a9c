use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use vcp_gallery::config::GalleryConfig;
use vcp_gallery::event::LibraryWatcher;
use vcp_gallery::index::{scan_roots, PhotoLibrary};
use vcp_gallery::query::QueryServer;

#[derive(Parser)]
#[command(
    name = "vcp-gallery",
    about = "Keyset-paginated window service for large photo galleries"
)]
struct Cli {
    /// 照片根目录（可重复；覆盖配置文件）
    #[arg(long = "root")]
    roots: Vec<PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    page_limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = GalleryConfig::load();
    if !cli.roots.is_empty() {
        config.roots = cli.roots;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(limit) = cli.page_limit {
        config.page_limit = limit;
    }
    if config.roots.is_empty() {
        let fallback = dirs::picture_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/"));
        config.roots.push(fallback);
    }

    info!("starting vcp-gallery over {:?}", config.roots);

    let library = Arc::new(PhotoLibrary::new());
    let ingested = scan_roots(&library, &config.roots);
    info!("initial scan ingested {} photos", ingested);

    // 文件系统变更 → 库变更 → ChangeEvent 广播
    let overflow_drops = Arc::new(AtomicU64::new(0));
    let (mut watcher, _pump) =
        LibraryWatcher::start(library.clone(), config.event_channel_size, overflow_drops)?;
    LibraryWatcher::watch_roots(&mut watcher, &config.roots);

    let server = QueryServer::new(library.clone());
    let port = config.port;
    tokio::spawn(server.run(port));

    info!(
        "vcp-gallery ready. Browse via: http://localhost:{}/photos",
        port
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    Ok(())
}
