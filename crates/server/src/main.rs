mod config;
mod error;
mod gallery;
mod routes;
mod startup;
mod state;
mod uploads;
mod worker;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use axum::Router;
use clap::Parser;

use crate::config::ServerConfig;
use crate::gallery::ReferenceGallery;
use crate::state::AppState;
use crate::uploads::UploadStore;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    config.validate()?;
    let addr = config.bind_address()?;

    // Models are resolved and loaded before the listener exists.
    let use_case = startup::build_use_case(&config)?;
    let content_type = use_case.content_type();
    let policy = use_case.policy();

    let uploads = UploadStore::new(&config.upload_dir, config.keep_uploads)?;
    log::info!(
        "Staging uploads in {} (keep: {})",
        uploads.dir().display(),
        uploads.keeps_files()
    );
    let gallery = ReferenceGallery::new(&config.gallery_dir);
    if !gallery.dir().is_dir() {
        log::warn!(
            "Reference gallery {} does not exist; /faceswap_with_list will return 404",
            gallery.dir().display()
        );
    }

    let (worker, worker_thread) =
        worker::spawn(use_case, config.queue_depth, config.request_timeout())?;
    let state = Arc::new(AppState {
        worker,
        uploads,
        gallery,
        policy,
        content_type,
    });
    let app = routes::router(state, config.max_upload_bytes);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(serve(app, addr));
    // Dropping the runtime drops the router and with it the last worker handle.
    drop(runtime);

    if worker_thread.join().is_err() {
        log::error!("Inference worker exited abnormally");
    }
    served?;
    Ok(())
}

async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        log::error!("Failed to bind to {addr}: {e}");
        e
    })?;
    log::info!("Face swap service listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
