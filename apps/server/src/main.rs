#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use broker::{BrokerConfig, MemoryQueue, Normalizer, Reconciler, StateStore, Transport};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod error;
mod routes;

use cli::Cli;
use error::AppError;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    logger::init_with_debug(config.reconciler.debug);
    debug!("{config}");

    run_server(config, cli.dry_run).await
}

async fn run_server(config: BrokerConfig, dry_run: bool) -> Result<(), AppError> {
    let transport = if dry_run {
        warn!("Dry run, events are kept in memory");
        Transport::new(Arc::new(MemoryQueue::new()), &config.queue)
    } else {
        Transport::connect(&config.redis, &config.queue).await?
    };

    let addr: SocketAddr = format!("{}:{}", config.http.bind, config.http.port).parse()?;
    let normalizer = web::Data::new(Normalizer::new(config.http.confirm_timeout())?);

    let (store, store_handle) = StateStore::new(&config.intake);
    let shutdown = CancellationToken::new();
    let store_task = tokio::spawn(store.run(shutdown.clone()));

    let reconciler = Reconciler::new(store_handle.clone(), transport, config.reconciler.clone());
    let reconciler_task = tokio::spawn(reconciler.run(shutdown.clone()));

    let store_handle = web::Data::new(store_handle);
    let path = config.http.path.clone();

    info!(%addr, path = %path, queue = %config.queue.name, "Listening for states");
    let served = HttpServer::new(move || {
        App::new()
            .app_data(normalizer.clone())
            .app_data(store_handle.clone())
            .configure(routes::configure(&path))
    })
    .bind(addr)?
    .run()
    .await;

    shutdown.cancel();
    if let Err(err) = reconciler_task.await {
        warn!("Reconciler task failed: {err}");
    }
    match store_task.await {
        Ok(remaining) => info!(cached = remaining.len(), "State store stopped"),
        Err(err) => warn!("State store task failed: {err}"),
    }

    served?;
    Ok(())
}
