use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use trivia_api::libtrivia::db;
use trivia_api::libtrivia::error::StoreError;
use trivia_api::libtrivia::pagination::QUESTIONS_PER_PAGE;
use trivia_api::libtrivia::quiz::ThreadRngPicker;
use trivia_api::server::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "trivia-api")]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", env = "TRIVIA_DB_PATH", default_value = "trivia.db")]
    db: PathBuf,
    #[arg(long, env = "TRIVIA_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(short, long, env = "TRIVIA_PORT", default_value = "5000")]
    port: u16,
    #[arg(long, default_value_t = QUESTIONS_PER_PAGE as u32, value_parser = clap::value_parser!(u32).range(1..))]
    page_size: u32,
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Error)]
enum Error {
    #[error("cannot open database: {0}")]
    Store(#[from] StoreError),
    #[error("server failed: {0}")]
    Io(#[from] io::Error),
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("[Setup] Cannot listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("[Setup] Shutting down");
}

/// Binds the listener; `host` may be an IP literal or a name to resolve.
async fn listen(host: &str, port: u16) -> io::Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("[Setup] Listening on {}", listener.local_addr()?);
    Ok(listener)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();
    debug!("[Setup] {:?}", args);

    let pool = db::create_or_open(&args.db)?;
    info!("[DB] Database Connection Successful!");

    let state = AppState::new(pool, args.page_size as usize, Arc::new(ThreadRngPicker));
    let listener = listen(&args.host, args.port).await?;

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listens_on_host_names_and_literals() {
        let by_name = listen("localhost", 0).await.unwrap();
        assert!(by_name.local_addr().unwrap().ip().is_loopback());
        let by_ip = listen("127.0.0.1", 0).await.unwrap();
        assert_ne!(by_ip.local_addr().unwrap().port(), 0);
    }
}
