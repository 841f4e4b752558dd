// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{error, info};
use runtime_inventory::gather_runtime_info;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};

static NOTFOUND: &[u8] = b"Not found";

/// HTTP endpoint exposing aggregated container runtime information.
#[derive(Debug, Parser)]
#[command(name = "runtime-exporter", version)]
struct Args {
    /// Address the HTTP server listens on.
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: String,

    /// Address of the extraction trigger.
    #[arg(long, default_value = "127.0.0.1:3000")]
    trigger_address: String,

    /// Log level filter, overridable through RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// The `hash` query parameter defaults to true; only an explicit
/// `hash=false` disables anonymization.
fn hash_param(query: Option<&str>) -> bool {
    let Some(query) = query else {
        return true;
    };
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "hash")
        .is_none_or(|(_, value)| value != "false")
}

async fn handle_gather(
    req: &Request<hyper::body::Incoming>,
    trigger_address: &str,
) -> Result<Response<BoxBody<Bytes, std::io::Error>>> {
    let hash = hash_param(req.uri().query());

    let body = match gather_runtime_info(trigger_address, hash).await {
        Ok(body) => body,
        Err(e) => {
            error!("failed to gather runtime info: {e}");
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(
                    Full::new(Bytes::from(e.to_string()))
                        .map_err(|e| match e {})
                        .boxed(),
                )
                .map_err(|e| anyhow!("Failed to build error response: {}", e));
        }
    };

    Response::builder()
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)).map_err(|e| match e {}).boxed())
        .map_err(|e| anyhow!("Failed to build response: {}", e))
}

fn no_content() -> Result<Response<BoxBody<Bytes, std::io::Error>>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()).map_err(|e| match e {}).boxed())
        .map_err(|e| anyhow!("Failed to build no content response: {}", e))
}

fn not_found() -> Result<Response<BoxBody<Bytes, std::io::Error>>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(NOTFOUND.into()).map_err(|e| match e {}).boxed())
        .map_err(|e| anyhow!("Failed to build not found response: {}", e))
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    trigger_address: &str,
) -> Result<Response<BoxBody<Bytes, std::io::Error>>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/gather-runtime-info") => {
            info!("Handling /gather-runtime-info request");
            handle_gather(&req, trigger_address).await
        }
        (&Method::GET, "/health/live") | (&Method::GET, "/health/ready") => no_content(),
        _ => {
            info!(
                "{} Request to unknown endpoint: {}",
                req.method(),
                req.uri().path()
            );
            not_found()
        }
    }
}

async fn run_server(args: Args) -> Result<()> {
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("Listening on {}", args.bind);

    // Setup signal handlers
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    loop {
        tokio::select! {
            // Handle incoming connections
            accept_result = listener.accept() => {
                let (stream, _) = accept_result?;
                let io = TokioIo::new(stream);
                let trigger_address = args.trigger_address.clone();

                // Spawn a tokio task to serve multiple connections concurrently
                tokio::task::spawn(async move {
                    if let Err(err) = http1::Builder::new()
                        .serve_connection(
                            io,
                            service_fn(|req| {
                                let trigger_address = trigger_address.clone();
                                async move {
                                    Ok::<_, anyhow::Error>(
                                        handle_request(req, &trigger_address).await.unwrap_or_else(|e| {
                                            error!("Request handling failed: {e}");
                                            Response::builder()
                                                .status(StatusCode::INTERNAL_SERVER_ERROR)
                                                .body(
                                                    Full::new(Bytes::from(&b"Internal Server Error"[..]))
                                                        .map_err(|e| match e {})
                                                        .boxed(),
                                                )
                                                .unwrap_or_else(|_| {
                                                    // Last resort if even error response building fails
                                                    Response::new(
                                                        Full::new(Bytes::from(&b"Error"[..]))
                                                            .map_err(|e| match e {})
                                                            .boxed(),
                                                    )
                                                })
                                        }),
                                    )
                                }
                            }),
                        )
                        .await
                    {
                        error!("Error serving connection: {err}");
                    }
                });
            }
            // Handle SIGTERM
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                return Ok(());
            }
            // Handle SIGINT
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting runtime-exporter");
    run_server(args).await
}
