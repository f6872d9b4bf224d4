use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use bridge::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LOG_FORMAT=json switches to one JSON object per line for log shippers.
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bridge=debug,msgbridge=debug,tower_http=debug".into()),
        ))
        .with(fmt_layer)
        .init();

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(port).await,
        Some(cli::Commands::Probe {
            url,
            stream,
            prompt,
            max_tokens,
        }) => handle_probe_command(&url, stream, &prompt, max_tokens).await,
        None => run_server(None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(port_override: Option<u16>) -> anyhow::Result<()> {
    let cfg = config::load()?;
    let port = port_override.unwrap_or(cfg.port);

    if !cfg.has_credential() {
        tracing::warn!("OPENAI_API_KEY is not set; /v1/messages will fail until it is");
    }
    tracing::info!(
        backend = %cfg.backend_url,
        model = %cfg.model,
        timeout_secs = cfg.request_timeout_secs,
        "bridge configured"
    );

    let state = Arc::new(AppState::new(cfg)?);
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("msgbridge listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("msgbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Send one request to a running bridge and print what comes back.
async fn handle_probe_command(
    base_url: &str,
    stream: bool,
    prompt: &str,
    max_tokens: u32,
) -> anyhow::Result<()> {
    let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));
    let body = json!({
        "model": "claude-3-5-sonnet-20241022",
        "max_tokens": max_tokens,
        "stream": stream,
        "messages": [{"role": "user", "content": prompt}],
    });

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("bridge returned {}: {}", status, text);
    }

    if !stream {
        let message: Value = resp.json().await.context("response was not JSON")?;
        for block in message["content"].as_array().into_iter().flatten() {
            match block["type"].as_str() {
                Some("thinking") => println!("[thinking] {}", block["thinking"].as_str().unwrap_or("")),
                Some("text") => println!("{}", block["text"].as_str().unwrap_or("")),
                _ => {}
            }
        }
        println!(
            "\nstop_reason={} input_tokens={} output_tokens={}",
            message["stop_reason"], message["usage"]["input_tokens"], message["usage"]["output_tokens"]
        );
        return Ok(());
    }

    let mut events = resp.bytes_stream().eventsource();
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        let event = event.context("stream interrupted")?;
        if event.data == "[DONE]" {
            break;
        }
        let Ok(value) = serde_json::from_str::<Value>(&event.data) else {
            continue;
        };
        match value["type"].as_str() {
            Some("content_block_start") if value["index"] == 0 => print!("[thinking] "),
            Some("content_block_delta") => {
                let delta = &value["delta"];
                let fragment = delta["thinking"].as_str().or(delta["text"].as_str()).unwrap_or("");
                print!("{}", fragment);
                stdout.flush().ok();
            }
            Some("content_block_stop") => println!(),
            Some("message_delta") => println!("\nstop_reason={}", value["delta"]["stop_reason"]),
            Some("error") => anyhow::bail!("stream error: {}", value["error"]["message"]),
            _ => {}
        }
    }
    Ok(())
}
