//! Interactive session command.
//!
//! Each stdin line is sent as a text frame. State transitions and inbound
//! messages are printed as they happen. EOF or Ctrl-C closes the session.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use echo_core::config::{ConfigLoader, Configurable, Validatable};
use echo_websocket::config::{ENV_PREFIX, SessionConfig};
use echo_websocket::interceptor::StaticTokenProvider;
use echo_websocket::{WebSocketMessage, WebSocketSession};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

/// Arguments for the connect command
#[derive(Parser)]
pub struct ConnectArgs {
    /// WebSocket endpoint (ws:// or wss://)
    #[arg(short, long, env = "ECHO_WS_URL")]
    pub url: Option<String>,

    /// Session configuration file (.yaml, .yml, .toml, .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Auth token added to outbound JSON messages
    #[arg(long, env = "ECHO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Extra handshake header as key=value; may be repeated
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Log message payloads (masked)
    #[arg(long)]
    pub debug: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty header name in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Builds the session configuration: file, then `ECHO_WS_*`, then flags.
fn build_config(args: &ConnectArgs) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::new()
            .load_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };
    config.apply_env_overrides(ENV_PREFIX);

    if let Some(url) = &args.url {
        config.websocket.url.clone_from(url);
    }
    config.websocket.headers.extend(args.headers.iter().cloned());
    config.websocket.debug |= args.debug;

    config.validate().context("invalid session configuration")?;
    Ok(config)
}

fn print_message(message: &WebSocketMessage) {
    match message {
        WebSocketMessage::Text(text) => println!("< {text}"),
        WebSocketMessage::Binary(data) => println!("< [{} bytes]", data.len()),
    }
}

/// Runs an interactive session until stdin closes or Ctrl-C.
pub async fn run(args: ConnectArgs) -> Result<()> {
    let config = build_config(&args)?;
    let url = config.websocket.url.clone();

    let session = WebSocketSession::builder(config)
        .token_provider(Arc::new(StaticTokenProvider::new(args.token.clone())))
        .build()?;

    info!(url = %url, "Connecting");
    session.connect();

    let outcome = interact(
        &session,
        BufReader::new(tokio::io::stdin()),
        tokio::signal::ctrl_c(),
    )
    .await;

    session.close(1000, "Client closed").await;
    session.shutdown().await;
    println!("* {}", session.state());
    outcome
}

/// Pumps `input` lines into the session and prints what comes back until
/// EOF, the session ends or `interrupt` resolves.
async fn interact<R, I>(session: &WebSocketSession, input: R, interrupt: I) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = std::io::Result<()>>,
{
    let mut states = session.subscribe_state();
    let mut incoming = session.incoming();
    let mut lines = input.lines();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            result = &mut interrupt => {
                result.context("failed to listen for Ctrl-C")?;
                info!("Interrupted");
                return Ok(());
            }
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = states.borrow_and_update().clone();
                println!("* {state}");
            }
            message = incoming.recv() => match message {
                Some(message) => print_message(&message),
                None => return Ok(()),
            },
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        session.send(WebSocketMessage::text(line)).await?;
                    }
                }
                None => {
                    info!("stdin closed");
                    return Ok(());
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args() -> ConnectArgs {
        ConnectArgs {
            url: None,
            config: None,
            token: None,
            headers: Vec::new(),
            debug: false,
        }
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Device-Id = pixel-8").unwrap(),
            ("X-Device-Id".to_string(), "pixel-8".to_string())
        );
        assert_eq!(
            parse_header("X-Empty=").unwrap(),
            ("X-Empty".to_string(), String::new())
        );
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header("=value").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("session.yaml");
        std::fs::write(
            &file,
            "websocket:\n  url: ws://from-file/ws\n  headers:\n    X-App: echo\nbuffer_capacity: 7\n",
        )
        .unwrap();

        let config = build_config(&ConnectArgs {
            url: Some("wss://from-flag/ws".to_string()),
            config: Some(file),
            headers: vec![("X-Device-Id".to_string(), "pixel-8".to_string())],
            debug: true,
            ..args()
        })
        .unwrap();

        assert_eq!(config.websocket.url, "wss://from-flag/ws");
        assert_eq!(config.websocket.headers["X-App"], "echo");
        assert_eq!(config.websocket.headers["X-Device-Id"], "pixel-8");
        assert!(config.websocket.debug);
        assert_eq!(config.buffer_capacity, 7);
    }

    #[test]
    fn test_missing_url_is_rejected() {
        // only meaningful when the environment does not supply one
        if std::env::var("ECHO_WS_URL").is_err() {
            assert!(build_config(&args()).is_err());
        }
    }

    fn idle_session() -> WebSocketSession {
        WebSocketSession::new(SessionConfig::new("ws://127.0.0.1:9/ws")).unwrap()
    }

    #[tokio::test]
    async fn test_interrupt_stops_waiting_for_input() {
        let session = idle_session();
        // stdin stand-in that never yields a line
        let (_writer, reader) = tokio::io::duplex(64);

        interact(&session, BufReader::new(reader), std::future::ready(Ok(())))
            .await
            .unwrap();
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_input_lines_are_sent_until_eof() {
        let session = idle_session();
        let mut pending = session.subscribe_pending();

        interact(
            &session,
            &b"hello\n\n  world  \n"[..],
            std::future::pending(),
        )
        .await
        .unwrap();

        pending.wait_for(|count| *count == 2).await.unwrap();
        session.shutdown().await;
    }
}
