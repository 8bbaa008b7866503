//! agent-chrome-test -- local control-plane bridge between an AI agent and a
//! pre-authenticated browser session.
//!
//! Two modes, detected from whether stdin is a terminal:
//!
//! - **interactive**: starts the bridge, prints the socket endpoint, the
//!   generated token, and the audit-log path, then waits for Ctrl-C/SIGTERM.
//! - **piped**: additionally builds the tool surface and serves MCP over
//!   stdio; every status line goes to stderr so stdout stays a clean
//!   protocol channel.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use act_bridge::{ExtensionBridge, OriginAllowlist};
use act_ledger::AuditLog;
use act_tools::{tools, McpServer, ToolContext};
use act_types::config::{Config, DEFAULT_PORT};
use act_visual::BaselineStore;

#[derive(Parser, Debug)]
#[command(
    name = "agent-chrome-test",
    version,
    about = "Bridge an AI agent to a real browser session through a browser extension"
)]
struct Cli {
    /// WebSocket listener port (loopback only)
    #[arg(long, default_value_t = DEFAULT_PORT, env = "ACT_PORT")]
    port: u16,

    /// Comma-separated origins navigation may target (loopback is always allowed)
    #[arg(long, default_value = "", env = "ACT_ALLOWED_ORIGINS")]
    allowed_origins: String,

    /// Log filter (RUST_LOG syntax)
    #[arg(long, default_value = "info", env = "ACT_LOG")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = std::io::stdin().is_terminal();

    // Logs always go to stderr; in piped mode stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let config = Config::new(cli.port, &cli.allowed_origins, cwd);
    create_state_dir(&config.state_dir)?;

    let audit = Arc::new(AuditLog::new(&config.state_dir));
    let allowlist = Arc::new(OriginAllowlist::new(config.allowed_origins.clone()));
    let bridge = ExtensionBridge::new(config.port, allowlist, Arc::clone(&audit));

    if interactive {
        bridge.on_connect(|| println!("extension connected"));
        bridge.on_disconnect(|| println!("extension disconnected"));
    }

    bridge
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("startup failed: {e}"))?;
    let port = bridge.local_port().await.unwrap_or(config.port);

    if interactive {
        println!("agent-chrome-test listening on ws://127.0.0.1:{port}");
        println!("auth token: {}", bridge.token());
        println!("audit log:  {}", audit.path().display());
        shutdown_signal().await;
        println!("shutting down");
        bridge.stop().await;
    } else {
        info!("bridge listening on ws://127.0.0.1:{port}");
        info!(token = bridge.token(), "extension auth token");

        let store = BaselineStore::new(&config.state_dir);
        let ctx = ToolContext::new(bridge.clone(), store);
        let registry = tools::build_registry(&ctx)?;
        let server = McpServer::new(registry);

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        tokio::select! {
            result = server.run(stdin, stdout) => {
                result?;
                info!("agent channel closed");
            }
            _ = shutdown_signal() => {
                info!("shutdown signal received");
            }
        }
        bridge.stop().await;
    }

    Ok(())
}

/// Create `<cwd>/.agent-chrome-test/` at mode 0o700.
fn create_state_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create state dir {}", dir.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("failed to restrict {}", dir.display()))?;
    }
    Ok(())
}

/// Resolves on SIGTERM (Unix) or Ctrl-C.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
