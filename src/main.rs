use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modevisor::{
    control, AwayMode, LogWriter, ModeRegistry, Scheduler, ServiceConfig, ServiceSession,
    Subscribe, AWAY_MODE,
};

/// House mode scheduler with an HTTP control plane.
#[derive(Parser)]
#[command(name = "modevisor", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "modevisor.toml")]
    config: PathBuf,

    /// Listen address, overrides `server.addr`.
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modevisor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut cfg = ServiceConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if let Some(addr) = cli.addr {
        cfg.server.addr = addr;
    }

    let registry = build_registry(&cfg)?;
    info!(modes = ?registry.names(), "mode registry ready");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sched = Scheduler::builder(registry)
        .with_config(cfg.scheduler.clone())
        .with_subscribers(subs)
        .build();

    let listener = TcpListener::bind(cfg.server.addr)
        .await
        .with_context(|| format!("binding {}", cfg.server.addr))?;
    info!(
        addr = %cfg.server.addr,
        auth = cfg.server.api_key.is_some(),
        "control plane listening"
    );
    let app = control::router(sched.handle(), &cfg.server);
    let server = tokio::spawn(control::serve(listener, app, sched.shutdown_token()));

    let result = sched.run().await;
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "control plane stopped with an error"),
        Err(e) => warn!(error = %e, "control plane task died"),
    }
    result?;
    info!("shutdown complete");
    Ok(())
}

fn build_registry(cfg: &ServiceConfig) -> anyhow::Result<ModeRegistry> {
    let mut registry = ModeRegistry::with_idle(cfg.idle.tick());

    if let Some(away) = &cfg.away {
        let presence = cfg
            .sessions
            .presence
            .clone()
            .context("[away] needs [sessions.presence]")?;
        let lights = cfg
            .sessions
            .lights
            .clone()
            .context("[away] needs [sessions.lights]")?;

        let presence = Arc::new(ServiceSession::new("presence", presence)?);
        let lights = Arc::new(ServiceSession::new("lights", lights)?);
        let away = Arc::new(away.clone());
        registry = registry.register(AWAY_MODE, move || {
            AwayMode::new(away.clone(), presence.clone(), lights.clone())
        });
    }
    Ok(registry)
}
