use probe_demo::server::{bind, create_metrics, SignalListener};
use probe_demo::{RunningService, ServiceConfig, ServiceKind};
use std::process::ExitCode;
use tracing::{error, info};

/// Pick the service from the first command-line argument
fn parse_service<I>(mut args: I) -> Result<ServiceKind, String>
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    args.next();
    match args.next() {
        Some(name) => name.parse::<ServiceKind>().map_err(|e| e.to_string()),
        None => Err("usage: probe-demo <api|worker>".to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let kind = match parse_service(std::env::args()) {
        Ok(kind) => kind,
        Err(message) => {
            eprintln!("{}", message);
            return Ok(ExitCode::FAILURE);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env(kind)?;
    info!(
        service = %kind,
        port = config.port,
        peer = config.peer_url.as_deref().unwrap_or("<unset>"),
        "Starting demo service"
    );

    let metrics = create_metrics()?;

    // Install handlers before serving so an early SIGTERM still drains
    let mut signals = match SignalListener::register() {
        Ok(signals) => signals,
        Err(e) => {
            error!(error = %e, "Failed to register signal handlers");
            return Err(e.into());
        }
    };

    let listener = match bind(config.port).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "Failed to start HTTP server");
            return Err(e.into());
        }
    };

    let running = RunningService::start(&config, metrics, listener);

    let signal = signals.recv().await;
    let outcome = running.shutdown(signal).await;

    Ok(ExitCode::from(outcome.exit_code() as u8))
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
