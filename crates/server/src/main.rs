//! Civicdesk process entry point.

use std::sync::Arc;

use civicdesk_common::Config;
use civicdesk_core::{
    CodeSenderService, DbNotificationDispatcher, JwtSessionIssuer, LogCodeSender,
    NotificationDispatcherService, Services, SmtpCodeSender,
};
use civicdesk_db::repositories::NotificationRepository;
use civicdesk_queue::{SchedulerConfig, ServiceExecutor, run_scheduler};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("civicdesk=debug"));
    let json = std::env::var("CIVICDESK_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn code_sender(config: &Config) -> anyhow::Result<CodeSenderService> {
    match &config.email {
        Some(email) => {
            let sender = SmtpCodeSender::new(email, &config.portal, &config.verification)?;
            info!(smtp_host = %email.smtp_host, "Verification codes will be mailed");
            Ok(Arc::new(sender))
        }
        None => {
            warn!("No [email] section configured, verification codes are only logged");
            Ok(Arc::new(LogCodeSender))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => return Err(e.into()),
        _ => {}
    }

    init_tracing();
    info!("Starting civicdesk...");

    let config = Config::load()?;

    let db = civicdesk_db::init(&config).await?;
    civicdesk_db::migrate(&db).await?;
    let db = Arc::new(db);

    let dispatcher: NotificationDispatcherService = Arc::new(DbNotificationDispatcher::new(
        NotificationRepository::new(db.clone()),
    ));
    let services = Services::new(
        db,
        &config,
        code_sender(&config)?,
        Arc::new(JwtSessionIssuer::new(&config.auth)),
        dispatcher,
    );

    let executor = Arc::new(ServiceExecutor::new(
        services.verification.clone(),
        services.notifications.clone(),
    ));
    let scheduler = run_scheduler(&SchedulerConfig::from(&config.maintenance), executor);

    info!(portal = %config.portal.name, url = %config.portal.url, "Civicdesk is running");

    shutdown_signal().await;
    scheduler.shutdown();

    info!("Civicdesk stopped");
    Ok(())
}
