use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use log::info;
use tokio::sync::watch;

use medikeep::core::Config;
use medikeep::database::Database;
use medikeep::features::mail::HttpMailer;
use medikeep::features::reminders::ReminderScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Medikeep reminder tracker...");

    let database = Database::new(&config.database_path).await?;
    info!("Database ready at {}", config.database_path);

    let mailer = HttpMailer::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    );

    let store = Arc::new(database.clone());
    let scheduler = ReminderScheduler::new(
        store.clone(),
        store,
        Arc::new(mailer),
        Arc::new(database),
        Duration::from_secs(config.poll_interval_secs),
    )
    .progress_on_notify_failure(config.progress_on_notify_failure);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    info!(
        "Reminder delivery runs every {} seconds",
        config.poll_interval_secs
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping scheduler...");

    // Ignore the send result: the scheduler task may already be gone.
    let _ = shutdown_tx.send(true);
    scheduler_task.await?;

    info!("Goodbye");
    Ok(())
}
