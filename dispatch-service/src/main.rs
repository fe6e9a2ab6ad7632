use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use chrono::{DateTime, Utc};
use eventdesk_shared::config::DispatchConfig;
use eventdesk_shared::dispatch::{run_due_notifications, DispatchSummary};
use eventdesk_shared::sms::{HttpSmsSender, SmsSender};
use eventdesk_shared::store::dynamo::DynamoEventStore;
use eventdesk_shared::store::EventDataStore;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Dispatch Service Lambda");

    let store = Arc::new(DynamoEventStore::new().await);
    let sms = Arc::new(HttpSmsSender::from_env());
    let config = Arc::new(DispatchConfig::from_env());

    lambda_runtime::run(service_fn(|event| {
        handler(event, store.clone(), sms.clone(), config.clone())
    }))
    .await?;

    Ok(())
}

async fn handler(
    _event: LambdaEvent<CloudWatchEvent>,
    store: Arc<DynamoEventStore>,
    sms: Arc<HttpSmsSender>,
    config: Arc<DispatchConfig>,
) -> Result<(), Error> {
    info!("Dispatch service triggered");
    run_dispatch(&*store, &*sms, &config, Utc::now()).await?;
    Ok(())
}

/// One scheduled run. Only a failure to list notifications fails the
/// invocation; per-notification problems are logged and counted.
async fn run_dispatch<S, M>(
    store: &S,
    sms: &M,
    config: &DispatchConfig,
    now: DateTime<Utc>,
) -> Result<DispatchSummary, Error>
where
    S: EventDataStore + ?Sized,
    M: SmsSender + ?Sized,
{
    let summary = run_due_notifications(store, sms, config, now)
        .await
        .map_err(|e| {
            error!("Failed to scan pending notifications: {}", e);
            Error::from(format!("Failed to scan pending notifications: {}", e))
        })?;

    info!(
        "Dispatch completed. Processed {} notifications ({} failed), {} messages sent, {} failed",
        summary.notifications_processed,
        summary.notifications_failed,
        summary.messages_sent,
        summary.messages_failed
    );

    Ok(summary)
}
