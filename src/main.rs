use background_service::settings::{load_policy, save_policy};
use background_service::{ActivityLog, AutomationContext, AutomationScheduler};
use database::Database;
use llm_interface::{ContentGenerator, OpenRouterProvider};
use reddit_client::{RateLimitConfig, RateLimiter, RedditClient, RedditClientConfig, TokenStore};
use redscribe_core::config::{AppConfig, Secrets};
use redscribe_core::{ActionKind, Clock, CoreError, ErrorExt, KeyValueStore, SystemClock};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "redscribe=info,reddit_client=info,background_service=info,llm_interface=info";
const DEFAULT_CONFIG_PATH: &str = "redscribe.toml";

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    info!("Starting Redscribe");

    let path = std::env::var("REDSCRIBE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = AppConfig::load(&path).inspect_err(|e| {
        e.log_error();
    })?;
    let secrets = Secrets::from_env();
    info!(?secrets, "Configuration loaded");

    let mut database = Database::new(config.storage.database_url.clone());
    database.connect().await?;
    database.run_migrations().await?;
    let database = Arc::new(database);
    let store: Arc<dyn KeyValueStore> = database.clone();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let tokens = Arc::new(
        TokenStore::new(store.clone(), clock.clone())
            .with_staleness(config.reddit.token_staleness()),
    );
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_minute(
        config.reddit.requests_per_minute,
    )));
    let reddit = Arc::new(RedditClient::new(
        RedditClientConfig::from_settings(&config.reddit),
        limiter,
        tokens,
    )?);

    if !reddit.restore_session().await? {
        match secrets.reddit_credentials() {
            Ok(credentials) => {
                reddit.authenticate(credentials).await?;
            }
            Err(e) => {
                warn!(reason = %e.user_friendly_message(), "No stored session and no credentials");
            }
        }
    }

    let authenticated = reddit.is_authenticated().await;
    let user = if authenticated {
        match reddit.get_self().await {
            Ok(user) => {
                info!(user = %user.name, karma = user.total_karma(), "Signed in to Reddit");
                Some(user)
            }
            Err(e) => {
                e.log_warn();
                None
            }
        }
    } else {
        None
    };

    let activity = Arc::new(ActivityLog::new(store.clone(), clock.clone()));
    activity.load().await?;

    let policy = load_policy(store.as_ref(), &config.automation).await;
    save_policy(store.as_ref(), &policy).await?;

    let wanted = config.daemon.enabled_kinds();
    let scheduler = match automation_key(&wanted, authenticated, &secrets) {
        Some(api_key) => {
            let provider = OpenRouterProvider::new(config.generation.clone(), api_key)?;
            let scheduler = AutomationScheduler::new(
                AutomationContext {
                    reddit: reddit.clone(),
                    content: Arc::new(ContentGenerator::new(Arc::new(provider))),
                    activity: activity.clone(),
                    clock,
                },
                policy,
                config.targets.clone(),
            );
            for kind in wanted {
                scheduler.start(kind).await;
            }
            Some(scheduler)
        }
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    if let Some(scheduler) = &scheduler {
        scheduler.stop_all().await;
    }
    info!(counters = ?activity.counters().await, "Automation stopped");

    if let Some(dir) = &config.daemon.export_dir {
        let export = activity.export(user.as_ref()).await;
        let path = std::path::Path::new(dir).join(export.file_name());
        let written = match export.to_json_pretty() {
            Ok(json) => tokio::fs::write(&path, json).await.map_err(CoreError::from),
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => info!(path = %path.display(), "Analytics exported"),
            Err(e) => {
                e.log_warn();
            }
        }
    }

    database.close().await;
    Ok(())
}

/// The generation key when automation can start; otherwise logs why not.
fn automation_key(wanted: &[ActionKind], authenticated: bool, secrets: &Secrets) -> Option<String> {
    if wanted.is_empty() {
        info!("No automation enabled in [daemon]; idling until interrupted");
        return None;
    }
    if !authenticated {
        error!("Not authenticated with Reddit; automation will not start");
        return None;
    }
    match secrets.generation_api_key() {
        Ok(api_key) => Some(api_key),
        Err(e) => {
            warn!(reason = %e.user_friendly_message(), "No generation key; automation will not start");
            None
        }
    }
}
