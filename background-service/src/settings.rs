use redscribe_core::storage::{keys, load_json, save_json};
use redscribe_core::{AutomationPolicy, CoreError, ErrorExt, KeyValueStore};
use tracing::{info, warn};

/// Policy saved by an earlier run, or `fallback` when there is none or it
/// no longer parses.
pub async fn load_policy(store: &dyn KeyValueStore, fallback: &AutomationPolicy) -> AutomationPolicy {
    match load_json::<AutomationPolicy, _>(store, keys::SETTINGS).await {
        Ok(Some(policy)) => {
            info!("Loaded saved automation settings");
            policy
        }
        Ok(None) => fallback.clone(),
        Err(e) => {
            e.log_warn();
            warn!("Ignoring saved automation settings");
            fallback.clone()
        }
    }
}

pub async fn save_policy(store: &dyn KeyValueStore, policy: &AutomationPolicy) -> Result<(), CoreError> {
    save_json(store, keys::SETTINGS, policy).await
}
