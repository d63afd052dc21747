use chrono::{DateTime, Utc};
use redscribe_core::storage::{keys, load_json, save_json};
use redscribe_core::{
    ActionKind, ActionRecord, AnalyticsCounters, Clock, CoreError, ErrorExt, KeyValueStore,
    UserInfo,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Records older than this are dropped; it covers the longest cap window.
const RETENTION_HOURS: i64 = 24;
/// Display history only. Cap counting keeps every success in the window.
const MAX_RECORDS: usize = 1000;

#[derive(Debug, Default)]
struct ActivityState {
    records: VecDeque<ActionRecord>,
    successes: VecDeque<(ActionKind, DateTime<Utc>)>,
    counters: AnalyticsCounters,
}

/// Snapshot handed to the user as a downloadable JSON document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsExport {
    pub analytics: AnalyticsCounters,
    pub user_info: Option<UserInfo>,
    pub recent_activity: Vec<ActionRecord>,
    pub export_date: DateTime<Utc>,
}

impl AnalyticsExport {
    /// `redscribe-data-YYYY-MM-DD.json`, dated by the export.
    pub fn file_name(&self) -> String {
        format!("redscribe-data-{}.json", self.export_date.format("%Y-%m-%d"))
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Recent action history plus the persisted running totals.
pub struct ActivityLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<ActivityState>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            state: Mutex::new(ActivityState::default()),
        }
    }

    /// Restores counters saved by an earlier run.
    pub async fn load(&self) -> Result<AnalyticsCounters, CoreError> {
        let counters: AnalyticsCounters = match load_json(self.store.as_ref(), keys::ANALYTICS).await
        {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => {
                e.log_warn();
                warn!("Starting analytics from zero");
                AnalyticsCounters::default()
            }
        };
        self.state.lock().await.counters = counters.clone();
        Ok(counters)
    }

    /// Appends `record`, updates the counters and persists them.
    pub async fn record(&self, record: ActionRecord) -> Result<(), CoreError> {
        let counters = {
            let mut state = self.state.lock().await;
            state.counters.apply(&record);
            if record.is_success() {
                state.successes.push_back((record.kind, record.timestamp));
            }
            state.records.push_back(record);

            let cutoff = self.clock.now() - chrono::Duration::hours(RETENTION_HOURS);
            while let Some(oldest) = state.records.front() {
                if oldest.timestamp < cutoff || state.records.len() > MAX_RECORDS {
                    state.records.pop_front();
                } else {
                    break;
                }
            }
            while state
                .successes
                .front()
                .is_some_and(|(_, timestamp)| *timestamp < cutoff)
            {
                state.successes.pop_front();
            }
            state.counters.clone()
        };

        save_json(self.store.as_ref(), keys::ANALYTICS, &counters).await?;
        debug!(?counters, "Analytics updated");
        Ok(())
    }

    pub async fn count_successes(&self, kind: ActionKind, since: DateTime<Utc>) -> u32 {
        self.state
            .lock()
            .await
            .successes
            .iter()
            .filter(|(success_kind, timestamp)| *success_kind == kind && *timestamp > since)
            .count() as u32
    }

    /// Newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ActionRecord> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn counters(&self) -> AnalyticsCounters {
        self.state.lock().await.counters.clone()
    }

    /// Counters, retained history (newest first) and `user`, stamped now.
    pub async fn export(&self, user: Option<&UserInfo>) -> AnalyticsExport {
        let state = self.state.lock().await;
        AnalyticsExport {
            analytics: state.counters.clone(),
            user_info: user.cloned(),
            recent_activity: state.records.iter().rev().cloned().collect(),
            export_date: self.clock.now(),
        }
    }
}
