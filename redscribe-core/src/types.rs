use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

const REDACTED: &str = "[redacted]";

/// How a session obtains its first token pair.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    Password { username: String, password: String },
    AuthorizationCode { code: String, redirect_uri: String },
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &REDACTED)
                .finish(),
            Grant::AuthorizationCode { redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("code", &REDACTED)
                .field("redirect_uri", redirect_uri)
                .finish(),
        }
    }
}

/// Session credentials. Replaced wholesale on re-authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub grant: Grant,
}

impl Credentials {
    pub fn password(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant: Grant::Password {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    pub fn authorization_code(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant: Grant::AuthorizationCode {
                code: code.into(),
                redirect_uri: redirect_uri.into(),
            },
        }
    }

    /// Name of the first empty required field, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        if self.client_id.trim().is_empty() {
            return Some("client_id");
        }
        if self.client_secret.trim().is_empty() {
            return Some("client_secret");
        }
        match &self.grant {
            Grant::Password { username, password } => {
                if username.trim().is_empty() {
                    Some("username")
                } else if password.is_empty() {
                    Some("password")
                } else {
                    None
                }
            }
            Grant::AuthorizationCode { code, redirect_uri } => {
                if code.trim().is_empty() {
                    Some("code")
                } else if redirect_uri.trim().is_empty() {
                    Some("redirect_uri")
                } else {
                    None
                }
            }
        }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.grant {
            Grant::Password { username, .. } => Some(username),
            Grant::AuthorizationCode { .. } => None,
        }
    }

    /// The subset that is safe to keep on disk for pre-filling forms.
    pub fn to_saved(&self) -> SavedCredentials {
        SavedCredentials {
            username: self.username().map(str::to_string),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .field("grant", &self.grant)
            .finish()
    }
}

/// Persisted credential fields. Never includes a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCredentials {
    pub username: Option<String>,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for SavedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedCredentials")
            .field("username", &self.username)
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .finish()
    }
}

/// OAuth token pair as issued by the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub obtained_at: DateTime<Utc>,
    pub expires_in_seconds: u64,
    #[serde(default)]
    pub scope: Vec<String>,
}

impl TokenPair {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.obtained_at + chrono::Duration::seconds(self.expires_in_seconds as i64)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.obtained_at
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &REDACTED)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| REDACTED),
            )
            .field("obtained_at", &self.obtained_at)
            .field("expires_in_seconds", &self.expires_in_seconds)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub link_karma: i64,
    pub comment_karma: i64,
    pub created_utc: f64,
    pub is_gold: bool,
}

impl UserInfo {
    pub fn total_karma(&self) -> i64 {
        self.link_karma + self.comment_karma
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSort {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl ListingSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSort::Hot => "hot",
            ListingSort::New => "new",
            ListingSort::Top => "top",
            ListingSort::Rising => "rising",
        }
    }
}

impl fmt::Display for ListingSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub id: String,
    /// Typed id (`t3_...`), used as the parent of a comment.
    pub name: String,
    pub title: String,
    pub selftext: String,
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    pub ups: i64,
    pub num_comments: u64,
    pub created_utc: f64,
    pub stickied: bool,
    pub locked: bool,
}

impl RedditPost {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_utc as i64, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostId {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentId {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Post,
    Comment,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Post => f.write_str("post"),
            ActionKind::Comment => f.write_str("comment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionOutcome {
    Success,
    Failure { code: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub kind: ActionKind,
    pub subreddit: Option<String>,
    pub title: Option<String>,
    pub outcome: ActionOutcome,
    pub timestamp: DateTime<Utc>,
    pub karma_delta: i64,
}

impl ActionRecord {
    pub fn success(
        kind: ActionKind,
        subreddit: impl Into<String>,
        title: impl Into<String>,
        karma_delta: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subreddit: Some(subreddit.into()),
            title: Some(title.into()),
            outcome: ActionOutcome::Success,
            timestamp,
            karma_delta,
        }
    }

    pub fn failure(
        kind: ActionKind,
        subreddit: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subreddit,
            title: None,
            outcome: ActionOutcome::Failure {
                code: code.into(),
                message: message.into(),
            },
            timestamp,
            karma_delta: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Success)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsCounters {
    pub posts_generated: u64,
    pub comments_generated: u64,
    pub karma_gained: i64,
    pub failed_actions: u64,
}

impl AnalyticsCounters {
    pub fn apply(&mut self, record: &ActionRecord) {
        match (&record.outcome, record.kind) {
            (ActionOutcome::Success, ActionKind::Post) => self.posts_generated += 1,
            (ActionOutcome::Success, ActionKind::Comment) => self.comments_generated += 1,
            (ActionOutcome::Failure { .. }, _) => self.failed_actions += 1,
        }
        self.karma_gained += record.karma_delta;
    }
}

/// Timing and volume limits for automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationPolicy {
    pub post_interval_secs: u64,
    pub comment_interval_secs: u64,
    pub max_posts_per_day: u32,
    pub max_comments_per_hour: u32,
    pub natural_delay_min_secs: u64,
    pub natural_delay_max_secs: u64,
    pub post_warmup_secs: u64,
    pub comment_warmup_secs: u64,
}

impl Default for AutomationPolicy {
    fn default() -> Self {
        Self {
            post_interval_secs: 6 * 60 * 60,
            comment_interval_secs: 30 * 60,
            max_posts_per_day: 4,
            max_comments_per_hour: 10,
            natural_delay_min_secs: 30,
            natural_delay_max_secs: 120,
            post_warmup_secs: 5,
            comment_warmup_secs: 10,
        }
    }
}

impl AutomationPolicy {
    pub fn interval(&self, kind: ActionKind) -> Duration {
        match kind {
            ActionKind::Post => Duration::from_secs(self.post_interval_secs),
            ActionKind::Comment => Duration::from_secs(self.comment_interval_secs),
        }
    }

    pub fn warmup(&self, kind: ActionKind) -> Duration {
        match kind {
            ActionKind::Post => Duration::from_secs(self.post_warmup_secs),
            ActionKind::Comment => Duration::from_secs(self.comment_warmup_secs),
        }
    }

    /// Maximum successful actions within `cap_window(kind)`.
    pub fn cap(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Post => self.max_posts_per_day,
            ActionKind::Comment => self.max_comments_per_hour,
        }
    }

    pub fn cap_window(&self, kind: ActionKind) -> chrono::Duration {
        match kind {
            ActionKind::Post => chrono::Duration::hours(24),
            ActionKind::Comment => chrono::Duration::hours(1),
        }
    }

    pub fn natural_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.natural_delay_min_secs),
            Duration::from_secs(self.natural_delay_max_secs),
        )
    }
}

/// Candidate subreddits and topics the scheduler picks from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationTargets {
    pub post_subreddits: Vec<String>,
    pub post_topics: Vec<String>,
    pub post_style: String,
    pub comment_subreddits: Vec<String>,
    pub comment_tones: Vec<String>,
    pub comment_sort: ListingSort,
}

impl Default for AutomationTargets {
    fn default() -> Self {
        Self {
            post_subreddits: Vec::new(),
            post_topics: Vec::new(),
            post_style: "educational".to_string(),
            comment_subreddits: Vec::new(),
            comment_tones: vec!["helpful".to_string()],
            comment_sort: ListingSort::Hot,
        }
    }
}
