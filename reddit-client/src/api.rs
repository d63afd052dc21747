use redscribe_core::{CommentId, CoreError, Page, PostId, RedditApiError, RedditPost, UserInfo};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub ups: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub over_18: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub name: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
    #[serde(default)]
    pub is_gold: bool,
}

/// Envelope Reddit wraps around `api_type=json` responses.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonEnvelope<T> {
    pub json: JsonBody<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBody<T> {
    #[serde(default)]
    pub errors: Vec<Vec<Value>>,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitData {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentData {
    pub things: Vec<RedditListingChild<ThingData>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThingData {
    pub id: String,
    pub name: String,
}

impl<T> JsonEnvelope<T> {
    /// Splits the envelope into its data, turning reported errors into
    /// `SubmissionRejected`.
    pub fn into_data(self, what: &str) -> Result<T, CoreError> {
        if !self.json.errors.is_empty() {
            return Err(RedditApiError::SubmissionRejected {
                reason: describe_errors(&self.json.errors),
            }
            .into());
        }
        self.json.data.ok_or_else(|| {
            RedditApiError::InvalidResponse {
                details: format!("{} response carried no data", what),
            }
            .into()
        })
    }
}

/// Renders `[["RATELIMIT", "you are doing that too much", "ratelimit"]]`
/// as `RATELIMIT: you are doing that too much`.
fn describe_errors(errors: &[Vec<Value>]) -> String {
    errors
        .iter()
        .map(|entry| {
            let parts: Vec<&str> = entry.iter().take(2).filter_map(Value::as_str).collect();
            parts.join(": ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// One outbound API call, rebuilt per attempt so it can be replayed after a
/// token refresh.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            form: None,
        }
    }

    pub fn post_form(path: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            form: Some(form),
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> CoreError {
    if error.is_timeout() {
        CoreError::Timeout {
            seconds: timeout.as_secs().max(1),
        }
    } else {
        CoreError::Network(error)
    }
}

pub(crate) fn invalid_response(details: impl Into<String>) -> CoreError {
    RedditApiError::InvalidResponse {
        details: details.into(),
    }
    .into()
}

/// Accepts `rust`, `r/rust` and `/r/rust/`.
pub(crate) fn normalize_subreddit(subreddit: &str) -> Result<&str, CoreError> {
    let name = subreddit.trim().trim_matches('/');
    let name = name.strip_prefix("r/").unwrap_or(name);
    if name.is_empty() || name.contains('/') {
        return Err(CoreError::InvalidInput {
            message: format!("invalid subreddit name '{}'", subreddit),
        });
    }
    Ok(name)
}

/// Comments attach to a typed id; a bare id is taken to be a post.
pub(crate) fn parent_fullname(parent_id: &str) -> String {
    let parent_id = parent_id.trim();
    if parent_id.starts_with("t1_") || parent_id.starts_with("t3_") {
        parent_id.to_string()
    } else {
        format!("t3_{}", parent_id)
    }
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            name: post_data.name,
            title: post_data.title,
            selftext: post_data.selftext,
            author: post_data.author,
            subreddit: post_data.subreddit,
            permalink: post_data.permalink,
            ups: post_data.ups,
            num_comments: post_data.num_comments,
            created_utc: post_data.created_utc,
            stickied: post_data.stickied,
            locked: post_data.locked,
        }
    }
}

impl From<RedditUserData> for UserInfo {
    fn from(user: RedditUserData) -> Self {
        Self {
            name: user.name,
            link_karma: user.link_karma,
            comment_karma: user.comment_karma,
            created_utc: user.created_utc,
            is_gold: user.is_gold,
        }
    }
}

impl From<RedditListing<RedditPostData>> for Page<RedditPost> {
    fn from(listing: RedditListing<RedditPostData>) -> Self {
        Self {
            items: listing
                .data
                .children
                .into_iter()
                .map(|child| child.data.into())
                .collect(),
            after: listing.data.after,
            before: listing.data.before,
        }
    }
}

impl From<SubmitData> for PostId {
    fn from(data: SubmitData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            url: data.url,
        }
    }
}

impl From<ThingData> for CommentId {
    fn from(thing: ThingData) -> Self {
        Self {
            id: thing.id,
            name: thing.name,
        }
    }
}
