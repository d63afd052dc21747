//! What the scheduler needs from the outside world.
//!
//! Production wiring uses [`RedditClient`] and [`ContentGenerator`]; tests
//! substitute in-memory fakes.

use async_trait::async_trait;
use llm_interface::{ContentGenerator, GeneratedPost};
use reddit_client::RedditClient;
use redscribe_core::{CommentId, CoreError, ListingSort, PostId, RedditPost};

#[async_trait]
pub trait RedditActions: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    async fn list_posts(
        &self,
        subreddit: &str,
        sort: ListingSort,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError>;

    async fn submit_post(&self, subreddit: &str, title: &str, body: &str)
        -> Result<PostId, CoreError>;

    async fn submit_comment(&self, parent_id: &str, body: &str) -> Result<CommentId, CoreError>;
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn draft_post(
        &self,
        subreddit: &str,
        topic: &str,
        style: &str,
    ) -> Result<GeneratedPost, CoreError>;

    async fn draft_comment(
        &self,
        post_title: &str,
        post_body: &str,
        tone: &str,
    ) -> Result<String, CoreError>;
}

#[async_trait]
impl RedditActions for RedditClient {
    async fn is_authenticated(&self) -> bool {
        RedditClient::is_authenticated(self).await
    }

    async fn list_posts(
        &self,
        subreddit: &str,
        sort: ListingSort,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let page = RedditClient::list_posts(self, subreddit, sort, limit, None).await?;
        Ok(page.items)
    }

    async fn submit_post(
        &self,
        subreddit: &str,
        title: &str,
        body: &str,
    ) -> Result<PostId, CoreError> {
        RedditClient::submit_post(self, subreddit, title, body).await
    }

    async fn submit_comment(&self, parent_id: &str, body: &str) -> Result<CommentId, CoreError> {
        RedditClient::submit_comment(self, parent_id, body).await
    }
}

#[async_trait]
impl ContentSource for ContentGenerator {
    async fn draft_post(
        &self,
        subreddit: &str,
        topic: &str,
        style: &str,
    ) -> Result<GeneratedPost, CoreError> {
        self.generate_post(subreddit, topic, style).await
    }

    async fn draft_comment(
        &self,
        post_title: &str,
        post_body: &str,
        tone: &str,
    ) -> Result<String, CoreError> {
        self.generate_comment(post_title, post_body, tone).await
    }
}
