use crate::parser::{self, GeneratedPost};
use crate::prompts::{self, CommentTone, PostStyle};
use crate::provider::LlmProvider;
use redscribe_core::{CoreError, LlmError};
use std::sync::Arc;
use tracing::{debug, info};

/// Drafts posts and comments through an [`LlmProvider`].
pub struct ContentGenerator {
    provider: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for ContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGenerator")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl ContentGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate_post(
        &self,
        subreddit: &str,
        topic: &str,
        style: &str,
    ) -> Result<GeneratedPost, CoreError> {
        let style = PostStyle::parse_or_default(style);
        let prompt = prompts::post_prompt(subreddit, topic, style);

        let reply = self.call(&prompt).await?;
        let post = parser::parse_post_reply(&reply, topic);

        info!(subreddit, %style, title_chars = post.title.chars().count(), "Generated post draft");
        Ok(post)
    }

    pub async fn generate_comment(
        &self,
        post_title: &str,
        post_body: &str,
        tone: &str,
    ) -> Result<String, CoreError> {
        let tone = CommentTone::parse_or_default(tone);
        let prompt = prompts::comment_prompt(post_title, post_body, tone);

        let reply = self.call(&prompt).await?;
        let comment = parser::clean_comment(&reply);
        if comment.is_empty() {
            return Err(self.empty_reply());
        }

        info!(%tone, chars = comment.chars().count(), "Generated comment draft");
        Ok(comment)
    }

    async fn call(&self, prompt: &str) -> Result<String, CoreError> {
        debug!(provider = self.provider.name(), "Calling generation provider");
        let reply = self.provider.generate(prompt).await?;
        if reply.trim().is_empty() {
            return Err(self.empty_reply());
        }
        Ok(reply)
    }

    fn empty_reply(&self) -> CoreError {
        LlmError::InvalidResponseFormat {
            provider: self.provider.name().to_string(),
        }
        .into()
    }
}
