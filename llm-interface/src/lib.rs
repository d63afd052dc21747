pub mod generator;
pub mod parser;
pub mod prompts;
pub mod provider;

pub use generator::ContentGenerator;
pub use parser::GeneratedPost;
pub use prompts::{CommentTone, PostStyle};
pub use provider::{LlmProvider, OpenRouterProvider};
