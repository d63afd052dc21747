use std::fmt;
use std::str::FromStr;

pub const TITLE_MARKER: &str = "TITLE:";
pub const CONTENT_MARKER: &str = "CONTENT:";

/// Post styles. Unknown names fall back to `Educational`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostStyle {
    #[default]
    Educational,
    Discussion,
    Tutorial,
    News,
    Question,
}

impl PostStyle {
    pub const ALL: [PostStyle; 5] = [
        PostStyle::Educational,
        PostStyle::Discussion,
        PostStyle::Tutorial,
        PostStyle::News,
        PostStyle::Question,
    ];

    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStyle::Educational => "educational",
            PostStyle::Discussion => "discussion",
            PostStyle::Tutorial => "tutorial",
            PostStyle::News => "news",
            PostStyle::Question => "question",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            PostStyle::Educational => {
                "Create an educational and informative post that teaches something valuable"
            }
            PostStyle::Discussion => {
                "Create a thought-provoking discussion post that encourages engagement"
            }
            PostStyle::Tutorial => "Create a step-by-step tutorial or how-to guide",
            PostStyle::News => "Create a news or update post about recent developments",
            PostStyle::Question => "Create a genuine question post seeking community advice",
        }
    }
}

impl FromStr for PostStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(wanted))
            .ok_or(())
    }
}

impl fmt::Display for PostStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comment tones. Unknown names fall back to `Helpful`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentTone {
    #[default]
    Helpful,
    Question,
    Supportive,
    Funny,
}

impl CommentTone {
    pub const ALL: [CommentTone; 4] = [
        CommentTone::Helpful,
        CommentTone::Question,
        CommentTone::Supportive,
        CommentTone::Funny,
    ];

    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentTone::Helpful => "helpful",
            CommentTone::Question => "question",
            CommentTone::Supportive => "supportive",
            CommentTone::Funny => "funny",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            CommentTone::Helpful => "Write a helpful and informative comment that adds value",
            CommentTone::Question => {
                "Write a thoughtful follow-up question to encourage discussion"
            }
            CommentTone::Supportive => {
                "Write a supportive and agreeable comment that builds on the post"
            }
            CommentTone::Funny => "Write a witty and appropriate humorous comment",
        }
    }
}

impl FromStr for CommentTone {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(wanted))
            .ok_or(())
    }
}

impl fmt::Display for CommentTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn post_prompt(subreddit: &str, topic: &str, style: PostStyle) -> String {
    format!(
        "{instruction} for r/{subreddit} about {topic}.

Requirements:
- Create an engaging title (under 300 characters)
- Write informative content (2-4 paragraphs)
- Make it valuable to the r/{subreddit} community
- Use natural, conversational tone
- Follow Reddit best practices

Format your response as:
{TITLE_MARKER} [Your title here]

{CONTENT_MARKER}
[Your post content here]

Make it engaging and likely to receive upvotes and comments.",
        instruction = style.instruction(),
    )
}

pub fn comment_prompt(post_title: &str, post_body: &str, tone: CommentTone) -> String {
    let post_body = if post_body.trim().is_empty() {
        "No additional content"
    } else {
        post_body
    };

    format!(
        "{instruction} for this Reddit post:

Title: {post_title}
Content: {post_body}

Requirements:
- Keep it conversational and natural
- Add genuine value to the discussion
- Be appropriate for Reddit's community standards
- 1-3 sentences maximum
- Avoid being spammy or generic

Write only the comment text, nothing else.",
        instruction = tone.instruction(),
    )
}
