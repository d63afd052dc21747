use crate::prompts::{CONTENT_MARKER, TITLE_MARKER};

/// Reddit rejects titles longer than this many characters.
pub const MAX_TITLE_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPost {
    pub title: String,
    pub body: String,
}

/// Splits a marked-up reply into title and body.
///
/// Both markers must be present with non-empty text after them. Anything
/// else yields the whole reply as body under a generic title about `topic`.
pub fn parse_post_reply(reply: &str, topic: &str) -> GeneratedPost {
    let reply = reply.trim();

    match (marked_title(reply), marked_content(reply)) {
        (Some(title), Some(body)) => GeneratedPost {
            title: clip_title(title),
            body: body.to_string(),
        },
        _ => GeneratedPost {
            title: clip_title(&fallback_title(topic)),
            body: reply.to_string(),
        },
    }
}

pub fn fallback_title(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        "Interesting discussion".to_string()
    } else {
        format!("Interesting discussion about {}", topic)
    }
}

pub fn clip_title(title: &str) -> String {
    title.trim().chars().take(MAX_TITLE_CHARS).collect::<String>().trim_end().to_string()
}

/// Text after `TITLE:` up to the end of that line.
fn marked_title(reply: &str) -> Option<&str> {
    let start = reply.find(TITLE_MARKER)? + TITLE_MARKER.len();
    let line = reply[start..].lines().next()?;
    let title = line.trim().trim_matches(|c| c == '*' || c == '"').trim();
    (!title.is_empty()).then_some(title)
}

/// Everything after `CONTENT:`.
fn marked_content(reply: &str) -> Option<&str> {
    let start = reply.find(CONTENT_MARKER)? + CONTENT_MARKER.len();
    let body = reply[start..].trim_start_matches('*').trim();
    (!body.is_empty()).then_some(body)
}

/// Models sometimes wrap a comment in quotes.
pub fn clean_comment(reply: &str) -> String {
    let reply = reply.trim();
    let unquoted = reply
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(reply);
    unquoted.trim().to_string()
}
