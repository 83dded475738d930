//! HTML view of a conversation.
//!
//! A pure function of the message records: the same records always produce
//! the same markup, which is what makes reload and export consistent.

use crate::attachment::AttachmentKind;
use crate::history::{MessageRecord, Role};
use crate::render::{Block, Inline};
use crate::suggestion::Suggestion;

pub const WELCOME_HEADING: &str = "How can I help you today?";
pub const WELCOME_BODY: &str =
    "I'm your AI assistant capable of text chat, image analysis, and CSV data processing.";

/// Render the whole message container.
pub fn to_html(records: &[MessageRecord]) -> String {
    if records.is_empty() {
        return welcome_html();
    }
    records.iter().map(message_html).collect()
}

pub fn welcome_html() -> String {
    let mut html = String::from("<div class=\"welcome-message\">");
    html.push_str(&format!("<h2>{}</h2>", escape_html(WELCOME_HEADING)));
    html.push_str(&format!("<p>{}</p>", escape_html(WELCOME_BODY)));
    html.push_str("<div class=\"quick-suggestions\">");
    for suggestion in Suggestion::all() {
        html.push_str(&format!(
            "<div class=\"suggestion-card\" data-suggestion=\"{}\"><h3>{}</h3><p>{}</p></div>",
            suggestion.as_str(),
            escape_html(suggestion.title()),
            escape_html(suggestion.description()),
        ));
    }
    html.push_str("</div></div>");
    html
}

pub fn message_html(record: &MessageRecord) -> String {
    let (class, avatar) = match record.role {
        Role::User => ("user-message", "user"),
        Role::Bot => ("bot-message", "robot"),
    };

    let mut html = format!(
        "<div class=\"message {}\"><div class=\"message-avatar\"><i class=\"fas fa-{}\"></i></div><div class=\"message-content\">",
        class, avatar
    );
    for block in record.blocks() {
        html.push_str(&block_html(&block));
    }
    if let Some(note) = &record.attachment {
        if note.kind == AttachmentKind::Image {
            html.push_str(&format!(
                "<div class=\"file-preview-container\"><span class=\"file-preview\">{}</span></div>",
                escape_html(&note.name)
            ));
        }
    }
    html.push_str(&format!(
        "<div class=\"timestamp\">{}</div></div></div>",
        escape_html(&record.time_label())
    ));
    html
}

fn block_html(block: &Block) -> String {
    match block {
        Block::Paragraph(spans) => format!("<p>{}</p>", inline_html(spans)),
        Block::List(items) => {
            let items: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", inline_html(item)))
                .collect();
            format!("<ul>{}</ul>", items)
        }
        Block::Code(code) => format!("<pre><code>{}</code></pre>", escape_html(code)),
        Block::Image { alt, src } => format!(
            "<div class=\"chart-container\"><img src=\"{}\" alt=\"{}\"></div>",
            escape_html(src),
            escape_html(alt)
        ),
    }
}

fn inline_html(spans: &[Inline]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Inline::Text(s) => escape_html(s),
            Inline::Strong(inner) => format!("<strong>{}</strong>", inline_html(inner)),
            Inline::Emphasis(inner) => format!("<em>{}</em>", inline_html(inner)),
            Inline::Code(s) => format!("<code>{}</code>", escape_html(s)),
        })
        .collect()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{load_history, save_history, AttachmentNote};
    use crate::session::SessionId;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    #[test]
    fn empty_conversation_is_exactly_one_welcome_block() {
        let html = to_html(&[]);
        assert_eq!(html.matches("class=\"welcome-message\"").count(), 1);
        assert_eq!(html.matches("class=\"suggestion-card\"").count(), 3);
        assert!(html.contains("data-suggestion=\"csv\""));
    }

    #[test]
    fn messages_have_avatar_content_and_timestamp() {
        let html = to_html(&[MessageRecord::user("hi"), MessageRecord::bot("**hello**")]);
        assert!(!html.contains("welcome-message"));
        assert!(html.starts_with("<div class=\"message user-message\">"));
        assert!(html.contains("<p><strong>hello</strong></p>"));
        assert_eq!(html.matches("class=\"timestamp\"").count(), 2);
    }

    #[test]
    fn text_is_escaped() {
        let html = to_html(&[MessageRecord::bot("<script>alert(1)</script>\n```\n<b>\n```")]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<pre><code>&lt;b&gt;\n</code></pre>"));
    }

    #[test]
    fn code_nests_inside_strong() {
        let html = to_html(&[MessageRecord::bot("**a `b` c**")]);
        assert!(html.contains("<strong>a <code>b</code> c</strong>"));
    }

    #[test]
    fn image_attachments_get_a_preview_slot() {
        let record = MessageRecord::user("[cat.png]").with_attachment(AttachmentNote {
            name: "cat.png".to_string(),
            kind: AttachmentKind::Image,
        });
        assert!(to_html(&[record]).contains("file-preview-container"));
    }

    #[test]
    fn persist_then_reload_reproduces_markup() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let session = SessionId::from("user_roundtrip");
        let records = vec![
            MessageRecord::user("Analyze\n[data.csv]"),
            MessageRecord::bot("1. first\n2. *second*\n![Chart](data:image/png;base64,QUJD)"),
        ];
        let before = to_html(&records);

        save_history(&store, &session, &records).unwrap();
        let reloaded = load_history(&store, &session).unwrap();

        assert_eq!(to_html(&reloaded), before);
    }
}
