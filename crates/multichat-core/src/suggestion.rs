/// Quick-start cards offered while the chat is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggestion {
    Chat,
    Image,
    Csv,
}

impl Suggestion {
    pub fn all() -> [Suggestion; 3] {
        [Suggestion::Chat, Suggestion::Image, Suggestion::Csv]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Suggestion::Chat => "chat",
            Suggestion::Image => "image",
            Suggestion::Csv => "csv",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Suggestion::Chat => "Chat & Conversation",
            Suggestion::Image => "Image Analysis",
            Suggestion::Csv => "CSV Analysis",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Suggestion::Chat => "Have normal conversations and get information",
            Suggestion::Image => "Upload and discuss images with AI vision",
            Suggestion::Csv => "Analyze data from CSV file or URL",
        }
    }

    /// Text to prefill the input with, for suggestions that just start a conversation.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            Suggestion::Chat => Some("Hello! Tell me about yourself."),
            _ => None,
        }
    }
}
