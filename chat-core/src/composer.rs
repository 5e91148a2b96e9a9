//! The unsent message draft.

/// Holds the text the user is typing.
///
/// The draft survives failed sends so the user can retry; it is cleared
/// only after the message service accepted the message.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    draft: String,
}

impl Composer {
    /// Create an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the draft.
    pub fn set(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Current draft text.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// The draft, if it has any non-whitespace content.
    pub fn sendable(&self) -> Option<&str> {
        if is_blank(&self.draft) {
            None
        } else {
            Some(&self.draft)
        }
    }

    /// Empty the draft.
    pub fn clear(&mut self) {
        self.draft.clear();
    }
}

/// Whether `content` is empty or whitespace only.
pub fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}
