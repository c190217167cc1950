use serde::{Deserialize, Serialize};

/// One inline button carrying opaque callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

/// Inline keyboard attached to an outgoing text message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row holding a single button.
    #[must_use]
    pub fn button(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.rows.push(vec![InlineButton {
            label: label.into(),
            data: data.into(),
        }]);
        self
    }

    /// Every callback payload, row by row.
    pub fn callback_data(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.data.as_str())
    }
}
