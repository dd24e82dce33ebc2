use cove_types::models::MessageAuthor;

/// State of the inline mention suggestion popup. While it is open, Enter
/// confirms the highlighted suggestion instead of submitting.
#[derive(Debug, Clone)]
pub struct MentionPopup {
    pub query: String,
    pub candidates: Vec<MessageAuthor>,
    pub selected: usize,
}

impl MentionPopup {
    pub fn select_next(&mut self) {
        if !self.candidates.is_empty() {
            self.selected = (self.selected + 1) % self.candidates.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.candidates.is_empty() {
            self.selected = (self.selected + self.candidates.len() - 1) % self.candidates.len();
        }
    }

    pub fn selection(&self) -> Option<&MessageAuthor> {
        self.candidates.get(self.selected)
    }
}

/// An in-progress mention is an `@`-prefixed final token with the cursor at
/// the end of the body. Returns the query after the `@`.
pub fn mention_query(body: &str) -> Option<&str> {
    let tail = body.rsplit(char::is_whitespace).next()?;
    tail.strip_prefix('@')
}
