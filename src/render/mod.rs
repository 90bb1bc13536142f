//! HTML rendering of transcripts and the conversation list
//!
//! All user-provided text passes through [`escape_html`] before it is placed
//! in markup.

use chrono::Local;

use crate::conversation::{Conversation, Message};

/// Escape characters with special meaning in HTML
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Display element for one message
pub fn render_message(message: &Message) -> String {
    format!(
        r#"<div class="msg {}"><div>{}</div></div>"#,
        message.who.class(),
        escape_html(&message.text)
    )
}

/// Rendered transcript of the active conversation
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    elements: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with `messages`, in order
    pub fn render(&mut self, messages: &[Message]) {
        self.elements.clear();
        for message in messages {
            self.append(message);
        }
    }

    /// Add a single message at the end
    pub fn append(&mut self, message: &Message) {
        self.elements.push(render_message(message));
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn html(&self) -> String {
        self.elements.concat()
    }
}

/// Sidebar listing every conversation with open/delete controls
pub fn render_conversation_list(conversations: &[Conversation]) -> String {
    conversations
        .iter()
        .map(|c| {
            let id = escape_html(c.id.as_str());
            format!(
                concat!(
                    r#"<div class="convo-item">"#,
                    r#"<div><strong>{title}</strong><div class="meta">{created}</div></div>"#,
                    r#"<div><button class="btn open" data-id="{id}">Open</button>"#,
                    r#"<button class="btn quiet del" data-id="{id}">Del</button></div>"#,
                    r#"</div>"#
                ),
                title = escape_html(c.display_title()),
                created = c.created.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                id = id,
            )
        })
        .collect()
}
