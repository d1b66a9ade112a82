//! In-memory coaching session: one context, one ordered message log.
//!
//! The HTTP surface is stateless (clients resend the history on every
//! `/api/chat` call), so nothing in the server holds a session. This is the
//! library-side session type for callers that embed the coach directly and
//! drive it through a [`CompletionBackend`].

use thiserror::Error;
use tracing::warn;

use crate::coach::prompts::GREETING;
use crate::coach::relay::CompletionBackend;
use crate::models::chat::{ChatContext, ChatTurn, Message, Role};

#[allow(dead_code)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please fill in all fields: missing {}", .0.join(", "))]
    IncompleteContext(Vec<&'static str>),

    #[error("Session has not been started")]
    NotStarted,

    #[error("Message cannot be empty")]
    EmptyMessage,
}

/// Append-only conversation log scoped to one user session.
///
/// `send` takes `&mut self`, so a session can never have two turns in flight.
#[allow(dead_code)]
pub struct CoachSession<B> {
    backend: B,
    context: Option<ChatContext>,
    messages: Vec<Message>,
}

#[allow(dead_code)]
impl<B: CompletionBackend> CoachSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            context: None,
            messages: Vec::new(),
        }
    }

    /// Installs the documents, clears prior history and posts the greeting.
    pub fn start(&mut self, context: ChatContext) -> Result<&Message, SessionError> {
        let missing = context.missing_fields();
        if !missing.is_empty() {
            return Err(SessionError::IncompleteContext(missing));
        }

        self.context = Some(context);
        self.messages.clear();
        Ok(self.push(Message::new(Role::Assistant, GREETING)))
    }

    /// Appends the user's message, relays the full history and appends the
    /// reply. A failed relay call becomes an assistant error message; the
    /// session stays usable afterwards.
    pub async fn send(&mut self, text: &str) -> Result<&Message, SessionError> {
        let context = self.context.as_ref().ok_or(SessionError::NotStarted)?;
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.messages.push(Message::new(Role::User, text));
        let history: Vec<ChatTurn> = self.messages.iter().map(Message::to_turn).collect();

        let reply = match self.backend.complete(&history, context).await {
            Ok(response) => Message::new(Role::Assistant, response.message),
            Err(e) => {
                warn!("Coaching turn failed: {e}");
                Message::new(
                    Role::Assistant,
                    format!(
                        "Sorry, I encountered an error: {}. Please try again.",
                        e.user_message()
                    ),
                )
            }
        };

        Ok(self.push(reply))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn context(&self) -> Option<&ChatContext> {
        self.context.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.context.is_some()
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}
