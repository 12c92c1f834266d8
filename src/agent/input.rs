//! Run input normalization

use crate::llm::Message;

/// Initial conversation of a run
///
/// A plain string becomes one user message; a message or a message list is
/// used as given.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInput(Vec<Message>);

impl RunInput {
    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }
}

impl From<&str> for RunInput {
    fn from(text: &str) -> Self {
        RunInput(vec![Message::user(text)])
    }
}

impl From<String> for RunInput {
    fn from(text: String) -> Self {
        RunInput(vec![Message::user(text)])
    }
}

impl From<&String> for RunInput {
    fn from(text: &String) -> Self {
        RunInput(vec![Message::user(text.as_str())])
    }
}

impl From<Message> for RunInput {
    fn from(message: Message) -> Self {
        RunInput(vec![message])
    }
}

impl From<Vec<Message>> for RunInput {
    fn from(messages: Vec<Message>) -> Self {
        RunInput(messages)
    }
}
