pub mod telegram;

/// An event received from the messaging platform, already classified by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The `/start` command
    Start,
    /// The `/help` command
    Help,
    /// A plain text message that is not a command
    Text(String),
    /// Users that just joined the chat, in the order the platform lists them
    MembersJoined(Vec<Member>),
}

/// A user who joined a group chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: Option<String>,
    pub full_name: String,
}

impl Member {
    /// Username when the member has one, otherwise the full name.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.full_name)
    }
}
