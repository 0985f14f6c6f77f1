use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::llm::Completion;
use crate::platform::{InboundEvent, Member};

pub const START_GREETING: &str = "Hello! I am your AI-powered Telegram bot. Ask me anything!";

pub const HELP_TEXT: &str = "Send me any message and I'll answer it with Gemini.\n\n\
     Commands:\n\
     /start - Say hello\n\
     /help - Show this message";

/// Greeting sent to a member who just joined the group.
pub fn welcome_text(member: &Member) -> String {
    format!(
        "👋 Welcome, @{}! 🎉 We're happy to have you here. Feel free to ask questions and enjoy your stay!",
        member.display_name()
    )
}

/// Shared application state, built once at startup
pub struct AppState {
    pub config: Config,
    completion: Arc<dyn Completion>,
}

impl AppState {
    pub fn new(config: Config, completion: Arc<dyn Completion>) -> Self {
        Self { config, completion }
    }

    /// Produce the replies for one inbound event, in send order.
    ///
    /// Completion errors are returned to the caller untouched.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<Vec<String>> {
        match event {
            InboundEvent::Start => Ok(vec![START_GREETING.to_string()]),
            InboundEvent::Help => Ok(vec![HELP_TEXT.to_string()]),
            InboundEvent::Text(text) => {
                let reply = self.completion.ask(&text).await?;
                Ok(vec![reply])
            }
            InboundEvent::MembersJoined(members) => {
                info!("{} new member(s) joined", members.len());
                Ok(members.iter().map(welcome_text).collect())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Completion double that records its inputs and answers with a fixed reply.
    pub(crate) struct StubCompletion {
        reply: std::result::Result<String, String>,
        pub seen: Mutex<Vec<String>>,
    }

    impl StubCompletion {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: &str) -> Self {
            Self {
                reply: Err(error.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Completion for StubCompletion {
        async fn ask(&self, text: &str) -> Result<String> {
            self.seen.lock().await.push(text.to_string());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => anyhow::bail!("{}", e),
            }
        }
    }

    fn state_with(stub: Arc<StubCompletion>) -> AppState {
        AppState::new(Config::default(), stub)
    }

    fn member(username: Option<&str>, full_name: &str) -> Member {
        Member {
            username: username.map(str::to_string),
            full_name: full_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_replies_with_greeting() {
        let stub = Arc::new(StubCompletion::replying("unused"));
        let state = state_with(stub.clone());

        let replies = state.handle_event(InboundEvent::Start).await.unwrap();

        assert_eq!(replies, vec![START_GREETING.to_string()]);
        assert!(stub.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_identical() {
        let state = state_with(Arc::new(StubCompletion::replying("unused")));

        let first = state.handle_event(InboundEvent::Start).await.unwrap();
        let second = state.handle_event(InboundEvent::Start).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let state = state_with(Arc::new(StubCompletion::replying("unused")));

        let replies = state.handle_event(InboundEvent::Help).await.unwrap();

        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("/start"));
        assert!(replies[0].contains("/help"));
    }

    #[tokio::test]
    async fn test_text_is_relayed_verbatim() {
        let stub = Arc::new(StubCompletion::replying("4"));
        let state = state_with(stub.clone());

        let replies = state
            .handle_event(InboundEvent::Text("What is 2+2?".to_string()))
            .await
            .unwrap();

        assert_eq!(replies, vec!["4".to_string()]);
        assert_eq!(*stub.seen.lock().await, vec!["What is 2+2?".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_not_sanitized() {
        let raw = "<b>bold</b>\n\n  trailing  ";
        let state = state_with(Arc::new(StubCompletion::replying(raw)));

        let replies = state
            .handle_event(InboundEvent::Text("format something".to_string()))
            .await
            .unwrap();

        assert_eq!(replies, vec![raw.to_string()]);
    }

    #[tokio::test]
    async fn test_completion_error_propagates() {
        let state = state_with(Arc::new(StubCompletion::failing("quota exceeded")));

        let err = state
            .handle_event(InboundEvent::Text("hi".to_string()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_welcome_each_member_in_order() {
        let state = state_with(Arc::new(StubCompletion::replying("unused")));

        let replies = state
            .handle_event(InboundEvent::MembersJoined(vec![
                member(Some("ann_l"), "Ann Lee"),
                member(None, "Bob Stone"),
            ]))
            .await
            .unwrap();

        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("Welcome"));
        assert!(replies[0].contains("@ann_l"));
        assert!(!replies[0].contains("Ann Lee"));
        assert!(replies[1].contains("Welcome"));
        assert!(replies[1].contains("@Bob Stone"));
    }

    #[tokio::test]
    async fn test_no_members_no_replies() {
        let state = state_with(Arc::new(StubCompletion::replying("unused")));

        let replies = state
            .handle_event(InboundEvent::MembersJoined(Vec::new()))
            .await
            .unwrap();

        assert!(replies.is_empty());
    }

    #[test]
    fn test_welcome_text() {
        assert_eq!(
            welcome_text(&member(Some("carol"), "Carol King")),
            "👋 Welcome, @carol! 🎉 We're happy to have you here. Feel free to ask questions and enjoy your stay!"
        );
    }
}
