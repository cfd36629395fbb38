//! REST paths, relative to the configured base URL.

pub const CHATS: &str = "/chat";
pub const AGENTS: &str = "/agents";
pub const FILE_UPLOAD: &str = "/files/upload";
pub const HEALTH: &str = "/health";

pub fn chat(chat_id: &str) -> String {
    format!("/chat/{chat_id}")
}

pub fn chat_messages(chat_id: &str) -> String {
    format!("/chat/{chat_id}/messages")
}

/// Post a message into an existing chat
pub fn chat_message(chat_id: &str) -> String {
    format!("/chat/{chat_id}/message")
}

pub fn agent(agent_id: &str) -> String {
    format!("/agents/{agent_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(chat("c1"), "/chat/c1");
        assert_eq!(chat_messages("c1"), "/chat/c1/messages");
        assert_eq!(chat_message("c1"), "/chat/c1/message");
        assert_eq!(agent("a1"), "/agents/a1");
    }
}
