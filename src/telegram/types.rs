use teloxide::types::{ChatId, MessageId, ParseMode};

/// A message to send, turned into a `sendMessage` request by the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub reply_to: Option<MessageId>,
    pub disable_web_page_preview: bool,
}

impl OutgoingMessage {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            reply_to: None,
            disable_web_page_preview: false,
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = Some(mode);
        self
    }

    pub fn without_preview(mut self) -> Self {
        self.disable_web_page_preview = true;
        self
    }
}
