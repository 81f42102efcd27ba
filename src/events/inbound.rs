//! Platform-neutral view of the updates the bots react to.

use teloxide::types::{Message, User};
use teloxide::utils::command::parse_command;

use crate::telegram::{ChatId, MessageId, UserId};

/// Who sent a message or joined a chat
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl From<&User> for MemberInfo {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            display_name: user.full_name(),
            username: user.username.clone(),
            is_bot: user.is_bot,
        }
    }
}

/// The message an event replies to
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyTarget {
    pub message_id: MessageId,
    pub text: Option<String>,
    /// Author of the replied-to message, when Telegram reports one
    pub sender: Option<MemberInfo>,
}

impl From<&Message> for ReplyTarget {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.id,
            text: message.text().or_else(|| message.caption()).map(str::to_string),
            sender: message.from.as_ref().map(MemberInfo::from),
        }
    }
}

/// Where an event happened and who caused it
#[derive(Debug, Clone, PartialEq)]
pub struct MessageContext {
    pub chat_id: ChatId,
    pub chat_title: Option<String>,
    pub is_private: bool,
    pub message_id: MessageId,
    pub sender: MemberInfo,
    pub reply_to: Option<ReplyTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinEvent {
    pub context: MessageContext,
    pub members: Vec<MemberInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    pub context: MessageContext,
    /// Lowercased command name without the slash or `@bot` suffix
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextEvent {
    pub context: MessageContext,
    /// `None` for media and other non-text messages
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Join(JoinEvent),
    Command(CommandEvent),
    Message(TextEvent),
}

impl InboundEvent {
    /// Convert a received message. Messages without a sender (channel
    /// posts) are dropped, and so are commands addressed to another bot.
    pub fn from_message(message: &Message, bot_name: &str) -> Option<Self> {
        let sender = MemberInfo::from(message.from.as_ref()?);
        let context = MessageContext {
            chat_id: message.chat.id,
            chat_title: message.chat.title().map(str::to_string),
            is_private: message.chat.is_private(),
            message_id: message.id,
            sender,
            reply_to: message.reply_to_message().map(ReplyTarget::from),
        };

        if let Some(members) = message.new_chat_members() {
            return Some(InboundEvent::Join(JoinEvent {
                context,
                members: members.iter().map(MemberInfo::from).collect(),
            }));
        }

        let text = message.text().map(str::to_string);
        if let Some(body) = text.as_deref().filter(|t| t.starts_with('/')) {
            let (name, args) = command_parts(body, bot_name)?;
            return Some(InboundEvent::Command(CommandEvent {
                context,
                name,
                args,
            }));
        }

        Some(InboundEvent::Message(TextEvent { context, text }))
    }

    pub fn context(&self) -> &MessageContext {
        match self {
            InboundEvent::Join(e) => &e.context,
            InboundEvent::Command(e) => &e.context,
            InboundEvent::Message(e) => &e.context,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Join(_) => "join",
            InboundEvent::Command(_) => "command",
            InboundEvent::Message(_) => "message",
        }
    }
}

/// `/Name@bot a b` becomes `("name", ["a", "b"])`
fn command_parts(text: &str, bot_name: &str) -> Option<(String, Vec<String>)> {
    let (name, args) = parse_command(text, bot_name)?;
    if name.is_empty() {
        return None;
    }
    Some((
        name.to_lowercase(),
        args.into_iter().map(str::to_string).collect(),
    ))
}
