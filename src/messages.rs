use crate::events::MemberInfo;
use crate::telegram::UserId;

/// Label that precedes a user id in relayed headers and welcome messages.
/// Admin commands locate their target by searching replies for it.
pub const USER_ID_MARKER: &str = "User ID: ";

pub fn welcome_message(user: &MemberInfo, phrase: &str, timeout_secs: u64) -> String {
    format!(
        "Welcome {} to the group!\n\
        Please send '{}' within {} seconds to verify, or you will be banned.\n\
        {}{}\n\
        Username: {}",
        user.display_name,
        phrase,
        timeout_secs,
        USER_ID_MARKER,
        user.user_id.0,
        handle(user.username.as_deref())
    )
}

pub fn verified_message() -> String {
    "Verification successful, welcome aboard!".to_string()
}

pub fn timeout_notice(user_id: UserId, timeout_secs: u64) -> String {
    format!(
        "User ID:{} did not verify within {} seconds and has been banned.",
        user_id.0, timeout_secs
    )
}

/// Profile sent to administrators after a member passes verification
pub fn admin_verified_notice(display_name: &str, username: Option<&str>, user_id: UserId, chat_title: &str) -> String {
    format!(
        "New member verified in {}\n\
        Name: {}\n\
        Username: {}\n\
        {}{}",
        chat_title,
        display_name,
        handle(username),
        USER_ID_MARKER,
        user_id.0
    )
}

/// Header the relay sends ahead of each forwarded private message
pub fn relay_header(user: &MemberInfo) -> String {
    format!(
        "From: {} ({})\n\
        {}{}\n\
        ------------------------\n",
        user.display_name,
        handle(user.username.as_deref()),
        USER_ID_MARKER,
        user.user_id.0
    )
}

/// MarkdownV2 link; `pack` must be a plain language pack name
pub fn language_link(pack: &str) -> String {
    format!("[Switch language](tg://setlanguage?lang={})", pack)
}

fn handle(username: Option<&str>) -> String {
    match username {
        Some(name) => format!("@{}", name),
        None => "none".to_string(),
    }
}

/// Pull the user id out of text containing [`USER_ID_MARKER`]; the id runs
/// to the end of that line.
pub fn extract_user_id(text: &str) -> Option<String> {
    let start = text.find(USER_ID_MARKER)? + USER_ID_MARKER.len();
    let id = text[start..].lines().next().unwrap_or("").trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

pub const ADMIN_GREETING: &str = "Hi Master, I am your shield.";
pub const NOT_ADMIN: &str = "You are not an administrator and cannot use me.";
pub const ADMINS_ONLY: &str = "Only administrators can use this command.";
pub const REPLY_TO_DELETE: &str = "Please reply to the message you want to delete.";
pub const RELAY_WELCOME: &str = "Hello! Send me a message and I will forward it to the administrator.";
pub const RELAY_FORWARDED: &str = "Your message was forwarded to the administrator, please wait for a reply.";
pub const RELAY_FORWARD_FAILED: &str = "Failed to forward your message.";
pub const RELAY_BLOCKED: &str = "You have been blocked and cannot use this bot.";
pub const RELAY_REPLY_SENT: &str = "Reply sent.";
pub const RELAY_REPLY_FAILED: &str = "Failed to send the reply.";
pub const RELAY_NEEDS_MARKER: &str = "Please reply to a message that contains a user ID.";
pub const BLOCKED_NOTICE: &str = "You have been blocked by the administrator.";
pub const UNBLOCKED_NOTICE: &str = "You have been unblocked by the administrator.";

pub fn blocked_confirmation(user_id: &str) -> String {
    format!("Blocked user {}", user_id)
}

pub fn unblocked_confirmation(user_id: &str) -> String {
    format!("Unblocked user {}", user_id)
}

pub fn not_blocked(user_id: &str) -> String {
    format!("User {} is not blocked", user_id)
}

pub const REPLY_TO_MUTE: &str = "Please reply to a message to mute its author.";
pub const REPLY_TO_UNMUTE: &str = "Please reply to a message to unmute its author.";
pub const REPLY_TO_MDEL: &str = "Please reply to a message; everything from it to this command will be deleted.";
pub const REPLY_TO_PIN: &str = "Please reply to the message you want to pin.";
pub const REPLY_TO_PROMOTE: &str = "Please reply to a message to make its author an administrator.";
pub const REPLY_TO_DEMOTE: &str = "Please reply to a message to remove its author's administrator rights.";
pub const MDEL_DONE: &str = "Bulk delete finished.";
pub const PINNED: &str = "Message pinned.";
pub const UNPINNED: &str = "Message unpinned.";
pub const CONTENT_REMOVED: &str = "Inappropriate content detected, the message was removed.";
pub const HELP: &str = "Guard bot commands (administrators only, most by replying to a message):\n\
    /d delete a message\n\
    /mdel delete everything from a message onwards\n\
    /ban, /unban block or unblock a user\n\
    /mute, /unmute silence or restore a member\n\
    /pin, /unpin pin a message or unpin the latest\n\
    /admin, /unadmin grant or revoke moderator rights";

pub fn muted_confirmation(name: &str) -> String {
    format!("User {} has been muted.", name)
}

pub fn unmuted_confirmation(name: &str) -> String {
    format!("User {} has been unmuted.", name)
}

pub fn promoted_confirmation(name: &str) -> String {
    format!("User {} is now an administrator.", name)
}

pub fn demoted_confirmation(name: &str) -> String {
    format!("User {} is no longer an administrator.", name)
}

pub fn deleted_confirmation(name: &str) -> String {
    format!("Message from {} deleted.", name)
}

pub fn action_failed(action: &str) -> String {
    format!("Failed to {}, please check the bot's permissions.", action)
}

pub fn ban_usage(command: &str) -> String {
    format!(
        "Please provide the user ID.\nUsage: /{} <user ID> or reply to a message containing a user ID",
        command
    )
}
