//! Permission sets applied with `restrictChatMember`.

use teloxide::types::ChatPermissions;

/// Text only, applied while a new member is unverified
pub fn probation() -> ChatPermissions {
    ChatPermissions::SEND_MESSAGES
}

/// Regular member rights; pinning, topics and editing chat info stay withheld
pub fn member() -> ChatPermissions {
    ChatPermissions::SEND_MESSAGES
        | ChatPermissions::SEND_MEDIA_MESSAGES
        | ChatPermissions::SEND_POLLS
        | ChatPermissions::SEND_OTHER_MESSAGES
        | ChatPermissions::ADD_WEB_PAGE_PREVIEWS
        | ChatPermissions::INVITE_USERS
}

/// Nothing at all, for `/mute`
pub fn muted() -> ChatPermissions {
    ChatPermissions::empty()
}
