pub mod admin_ops;
pub mod content_filter;
pub mod membership_guard;
pub mod message_relay;
pub mod verification_registry;

pub use admin_ops::{AdminOps, SharedAdminOps};
pub use content_filter::{ContentFilter, SharedContentFilter};
pub use membership_guard::{MembershipGuard, SharedMembershipGuard};
pub use message_relay::{MessageRelay, SharedMessageRelay};
pub use verification_registry::{
    create_shared_verification_registry, PendingKey, PendingVerification,
    SharedVerificationRegistry, VerificationRegistry,
};
