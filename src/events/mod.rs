pub mod inbound;
pub mod router;

pub use inbound::{
    CommandEvent, InboundEvent, JoinEvent, MemberInfo, MessageContext, ReplyTarget, TextEvent,
};
pub use router::{CommandRouter, Dispatch, Filter, Priority};
