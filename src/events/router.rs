//! Priority-ordered, single-consumer event dispatch.
//!
//! Routes are grouped by [`Priority`]; for each event the first route (in
//! priority order, then registration order) whose [`Filter`] matches runs,
//! and no other. Events nothing matches are dropped.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

use super::inbound::InboundEvent;
use crate::error::Result;

/// Handler groups, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Membership = 1,
    Commands = 2,
    Fallback = 3,
}

/// Which events a route accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    NewMembers,
    Command(&'static str),
    /// Non-command text equal to the keyword
    Keyword(String),
    /// Any non-command message with text
    Text,
    /// Any non-command message, text or not
    AnyMessage,
}

impl Filter {
    pub fn matches(&self, event: &InboundEvent) -> bool {
        match (self, event) {
            (Filter::NewMembers, InboundEvent::Join(_)) => true,
            (Filter::Command(name), InboundEvent::Command(cmd)) => cmd.name == *name,
            (Filter::Keyword(keyword), InboundEvent::Message(msg)) => {
                msg.text.as_deref().map(str::trim) == Some(keyword.as_str())
            }
            (Filter::Text, InboundEvent::Message(msg)) => msg.text.is_some(),
            (Filter::AnyMessage, InboundEvent::Message(_)) => true,
            _ => false,
        }
    }
}

pub type HandlerFn = Arc<dyn Fn(InboundEvent) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct Route {
    priority: Priority,
    filter: Filter,
    name: &'static str,
    handler: HandlerFn,
}

/// Outcome of dispatching one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled(&'static str),
    Failed(&'static str),
    Dropped,
}

#[derive(Default)]
pub struct CommandRouter {
    routes: Vec<Route>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, Fut>(mut self, priority: Priority, filter: Filter, name: &'static str, handler: F) -> Self
    where
        F: Fn(InboundEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.routes.push(Route {
            priority,
            filter,
            name,
            handler: Arc::new(move |event| -> BoxFuture<'static, Result<()>> { Box::pin(handler(event)) }),
        });
        // Stable sort keeps registration order inside a group
        self.routes.sort_by_key(|r| r.priority);
        self
    }

    /// Name of the route that would handle `event`
    pub fn select(&self, event: &InboundEvent) -> Option<&'static str> {
        self.find(event).map(|r| r.name)
    }

    fn find(&self, event: &InboundEvent) -> Option<&Route> {
        self.routes.iter().find(|r| r.filter.matches(event))
    }

    /// Run the single matching handler. Handler errors are logged here.
    pub async fn dispatch(&self, event: InboundEvent) -> Dispatch {
        let Some(route) = self.find(&event) else {
            debug!("No handler for {} event, dropping", event.kind());
            return Dispatch::Dropped;
        };

        debug!(
            "Dispatching {} event to '{}' (priority {:?})",
            event.kind(),
            route.name,
            route.priority
        );

        match (route.handler)(event).await {
            Ok(()) => Dispatch::Handled(route.name),
            Err(e) => {
                error!("Handler '{}' failed: {}", route.name, e);
                Dispatch::Failed(route.name)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
