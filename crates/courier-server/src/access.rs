use std::sync::Arc;

use courier_core::Id;

// Per-request access policy hook. The default allows everything; deployments
// install a function that can deny with a status and reason (429 for rate
// limits). Denials keep their chosen status, they are never downgraded.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResource {
    Sigchain,
    Message,
    Disco,
    Invite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    Get,
    Put,
    Delete,
}

#[derive(Debug, Clone)]
pub struct AccessContext {
    pub kid: Id,
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum Access {
    Allow,
    Deny { code: u16, message: String },
}

impl Access {
    pub fn allow() -> Self {
        Access::Allow
    }

    pub fn deny_too_many_requests(message: impl Into<String>) -> Self {
        Access::Deny {
            code: 429,
            message: message.into(),
        }
    }
}

pub type AccessFn =
    Arc<dyn Fn(&AccessContext, AccessResource, AccessAction) -> Access + Send + Sync>;

pub fn allow_all() -> AccessFn {
    Arc::new(|_, _, _| Access::Allow)
}
