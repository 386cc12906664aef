//! Broker and event interfaces.
//!
//! A [`Broker`] is the transport that connects the bot to a chat network.
//! The kernel only needs its name, which scopes instances and preferences.
//! [`Event`] is the payload a broker produces and a plugin handler consumes;
//! the kernel routes on `broker`, `room_id` and `body` and never looks at
//! anything else.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// A messaging transport that produces events.
pub trait Broker: Send + Sync {
    /// The unique name of this broker (e.g. `"irc"`, `"slack"`).
    fn name(&self) -> &str;
}

/// A broker that carries nothing but its name.
///
/// Useful for launch configuration, management tooling and tests where the
/// actual transport lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBroker {
    name: String,
}

impl NamedBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Broker for NamedBroker {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for dyn Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Broker").field(&self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An inbound chat event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: Uuid,
    /// Name of the broker that produced the event.
    pub broker: String,
    /// Room the event was posted in.
    pub room_id: String,
    /// Author of the event.
    pub user: String,
    /// Message text; this is what instance patterns are matched against.
    pub body: String,
    /// When the broker received the event.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(
        broker: impl Into<String>,
        room_id: impl Into<String>,
        user: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            broker: broker.into(),
            room_id: room_id.into(),
            user: user.into(),
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}
