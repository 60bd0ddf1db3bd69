use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, PlatformId, UserId};

/// A registered chat participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub platform_id: PlatformId,
    pub username: Option<String>,
    pub given_name: String,
    pub family_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a user. The id and timestamp are assigned by storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub platform_id: PlatformId,
    pub username: Option<String>,
    pub given_name: String,
    pub family_name: Option<String>,
    pub is_admin: bool,
}

/// A scheduled event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub location: String,
    pub created_by: PlatformId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Replace the editable fields with those from `draft`.
    pub fn apply(&mut self, draft: EventDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.event_date = draft.event_date;
        self.location = draft.location;
    }
}

/// The user-editable part of an event, as parsed from a chat payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub location: String,
}

impl EventDraft {
    pub fn created_by(self, creator: PlatformId) -> NewEvent {
        NewEvent {
            title: self.title,
            description: self.description,
            event_date: self.event_date,
            location: self.location,
            created_by: creator,
        }
    }
}

/// Fields needed to insert an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub location: String,
    pub created_by: PlatformId,
}
