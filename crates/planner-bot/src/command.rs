//! Classification of inbound text into commands, and payload parsing.

use chrono::NaiveDate;

use planner_core::messages::command_token;
use planner_core::{EventDraft, EventId, Inbound, PlannerError, PlatformId};

/// Date format accepted in chat payloads.
pub const PAYLOAD_DATE_FORMAT: &str = "%Y-%m-%d";

/// A classified inbound message. Argument strings are unparsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Events,
    MyEvents,
    Admin,
    Create(Option<String>),
    Update(Option<String>),
    AdminUsers,
    AdminStats,
    AdminMakeAdmin(Option<String>),
    AdminDeleteEvent(Option<String>),
    /// Anything unrecognised; answered with an echo.
    Text(String),
}

impl Command {
    /// Classify one message.
    ///
    /// Text whose first word is `/create` is a creation request whether or
    /// not the transport flagged it as a command.
    pub fn classify(msg: &Inbound) -> Self {
        let args = arguments(&msg.raw_text);

        if command_token(&msg.raw_text).as_deref() == Some("create") {
            return Self::Create(args);
        }
        if !msg.is_command {
            return Self::Text(msg.raw_text.clone());
        }

        let token = msg
            .command_token
            .clone()
            .or_else(|| command_token(&msg.raw_text));

        match token.as_deref() {
            Some("start") => Self::Start,
            Some("help") => Self::Help,
            Some("events") => Self::Events,
            Some("myevents") => Self::MyEvents,
            Some("admin") => Self::Admin,
            Some("create") => Self::Create(args),
            Some("update") => Self::Update(args),
            Some("admin_users") => Self::AdminUsers,
            Some("admin_stats") => Self::AdminStats,
            Some("admin_makeadmin") => Self::AdminMakeAdmin(args),
            Some("admin_delete_event") => Self::AdminDeleteEvent(args),
            _ => Self::Text(msg.raw_text.clone()),
        }
    }

    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Events => "events",
            Self::MyEvents => "myevents",
            Self::Admin => "admin",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::AdminUsers => "admin_users",
            Self::AdminStats => "admin_stats",
            Self::AdminMakeAdmin(_) => "admin_makeadmin",
            Self::AdminDeleteEvent(_) => "admin_delete_event",
            Self::Text(_) => "text",
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::Admin
                | Self::AdminUsers
                | Self::AdminStats
                | Self::AdminMakeAdmin(_)
                | Self::AdminDeleteEvent(_)
        )
    }
}

/// Everything after the first whitespace run, or `None` if empty.
fn arguments(text: &str) -> Option<String> {
    text.trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// Parse `Title|Description|YYYY-MM-DD|Location`.
pub fn parse_event_payload(args: Option<&str>) -> Result<EventDraft, PlannerError> {
    let args = args.ok_or_else(|| PlannerError::Format("missing event details".into()))?;

    let fields: Vec<&str> = args.split('|').map(str::trim).collect();
    let [title, description, date, location] = fields.as_slice() else {
        return Err(PlannerError::Format(format!(
            "expected 4 parts separated by |, got {}",
            fields.len()
        )));
    };

    if title.is_empty() {
        return Err(PlannerError::Format("title must not be empty".into()));
    }

    Ok(EventDraft {
        title: title.to_string(),
        description: description.to_string(),
        event_date: parse_event_date(date)?,
        location: location.to_string(),
    })
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_event_date(raw: &str) -> Result<NaiveDate, PlannerError> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(PlannerError::Format(format!(
            "date {raw:?} is not in YYYY-MM-DD form"
        )));
    }
    NaiveDate::parse_from_str(raw, PAYLOAD_DATE_FORMAT)
        .map_err(|_| PlannerError::Format(format!("date {raw:?} is not a valid calendar date")))
}

/// Parse `<id> Title|Description|YYYY-MM-DD|Location`.
pub fn parse_update_payload(args: Option<&str>) -> Result<(EventId, EventDraft), PlannerError> {
    let args = args.ok_or_else(|| PlannerError::Format("missing event id".into()))?;
    let (id, rest) = match args.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, Some(rest.trim())),
        None => (args, None),
    };
    let id = parse_event_id(Some(id))?;
    let draft = parse_event_payload(rest.filter(|r| !r.is_empty()))?;
    Ok((id, draft))
}

pub fn parse_event_id(args: Option<&str>) -> Result<EventId, PlannerError> {
    let raw = args.ok_or_else(|| PlannerError::Format("missing event id".into()))?;
    raw.parse()
        .map_err(|_| PlannerError::Format(format!("{raw:?} is not an event id")))
}

pub fn parse_platform_id(args: Option<&str>) -> Result<PlatformId, PlannerError> {
    let raw = args.ok_or_else(|| PlannerError::Format("missing user id".into()))?;
    raw.parse()
        .map_err(|_| PlannerError::Format(format!("{raw:?} is not a user id")))
}
