//! Reply texts. Everything here is safe to show to a chat user.
//!
//! Texts use the Telegram legacy `Markdown` subset: `*bold*` and plain
//! bullets. User-supplied fields are escaped before interpolation, or
//! wrapped with [`bold`] when they sit inside an entity.

use std::fmt::Write as _;

use planner_core::{Event, PlannerError, User};

/// Display format for event dates.
pub const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y";

pub const AUTH_ERROR: &str = "Authorization error. Please try again later.";
pub const PERMISSION_DENIED: &str = "⛔ You don't have permission to do that.";
pub const NO_EVENTS: &str = "No events yet. Create one with /create";
pub const NO_OWN_EVENTS: &str = "You have no events yet. Create one with /create";
pub const NO_USERS: &str = "No registered users.";

const CREATE_USAGE: &str = "/create Title|Description|YYYY-MM-DD|Location";
const UPDATE_USAGE: &str = "/update ID Title|Description|YYYY-MM-DD|Location";

/// Escape the characters legacy Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap user text in a bold entity.
///
/// Legacy Markdown has no escapes inside an entity, so the entity is closed
/// around each markup character and the character is escaped outside it:
/// `2*2=4` becomes `*2*\**2=4*`.
pub fn bold(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    let mut run = String::new();
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            if !run.is_empty() {
                let _ = write!(out, "*{run}*");
                run.clear();
            }
            out.push('\\');
            out.push(c);
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        let _ = write!(out, "*{run}*");
    }
    out
}

pub fn welcome(given_name: &str) -> String {
    format!(
        "👋 Hello, {}!\n\n\
         I help you plan events.\n\n\
         *Commands:*\n\
         /events - all events\n\
         /myevents - events you created\n\
         /create - create an event\n\
         /help - command reference\n\n\
         Create an event with:\n\
         {CREATE_USAGE}",
        escape_markdown(given_name)
    )
}

pub fn help() -> String {
    format!(
        "📖 *Command reference*\n\n\
         /start - welcome message\n\
         /events - list all events\n\
         /myevents - list events you created\n\
         /create - create an event\n\
         /update - change an event you created\n\
         /help - this message\n\n\
         *Create:*\n\
         {CREATE_USAGE}\n\
         Example: /create Conference|Tech talk|2024-12-31|Hall A\n\n\
         *Update:*\n\
         {UPDATE_USAGE}"
    )
}

pub fn admin_menu() -> String {
    // Underscores in command names are escaped so Telegram does not read
    // them as italics.
    "🛠 *Admin menu*\n\n\
     /admin\\_users - list registered users\n\
     /admin\\_stats - user and event counts\n\
     /admin\\_makeadmin ID - grant admin rights\n\
     /admin\\_delete\\_event ID - delete an event"
        .to_string()
}

fn push_event(out: &mut String, event: &Event) {
    let _ = write!(
        out,
        "• {} (#{})\n  📍 {}\n  📅 {}\n  👤 {}\n\n",
        bold(&event.title),
        event.id,
        escape_markdown(&event.location),
        event.event_date.format(DISPLAY_DATE_FORMAT),
        event.created_by,
    );
}

pub fn event_list(heading: &str, events: &[Event]) -> String {
    let mut out = format!("📅 *{heading}:*\n\n");
    for event in events {
        push_event(&mut out, event);
    }
    out.trim_end().to_string()
}

pub fn event_created(event: &Event) -> String {
    format!(
        "✅ Event created!\n\n{}\n📍 {}\n📅 {}\nID: {}",
        bold(&event.title),
        escape_markdown(&event.location),
        event.event_date.format(DISPLAY_DATE_FORMAT),
        event.id,
    )
}

pub fn event_updated(event: &Event) -> String {
    format!(
        "✏️ Event updated!\n\n{}\n📍 {}\n📅 {}",
        bold(&event.title),
        escape_markdown(&event.location),
        event.event_date.format(DISPLAY_DATE_FORMAT),
    )
}

pub fn event_deleted(event: &Event) -> String {
    format!("🗑 Deleted event #{} ({}).", event.id, escape_markdown(&event.title))
}

pub fn user_list(users: &[User]) -> String {
    if users.is_empty() {
        return NO_USERS.to_string();
    }
    let mut out = String::from("👥 *Users:*\n\n");
    for user in users {
        let handle = user
            .username
            .as_deref()
            .map(|u| format!(" @{}", escape_markdown(u)))
            .unwrap_or_default();
        let admin = if user.is_admin { " (admin)" } else { "" };
        let _ = writeln!(
            out,
            "• {} {}{}{}",
            user.platform_id,
            escape_markdown(&user.given_name),
            handle,
            admin
        );
    }
    out.trim_end().to_string()
}

pub fn stats(users: u64, admins: u64, events: u64) -> String {
    format!("📊 *Stats*\n\nUsers: {users}\nAdmins: {admins}\nEvents: {events}")
}

pub fn promoted(user: &str) -> String {
    format!("✅ User {user} is now an admin.")
}

pub fn echo(text: &str) -> String {
    format!(
        "You wrote: {}\n\nSend /help for the list of commands.",
        escape_markdown(text)
    )
}

/// User-facing text for a failed command. Internal detail is dropped for
/// system errors.
pub fn failure(command: &str, err: &PlannerError) -> String {
    match err {
        PlannerError::Format(detail) => {
            let usage = match command {
                "create" => Some(CREATE_USAGE),
                "update" => Some(UPDATE_USAGE),
                _ => None,
            };
            match usage {
                Some(usage) => format!(
                    "❌ Invalid format: {}\n\nUse:\n{usage}",
                    escape_markdown(detail)
                ),
                None => format!("❌ Invalid argument: {}", escape_markdown(detail)),
            }
        }
        PlannerError::Permission(_) => PERMISSION_DENIED.to_string(),
        PlannerError::NotFound(what) => format!("❌ Not found: {}", escape_markdown(what)),
        PlannerError::Auth(_) => AUTH_ERROR.to_string(),
        PlannerError::ConstraintViolation(_) | PlannerError::Storage(_) => {
            "❌ Something went wrong. Please try again later.".to_string()
        }
    }
}
