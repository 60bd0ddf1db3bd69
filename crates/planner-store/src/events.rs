use chrono::Utc;
use tracing::instrument;

use planner_core::{Event, EventId, NewEvent, PlatformId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const EVENT_COLUMNS: &str =
    "id, title, description, event_date, location, created_by, created_at, updated_at";

pub struct EventRepo {
    db: Database,
}

impl EventRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert an event. An unknown creator or blank title is a `Constraint` error.
    #[instrument(skip(self, event), fields(created_by = %event.created_by, title = %event.title))]
    pub fn create(&self, event: &NewEvent) -> Result<Event, StoreError> {
        let now = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (title, description, event_date, location, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    event.title,
                    event.description,
                    row_helpers::format_date(event.event_date),
                    event.location,
                    event.created_by.get(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Event {
                id: EventId::new(conn.last_insert_rowid()),
                title: event.title.clone(),
                description: event.description.clone(),
                event_date: event.event_date,
                location: event.location.clone(),
                created_by: event.created_by,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Every event, earliest date first. Same-day events keep insertion order.
    #[instrument(skip(self))]
    pub fn get_all(&self) -> Result<Vec<Event>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events ORDER BY event_date ASC, id ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_event(row)?);
            }
            Ok(results)
        })
    }

    #[instrument(skip(self), fields(event_id = %id))]
    pub fn get_by_id(&self, id: EventId) -> Result<Event, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"))?;
            let mut rows = stmt.query([id.get()])?;
            match rows.next()? {
                Some(row) => row_to_event(row),
                None => Err(StoreError::NotFound(format!("event {id}"))),
            }
        })
    }

    /// Overwrite the editable fields of `event` and refresh `updated_at`.
    /// Returns the stored row as it now reads.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub fn update(&self, event: &Event) -> Result<Event, StoreError> {
        let now = Utc::now();

        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events
                 SET title = ?1, description = ?2, event_date = ?3, location = ?4, updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    event.title,
                    event.description,
                    row_helpers::format_date(event.event_date),
                    event.location,
                    now.to_rfc3339(),
                    event.id.get(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("event {}", event.id)));
            }

            let mut updated = event.clone();
            updated.updated_at = now;
            Ok(updated)
        })
    }

    #[instrument(skip(self), fields(event_id = %id))]
    pub fn delete_by_id(&self, id: EventId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM events WHERE id = ?1", [id.get()])?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("event {id}")));
            }
            Ok(())
        })
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> Result<Event, StoreError> {
    let event_date: String = row_helpers::get(row, 3, "events", "event_date")?;
    let created_at: String = row_helpers::get(row, 6, "events", "created_at")?;
    let updated_at: String = row_helpers::get(row, 7, "events", "updated_at")?;

    Ok(Event {
        id: EventId::new(row_helpers::get(row, 0, "events", "id")?),
        title: row_helpers::get(row, 1, "events", "title")?,
        description: row_helpers::get_opt(row, 2, "events", "description")?.unwrap_or_default(),
        event_date: row_helpers::parse_date(&event_date, "events", "event_date")?,
        location: row_helpers::get_opt(row, 4, "events", "location")?.unwrap_or_default(),
        created_by: PlatformId::new(row_helpers::get(row, 5, "events", "created_by")?),
        created_at: row_helpers::parse_timestamp(&created_at, "events", "created_at")?,
        updated_at: row_helpers::parse_timestamp(&updated_at, "events", "updated_at")?,
    })
}
