// Data models for the organizer's three lists

use crate::record::{Completable, DraftError, Record, required};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A to-do entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    #[serde(alias = "texto")]
    pub text: String,
    #[serde(default, alias = "completada")]
    pub done: bool,
    #[serde(alias = "fecha")]
    pub created_at: DateTime<Utc>,
}

/// Input for a new task
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub text: String,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Record for Task {
    type Draft = TaskDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn search_text(&self) -> &str {
        &self.text
    }

    fn slot_name() -> &'static str {
        "tasks"
    }

    fn legacy_slot_name() -> Option<&'static str> {
        Some("tareas")
    }

    fn from_draft(draft: TaskDraft, id: i64, now: DateTime<Utc>) -> Result<Self, DraftError> {
        required("text", &draft.text)?;
        Ok(Self {
            id,
            text: draft.text,
            done: false,
            created_at: now,
        })
    }
}

impl Completable for Task {
    fn is_done(&self) -> bool {
        self.done
    }

    fn set_done(&mut self, done: bool) {
        self.done = done;
    }
}

/// A free-form note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    #[serde(alias = "texto")]
    pub text: String,
    #[serde(alias = "fecha")]
    pub created_at: DateTime<Utc>,
}

/// Input for a new note
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub text: String,
}

impl NoteDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Record for Note {
    type Draft = NoteDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn search_text(&self) -> &str {
        &self.text
    }

    fn slot_name() -> &'static str {
        "notes"
    }

    fn legacy_slot_name() -> Option<&'static str> {
        Some("notas")
    }

    fn from_draft(draft: NoteDraft, id: i64, now: DateTime<Utc>) -> Result<Self, DraftError> {
        required("text", &draft.text)?;
        Ok(Self {
            id,
            text: draft.text,
            created_at: now,
        })
    }
}

/// A calendar entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(alias = "titulo")]
    pub title: String,
    #[serde(alias = "fecha")]
    pub date: NaiveDate,
    #[serde(default, alias = "hora", with = "clock_time")]
    pub time: Option<NaiveTime>,
    #[serde(default, alias = "recordatorio")]
    pub reminder: bool,
}

impl Event {
    /// "2024-03-01 09:30", or just the date when no time is set
    pub fn when_display(&self) -> String {
        match self.time {
            Some(time) => format!("{} {}", self.date, time.format(CLOCK_FORMAT)),
            None => self.date.to_string(),
        }
    }
}

/// Input for a new event, as typed by the user
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`; empty for an all-day event
    pub time: String,
    pub reminder: bool,
}

impl Record for Event {
    type Draft = EventDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn search_text(&self) -> &str {
        &self.title
    }

    fn slot_name() -> &'static str {
        "events"
    }

    fn legacy_slot_name() -> Option<&'static str> {
        Some("eventos")
    }

    fn from_draft(draft: EventDraft, id: i64, _now: DateTime<Utc>) -> Result<Self, DraftError> {
        required("title", &draft.title)?;
        required("date", &draft.date)?;
        let date_str = draft.date.trim();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| DraftError::Invalid("date", date_str.to_string()))?;

        let time = match draft.time.trim() {
            "" => None,
            raw => Some(
                parse_clock_time(raw).ok_or_else(|| DraftError::Invalid("time", raw.to_string()))?,
            ),
        };

        Ok(Self {
            id,
            title: draft.title,
            date,
            time,
            reminder: draft.reminder,
        })
    }
}

const CLOCK_FORMAT: &str = "%H:%M";

/// Parse `HH:MM` (or `HH:MM:SS`), keeping minute precision
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
        .and_then(|t| t.with_second(0))
}

/// `Option<NaiveTime>` as `"HH:MM"` / `null`; an empty string also reads as no time
mod clock_time {
    use super::{CLOCK_FORMAT, parse_clock_time};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&t.format(CLOCK_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse_clock_time(s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid clock time: {:?}", s))),
        }
    }
}
