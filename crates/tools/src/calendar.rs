//! Calendar tools — event CRUD, free-slot search, and daily summaries over a
//! file-backed event store.
//!
//! Dates arrive as natural language ("today", "tomorrow") or ISO
//! (`YYYY-MM-DD`) and are resolved here, never by the agent core. Timed
//! events default to a 60-minute duration; events without a time are
//! all-day.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use confab_core::error::ToolError;
use confab_core::reply::ToolCall;
use confab_core::tool::{ToolHandler, ToolKind, ToolOutput};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_DURATION_MIN: i64 = 60;
const DEFAULT_SEARCH_DAYS: i64 = 30;

/// A stored calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
}

/// The flattened, model-facing view of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub duration_min: Option<i64>,
    pub time_display: String,
}

impl EventView {
    fn from_event(event: &CalendarEvent) -> Self {
        let (duration_min, time_display) = if event.all_day {
            (None, "All Day".to_string())
        } else {
            (
                Some((event.end - event.start).num_minutes()),
                format!(
                    "{} – {}",
                    event.start.format("%H:%M"),
                    event.end.format("%H:%M")
                ),
            )
        };
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            start: event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            end: event.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            all_day: event.all_day,
            duration_min,
            time_display,
        }
    }
}

/// A free gap between busy intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: String,
    pub end: String,
    pub duration_min: i64,
}

/// File-backed event store shared by the calendar tool suite.
pub struct CalendarStore {
    path: PathBuf,
    work_start: u32,
    work_end: u32,
    events: RwLock<Vec<CalendarEvent>>,
}

impl CalendarStore {
    pub fn new(path: PathBuf, work_start: u32, work_end: u32) -> Self {
        let events = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = events.len(), "Calendar store loaded");
        Self { path, work_start, work_end, events: RwLock::new(events) }
    }

    fn load_from_disk(path: &PathBuf) -> Vec<CalendarEvent> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Calendar file unreadable, starting empty");
                Vec::new()
            }
        }
    }

    async fn flush(&self) -> Result<(), ToolError> {
        let events = self.events.read().await;
        let write = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&*events)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(&self.path, json)
        })();
        write.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "calendar".into(),
            reason: format!("failed to persist calendar: {e}"),
        })
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    /// Resolve a date string (`YYYY-MM-DD`, "today", "tomorrow") into a date.
    /// `None` defaults to today.
    fn resolve_date(raw: Option<&str>) -> Result<NaiveDate, ToolError> {
        let today = Self::now().date();
        let Some(raw) = raw else { return Ok(today) };

        match raw.trim().to_lowercase().as_str() {
            "" | "today" => Ok(today),
            "tomorrow" => Ok(today + Duration::days(1)),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
                ToolError::InvalidArguments(format!(
                    "cannot resolve date '{raw}' (expected YYYY-MM-DD, 'today' or 'tomorrow')"
                ))
            }),
        }
    }

    fn parse_time(raw: &str) -> Result<NaiveTime, ToolError> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
            ToolError::InvalidArguments(format!("cannot parse time '{raw}' (expected HH:MM)"))
        })
    }

    /// Events overlapping the given day, ordered by start.
    pub async fn get_events(&self, date: Option<&str>) -> Result<Vec<EventView>, ToolError> {
        let day = Self::resolve_date(date)?;
        let day_start = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let day_end = day_start + Duration::days(1);

        let events = self.events.read().await;
        let mut found: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| e.start < day_end && e.end > day_start)
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found.into_iter().map(EventView::from_event).collect())
    }

    /// Full-text search across event titles, looking `days` ahead.
    pub async fn search_events(
        &self,
        query: &str,
        days: Option<i64>,
    ) -> Result<Vec<EventView>, ToolError> {
        let now = Self::now();
        let horizon = now + Duration::days(days.unwrap_or(DEFAULT_SEARCH_DAYS));
        let needle = query.to_lowercase();

        let events = self.events.read().await;
        let mut found: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| e.end >= now && e.start <= horizon)
            .filter(|e| e.title.to_lowercase().contains(&needle))
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found.into_iter().map(EventView::from_event).collect())
    }

    /// Create an event. All-day when `time` is absent; otherwise timed with a
    /// default 60-minute duration.
    pub async fn create_event(
        &self,
        title: &str,
        date: &str,
        time: Option<&str>,
    ) -> Result<EventView, ToolError> {
        let day = Self::resolve_date(Some(date))?;

        let (start, end, all_day) = match time {
            None => {
                let start = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
                (start, start + Duration::days(1), true)
            }
            Some(raw) => {
                let start = day.and_time(Self::parse_time(raw)?);
                (start, start + Duration::minutes(DEFAULT_DURATION_MIN), false)
            }
        };

        let event = CalendarEvent {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            start,
            end,
            all_day,
        };
        let view = EventView::from_event(&event);

        self.events.write().await.push(event);
        self.flush().await?;
        debug!(title = %title, "Created calendar event");
        Ok(view)
    }

    /// Update fields on an existing event. Only provided fields change; a
    /// timed event keeps its duration when moved.
    pub async fn update_event(
        &self,
        event_id: &str,
        title: Option<&str>,
        date: Option<&str>,
        time: Option<&str>,
    ) -> Result<EventView, ToolError> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: "updateEvent".into(),
                reason: format!("event not found: {event_id}"),
            })?;

        if let Some(title) = title {
            event.title = title.to_string();
        }

        if date.is_some() || time.is_some() {
            let day = match date {
                Some(raw) => Self::resolve_date(Some(raw))?,
                None => event.start.date(),
            };

            match time {
                Some(raw) => {
                    let duration = if event.all_day {
                        Duration::minutes(DEFAULT_DURATION_MIN)
                    } else {
                        event.end - event.start
                    };
                    event.start = day.and_time(Self::parse_time(raw)?);
                    event.end = event.start + duration;
                    event.all_day = false;
                }
                None if event.all_day => {
                    event.start = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
                    event.end = event.start + Duration::days(1);
                }
                None => {
                    // Date moved, time untouched: keep the clock and duration.
                    let duration = event.end - event.start;
                    let clock = event.start.time();
                    event.start = day.and_time(clock);
                    event.end = event.start + duration;
                }
            }
        }

        let view = EventView::from_event(event);
        drop(events);
        self.flush().await?;
        Ok(view)
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), ToolError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err(ToolError::ExecutionFailed {
                tool_name: "deleteEvent".into(),
                reason: format!("event not found: {event_id}"),
            });
        }
        drop(events);
        self.flush().await
    }

    /// Find gaps of at least `duration` minutes inside the work-day window.
    pub async fn find_free_slots(
        &self,
        date: &str,
        duration: i64,
    ) -> Result<Vec<FreeSlot>, ToolError> {
        let day = Self::resolve_date(Some(date))?;
        let day_start = day
            .and_hms_opt(self.work_start, 0, 0)
            .ok_or_else(|| ToolError::InvalidArguments("invalid work_start hour".into()))?;
        let day_end = day
            .and_hms_opt(self.work_end, 0, 0)
            .ok_or_else(|| ToolError::InvalidArguments("invalid work_end hour".into()))?;

        // Collect timed busy intervals for the day, then merge overlaps.
        let events = self.events.read().await;
        let mut busy: Vec<(NaiveDateTime, NaiveDateTime)> = events
            .iter()
            .filter(|e| !e.all_day && e.start < day_end && e.end > day_start)
            .map(|e| (e.start.max(day_start), e.end.min(day_end)))
            .collect();
        drop(events);
        busy.sort();

        let mut merged: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();
        for (s, e) in busy {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }

        // Scan the gaps.
        let mut slots = Vec::new();
        let mut current = day_start;
        for (busy_start, busy_end) in merged {
            let gap = (busy_start - current).num_minutes();
            if gap >= duration {
                slots.push(FreeSlot {
                    start: current.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    end: busy_start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    duration_min: gap,
                });
            }
            current = current.max(busy_end);
        }

        let gap = (day_end - current).num_minutes();
        if gap >= duration {
            slots.push(FreeSlot {
                start: current.format("%Y-%m-%dT%H:%M:%S").to_string(),
                end: day_end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                duration_min: gap,
            });
        }

        Ok(slots)
    }

    /// Day report: event count, meeting minutes, free minutes, busiest block.
    pub async fn daily_summary(&self, date: &str) -> Result<serde_json::Value, ToolError> {
        let day = Self::resolve_date(Some(date))?;
        let events = self.get_events(Some(&day.format("%Y-%m-%d").to_string())).await?;

        let total_min: i64 = events.iter().filter_map(|e| e.duration_min).sum();
        let work_min = i64::from(self.work_end - self.work_start) * 60;
        let busiest = events
            .iter()
            .max_by_key(|e| e.duration_min.unwrap_or(0))
            .map(|e| e.title.clone());

        Ok(serde_json::json!({
            "date": day.format("%Y-%m-%d").to_string(),
            "day_name": day.weekday().to_string(),
            "event_count": events.len(),
            "total_meeting_min": total_min,
            "free_min": (work_min - total_min).max(0),
            "busiest_block": busiest,
            "events": events,
        }))
    }
}

/// One member of the calendar tool suite. All seven share the same store.
pub struct CalendarTool {
    kind: ToolKind,
    store: Arc<CalendarStore>,
}

impl CalendarTool {
    /// Build the full suite of calendar handlers over one store.
    pub fn suite(store: Arc<CalendarStore>) -> Vec<CalendarTool> {
        [
            ToolKind::GetEvent,
            ToolKind::SearchEvent,
            ToolKind::CreateEvent,
            ToolKind::UpdateEvent,
            ToolKind::DeleteEvent,
            ToolKind::FindFreeSlot,
            ToolKind::DailySummary,
        ]
        .into_iter()
        .map(|kind| CalendarTool { kind, store: Arc::clone(&store) })
        .collect()
    }

    fn pretty<T: Serialize>(value: &T) -> Result<String, ToolError> {
        serde_json::to_string_pretty(value).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "calendar".into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ToolHandler for CalendarTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        if call.kind() != self.kind {
            return Err(ToolError::InvalidArguments(format!(
                "expected {}, got {}",
                self.kind,
                call.kind()
            )));
        }

        let text = match call {
            ToolCall::GetEvent { date } => {
                let events = self.store.get_events(date.as_deref()).await?;
                Self::pretty(&events)?
            }
            ToolCall::SearchEvent { query, days } => {
                let events = self.store.search_events(query, *days).await?;
                Self::pretty(&events)?
            }
            ToolCall::CreateEvent { title, date, time } => {
                let event = self.store.create_event(title, date, time.as_deref()).await?;
                Self::pretty(&event)?
            }
            ToolCall::UpdateEvent { event_id, title, date, time } => {
                let event = self
                    .store
                    .update_event(event_id, title.as_deref(), date.as_deref(), time.as_deref())
                    .await?;
                Self::pretty(&event)?
            }
            ToolCall::DeleteEvent { event_id } => {
                self.store.delete_event(event_id).await?;
                format!("{{\"deleted\": true, \"event_id\": \"{event_id}\"}}")
            }
            ToolCall::FindFreeSlot { date, duration } => {
                let slots = self.store.find_free_slots(date, *duration).await?;
                Self::pretty(&slots)?
            }
            ToolCall::DailySummary { date } => {
                let summary = self.store.daily_summary(date).await?;
                Self::pretty(&summary)?
            }
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "not a calendar call: {}",
                    other.kind()
                )));
            }
        };

        Ok(ToolOutput::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> Arc<CalendarStore> {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        Arc::new(CalendarStore::new(path, 9, 17))
    }

    #[tokio::test]
    async fn create_and_get_timed_event() {
        let store = temp_store();
        let created = store.create_event("Standup", "2026-03-02", Some("09:30")).await.unwrap();
        assert!(!created.all_day);
        assert_eq!(created.duration_min, Some(60));
        assert_eq!(created.time_display, "09:30 – 10:30");

        let day = store.get_events(Some("2026-03-02")).await.unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].title, "Standup");

        let other_day = store.get_events(Some("2026-03-03")).await.unwrap();
        assert!(other_day.is_empty());
    }

    #[tokio::test]
    async fn all_day_event_without_time() {
        let store = temp_store();
        let created = store.create_event("Conference", "2026-03-02", None).await.unwrap();
        assert!(created.all_day);
        assert_eq!(created.duration_min, None);
        assert_eq!(created.time_display, "All Day");
    }

    #[tokio::test]
    async fn natural_language_dates_resolve() {
        let store = temp_store();
        let created = store.create_event("Dentist", "tomorrow", Some("14:00")).await.unwrap();
        let tomorrow = Local::now().date_naive() + Duration::days(1);
        assert!(created.start.starts_with(&tomorrow.format("%Y-%m-%d").to_string()));

        let err = store.create_event("x", "someday", None).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn search_matches_titles_case_insensitive() {
        let store = temp_store();
        let date = (Local::now().date_naive() + Duration::days(3))
            .format("%Y-%m-%d")
            .to_string();
        store.create_event("Lunch with Sophie", &date, Some("12:00")).await.unwrap();
        store.create_event("Sprint review", &date, Some("15:00")).await.unwrap();

        let found = store.search_events("lunch", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Lunch with Sophie");
    }

    #[tokio::test]
    async fn update_moves_event_and_preserves_duration() {
        let store = temp_store();
        let created = store.create_event("Review", "2026-03-02", Some("10:00")).await.unwrap();

        // Stretch to 90 minutes by moving the time on the same day first.
        let updated = store
            .update_event(&created.id, None, Some("2026-03-05"), Some("16:00"))
            .await
            .unwrap();
        assert!(updated.start.starts_with("2026-03-05T16:00"));
        assert_eq!(updated.duration_min, Some(60));

        // Date-only move keeps the clock.
        let moved = store
            .update_event(&created.id, Some("Final review"), Some("2026-03-06"), None)
            .await
            .unwrap();
        assert_eq!(moved.title, "Final review");
        assert!(moved.start.starts_with("2026-03-06T16:00"));
    }

    #[tokio::test]
    async fn update_unknown_event_fails() {
        let store = temp_store();
        let err = store.update_event("ghost", Some("x"), None, None).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn delete_removes_event() {
        let store = temp_store();
        let created = store.create_event("Temp", "2026-03-02", None).await.unwrap();
        store.delete_event(&created.id).await.unwrap();
        assert!(store.get_events(Some("2026-03-02")).await.unwrap().is_empty());
        assert!(store.delete_event(&created.id).await.is_err());
    }

    #[tokio::test]
    async fn free_slots_merge_overlapping_busy_blocks() {
        let store = temp_store();
        // 10:00–11:00 and 10:30–11:30 overlap; merged busy 10:00–11:30.
        store.create_event("A", "2026-03-02", Some("10:00")).await.unwrap();
        store.create_event("B", "2026-03-02", Some("10:30")).await.unwrap();

        let slots = store.find_free_slots("2026-03-02", 30).await.unwrap();
        // Gaps: 09:00–10:00 (60) and 11:30–17:00 (330).
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].duration_min, 60);
        assert!(slots[1].start.ends_with("11:30:00"));
        assert_eq!(slots[1].duration_min, 330);
    }

    #[tokio::test]
    async fn free_slots_empty_day_is_whole_window() {
        let store = temp_store();
        let slots = store.find_free_slots("2026-03-02", 30).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].duration_min, 8 * 60);
    }

    #[tokio::test]
    async fn daily_summary_reports_counts() {
        let store = temp_store();
        store.create_event("Standup", "2026-03-02", Some("09:30")).await.unwrap();
        store.create_event("Planning", "2026-03-02", Some("11:00")).await.unwrap();

        let summary = store.daily_summary("2026-03-02").await.unwrap();
        assert_eq!(summary["event_count"], 2);
        assert_eq!(summary["total_meeting_min"], 120);
        assert_eq!(summary["free_min"], 8 * 60 - 120);
        assert_eq!(summary["day_name"], "Mon");
    }

    #[tokio::test]
    async fn store_persists_across_reload() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);

        let store = CalendarStore::new(path.clone(), 9, 17);
        store.create_event("Persisted", "2026-03-02", None).await.unwrap();

        let reloaded = CalendarStore::new(path, 9, 17);
        let events = reloaded.get_events(Some("2026-03-02")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Persisted");
    }

    #[tokio::test]
    async fn suite_dispatches_by_kind() {
        let store = temp_store();
        let tools = CalendarTool::suite(store);
        assert_eq!(tools.len(), 7);

        let create = tools.iter().find(|t| t.kind() == ToolKind::CreateEvent).unwrap();
        let call = ToolCall::CreateEvent {
            title: "Meeting with Sophie".into(),
            date: "2026-03-02".into(),
            time: Some("14:00".into()),
        };
        let out = create.execute(&call).await.unwrap();
        assert!(out.text.contains("Meeting with Sophie"));

        // A calendar handler refuses a foreign variant.
        let err = create
            .execute(&ToolCall::GetEvent { date: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
