//! Decision audit trail.
//!
//! Every mutating operation on a decision appends one or more [`Event`]s in the
//! same store transaction as the change itself. Events are never updated or
//! deleted; the Postgres schema enforces this with a trigger.
//!
//! The metadata blob stored next to each event is modelled as [`EventKind`], a
//! tagged union keyed by the event type, so each type carries its own payload:
//!
//! ```text
//! created            {"approvers": [uuid, ...]}
//! edited             {"changes": {"title": {"from": "..", "to": ".."}}}
//! approved/rejected  {}
//! comment            {"comment_id": uuid}
//! approvers_updated  {"added": [uuid], "removed": [uuid]}
//! links_updated      {"added": [url], "removed": [url], "updated": [url]}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::comment::Comment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata", rename_all = "snake_case")]
pub enum EventKind {
    Created {
        approvers: Vec<Uuid>,
    },
    Edited {
        changes: BTreeMap<String, FieldChange>,
    },
    Approved {},
    Rejected {},
    Comment {
        comment_id: Uuid,
    },
    ApproversUpdated {
        added: Vec<Uuid>,
        removed: Vec<Uuid>,
    },
    LinksUpdated {
        added: Vec<String>,
        removed: Vec<String>,
        updated: Vec<String>,
    },
}

impl EventKind {
    /// Value of the `type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::Created { .. } => "created",
            EventKind::Edited { .. } => "edited",
            EventKind::Approved {} => "approved",
            EventKind::Rejected {} => "rejected",
            EventKind::Comment { .. } => "comment",
            EventKind::ApproversUpdated { .. } => "approvers_updated",
            EventKind::LinksUpdated { .. } => "links_updated",
        }
    }

    /// Value of the `metadata_json` column.
    pub fn metadata(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("metadata").unwrap_or_else(|| Value::Object(Default::default())),
            _ => Value::Object(Default::default()),
        }
    }

    /// Rebuild from the two stored columns.
    pub fn from_parts(type_name: &str, metadata: Value) -> Result<Self, String> {
        let tagged = serde_json::json!({ "type": type_name, "metadata": metadata });
        serde_json::from_value(tagged)
            .map_err(|e| format!("Unreadable {type_name} event metadata: {e}"))
    }

    pub fn is_vote(&self) -> bool {
        matches!(self, EventKind::Approved {} | EventKind::Rejected {})
    }
}

/// A stored audit record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    /// Insertion sequence; breaks ties between events sharing a timestamp.
    pub seq: i64,
    pub decision_id: Uuid,
    #[serde(flatten)]
    pub kind: EventKind,
    pub actor_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// An event about to be appended.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub kind: EventKind,
    pub actor_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn new(decision_id: Uuid, actor_user_id: Uuid, kind: EventKind, at: DateTime<Utc>) -> Self {
        NewEvent {
            id: Uuid::new_v4(),
            decision_id,
            kind,
            actor_user_id: Some(actor_user_id),
            created_at: at,
        }
    }
}

/// Reading order for a decision's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOrder {
    /// Chronological narrative.
    #[default]
    Oldest,
    /// Most recent first.
    Newest,
}

impl EventOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("desc") | Some("newest") => EventOrder::Newest,
            _ => EventOrder::Oldest,
        }
    }
}

/// Sort events for display. The log itself is never reordered.
pub fn ordered(mut events: Vec<Event>, order: EventOrder) -> Vec<Event> {
    events.sort_by(|a, b| (a.created_at, a.seq).cmp(&(b.created_at, b.seq)));
    if order == EventOrder::Newest {
        events.reverse();
    }
    events
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TimelineEntry {
    Event(Event),
    Comment(Comment),
}

impl TimelineEntry {
    fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Event(e) => e.created_at,
            TimelineEntry::Comment(c) => c.created_at,
        }
    }
}

/// Events and comments merged into one ascending narrative.
///
/// A `comment` event and its comment share a timestamp; the event sorts first.
pub fn timeline(events: Vec<Event>, comments: Vec<Comment>) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = ordered(events, EventOrder::Oldest)
        .into_iter()
        .map(TimelineEntry::Event)
        .collect();
    entries.extend(comments.into_iter().map(TimelineEntry::Comment));
    // stable sort keeps events ahead of comments at equal timestamps
    entries.sort_by_key(|e| e.at());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(kind: EventKind, seq: i64, at: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            seq,
            decision_id: Uuid::nil(),
            kind,
            actor_user_id: Some(Uuid::nil()),
            created_at: at,
        }
    }

    #[test]
    fn metadata_roundtrips_through_columns() {
        let added = vec![Uuid::new_v4()];
        let kind = EventKind::ApproversUpdated {
            added: added.clone(),
            removed: vec![],
        };
        assert_eq!(kind.type_name(), "approvers_updated");
        let metadata = kind.metadata();
        assert_eq!(metadata["added"][0], serde_json::json!(added[0]));
        assert_eq!(EventKind::from_parts("approvers_updated", metadata).unwrap(), kind);
    }

    #[test]
    fn vote_events_have_empty_metadata() {
        assert_eq!(EventKind::Approved {}.metadata(), serde_json::json!({}));
        assert_eq!(
            EventKind::from_parts("rejected", serde_json::json!({})).unwrap(),
            EventKind::Rejected {}
        );
    }

    #[test]
    fn edited_metadata_keeps_changes_shape() {
        let mut changes = BTreeMap::new();
        changes.insert(
            "title".to_string(),
            FieldChange {
                from: Some("Old".into()),
                to: Some("New".into()),
            },
        );
        let metadata = EventKind::Edited { changes }.metadata();
        assert_eq!(metadata, serde_json::json!({"changes": {"title": {"from": "Old", "to": "New"}}}));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(EventKind::from_parts("deleted", serde_json::json!({})).is_err());
    }

    #[test]
    fn ordering_uses_sequence_for_ties() {
        let now = Utc::now();
        let events = vec![
            event(EventKind::Approved {}, 2, now),
            event(EventKind::Created { approvers: vec![] }, 1, now),
            event(EventKind::Rejected {}, 3, now + Duration::seconds(1)),
        ];
        let asc = ordered(events.clone(), EventOrder::Oldest);
        assert_eq!(asc.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        let desc = ordered(events, EventOrder::Newest);
        assert_eq!(desc.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[test]
    fn timeline_interleaves_comments() {
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            decision_id: Uuid::nil(),
            user_id: Uuid::nil(),
            body: "Looks good".into(),
            created_at: now + Duration::seconds(5),
        };
        let entries = timeline(
            vec![
                event(EventKind::Created { approvers: vec![] }, 1, now),
                event(EventKind::Approved {}, 2, now + Duration::seconds(10)),
            ],
            vec![comment],
        );
        let kinds: Vec<&str> = entries
            .iter()
            .map(|e| match e {
                TimelineEntry::Event(ev) => ev.kind.type_name(),
                TimelineEntry::Comment(_) => "comment_body",
            })
            .collect();
        assert_eq!(kinds, vec!["created", "comment_body", "approved"]);
    }
}
