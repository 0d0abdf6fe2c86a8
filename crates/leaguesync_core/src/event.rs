//! Event and history record types.

use crate::store::ID_FIELD;
use chrono::{DateTime, TimeZone, Utc};
use leaguesync_codec::{Document, Value};
use std::collections::BTreeMap;

/// An entity snapshot offered to the event store.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEvent {
    /// Partition key, e.g. a league id.
    pub subject: String,
    /// Event type name, e.g. `TEAMS`.
    pub event_type: String,
    /// Pass-through entity fields.
    pub fields: Document,
}

impl SnapshotEvent {
    /// Creates a snapshot event.
    pub fn new(subject: impl Into<String>, event_type: impl Into<String>, fields: Document) -> Self {
        Self {
            subject: subject.into(),
            event_type: event_type.into(),
            fields,
        }
    }

    /// Wraps a batch of entities of one type.
    pub fn batch(subject: &str, event_type: &str, entities: impl IntoIterator<Item = Document>) -> Vec<Self> {
        entities
            .into_iter()
            .map(|fields| Self::new(subject, event_type, fields))
            .collect()
    }
}

/// The current stored snapshot of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Partition key.
    pub subject: String,
    /// Event type name.
    pub event_type: String,
    /// Entity id.
    pub id: String,
    /// Insertion time of this snapshot.
    pub timestamp: DateTime<Utc>,
    /// Entity fields, without the store-owned `id` and `timestamp`.
    pub fields: Document,
}

impl StoredEvent {
    /// Looks up a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Renders the stored document: the fields plus `id` and `timestamp`.
    pub fn to_document(&self) -> Document {
        let mut doc = self.fields.clone();
        doc.insert(ID_FIELD.into(), Value::Text(self.id.clone()));
        doc.insert("timestamp".into(), Value::Timestamp(self.timestamp.timestamp_millis()));
        doc
    }

    /// Reads a stored document back.
    ///
    /// Returns `None` if the store-owned fields are missing.
    pub fn from_document(subject: &str, event_type: &str, mut doc: Document) -> Option<Self> {
        let id = doc.remove(ID_FIELD)?.to_key_string()?;
        let timestamp = millis_to_datetime(doc.remove("timestamp")?.as_timestamp_millis()?)?;
        Some(Self {
            subject: subject.to_string(),
            event_type: event_type.to_string(),
            id,
            timestamp,
            fields: doc,
        })
    }
}

/// Before and after values of one field.
///
/// `None` means the field was absent on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Value before the update.
    pub old_value: Option<Value>,
    /// Value after the update.
    pub new_value: Option<Value>,
}

/// Field-level changes recorded when a stored entity is updated.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    /// Changed fields.
    pub changes: BTreeMap<String, FieldChange>,
    /// When the change was recorded.
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Renders the record as a document:
    /// `{field: {oldValue, newValue}, timestamp}`.
    ///
    /// A side that was absent is left out of the entry, so an explicit
    /// `Null` stays distinguishable from a missing field.
    pub fn to_document(&self) -> Document {
        let mut doc: Document = self
            .changes
            .iter()
            .map(|(field, change)| {
                let mut entry = Document::new();
                if let Some(old) = &change.old_value {
                    entry.insert("oldValue".into(), old.clone());
                }
                if let Some(new) = &change.new_value {
                    entry.insert("newValue".into(), new.clone());
                }
                (field.clone(), Value::Map(entry))
            })
            .collect();
        doc.insert("timestamp".into(), Value::Timestamp(self.timestamp.timestamp_millis()));
        doc
    }

    /// Reads a stored record back.
    pub fn from_document(mut doc: Document) -> Option<Self> {
        let timestamp = millis_to_datetime(doc.remove("timestamp")?.as_timestamp_millis()?)?;
        let changes = doc
            .into_iter()
            .filter_map(|(field, value)| {
                let Value::Map(mut entry) = value else {
                    return None;
                };
                Some((
                    field,
                    FieldChange {
                        old_value: entry.remove("oldValue"),
                        new_value: entry.remove("newValue"),
                    },
                ))
            })
            .collect();
        Some(Self { changes, timestamp })
    }
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
