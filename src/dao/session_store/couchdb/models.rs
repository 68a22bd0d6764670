use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{FinishedEntryEntity, SlotRowEntity, StudentEntity, TimerRecordEntity},
    session_store::couchdb::error::CouchDaoError,
};

pub const STUDENT_PREFIX: &str = "student::";
pub const SLOT_PREFIX: &str = "slot::";
pub const TIMER_PREFIX: &str = "timer::";
pub const FINISHED_PREFIX: &str = "finished::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Minimal view of a document used when only the revision matters.
#[derive(Debug, Deserialize)]
pub struct RevDocument {
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchStudentDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub student: StudentBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentBody {
    pub name: String,
    pub exam_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl From<(StudentEntity, Option<String>)> for CouchStudentDocument {
    fn from((student, rev): (StudentEntity, Option<String>)) -> Self {
        Self {
            id: student_doc_id(student.id),
            rev,
            student: StudentBody {
                name: student.name,
                exam_number: student.exam_number,
                photo_url: student.photo_url,
            },
        }
    }
}

impl TryFrom<CouchStudentDocument> for StudentEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchStudentDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            name: doc.student.name,
            exam_number: doc.student.exam_number,
            photo_url: doc.student.photo_url,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSlotDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub slot: SlotBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotBody {
    #[serde(default)]
    pub occupant: Option<Uuid>,
    pub updated_at_ms: u64,
}

impl From<(SlotRowEntity, Option<String>)> for CouchSlotDocument {
    fn from((slot, rev): (SlotRowEntity, Option<String>)) -> Self {
        Self {
            id: slot_doc_id(slot.index),
            rev,
            slot: SlotBody {
                occupant: slot.occupant,
                updated_at_ms: slot.updated_at_ms,
            },
        }
    }
}

impl TryFrom<CouchSlotDocument> for SlotRowEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchSlotDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            index: extract_index(&doc.id)?,
            occupant: doc.slot.occupant,
            updated_at_ms: doc.slot.updated_at_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchTimerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub timer: TimerBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerBody {
    pub is_running: bool,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    pub base_remaining_secs: i64,
    pub updated_at_ms: u64,
}

impl From<(TimerRecordEntity, Option<String>)> for CouchTimerDocument {
    fn from((timer, rev): (TimerRecordEntity, Option<String>)) -> Self {
        Self {
            id: timer_doc_id(timer.occupant_id),
            rev,
            timer: TimerBody {
                is_running: timer.is_running,
                started_at_ms: timer.started_at_ms,
                base_remaining_secs: timer.base_remaining_secs,
                updated_at_ms: timer.updated_at_ms,
            },
        }
    }
}

impl TryFrom<CouchTimerDocument> for TimerRecordEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchTimerDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            occupant_id: extract_uuid(&doc.id)?,
            is_running: doc.timer.is_running,
            started_at_ms: doc.timer.started_at_ms,
            base_remaining_secs: doc.timer.base_remaining_secs,
            updated_at_ms: doc.timer.updated_at_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchFinishedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub entry: FinishedBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedBody {
    pub student: StudentEntity,
    pub time_used_secs: i64,
    pub finished_at_ms: u64,
}

impl From<(FinishedEntryEntity, Option<String>)> for CouchFinishedDocument {
    fn from((entry, rev): (FinishedEntryEntity, Option<String>)) -> Self {
        Self {
            id: finished_doc_id(entry.student.id),
            rev,
            entry: FinishedBody {
                student: entry.student,
                time_used_secs: entry.time_used_secs,
                finished_at_ms: entry.finished_at_ms,
            },
        }
    }
}

impl From<CouchFinishedDocument> for FinishedEntryEntity {
    fn from(doc: CouchFinishedDocument) -> Self {
        Self {
            student: doc.entry.student,
            time_used_secs: doc.entry.time_used_secs,
            finished_at_ms: doc.entry.finished_at_ms,
        }
    }
}

pub fn student_doc_id(id: Uuid) -> String {
    format!("{}{}", STUDENT_PREFIX, id)
}

pub fn slot_doc_id(index: usize) -> String {
    format!("{}{:04}", SLOT_PREFIX, index)
}

pub fn timer_doc_id(occupant_id: Uuid) -> String {
    format!("{}{}", TIMER_PREFIX, occupant_id)
}

pub fn finished_doc_id(student_id: Uuid) -> String {
    format!("{}{}", FINISHED_PREFIX, student_id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}

pub fn extract_index(doc_id: &str) -> Result<usize, CouchDaoError> {
    let (_, index) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    index.parse().map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid slot index",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ids_round_trip_their_keys() {
        let id = Uuid::new_v4();
        assert_eq!(extract_uuid(&timer_doc_id(id)).unwrap(), id);
        assert_eq!(extract_uuid(&finished_doc_id(id)).unwrap(), id);
        assert_eq!(extract_index(&slot_doc_id(3)).unwrap(), 3);
        // Zero-padding keeps _all_docs ranges ordered by position.
        assert_eq!(slot_doc_id(12), "slot::0012");
    }

    #[test]
    fn malformed_doc_ids_are_rejected() {
        assert!(extract_uuid("timer").is_err());
        assert!(extract_uuid("timer::not-a-uuid").is_err());
        assert!(extract_index("slot::x1").is_err());
    }
}
