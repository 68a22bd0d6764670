use serde::{Deserialize, Serialize};

use crate::dao::models::{FinishedEntryEntity, SlotRowEntity, TimerRecordEntity};

/// File holding the session snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "session.json";
/// Read-only roster file inside the data directory.
pub const ROSTER_FILE: &str = "roster.json";

/// Whole-state session snapshot persisted as a single JSON document.
///
/// The top-level keys are fixed wire names so the file stays exchangeable
/// with external tooling. There is deliberately no waiting-list key: the
/// queue is derived from the roster, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    #[serde(rename = "activeSlots", default)]
    pub active_slots: Vec<SlotRowEntity>,
    #[serde(rename = "finishedStudents", default)]
    pub finished_students: Vec<FinishedEntryEntity>,
    #[serde(rename = "timerStates", default)]
    pub timer_states: Vec<TimerRecordEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_under_fixed_wire_keys() {
        let snapshot = SessionSnapshot {
            active_slots: vec![SlotRowEntity {
                index: 0,
                occupant: None,
                updated_at_ms: 0,
            }],
            finished_students: Vec::new(),
            timer_states: Vec::new(),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("activeSlots"));
        assert!(object.contains_key("finishedStudents"));
        assert!(object.contains_key("timerStates"));
        assert!(!object.contains_key("waitingList"));
    }

    #[test]
    fn snapshot_tolerates_missing_sections() {
        let snapshot: SessionSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, SessionSnapshot::default());
    }
}
