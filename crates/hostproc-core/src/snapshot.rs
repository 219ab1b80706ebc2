use serde::{Deserialize, Serialize};

use crate::Target;

/// Process identifier.
pub type Pid = u32;

/// One process as seen at capture time. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub parent_pid: Pid,
    /// Executable base name; compared case-insensitively.
    pub name: String,
}

/// A point-in-time view of the process table.
///
/// A snapshot is valid only for the duration of the operation that requested
/// it and is never cached across calls: the process table changes
/// continuously underneath us. Record order is whatever the enumeration
/// produced; consumers must not depend on it beyond "consistent within this
/// snapshot".
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<ProcessRecord>,
}

impl Snapshot {
    pub fn from_records(records: Vec<ProcessRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.records.iter().any(|r| r.pid == pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid == pid)
    }

    /// Parent PID of `pid` per this snapshot.
    pub fn parent_of(&self, pid: Pid) -> Option<Pid> {
        self.get(pid).map(|r| r.parent_pid)
    }

    /// First record matching `target`, in snapshot iteration order.
    ///
    /// When several processes share a name this is deterministic for one
    /// snapshot but arbitrary across snapshots; callers that need a stable
    /// answer must target a PID.
    pub fn resolve_first(&self, target: &Target) -> Option<Pid> {
        self.records
            .iter()
            .find(|r| Self::matches(r, target))
            .map(|r| r.pid)
    }

    /// All records matching `target`, in snapshot iteration order.
    pub fn resolve_all(&self, target: &Target) -> Vec<Pid> {
        self.records
            .iter()
            .filter(|r| Self::matches(r, target))
            .map(|r| r.pid)
            .collect()
    }

    fn matches(record: &ProcessRecord, target: &Target) -> bool {
        match target {
            Target::Pid(pid) => record.pid == *pid,
            Target::Name(name) => record.name.eq_ignore_ascii_case(name),
        }
    }
}
