use serde::{Deserialize, Serialize};

use crate::Pid;

/// Combined per-process query result, copied out to the caller.
///
/// Every field is a single best-effort read. The process may mutate state
/// between the sub-queries that fill this in, so no field is guaranteed
/// consistent with another; that is a documented limitation, not a bug.
/// Fields a platform cannot supply are zero/empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub parent_pid: Pid,
    pub session_id: u32,
    pub exe_path: String,
    pub command_line: String,
    pub memory_usage_bytes: u64,
    pub thread_count: u32,
}
