use std::collections::{HashMap, HashSet, VecDeque};

use crate::{Pid, Snapshot};

impl Snapshot {
    /// The closed set of descendants of `root`, root included, computed
    /// solely from this snapshot.
    ///
    /// Breadth-first over a parent-to-children index, so the result is
    /// ordered shallow to deep with the root first. A root that is not in
    /// the snapshot yields an empty tree, matching the resolver's treatment
    /// of unmatched PIDs.
    ///
    /// PID reuse can leave stale or inconsistent parent links in a snapshot;
    /// self-parenting records and cycles stop that branch instead of
    /// looping. Members may exit between construction and use, so consumers
    /// must treat "already gone" as a non-error.
    pub fn descendants_of(&self, root: Pid) -> Vec<Pid> {
        if !self.contains(root) {
            return Vec::new();
        }

        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for record in self.records() {
            if record.pid == record.parent_pid {
                // Stale self-link; expanding it would never terminate.
                continue;
            }
            children.entry(record.parent_pid).or_default().push(record.pid);
        }

        let mut seen: HashSet<Pid> = HashSet::new();
        seen.insert(root);
        let mut queue: VecDeque<Pid> = VecDeque::new();
        queue.push_back(root);
        let mut members = Vec::new();

        while let Some(pid) = queue.pop_front() {
            members.push(pid);
            if let Some(kids) = children.get(&pid) {
                for &kid in kids {
                    if seen.insert(kid) {
                        queue.push_back(kid);
                    }
                }
            }
        }
        members
    }
}
