use crate::Pid;

/// A session is only a named container of process groups here; it dies
/// with its last group.
#[derive(Debug)]
pub struct Session {
    sid: Pid,
    pub(crate) group_count: usize,
}

impl Session {
    pub(crate) fn new(sid: Pid) -> Self {
        Self { sid, group_count: 0 }
    }

    /// Get session id
    pub fn get_sid(&self) -> Pid {
        self.sid
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }
}
