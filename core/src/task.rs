use crate::manager::TeamManager;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use team_process::{Pid, TeamError, TeamResult, ThreadRecord, Tid};

/// Body of an additional thread; its return value is the exit status.
pub type ThreadBody = Box<dyn FnOnce() -> i32 + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: Tid,
    pub team: Pid,
    pub name: String,
    pub priority: i32,
    pub kernel_time: u64,
    pub user_time: u64,
}

impl TeamManager {
    /// Starts another thread in the calling team.
    pub fn spawn_thread(self: &Arc<Self>, name: &str, priority: i32, body: ThreadBody) -> TeamResult<Tid> {
        let team = self.current_team()?;
        let tid = self.ids.allocate();
        {
            let mut teams = self.teams.lock();
            let node = teams.lookup_mut(team).ok_or(TeamError::NoSuchProcess)?;
            node.add_thread(tid, false);
            self.threads.lock().insert(ThreadRecord::new(tid, team, name, priority));
        }

        let manager = self.clone();
        let entry = Box::new(move || {
            let status = body();
            manager.thread_exit(tid, status);
        });
        if let Err(err) = self.platform.scheduler.spawn(tid, name, priority, entry) {
            let mut teams = self.teams.lock();
            if let Some(node) = teams.get_mut(team) {
                node.remove_thread(tid);
            }
            self.threads.lock().remove(tid);
            return Err(err);
        }
        debug!("[thread] thread {} ({}) started in team {}", tid, name, team);
        Ok(tid)
    }

    pub fn thread_info(&self, tid: Tid) -> TeamResult<ThreadInfo> {
        let threads = self.threads.lock();
        let thread = threads.get(tid).ok_or(TeamError::NoSuchProcess)?;
        Ok(ThreadInfo {
            id: thread.id,
            team: thread.team,
            name: thread.name.clone(),
            priority: thread.priority,
            kernel_time: thread.kernel_time,
            user_time: thread.user_time,
        })
    }

    /// Accounts CPU time to a live thread.
    pub fn charge_thread_time(&self, tid: Tid, kernel: u64, user: u64) -> TeamResult<()> {
        if self.threads.lock().charge(tid, kernel, user) {
            Ok(())
        } else {
            Err(TeamError::NoSuchProcess)
        }
    }
}
