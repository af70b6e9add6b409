use crate::death::DeathEntry;
use crate::event::WaitEvent;
use crate::process_group::{FreedGroup, ProcessGroup};
use crate::session::Session;
use crate::team::{TeamNode, TeamState};
use crate::Pid;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// The global team tree plus the process groups and sessions it is
/// partitioned into. Every method expects the team lock to be held.
pub struct TeamTable<T> {
    pub(crate) teams: BTreeMap<Pid, TeamNode<T>>,
    pub(crate) groups: BTreeMap<Pid, ProcessGroup>,
    pub(crate) sessions: BTreeMap<Pid, Session>,
    used_teams: usize,
    next_group_serial: u64,
}

impl<T> Default for TeamTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TeamTable<T> {
    pub const fn new() -> Self {
        Self {
            teams: BTreeMap::new(),
            groups: BTreeMap::new(),
            sessions: BTreeMap::new(),
            used_teams: 0,
            next_group_serial: 1,
        }
    }

    /// Number of teams not yet past `team_remove_team`.
    pub fn used_teams(&self) -> usize {
        self.used_teams
    }

    pub fn insert(&mut self, team: TeamNode<T>) {
        let id = team.get_pid();
        if self.teams.contains_key(&id) {
            panic!("[team] team with id {} already exists", id);
        }
        self.teams.insert(id, team);
        self.used_teams += 1;
    }

    /// Any team still in the table, dying ones included.
    pub fn get(&self, id: Pid) -> Option<&TeamNode<T>> {
        self.teams.get(&id)
    }

    pub fn get_mut(&mut self, id: Pid) -> Option<&mut TeamNode<T>> {
        self.teams.get_mut(&id)
    }

    /// A team that is visible to lookups: dying teams are not.
    pub fn lookup(&self, id: Pid) -> Option<&TeamNode<T>> {
        self.teams.get(&id).filter(|team| team.is_alive())
    }

    pub fn lookup_mut(&mut self, id: Pid) -> Option<&mut TeamNode<T>> {
        self.teams.get_mut(&id).filter(|team| team.is_alive())
    }

    /// Live teams in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &TeamNode<T>> {
        self.teams.values().filter(|team| team.is_alive())
    }

    /// Live teams with an ID of at least `from`.
    pub fn iter_from(&self, from: Pid) -> impl Iterator<Item = &TeamNode<T>> {
        self.teams.range(from..).map(|(_, team)| team).filter(|team| team.is_alive())
    }

    /// Drops the team object itself. Only for teams already unlinked by
    /// [`TeamTable::remove_team`] or never linked at all.
    pub fn delete(&mut self, id: Pid) -> Option<TeamNode<T>> {
        let team = self.teams.remove(&id)?;
        assert!(
            team.parent.is_none() && team.group.is_none() && team.children.is_empty(),
            "[team] team {} deleted while still linked",
            id
        );
        if team.state != TeamState::Death {
            self.used_teams -= 1;
        }
        Some(team)
    }

    pub fn insert_into_parent(&mut self, parent: Pid, child: Pid) {
        let Some(parent_team) = self.teams.get_mut(&parent) else {
            panic!("[team] parent {} of team {} does not exist", parent, child);
        };
        parent_team.children.insert(child);
        let Some(child_team) = self.teams.get_mut(&child) else {
            panic!("[team] team {} does not exist", child);
        };
        assert!(child_team.parent.is_none(), "[team] team {} already has a parent", child);
        child_team.parent = Some(parent);
    }

    pub fn remove_from_parent(&mut self, child: Pid) {
        let Some(parent) = self.teams.get_mut(&child).and_then(|team| team.parent.take()) else {
            return;
        };
        if let Some(parent_team) = self.teams.get_mut(&parent) {
            parent_team.children.remove(&child);
        }
    }

    /// Hands every child of `team` over to `team`'s own parent.
    pub fn reparent_children(&mut self, team: Pid) {
        let Some(node) = self.teams.get_mut(&team) else {
            return;
        };
        let children = core::mem::take(&mut node.children);
        if children.is_empty() {
            return;
        }
        let Some(new_parent) = node.parent else {
            panic!("[team] parentless team {} cannot hand over its children", team);
        };
        for child in children {
            if let Some(child_team) = self.teams.get_mut(&child) {
                child_team.parent = Some(new_parent);
            }
            if let Some(parent_team) = self.teams.get_mut(&new_parent) {
                parent_team.children.insert(child);
            }
            debug!("[team] team {} adopted by {}", child, new_parent);
        }
    }

    pub fn session(&self, sid: Pid) -> Option<&Session> {
        self.sessions.get(&sid)
    }

    pub fn group(&self, pgid: Pid) -> Option<&ProcessGroup> {
        self.groups.get(&pgid)
    }

    pub fn group_in_session(&self, sid: Pid, pgid: Pid) -> Option<&ProcessGroup> {
        self.groups.get(&pgid).filter(|group| group.get_sid() == sid)
    }

    pub fn create_session(&mut self, sid: Pid) {
        if self.sessions.contains_key(&sid) {
            panic!("[team] session with id {} already exists", sid);
        }
        self.sessions.insert(sid, Session::new(sid));
    }

    /// Creates an empty group inside an existing session.
    pub fn create_group(&mut self, pgid: Pid, sid: Pid, event: Arc<WaitEvent>) {
        if self.groups.contains_key(&pgid) {
            panic!("[team] process group with id {} already exists", pgid);
        }
        let Some(session) = self.sessions.get_mut(&sid) else {
            panic!("[team] session {} of group {} does not exist", sid, pgid);
        };
        session.group_count += 1;
        let serial = self.next_group_serial;
        self.next_group_serial += 1;
        self.groups.insert(pgid, ProcessGroup::new(pgid, serial, sid, event));
    }

    pub fn insert_into_group(&mut self, team: Pid, pgid: Pid) {
        let Some(group) = self.groups.get_mut(&pgid) else {
            panic!("[team] process group {} does not exist", pgid);
        };
        let Some(node) = self.teams.get_mut(&team) else {
            panic!("[team] team {} does not exist", team);
        };
        assert!(node.group.is_none(), "[team] team {} is already in a group", team);
        group.members.insert(team);
        node.group = Some(pgid);
        node.group_id = pgid;
        node.session_id = group.get_sid();
        node.ledger.adjust_wait_for_any(group.wait_for_any);
    }

    /// Unlinks `team` from its group. A group left empty is unlinked as
    /// well, together with its session if that was the last group; both are
    /// returned so they can be dropped outside the lock. Calling this on a
    /// team that is not in a group does nothing.
    pub fn remove_from_group(&mut self, team: Pid) -> Option<FreedGroup> {
        let node = self.teams.get_mut(&team)?;
        let pgid = node.group.take()?;
        let Some(group) = self.groups.get_mut(&pgid) else {
            panic!("[team] team {} was in missing group {}", team, pgid);
        };
        group.members.remove(&team);
        node.ledger.adjust_wait_for_any(-group.wait_for_any);
        if !group.members.is_empty() {
            return None;
        }
        let group = self.groups.remove(&pgid)?;
        let sid = group.get_sid();
        let session = match self.sessions.get_mut(&sid) {
            Some(session) => {
                session.group_count -= 1;
                if session.group_count == 0 {
                    self.sessions.remove(&sid)
                } else {
                    None
                }
            }
            None => None,
        };
        debug!(
            "[team] group {} freed{}",
            pgid,
            if session.is_some() { " with its session" } else { "" }
        );
        Some(FreedGroup { group, session })
    }

    /// Appends `entry` to the ledger of `parent`.
    pub fn post_death_entry(&mut self, parent: Pid, entry: DeathEntry, cap: usize) {
        if let Some(parent_team) = self.teams.get_mut(&parent) {
            parent_team.ledger.push(entry, cap);
        }
    }

    /// Events to signal once `team` dies: its parent's ledger, its own
    /// group and its parent's group.
    pub fn death_events(&self, team: Pid) -> Vec<Arc<WaitEvent>> {
        let Some(node) = self.teams.get(&team) else {
            return Vec::new();
        };
        let parent = node.parent.and_then(|parent| self.teams.get(&parent));
        let group_event = |pgid: Option<Pid>| {
            pgid.and_then(|pgid| self.groups.get(&pgid))
                .map(|group| group.event.clone())
        };
        let candidates = [
            parent.map(|parent| parent.ledger.event.clone()),
            group_event(node.group),
            group_event(parent.and_then(|parent| parent.group)),
        ];

        let mut events: Vec<Arc<WaitEvent>> = Vec::new();
        for event in candidates.into_iter().flatten() {
            if !events.iter().any(|known| Arc::ptr_eq(known, &event)) {
                events.push(event);
            }
        }
        events
    }

    /// Takes `team` out of the tree: marks it dying, folds its CPU time into
    /// the parent's ledger, hands its children to the parent and leaves the
    /// group. The object stays in the table, invisible to lookups, until
    /// [`TeamTable::delete`].
    pub fn remove_team(&mut self, team: Pid) -> Option<FreedGroup> {
        let Some(node) = self.teams.get_mut(&team) else {
            panic!("[team] removing unknown team {}", team);
        };
        assert!(node.is_alive(), "[team] team {} removed twice", team);
        node.state = TeamState::Death;
        self.used_teams -= 1;
        let kernel = node.dead_threads_kernel_time + node.ledger.kernel_time;
        let user = node.dead_threads_user_time + node.ledger.user_time;
        let parent = node.parent;
        if let Some(parent) = parent.and_then(|parent| self.teams.get_mut(&parent)) {
            parent.ledger.add_times(kernel, user);
        }

        self.reparent_children(team);
        let freed = self.remove_from_group(team);
        self.remove_from_parent(team);
        freed
    }
}
