use crate::death::{DeathEntry, DeathLedger};
use crate::event::{WaitEvent, WaitQueue};
use crate::process_group::FreedGroup;
use crate::table::TeamTable;
use crate::team::{TeamNode, TeamState};
use crate::thread::{ExitReason, Signal, ThreadExit};
use crate::wait::{Interest, WaitTarget};
use crate::{Pid, TeamError};
use alloc::sync::Arc;
use alloc::vec::Vec;
use proptest::prelude::*;

struct NoopQueue;

impl WaitQueue for NoopQueue {
    fn wait_until(&self, condition: &dyn Fn() -> bool, _interruptible: bool) -> bool {
        condition()
    }

    fn notify_all(&self) {}
}

fn event() -> Arc<WaitEvent> {
    WaitEvent::new(Arc::new(NoopQueue))
}

fn node(id: Pid) -> TeamNode<()> {
    TeamNode::new(id, "team", DeathLedger::new(event()), ())
}

/// Kernel team 1, alone in session 1 / group 1.
fn kernel_table() -> TeamTable<()> {
    let mut table = TeamTable::new();
    table.create_session(1);
    table.create_group(1, 1, event());
    table.insert(node(1));
    table.insert_into_group(1, 1);
    table
}

fn spawn(table: &mut TeamTable<()>, id: Pid, parent: Pid) {
    table.insert(node(id));
    table.insert_into_parent(parent, id);
    let group = table.get(parent).unwrap().get_group_id();
    table.insert_into_group(id, group);
}

fn die(table: &mut TeamTable<()>, id: Pid, status: i32) -> Option<FreedGroup> {
    let team = table.get(id).unwrap();
    let parent = team.get_parent().unwrap();
    let entry = DeathEntry::new(id, id, team.get_group_id(), ThreadExit::normal(status));
    table.post_death_entry(parent, entry, 32);
    table.remove_team(id)
}

fn move_to_new_group(table: &mut TeamTable<()>, id: Pid, new_session: bool) {
    table.remove_from_group(id);
    let sid = if new_session {
        table.create_session(id);
        id
    } else {
        table.get(id).unwrap().get_session_id()
    };
    table.create_group(id, sid, event());
    table.insert_into_group(id, id);
}

#[test]
fn orphans_are_adopted_by_grandparent() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    spawn(&mut table, 3, 2);
    spawn(&mut table, 4, 2);

    die(&mut table, 2, 7);

    assert_eq!(table.get(3).unwrap().get_parent(), Some(1));
    assert_eq!(table.get(4).unwrap().get_parent(), Some(1));
    let kernel_children: Vec<Pid> = table.get(1).unwrap().children().collect();
    assert_eq!(kernel_children, [3, 4]);
    assert!(table.lookup(2).is_none());
    assert_eq!(table.get(2).unwrap().get_state(), TeamState::Death);
    assert_eq!(table.get(1).unwrap().ledger().len(), 1);
    assert_eq!(table.used_teams(), 3);

    let dead = table.delete(2).unwrap();
    assert_eq!(dead.get_pid(), 2);
    assert_eq!(table.used_teams(), 3);
}

#[test]
fn last_member_frees_group_and_session() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    move_to_new_group(&mut table, 2, true);
    assert_eq!(table.session(2).unwrap().group_count(), 1);

    let freed = die(&mut table, 2, 0).expect("group 2 should be freed");
    assert_eq!(freed.group.get_pgid(), 2);
    assert_eq!(freed.session.as_ref().map(|s| s.get_sid()), Some(2));
    assert!(table.group(2).is_none());
    assert!(table.session(2).is_none());

    // Unlinking again is a no-op.
    assert!(table.remove_from_group(2).is_none());
}

#[test]
fn group_survives_while_other_members_remain() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    spawn(&mut table, 3, 1);
    move_to_new_group(&mut table, 2, false);
    table.remove_from_group(3);
    table.insert_into_group(3, 2);

    assert!(die(&mut table, 2, 0).is_none());
    let group = table.group(2).unwrap();
    assert_eq!(group.members().collect::<Vec<_>>(), [3]);
    assert_eq!(table.session(1).unwrap().group_count(), 2);
}

#[test]
fn specific_wait_does_not_steal_from_wildcard_waiter() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    let mut wildcard = table.register_interest(1, WaitTarget::AnyChild).unwrap();
    die(&mut table, 2, 42);

    let mut none = Interest::None;
    let entry = table
        .poll_death_entry(1, WaitTarget::Child(2), &mut none)
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, 42);
    assert_eq!(table.get(1).unwrap().ledger().len(), 1);

    let entry = table
        .poll_death_entry(1, WaitTarget::AnyChild, &mut wildcard)
        .unwrap()
        .unwrap();
    assert_eq!(entry.team, 2);
    assert_eq!(wildcard, Interest::None);
    assert!(table.get(1).unwrap().ledger().is_empty());
    assert_eq!(table.get(1).unwrap().ledger().wait_for_any(), 0);
}

#[test]
fn poll_tells_missing_children_from_running_ones() {
    let mut table = kernel_table();
    let mut none = Interest::None;
    assert_eq!(
        table.poll_death_entry(1, WaitTarget::Child(99), &mut none),
        Err(TeamError::NoSuchChild)
    );
    assert_eq!(
        table.poll_death_entry(1, WaitTarget::AnyChild, &mut none),
        Err(TeamError::NoSuchChild)
    );

    spawn(&mut table, 2, 1);
    spawn(&mut table, 3, 2);
    assert_eq!(table.poll_death_entry(1, WaitTarget::Child(2), &mut none), Ok(None));
    assert_eq!(table.poll_death_entry(1, WaitTarget::AnyChild, &mut none), Ok(None));
    // A grandchild is not a child.
    assert_eq!(
        table.poll_death_entry(1, WaitTarget::Child(3), &mut none),
        Err(TeamError::NoSuchChild)
    );
    assert_eq!(
        table.poll_death_entry(1, WaitTarget::AnyInOwnGroup, &mut none),
        Err(TeamError::NotImplemented)
    );
}

#[test]
fn group_interest_follows_membership() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    let mut interest = table.register_interest(1, WaitTarget::Group(1)).unwrap();
    assert_eq!(table.group(1).unwrap().wait_for_any(), 1);
    assert_eq!(table.get(2).unwrap().ledger().wait_for_any(), 1);

    spawn(&mut table, 3, 1);
    assert_eq!(table.get(3).unwrap().ledger().wait_for_any(), 1);
    move_to_new_group(&mut table, 3, false);
    assert_eq!(table.get(3).unwrap().ledger().wait_for_any(), 0);

    table.withdraw_interest(&mut interest);
    table.withdraw_interest(&mut interest);
    assert_eq!(table.group(1).unwrap().wait_for_any(), 0);
    assert_eq!(table.get(1).unwrap().ledger().wait_for_any(), 0);
    assert_eq!(table.get(2).unwrap().ledger().wait_for_any(), 0);
}

#[test]
fn group_wait_collects_from_member_ledgers() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    spawn(&mut table, 3, 2);
    let mut interest = table.register_interest(1, WaitTarget::Group(1)).unwrap();

    die(&mut table, 3, 5);
    let entry = table
        .poll_death_entry(1, WaitTarget::Group(1), &mut interest)
        .unwrap()
        .unwrap();
    assert_eq!((entry.team, entry.status), (3, 5));
    assert!(table.get(2).unwrap().ledger().is_empty());
    assert_eq!(table.group(1).unwrap().wait_for_any(), 0);
}

#[test]
fn group_wait_rejects_foreign_session() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    move_to_new_group(&mut table, 2, true);
    assert_eq!(
        table.register_interest(1, WaitTarget::Group(2)),
        Err(TeamError::NoSuchChild)
    );
}

#[test]
fn ledger_cap_evicts_oldest_entry() {
    let mut table = kernel_table();
    for id in 2..=4 {
        spawn(&mut table, id, 1);
        let entry = DeathEntry::new(id, id, 1, ThreadExit::normal(id));
        table.post_death_entry(1, entry, 2);
        table.remove_team(id);
    }
    let teams: Vec<Pid> = table.get(1).unwrap().ledger().entries().map(|e| e.team).collect();
    assert_eq!(teams, [3, 4]);
}

#[test]
fn cpu_time_folds_into_parent_ledger() {
    let mut table = kernel_table();
    spawn(&mut table, 2, 1);
    spawn(&mut table, 3, 2);
    table.get_mut(3).unwrap().dead_threads_user_time = 30;
    table.get_mut(2).unwrap().dead_threads_kernel_time = 5;

    die(&mut table, 3, 0);
    die(&mut table, 2, 0);
    let ledger = table.get(1).unwrap().ledger();
    assert_eq!((ledger.kernel_time, ledger.user_time), (5, 30));
}

#[test]
fn killed_exit_packs_signal_and_reason() {
    let entry = DeathEntry::new(5, 5, 1, ThreadExit::killed(Signal::Kill));
    assert_eq!(entry.reason, ExitReason::Interrupted);
    assert_eq!(entry.packed_reason(), (9 << 16) | 2);
    assert_eq!(DeathEntry::new(5, 5, 1, ThreadExit::normal(3)).packed_reason(), 1);
}

#[test]
fn names_are_truncated_on_char_boundary() {
    let mut team = node(9);
    team.set_name("ééééééééééééééééééééééééééé");
    assert!(team.get_name().len() <= 31);
    assert!(team.get_name().chars().all(|c| c == 'é'));
}

#[derive(Debug, Clone)]
enum Op {
    WaitAny(usize),
    WaitGroup(usize, bool),
    Withdraw(usize),
    Move(usize, bool),
}

const MEMBERS: [Pid; 5] = [2, 3, 4, 5, 6];
const SIDE_GROUP: Pid = 10;

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..MEMBERS.len() + 1).prop_map(Op::WaitAny),
        (0..MEMBERS.len() + 1, any::<bool>()).prop_map(|(c, g)| Op::WaitGroup(c, g)),
        (0..8usize).prop_map(Op::Withdraw),
        (0..MEMBERS.len(), any::<bool>()).prop_map(|(m, g)| Op::Move(m, g)),
    ]
}

fn caller(index: usize) -> Pid {
    if index == 0 { 1 } else { MEMBERS[index - 1] }
}

fn check_conservation(table: &TeamTable<()>, interests: &[Interest]) {
    for team in table.iter() {
        let id = team.get_pid();
        let expected: i32 = interests
            .iter()
            .map(|interest| match *interest {
                Interest::AnyChild(owner) if owner == id => 1,
                Interest::Group { pgid, serial } => table
                    .group(pgid)
                    .filter(|g| g.get_serial() == serial && g.contains(id))
                    .map_or(0, |_| 1),
                _ => 0,
            })
            .sum();
        assert_eq!(team.ledger().wait_for_any(), expected, "ledger of team {}", id);
    }
    for pgid in [1, SIDE_GROUP] {
        if let Some(group) = table.group(pgid) {
            let expected = interests
                .iter()
                .filter(|i| **i == Interest::Group { pgid, serial: group.get_serial() })
                .count() as i32;
            assert_eq!(group.wait_for_any(), expected, "group {}", pgid);
        }
    }
}

proptest! {
    #[test]
    fn wait_for_any_is_conserved(ops in prop::collection::vec(op(), 1..48)) {
        let mut table = kernel_table();
        for id in MEMBERS {
            spawn(&mut table, id, 1);
        }
        let mut interests: Vec<Interest> = Vec::new();

        for op in ops {
            match op {
                Op::WaitAny(index) => {
                    interests.push(table.register_interest(caller(index), WaitTarget::AnyChild).unwrap());
                }
                Op::WaitGroup(index, side) => {
                    let pgid = if side { SIDE_GROUP } else { 1 };
                    if let Ok(interest) = table.register_interest(caller(index), WaitTarget::Group(pgid)) {
                        interests.push(interest);
                    }
                }
                Op::Withdraw(index) => {
                    if !interests.is_empty() {
                        let mut interest = interests.remove(index % interests.len());
                        table.withdraw_interest(&mut interest);
                    }
                }
                Op::Move(index, side) => {
                    let id = MEMBERS[index];
                    let pgid = if side { SIDE_GROUP } else { 1 };
                    table.remove_from_group(id);
                    if table.group(pgid).is_none() {
                        table.create_group(pgid, 1, event());
                    }
                    table.insert_into_group(id, pgid);
                }
            }
            check_conservation(&table, &interests);
        }

        for mut interest in interests {
            table.withdraw_interest(&mut interest);
        }
        for team in table.iter() {
            prop_assert_eq!(team.ledger().wait_for_any(), 0);
        }
    }
}
