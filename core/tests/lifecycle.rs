mod common;

use common::{SLEEPER, boot, boot_with, eventually, register, spawn};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use team_core::host::{DebugEvent, FaultPoint};
use team_core::platform::{ImageLoader, UserMemory};
use team_core::{ArgSource, LoadFlags, ProcessInfoKind, TeamConfig, TeamError, WaitFlags, WaitTarget};
use team_process::Signal;

const EXITED: i32 = 1;
const KILLED: i32 = (9 << 16) | 2;

#[test]
fn spawned_team_exit_status_is_collected() {
    let (host, manager) = boot();
    host.register_program("/bin/answer", |context| {
        if context.args == ["/bin/answer", "-v"] { 42 } else { -1 }
    });

    let child = spawn(&manager, &["/bin/answer", "-v"]).unwrap();
    assert!(child > manager.kernel_team());

    let exit = manager.wait_for_child(WaitTarget::Child(child), WaitFlags::empty()).unwrap();
    assert_eq!(exit.thread, child);
    assert_eq!(exit.status, 42);
    assert_eq!(exit.reason, EXITED);
    assert_eq!(manager.team_info(child), Err(TeamError::NoSuchProcess));
    assert_eq!(manager.pending_death_entries(manager.kernel_team()), Some(0));

    eventually("the destructor", || host.vm.live_address_spaces() == 0);
    eventually("ports and semaphores", || host.ipc.deletions(child) == (1, 1));
    assert_eq!(host.io.live_contexts(), 1);
    assert_eq!(host.loader.image_count(child), 0);
    eventually("the deletion notice", || {
        let events = host.debugger.events_of(child);
        events.len() == 2
            && events.contains(&DebugEvent::Created(child))
            && events.contains(&DebugEvent::Deleted(child, None))
    });
    assert_eq!(manager.used_teams(), 1);
}

#[test]
fn failed_load_reports_loader_error() {
    let (host, manager) = boot();

    assert_eq!(spawn(&manager, &["/bin/missing"]), Err(TeamError::NotFound));
    assert_eq!(manager.used_teams(), 1);
    assert_eq!(manager.children_of(manager.kernel_team()), Ok(vec![]));
    eventually("the failed team's address space", || host.vm.live_address_spaces() == 0);

    // the dead team still left a death entry for its parent
    let exit = manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::NO_HANG).unwrap();
    assert_eq!(exit.status, TeamError::NotFound.code());
}

#[test]
fn spawn_without_arguments_is_rejected() {
    let (_host, manager) = boot();
    let result = manager.load_image(ArgSource::Kernel { args: &[], env: &[] }, 10, LoadFlags::WAIT_TILL_LOADED);
    assert_eq!(result, Err(TeamError::BadValue));
    assert_eq!(manager.used_teams(), 1);
}

#[test]
fn huge_argument_counts_are_rejected() {
    let (host, manager) = boot();
    let argv = host.user.alloc_str_array(&[SLEEPER]);
    let envp = host.user.alloc_str_array(&["HOME=/boot/home"]);
    for (argc, envc) in [(usize::MAX / 8, 0), (usize::MAX, 0), (1, usize::MAX / 8)] {
        let source = ArgSource::User { argv, argc, envp, envc };
        assert_eq!(
            manager.load_image(source, 10, LoadFlags::WAIT_TILL_LOADED),
            Err(TeamError::BadValue)
        );
    }
    assert_eq!(manager.used_teams(), 1);
    assert_eq!(host.vm.live_address_spaces(), 0);
}

#[test]
fn user_arguments_must_be_utf8() {
    let (host, manager) = boot();
    let garbage = host.user.alloc(&[b'/', 0xff, 0xfe, b'x', 0]);
    let argv = host.user.alloc(&[garbage.to_ne_bytes(), 0usize.to_ne_bytes()].concat());
    let source = ArgSource::User {
        argv,
        argc: 1,
        envp: 0,
        envc: 0,
    };
    assert_eq!(
        manager.load_image(source, 10, LoadFlags::WAIT_TILL_LOADED),
        Err(TeamError::BadValue)
    );
    assert_eq!(manager.used_teams(), 1);

    // a character cut by the length limit is dropped, not refused
    let cut = host.user.alloc(&[b'a', 0xc3, 0xa9, 0]);
    assert_eq!(host.user.read_cstr(cut, 3).as_deref(), Ok("a"));
    assert_eq!(host.user.read_cstr(cut, 4).as_deref(), Ok("a\u{e9}"));
}

#[test]
fn creation_failures_roll_back() {
    let (host, manager) = boot();
    let kernel = manager.kernel_team();

    for point in [FaultPoint::IoContext, FaultPoint::AddressSpace, FaultPoint::Spawn] {
        host.faults.fail_next(point);
        assert_eq!(spawn(&manager, &[SLEEPER]), Err(TeamError::NoMemory), "{:?}", point);
        assert_eq!(manager.used_teams(), 1, "{:?}", point);
        assert_eq!(manager.children_of(kernel), Ok(vec![]), "{:?}", point);
        assert_eq!(manager.group_members(kernel), Some(vec![kernel]), "{:?}", point);
        assert_eq!(host.vm.live_address_spaces(), 0, "{:?}", point);
        assert_eq!(host.io.live_contexts(), 1, "{:?}", point);
    }

    // nothing is left armed
    let child = spawn(&manager, &[SLEEPER]).unwrap();
    manager.kill_team(child).unwrap();
    manager.wait_for_child(WaitTarget::Child(child), WaitFlags::empty()).unwrap();
}

#[test]
fn team_limit_is_enforced() {
    let config = TeamConfig {
        max_teams: 2,
        ..TeamConfig::default()
    };
    let (_host, manager) = boot_with(config);

    let first = spawn(&manager, &[SLEEPER]).unwrap();
    assert_eq!(manager.max_teams(), 2);
    assert_eq!(spawn(&manager, &[SLEEPER]), Err(TeamError::NoMemory));

    manager.kill_team(first).unwrap();
    manager.wait_for_child(WaitTarget::Child(first), WaitFlags::empty()).unwrap();
    let second = spawn(&manager, &[SLEEPER]).unwrap();
    assert_ne!(first, second);
    manager.kill_team(second).unwrap();
    manager.wait_for_child(WaitTarget::Child(second), WaitFlags::empty()).unwrap();
}

#[test]
fn killed_team_reports_the_signal() {
    let (_host, manager) = boot();
    let child = spawn(&manager, &[SLEEPER]).unwrap();

    manager.kill_team(child).unwrap();
    let exit = manager.wait_for_child(WaitTarget::Child(child), WaitFlags::empty()).unwrap();
    assert_eq!(exit.reason, KILLED);
    assert_eq!(exit.status, 0);

    assert_eq!(manager.kill_team(child), Err(TeamError::NoSuchProcess));
    assert_eq!(manager.kill_team(manager.kernel_team()), Err(TeamError::NotAllowed));
}

#[test]
fn parent_is_signalled_when_a_child_dies() {
    let (host, manager) = boot();
    let kernel = manager.kernel_team();
    host.register_program("/bin/true", |_| 0);

    let child = spawn(&manager, &["/bin/true"]).unwrap();
    manager.wait_for_child(WaitTarget::Child(child), WaitFlags::empty()).unwrap();
    eventually("SIGCHLD", || host.scheduler.received(kernel).contains(&Signal::Child));
}

#[test]
fn no_hang_wait_would_block() {
    let (_host, manager) = boot();
    let kernel = manager.kernel_team();
    let child = spawn(&manager, &[SLEEPER]).unwrap();

    assert_eq!(
        manager.wait_for_child(WaitTarget::Child(child), WaitFlags::NO_HANG),
        Err(TeamError::WouldBlock)
    );
    assert_eq!(
        manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::NO_HANG),
        Err(TeamError::WouldBlock)
    );
    assert_eq!(manager.wait_for_any_of(kernel), Some(0));

    manager.kill_team(child).unwrap();
    manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::empty()).unwrap();
}

#[test]
fn waiting_without_children_fails() {
    let (_host, manager) = boot();
    assert_eq!(
        manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::empty()),
        Err(TeamError::NoSuchChild)
    );
    assert_eq!(
        manager.wait_for_child(WaitTarget::Child(4242), WaitFlags::empty()),
        Err(TeamError::NoSuchChild)
    );
    assert_eq!(
        manager.wait_for_child(WaitTarget::AnyInOwnGroup, WaitFlags::empty()),
        Err(TeamError::NotImplemented)
    );
}

#[test]
fn interrupted_wait_restores_wildcard_count() {
    let (host, manager) = boot();
    let kernel = manager.kernel_team();
    let child = spawn(&manager, &[SLEEPER]).unwrap();

    let scheduler = host.scheduler.clone();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        scheduler.interrupt(kernel);
    });
    assert_eq!(
        manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::empty()),
        Err(TeamError::Interrupted)
    );
    interrupter.join().unwrap();
    assert_eq!(manager.wait_for_any_of(kernel), Some(0));

    manager.kill_team(child).unwrap();
    let exit = manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::empty()).unwrap();
    assert_eq!(exit.thread, child);
}

#[test]
fn any_child_collects_every_child_once() {
    let (host, manager) = boot();
    host.register_program("/bin/one", |_| 1);
    host.register_program("/bin/two", |_| 2);

    let one = spawn(&manager, &["/bin/one"]).unwrap();
    let two = spawn(&manager, &["/bin/two"]).unwrap();
    let mut reaped: Vec<_> = (0..2)
        .map(|_| manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::empty()).unwrap())
        .map(|exit| (exit.thread, exit.status))
        .collect();
    reaped.sort();
    assert_eq!(reaped, [(one, 1), (two, 2)]);
    assert_eq!(
        manager.wait_for_child(WaitTarget::AnyChild, WaitFlags::empty()),
        Err(TeamError::NoSuchChild)
    );
}

#[test]
fn orphans_are_adopted_by_the_grandparent() {
    let (host, manager) = boot();
    let kernel = manager.kernel_team();
    let (tx, rx) = mpsc::channel();
    register(&host, &manager, "/bin/spawner", move |manager, _| {
        let grandchild = spawn(manager, &[SLEEPER]).unwrap();
        tx.send(grandchild).unwrap();
        0
    });

    let parent = spawn(&manager, &["/bin/spawner"]).unwrap();
    let grandchild = rx.recv().unwrap();
    manager.wait_for_child(WaitTarget::Child(parent), WaitFlags::empty()).unwrap();

    assert_eq!(manager.children_of(kernel), Ok(vec![grandchild]));
    assert_eq!(manager.parent_of(grandchild), Ok(kernel));
    assert_eq!(
        manager.process_info(grandchild, ProcessInfoKind::Parent),
        Err(TeamError::BadValue)
    );
    assert_eq!(manager.process_info(grandchild, ProcessInfoKind::Group), Ok(kernel));

    manager.kill_team(grandchild).unwrap();
    let exit = manager.wait_for_child(WaitTarget::Child(grandchild), WaitFlags::empty()).unwrap();
    assert_eq!(exit.reason, KILLED);
}

#[test]
fn exit_from_a_secondary_thread_ends_the_team() {
    let (host, manager) = boot();
    let scheduler = host.scheduler.clone();
    register(&host, &manager, "/bin/bail", move |manager, _| {
        let helper = manager.clone();
        manager
            .spawn_thread("bail", 10, Box::new(move || -> i32 { helper.exit_team(9) }))
            .unwrap();
        scheduler.wait_until_killed();
        0
    });

    let child = spawn(&manager, &["/bin/bail"]).unwrap();
    let exit = manager.wait_for_child(WaitTarget::Child(child), WaitFlags::empty()).unwrap();
    assert_eq!(exit.status, 9);
    assert_eq!(exit.reason, EXITED);
}

#[test]
fn dying_team_takes_its_threads_along() {
    let (host, manager) = boot();
    let scheduler = host.scheduler.clone();
    let (tx, rx) = mpsc::channel();
    register(&host, &manager, "/bin/multi", move |manager, context| {
        let scheduler = scheduler.clone();
        let worker = manager
            .spawn_thread(
                "worker",
                10,
                Box::new(move || {
                    scheduler.wait_until_killed();
                    3
                }),
            )
            .unwrap();
        let threads = manager.team_info(context.team).map_or(0, |info| info.thread_count);
        tx.send((worker, threads)).unwrap();
        0
    });

    let child = spawn(&manager, &["/bin/multi"]).unwrap();
    let (worker, threads) = rx.recv().unwrap();
    assert_eq!(threads, 2);
    let exit = manager.wait_for_child(WaitTarget::Child(child), WaitFlags::empty()).unwrap();
    assert_eq!(exit.status, 0);
    eventually("the worker to be killed", || manager.thread_info(worker).is_err());
    eventually("the team to be deleted", || manager.team_state(child).is_none());
}
