#![allow(dead_code)]

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use team_core::host::HostPlatform;
use team_core::{ArgSource, LoadFlags, Pid, TeamConfig, TeamManager, TeamResult};

/// Program that blocks until its team is killed.
pub const SLEEPER: &str = "/bin/sleeper";

pub fn boot_with(config: TeamConfig) -> (HostPlatform, Arc<TeamManager>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = HostPlatform::new();
    let manager = host.boot(config).expect("boot");
    let scheduler = host.scheduler.clone();
    host.register_program(SLEEPER, move |_| {
        scheduler.wait_until_killed();
        0
    });
    (host, manager)
}

pub fn boot() -> (HostPlatform, Arc<TeamManager>) {
    boot_with(TeamConfig::default())
}

/// Registers a program that gets the manager handed in.
pub fn register<F>(host: &HostPlatform, manager: &Arc<TeamManager>, path: &str, program: F)
where
    F: Fn(&Arc<TeamManager>, &team_core::host::ProgramContext) -> i32 + Send + Sync + 'static,
{
    let manager: Weak<TeamManager> = Arc::downgrade(manager);
    host.register_program(path, move |context| {
        let manager = manager.upgrade().expect("manager gone");
        program(&manager, context)
    });
}

pub fn spawn(manager: &Arc<TeamManager>, args: &[&str]) -> TeamResult<Pid> {
    manager.load_image(ArgSource::Kernel { args, env: &[] }, 10, LoadFlags::WAIT_TILL_LOADED)
}

pub fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(2));
    }
}
