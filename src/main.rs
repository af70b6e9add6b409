//! Boots the team engine on the host simulation and runs user tasks.
//!
//! Each command line argument is one task, e.g. `"/bin/init"` or
//! `"/bin/hello a b"`. Without arguments the init program runs.

#[macro_use]
extern crate log;

mod programs;

use team_core::host::HostPlatform;
use team_core::{ArgSource, LoadFlags, TeamConfig, WaitFlags, WaitTarget};

const ENVS: &[&str] = &["PATH=/bin", "HOME=/boot/home"];

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let host = HostPlatform::new();
    let manager = match host.boot(TeamConfig::default()) {
        Ok(manager) => manager,
        Err(err) => {
            error!("[task manager] boot failed: {:?}", err);
            std::process::exit(1);
        }
    };
    team_api::init(manager.clone());
    programs::install(&host);

    let mut testcases: Vec<String> = std::env::args().skip(1).collect();
    if testcases.is_empty() {
        testcases.push(String::from(programs::INIT));
    }

    let mut failed = false;
    for testcase in &testcases {
        let args: Vec<&str> = testcase.split_whitespace().collect();
        info!("[task manager] Running user task: {}", testcase);
        let result = manager
            .load_image(ArgSource::Kernel { args: &args, env: ENVS }, 10, LoadFlags::WAIT_TILL_LOADED)
            .and_then(|team| manager.wait_for_child(WaitTarget::Child(team), WaitFlags::empty()));
        match result {
            Ok(exit) => {
                info!(
                    "[task manager] User task {} exited with status {} (reason {:#x})",
                    testcase, exit.status, exit.reason
                );
                failed |= exit.status != 0;
            }
            Err(err) => {
                error!("[task manager] User task {} failed: {:?}", testcase, err);
                failed = true;
            }
        }
    }

    print!("{}", manager.dump_teams());
    host.scheduler.join_all();
    if failed {
        std::process::exit(1);
    }
}
