use crate::teams;
use axerrno::LinuxResult;
use team_process::{Pid, Tid};

pub fn sys_exit_team_impl(status: i32) -> LinuxResult<isize> {
    let teams = teams()?;
    info!("[exit] team {:?} exiting with {}", teams.current_team(), status);
    teams.exit_team(status)
}

pub fn sys_kill_team_impl(team: Pid) -> LinuxResult<isize> {
    teams()?.kill_team(team)?;
    Ok(0)
}

pub fn sys_kill_thread_impl(thread: Tid) -> LinuxResult<isize> {
    teams()?.kill_thread(thread)?;
    Ok(0)
}
