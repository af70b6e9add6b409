use crate::teams;
use axerrno::LinuxResult;
use team_process::Pid;

pub fn sys_setpgid_impl(pid: Pid, pgid: Pid) -> LinuxResult<isize> {
    Ok(teams()?.setpgid(pid, pgid)? as _)
}

pub fn sys_setsid_impl() -> LinuxResult<isize> {
    Ok(teams()?.setsid()? as _)
}
