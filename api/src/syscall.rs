//! Syscall number decoding and dispatch.

use crate::imp::task::{UserTeamInfo, UserTeamUsage};
use crate::interface::task::*;
use crate::interface::user::*;
use axerrno::{LinuxError, LinuxResult};
use num_enum::TryFromPrimitive;

#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum Sysno {
    LoadImage = 1,
    Exec = 2,
    Fork = 3,
    WaitForChild = 4,
    ExitTeam = 5,
    KillTeam = 6,
    KillThread = 7,
    Setpgid = 8,
    Setsid = 9,
    GetTeamInfo = 10,
    GetNextTeamInfo = 11,
    GetTeamUsageInfo = 12,
    Getpid = 13,
    Getppid = 14,
    ProcessInfo = 15,
}

/// Runs syscall `syscall_num` with raw register arguments. Errors come
/// back as negative errno values.
pub fn handle_syscall(syscall_num: usize, args: [usize; 6]) -> isize {
    let result: LinuxResult<isize> = match Sysno::try_from(syscall_num) {
        Ok(sysno) => {
            trace!("[syscall] <{:?}> begin", sysno);
            dispatch(sysno, args)
        }
        Err(_) => stub_unimplemented(syscall_num),
    };
    let ans = result.unwrap_or_else(|err| -err.code() as _);
    trace!("[syscall] <{}> return {}", syscall_num, ans);
    ans
}

fn dispatch(sysno: Sysno, args: [usize; 6]) -> LinuxResult<isize> {
    let [arg0, arg1, arg2, arg3, arg4, arg5] = args;
    match sysno {
        Sysno::LoadImage => sys_load_image(arg0.into(), arg1, arg2.into(), arg3, arg4 as _, arg5 as _),
        Sysno::Exec => sys_exec(arg0.into(), arg1.into(), arg2, arg3.into(), arg4),
        Sysno::Fork => sys_fork(),
        Sysno::WaitForChild => sys_wait_for_child(arg0 as _, arg1 as _, arg2.into(), arg3.into()),
        Sysno::ExitTeam => sys_exit_team(arg0 as _),
        Sysno::KillTeam => sys_kill_team(arg0 as _),
        Sysno::KillThread => sys_kill_thread(arg0 as _),
        Sysno::Setpgid => sys_setpgid(arg0 as _, arg1 as _),
        Sysno::Setsid => sys_setsid(),
        Sysno::GetTeamInfo => sys_get_team_info(arg0 as _, arg1.into()),
        Sysno::GetNextTeamInfo => sys_get_next_team_info(arg0.into(), arg1.into()),
        Sysno::GetTeamUsageInfo => sys_get_team_usage_info(arg0 as _, arg1 as _, arg2.into()),
        Sysno::Getpid => sys_getpid(),
        Sysno::Getppid => sys_getppid(),
        Sysno::ProcessInfo => sys_process_info(arg0 as _, arg1 as _),
    }
}

fn stub_unimplemented(syscall_num: usize) -> LinuxResult<isize> {
    warn!("Unimplemented syscall: {}, ENOSYS", syscall_num);
    Err(LinuxError::ENOSYS)
}

/// Size of the structures some syscalls fill in, for callers laying out
/// user memory.
pub const TEAM_INFO_SIZE: usize = core::mem::size_of::<UserTeamInfo>();
pub const TEAM_USAGE_SIZE: usize = core::mem::size_of::<UserTeamUsage>();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_numbers_fail_with_enosys() {
        assert_eq!(handle_syscall(0, [0; 6]), -(LinuxError::ENOSYS.code() as isize));
        assert_eq!(handle_syscall(999, [0; 6]), -(LinuxError::ENOSYS.code() as isize));
    }

    #[test]
    fn numbers_decode() {
        assert_eq!(Sysno::try_from(4usize).ok(), Some(Sysno::WaitForChild));
        assert_eq!(TEAM_INFO_SIZE, 7 * 4 + 64);
        assert_eq!(TEAM_USAGE_SIZE, 16);
    }
}
