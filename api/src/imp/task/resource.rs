use crate::teams;
use axerrno::{LinuxError, LinuxResult};
use bytemuck::{Pod, Zeroable};
use team_core::{TeamUsage, UsageWho};
use team_process::Pid;

/// CPU time as user space sees it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct UserTeamUsage {
    pub user_time: u64,
    pub kernel_time: u64,
}

impl From<TeamUsage> for UserTeamUsage {
    fn from(usage: TeamUsage) -> Self {
        Self {
            user_time: usage.user_time,
            kernel_time: usage.kernel_time,
        }
    }
}

pub fn sys_get_team_usage_info_impl(team: Pid, who: i32) -> LinuxResult<UserTeamUsage> {
    let who = UsageWho::try_from(who).map_err(|_| LinuxError::EINVAL)?;
    Ok(teams()?.team_usage_info(team, who)?.into())
}
