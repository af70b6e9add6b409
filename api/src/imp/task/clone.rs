use crate::teams;
use axerrno::LinuxResult;

/// Duplicates the calling team; the parent gets the child's ID.
pub fn sys_fork_impl() -> LinuxResult<isize> {
    let child = teams()?.fork()?;
    Ok(child as _)
}
