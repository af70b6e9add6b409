use crate::ptr::{PtrWrapper, UserConstPtr};
use crate::teams;
use axerrno::{LinuxError, LinuxResult};
use team_core::{ArgSource, LoadFlags};

/// Starts a new team from user supplied `argv`/`envp` arrays. `argv[0]`
/// names the program.
pub fn sys_load_image_impl(
    argv: UserConstPtr<usize>,
    argc: usize,
    envp: UserConstPtr<usize>,
    envc: usize,
    priority: i32,
    flags: u32,
) -> LinuxResult<isize> {
    let flags = LoadFlags::from_bits(flags).ok_or(LinuxError::EINVAL)?;
    let source = ArgSource::User {
        argv: argv.address(),
        argc,
        envp: envp.address(),
        envc,
    };
    let team = teams()?.load_image(source, priority, flags)?;
    Ok(team as _)
}
