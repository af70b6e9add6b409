use crate::ptr::{PtrWrapper, UserConstPtr};
use crate::teams;
use axerrno::LinuxResult;
use team_core::ArgSource;

/// Replaces the calling team's program. Returns only on failure.
pub fn sys_exec_impl(
    path: UserConstPtr<u8>,
    argv: UserConstPtr<usize>,
    argc: usize,
    envp: UserConstPtr<usize>,
    envc: usize,
) -> LinuxResult<isize> {
    let path = path.read_str()?;
    let source = ArgSource::User {
        argv: argv.address(),
        argc,
        envp: envp.address(),
        envc,
    };
    debug!("[exec] {} with {} args, {} env", path, argc, envc);
    match teams()?.exec(&path, source) {
        Ok(never) => match never {},
        Err(err) => Err(err.into()),
    }
}
