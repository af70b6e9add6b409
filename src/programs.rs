//! Programs the simulated loader knows. They only talk to the kernel
//! through [`handle_syscall`], like user space would.

use team_api::imp::task::UserTeamInfo;
use team_api::syscall::{Sysno, TEAM_INFO_SIZE, handle_syscall};
use team_core::host::{HostPlatform, HostUserMemory, set_fork_continuation};

pub const INIT: &str = "/bin/init";

const WAIT_TILL_LOADED: usize = 0x1;

fn syscall(sysno: Sysno, args: [usize; 6]) -> isize {
    handle_syscall(sysno as usize, args)
}

fn read_i32(user: &HostUserMemory, addr: usize) -> Option<i32> {
    let bytes = user.read_vec(addr, 4).ok()?;
    Some(i32::from_ne_bytes(bytes.try_into().ok()?))
}

/// Waits for `child`, returning its exit status.
fn wait(user: &HostUserMemory, child: isize) -> Option<i32> {
    let status = user.alloc_zeroed(4);
    if syscall(Sysno::WaitForChild, [child as usize, 0, 0, status, 0, 0]) != child {
        return None;
    }
    read_i32(user, status)
}

pub fn install(host: &HostPlatform) {
    host.register_program("/bin/true", |_| 0);
    host.register_program("/bin/false", |_| 1);

    host.register_program("/bin/hello", |context| {
        let pid = syscall(Sysno::Getpid, [0; 6]);
        let ppid = syscall(Sysno::Getppid, [0; 6]);
        info!("[hello] team {} (parent {}) says {}", pid, ppid, context.args[1..].join(" "));
        0
    });

    let user = host.user.clone();
    host.register_program("/bin/ps", move |_| {
        let cookie = user.alloc_zeroed(4);
        let info = user.alloc_zeroed(TEAM_INFO_SIZE);
        while syscall(Sysno::GetNextTeamInfo, [cookie, info, 0, 0, 0, 0]) == 0 {
            let Ok(bytes) = user.read_vec(info, TEAM_INFO_SIZE) else {
                return 1;
            };
            let team: UserTeamInfo = bytemuck::pod_read_unaligned(&bytes);
            info!("[ps] {:>4} threads {} {}", team.team, team.thread_count, team.args());
        }
        0
    });

    let user = host.user.clone();
    host.register_program(INIT, move |_| {
        let session = syscall(Sysno::Setsid, [0; 6]);
        info!("[init] running in session {}", session);

        set_fork_continuation(|| {
            let pid = syscall(Sysno::Getpid, [0; 6]);
            info!("[init] forked child {} running", pid);
            0
        });
        let forked = syscall(Sysno::Fork, [0; 6]);
        if forked < 0 {
            return forked as i32;
        }

        let mut spawned = Vec::new();
        for args in [&["/bin/hello", "world"][..], &["/bin/ps"][..]] {
            let argv = user.alloc_str_array(args);
            let child = syscall(Sysno::LoadImage, [argv, args.len(), 0, 0, 10, WAIT_TILL_LOADED]);
            if child < 0 {
                return child as i32;
            }
            spawned.push(child);
        }

        let mut failures = 0;
        for child in core::iter::once(forked).chain(spawned) {
            match wait(&user, child) {
                Some(0) => {}
                status => {
                    warn!("[init] child {} ended with {:?}", child, status);
                    failures += 1;
                }
            }
        }
        failures
    });
}
