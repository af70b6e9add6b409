use axerrno::LinuxError;
use std::sync::OnceLock;
use team_api::imp::task::{UserTeamInfo, UserTeamUsage};
use team_api::syscall::{Sysno, TEAM_INFO_SIZE, TEAM_USAGE_SIZE, handle_syscall};
use team_core::TeamConfig;
use team_core::host::{HostPlatform, set_fork_continuation};

const SLEEPER: &str = "/bin/sleeper";
const EXITED: i32 = 1;
const KILLED: i32 = (9 << 16) | 2;
const WAIT_TILL_LOADED: usize = 0x1;
const NO_HANG: usize = 0x1;

static HOST: OnceLock<HostPlatform> = OnceLock::new();

/// Boots one system for the whole binary and makes the calling test
/// thread act as the kernel team.
fn host() -> &'static HostPlatform {
    let host = HOST.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        let host = HostPlatform::new();
        team_api::init(host.boot(TeamConfig::default()).expect("boot"));
        register_programs(&host);
        host
    });
    host.scheduler.adopt_current(1);
    host
}

fn register_programs(host: &HostPlatform) {
    let scheduler = host.scheduler.clone();
    host.register_program(SLEEPER, move |_| {
        scheduler.wait_until_killed();
        0
    });
    host.register_program("/bin/seven", |context| {
        if context.args == ["/bin/seven", "x"] && context.env == ["A=1"] { 7 } else { -1 }
    });
    host.register_program("/bin/finish", |_| 11);

    let user = host.user.clone();
    host.register_program("/bin/exec-finish", move |_| {
        let path = user.alloc_str("/bin/finish");
        let argv = user.alloc_str_array(&["finish"]);
        handle_syscall(Sysno::Exec as usize, [path, argv, 1, 0, 0, 0]) as i32
    });
    host.register_program("/bin/exec-bad-path", |_| {
        handle_syscall(Sysno::Exec as usize, [0x10, 0, 0, 0, 0, 0]) as i32
    });

    let user = host.user.clone();
    host.register_program("/bin/fork-wait", move |_| {
        set_fork_continuation(|| 3);
        let child = handle_syscall(Sysno::Fork as usize, [0; 6]);
        if child <= 0 {
            return -100;
        }
        let status = user.alloc_zeroed(4);
        let reaped = handle_syscall(Sysno::WaitForChild as usize, [child as usize, 0, 0, status, 0, 0]);
        if reaped != child {
            return -101;
        }
        read_i32(&user, status) + 100
    });
    host.register_program("/bin/exit-nine", |_| {
        handle_syscall(Sysno::ExitTeam as usize, [9, 0, 0, 0, 0, 0]);
        -1
    });
    host.register_program("/bin/whoami", |_| {
        let pid = handle_syscall(Sysno::Getpid as usize, [0; 6]);
        let ppid = handle_syscall(Sysno::Getppid as usize, [0; 6]);
        let sid = handle_syscall(Sysno::Setsid as usize, [0; 6]);
        if ppid == 1 && sid == pid { 0 } else { -1 }
    });
}

fn read_i32(user: &team_core::host::HostUserMemory, addr: usize) -> i32 {
    let bytes = user.read_vec(addr, 4).expect("readable");
    i32::from_ne_bytes(bytes.try_into().expect("four bytes"))
}

fn errno(err: LinuxError) -> isize {
    -(err.code() as isize)
}

/// Starts `args` through the load_image syscall and returns the new team.
fn load(host: &HostPlatform, args: &[&str]) -> isize {
    let argv = host.user.alloc_str_array(args);
    handle_syscall(Sysno::LoadImage as usize, [argv, args.len(), 0, 0, 10, WAIT_TILL_LOADED])
}

/// Waits for `child` through the syscall, returning `(reason, status)`.
fn wait(host: &HostPlatform, child: isize) -> (i32, i32) {
    let reason = host.user.alloc_zeroed(4);
    let status = host.user.alloc_zeroed(4);
    let reaped = handle_syscall(Sysno::WaitForChild as usize, [child as usize, 0, reason, status, 0, 0]);
    assert_eq!(reaped, child);
    (read_i32(&host.user, reason), read_i32(&host.user, status))
}

#[test]
fn load_image_passes_arguments_and_environment() {
    let host = host();
    let argv = host.user.alloc_str_array(&["/bin/seven", "x"]);
    let envp = host.user.alloc_str_array(&["A=1"]);
    let child = handle_syscall(Sysno::LoadImage as usize, [argv, 2, envp, 1, 10, WAIT_TILL_LOADED]);
    assert!(child > 1, "load_image returned {}", child);
    assert_eq!(wait(host, child), (EXITED, 7));
}

#[test]
fn load_image_rejects_bad_arguments() {
    let host = host();
    let argv = host.user.alloc_str_array(&[SLEEPER]);
    assert_eq!(
        handle_syscall(Sysno::LoadImage as usize, [0x10, 1, 0, 0, 10, 0]),
        errno(LinuxError::EFAULT)
    );
    assert_eq!(
        handle_syscall(Sysno::LoadImage as usize, [argv, 0, 0, 0, 10, 0]),
        errno(LinuxError::EINVAL)
    );
    assert_eq!(
        handle_syscall(Sysno::LoadImage as usize, [argv, 1, 0, 0, 10, 0x80]),
        errno(LinuxError::EINVAL)
    );
    assert_eq!(
        handle_syscall(Sysno::LoadImage as usize, [argv, usize::MAX / 8, 0, 0, 10, 0]),
        errno(LinuxError::EINVAL)
    );
    assert_eq!(load(host, &["/bin/missing"]), errno(LinuxError::ENOENT));
}

#[test]
fn wait_reports_errors_as_errno() {
    let host = host();
    let status = host.user.alloc_zeroed(4);
    assert_eq!(
        handle_syscall(Sysno::WaitForChild as usize, [4242, 0, 0, status, 0, 0]),
        errno(LinuxError::ECHILD)
    );
    assert_eq!(
        handle_syscall(Sysno::WaitForChild as usize, [0, 0, 0, 0, 0, 0]),
        errno(LinuxError::EOPNOTSUPP)
    );
    assert_eq!(
        handle_syscall(Sysno::WaitForChild as usize, [-1isize as usize, 0x40, 0, 0, 0, 0]),
        errno(LinuxError::EINVAL)
    );

    let child = load(host, &[SLEEPER]);
    assert_eq!(
        handle_syscall(Sysno::WaitForChild as usize, [child as usize, NO_HANG, 0, 0, 0, 0]),
        errno(LinuxError::EAGAIN)
    );
    // a bad out pointer is only noticed after the child was reaped
    assert_eq!(handle_syscall(Sysno::KillTeam as usize, [child as usize, 0, 0, 0, 0, 0]), 0);
    assert_eq!(
        handle_syscall(Sysno::WaitForChild as usize, [child as usize, 0, 0x10, 0, 0, 0]),
        errno(LinuxError::EFAULT)
    );
}

#[test]
fn killed_team_reports_the_signal() {
    let host = host();
    assert_eq!(handle_syscall(Sysno::KillTeam as usize, [1, 0, 0, 0, 0, 0]), errno(LinuxError::EPERM));
    assert_eq!(
        handle_syscall(Sysno::KillTeam as usize, [4242, 0, 0, 0, 0, 0]),
        errno(LinuxError::ESRCH)
    );
    let child = load(host, &[SLEEPER]);
    assert_eq!(handle_syscall(Sysno::KillTeam as usize, [child as usize, 0, 0, 0, 0, 0]), 0);
    assert_eq!(wait(host, child), (KILLED, 0));
}

#[test]
fn team_info_is_copied_out() {
    let host = host();
    let child = load(host, &[SLEEPER, "-q"]);
    let info = host.user.alloc_zeroed(TEAM_INFO_SIZE);
    assert_eq!(handle_syscall(Sysno::GetTeamInfo as usize, [child as usize, info, 0, 0, 0, 0]), 0);

    let bytes = host.user.read_vec(info, TEAM_INFO_SIZE).unwrap();
    let info: UserTeamInfo = bytemuck::pod_read_unaligned(&bytes);
    assert_eq!(info.team as isize, child);
    assert_eq!(info.thread_count, 1);
    assert_eq!(info.argc, 2);
    assert_eq!(info.args(), "/bin/sleeper -q");
    assert_eq!(info.debugger_nub_thread, -1);

    assert_eq!(
        handle_syscall(Sysno::GetTeamInfo as usize, [child as usize, 0, 0, 0, 0, 0]),
        errno(LinuxError::EFAULT)
    );
    handle_syscall(Sysno::KillTeam as usize, [child as usize, 0, 0, 0, 0, 0]);
    wait(host, child);
    let info = host.user.alloc_zeroed(TEAM_INFO_SIZE);
    assert_eq!(
        handle_syscall(Sysno::GetTeamInfo as usize, [child as usize, info, 0, 0, 0, 0]),
        errno(LinuxError::ESRCH)
    );
}

#[test]
fn next_team_info_walks_the_table() {
    let host = host();
    let child = load(host, &[SLEEPER]);
    let cookie = host.user.alloc_zeroed(4);
    let info = host.user.alloc_zeroed(TEAM_INFO_SIZE);

    let mut seen = Vec::new();
    while handle_syscall(Sysno::GetNextTeamInfo as usize, [cookie, info, 0, 0, 0, 0]) == 0 {
        let bytes = host.user.read_vec(info, TEAM_INFO_SIZE).unwrap();
        seen.push(bytemuck::pod_read_unaligned::<UserTeamInfo>(&bytes).team as isize);
    }
    assert_eq!(seen.first(), Some(&1));
    assert!(seen.contains(&child));
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));

    handle_syscall(Sysno::KillTeam as usize, [child as usize, 0, 0, 0, 0, 0]);
    wait(host, child);
}

#[test]
fn usage_info_validates_its_selector() {
    let host = host();
    let usage = host.user.alloc_zeroed(TEAM_USAGE_SIZE);
    assert_eq!(handle_syscall(Sysno::GetTeamUsageInfo as usize, [1, 0, usage, 0, 0, 0]), 0);
    let bytes = host.user.read_vec(usage, TEAM_USAGE_SIZE).unwrap();
    let _: UserTeamUsage = bytemuck::pod_read_unaligned(&bytes);
    assert_eq!(
        handle_syscall(Sysno::GetTeamUsageInfo as usize, [1, 5, usage, 0, 0, 0]),
        errno(LinuxError::EINVAL)
    );
    assert_eq!(
        handle_syscall(Sysno::GetTeamUsageInfo as usize, [4242, 0, usage, 0, 0, 0]),
        errno(LinuxError::ESRCH)
    );
}

#[test]
fn kernel_identity() {
    host();
    assert_eq!(handle_syscall(Sysno::Getpid as usize, [0; 6]), 1);
    assert_eq!(handle_syscall(Sysno::Getppid as usize, [0; 6]), 0);
    assert_eq!(handle_syscall(Sysno::ProcessInfo as usize, [0, 1, 0, 0, 0, 0]), 1);
    assert_eq!(handle_syscall(Sysno::ProcessInfo as usize, [0, 2, 0, 0, 0, 0]), 1);
    assert_eq!(
        handle_syscall(Sysno::ProcessInfo as usize, [0, 9, 0, 0, 0, 0]),
        errno(LinuxError::EINVAL)
    );
    assert_eq!(handle_syscall(Sysno::Setsid as usize, [0; 6]), errno(LinuxError::EPERM));
    assert_eq!(handle_syscall(Sysno::Setpgid as usize, [0; 6]), 1);
    assert_eq!(
        handle_syscall(Sysno::Setpgid as usize, [-1isize as usize, 0, 0, 0, 0, 0]),
        errno(LinuxError::EINVAL)
    );
}

#[test]
fn child_identity_and_new_session() {
    let host = host();
    let child = load(host, &["/bin/whoami"]);
    assert_eq!(wait(host, child), (EXITED, 0));
}

#[test]
fn exec_through_the_syscall() {
    let host = host();
    let child = load(host, &["/bin/exec-finish"]);
    assert_eq!(wait(host, child), (EXITED, 11));

    let child = load(host, &["/bin/exec-bad-path"]);
    assert_eq!(wait(host, child), (EXITED, errno(LinuxError::EFAULT) as i32));
}

#[test]
fn fork_and_exit_through_the_syscall() {
    let host = host();
    let child = load(host, &["/bin/fork-wait"]);
    assert_eq!(wait(host, child), (EXITED, 103));

    let child = load(host, &["/bin/exit-nine"]);
    assert_eq!(wait(host, child), (EXITED, 9));
}
