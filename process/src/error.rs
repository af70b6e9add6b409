use axerrno::LinuxError;
use core::fmt;

/// Failure kinds shared by every team operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamError {
    /// Out of memory, or a configured limit (team count) was reached.
    NoMemory,
    /// A user pointer was outside user space or could not be read.
    BadAddress,
    /// Malformed argument.
    BadValue,
    /// The caller lacks the right to do this (kernel team, leader rules, ...).
    NotAllowed,
    /// The named team or thread does not exist.
    NoSuchProcess,
    /// Nothing the caller could ever wait for.
    NoSuchChild,
    /// Would have to block, but blocking was not requested.
    WouldBlock,
    /// Valid request for a feature that is not provided.
    NotImplemented,
    /// A blocking wait was cut short by a signal.
    Interrupted,
    /// A program or watcher could not be found.
    NotFound,
    /// The team died before it got far enough to report a result.
    Aborted,
}

impl TeamError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TeamError::NoMemory => "out of memory",
            TeamError::BadAddress => "bad address",
            TeamError::BadValue => "invalid argument",
            TeamError::NotAllowed => "operation not allowed",
            TeamError::NoSuchProcess => "no such team",
            TeamError::NoSuchChild => "no child to wait for",
            TeamError::WouldBlock => "operation would block",
            TeamError::NotImplemented => "not implemented",
            TeamError::Interrupted => "interrupted",
            TeamError::NotFound => "not found",
            TeamError::Aborted => "aborted",
        }
    }

    /// Negative errno, as stored in a thread's exit status when a team
    /// fails before reaching user space.
    pub fn code(self) -> i32 {
        -LinuxError::from(self).code()
    }
}

impl fmt::Display for TeamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TeamError> for LinuxError {
    fn from(err: TeamError) -> Self {
        match err {
            TeamError::NoMemory => LinuxError::ENOMEM,
            TeamError::BadAddress => LinuxError::EFAULT,
            TeamError::BadValue => LinuxError::EINVAL,
            TeamError::NotAllowed => LinuxError::EPERM,
            TeamError::NoSuchProcess => LinuxError::ESRCH,
            TeamError::NoSuchChild => LinuxError::ECHILD,
            TeamError::WouldBlock => LinuxError::EAGAIN,
            TeamError::NotImplemented => LinuxError::EOPNOTSUPP,
            TeamError::Interrupted => LinuxError::EINTR,
            TeamError::NotFound => LinuxError::ENOENT,
            TeamError::Aborted => LinuxError::EIO,
        }
    }
}

pub type TeamResult<T = ()> = Result<T, TeamError>;
