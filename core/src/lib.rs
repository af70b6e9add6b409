//! Team lifecycle engine: creating teams from images, fork, exec, thread and
//! team exit, reaping dead children, process groups and sessions.
//!
//! The engine talks to the rest of the kernel only through the traits in
//! [`platform`]; the `host` feature provides a thread-backed rendition of
//! all of them so the whole lifecycle can run inside a normal process.
#![cfg_attr(not(any(test, feature = "host")), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod config;
pub mod control;
pub mod entry;
pub mod exec;
pub mod exit;
pub mod fork;
pub mod info;
pub mod manager;
pub mod mm;
pub mod platform;
pub mod process;
pub mod task;
pub mod wait;
pub mod watch;

#[cfg(feature = "host")]
pub mod host;

pub use config::TeamConfig;
pub use entry::LoadFlags;
pub use info::{ProcessInfoKind, TeamInfo, TeamUsage, UsageWho};
pub use manager::TeamManager;
pub use mm::{ArgSource, ProgramArgs, TeamArgs};
pub use platform::Platform;
pub use wait::{ChildExit, WaitFlags};
pub use watch::WatcherId;

pub use team_process::{Pid, PortId, Tid, TeamError, TeamResult, WaitTarget};
