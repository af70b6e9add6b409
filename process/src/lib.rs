//! Team bookkeeping for a Haiku-style kernel.
//! Session contains ProcessGroup, ProcessGroup contains Team, Team contains Thread.
//! A team has child teams, and a dead team leaves a [`DeathEntry`] in its
//! parent's [`DeathLedger`] until some waiter collects it.
//!
//! Everything here is plain data guarded by the caller's locks: the
//! [`TeamTable`] is meant to live behind the global team lock and the
//! [`ThreadTable`] behind the thread lock, always taken in that order.
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod death;
pub mod error;
pub mod event;
pub mod process_group;
pub mod session;
pub mod table;
pub mod team;
pub mod thread;
pub mod wait;

#[cfg(test)]
mod tests;

pub use death::{DeathEntry, DeathLedger};
pub use error::{TeamError, TeamResult};
pub use event::{WaitEvent, WaitQueue};
pub use process_group::{FreedGroup, ProcessGroup};
pub use session::Session;
pub use table::TeamTable;
pub use team::{DebugFlags, DebugInfo, OS_NAME_LENGTH, TEAM_ARGS_LENGTH, TeamNode, TeamState};
pub use thread::{ExitReason, IdAllocator, Signal, ThreadExit, ThreadRecord, ThreadTable};
pub use wait::{Interest, WaitSlot, WaitTarget};

/// Type alias for session, process group, team and thread IDs.
/// Teams and threads share one ID space: a team's ID is the ID of its main
/// thread. Signed, because wait selectors encode groups as negative values.
pub type Pid = i32;

/// Thread IDs live in the same space as team IDs.
pub type Tid = Pid;

/// Identifier of a message port owned by the debugger.
pub type PortId = i32;
