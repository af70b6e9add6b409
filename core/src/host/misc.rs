use super::lock;
use crate::platform::{Debugger, Ipc, UserMemory};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::Vec;
use team_process::{Pid, PortId, TeamError, TeamResult};

/// Operations the host services can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    AddressSpace,
    IoContext,
    Spawn,
    CopyArea,
}

#[derive(Default)]
pub struct Faults {
    armed: Mutex<Vec<FaultPoint>>,
}

impl Faults {
    pub fn fail_next(&self, point: FaultPoint) {
        lock(&self.armed).push(point);
    }

    pub(crate) fn take(&self, point: FaultPoint) -> bool {
        let mut armed = lock(&self.armed);
        match armed.iter().position(|p| *p == point) {
            Some(index) => {
                armed.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct HostIpc {
    ports_deleted: Mutex<Vec<Pid>>,
    sems_deleted: Mutex<Vec<Pid>>,
}

impl HostIpc {
    /// How often `team`'s ports and semaphores were released.
    pub fn deletions(&self, team: Pid) -> (usize, usize) {
        let count = |list: &Mutex<Vec<Pid>>| lock(list).iter().filter(|t| **t == team).count();
        (count(&self.ports_deleted), count(&self.sems_deleted))
    }
}

impl Ipc for HostIpc {
    fn delete_owned_ports(&self, team: Pid) {
        lock(&self.ports_deleted).push(team);
    }

    fn delete_owned_sems(&self, team: Pid) {
        lock(&self.sems_deleted).push(team);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEvent {
    Created(Pid),
    Deleted(Pid, Option<PortId>),
    ExecPrepared(Pid),
    ExecFinished(Pid),
}

#[derive(Default)]
pub struct HostDebugger {
    events: Mutex<Vec<DebugEvent>>,
}

impl HostDebugger {
    pub fn events(&self) -> Vec<DebugEvent> {
        lock(&self.events).clone()
    }

    pub fn events_of(&self, team: Pid) -> Vec<DebugEvent> {
        self.events()
            .into_iter()
            .filter(|event| match *event {
                DebugEvent::Created(t)
                | DebugEvent::Deleted(t, _)
                | DebugEvent::ExecPrepared(t)
                | DebugEvent::ExecFinished(t) => t == team,
            })
            .collect()
    }
}

impl Debugger for HostDebugger {
    fn team_created(&self, team: Pid) {
        lock(&self.events).push(DebugEvent::Created(team));
    }

    fn team_deleted(&self, team: Pid, debugger_port: Option<PortId>) {
        lock(&self.events).push(DebugEvent::Deleted(team, debugger_port));
    }

    fn prepare_for_exec(&self, team: Pid) {
        lock(&self.events).push(DebugEvent::ExecPrepared(team));
    }

    fn finish_after_exec(&self, team: Pid) {
        lock(&self.events).push(DebugEvent::ExecFinished(team));
    }
}

pub const USER_BASE: usize = 0x1000_0000;
pub const USER_END: usize = 0x6000_0000;

/// Flat user memory made of separately allocated regions; anything
/// between regions faults.
pub struct HostUserMemory {
    regions: Mutex<BTreeMap<usize, Vec<u8>>>,
    next: AtomicUsize,
}

impl Default for HostUserMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl HostUserMemory {
    pub fn new() -> Self {
        Self {
            regions: Mutex::new(BTreeMap::new()),
            next: AtomicUsize::new(USER_BASE),
        }
    }

    pub fn alloc(&self, bytes: &[u8]) -> usize {
        // leave a hole after each region so overruns fault
        let size = (bytes.len().max(1) + 15) & !15;
        let addr = self.next.fetch_add(size + 16, Ordering::Relaxed);
        lock(&self.regions).insert(addr, bytes.to_vec());
        addr
    }

    pub fn alloc_zeroed(&self, len: usize) -> usize {
        self.alloc(&std::vec![0; len])
    }

    pub fn alloc_str(&self, s: &str) -> usize {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.alloc(&bytes)
    }

    /// Copies every string in and returns the address of a pointer array.
    pub fn alloc_str_array(&self, strings: &[&str]) -> usize {
        let ptrs: Vec<u8> = strings
            .iter()
            .map(|s| self.alloc_str(s))
            .chain(core::iter::once(0))
            .flat_map(usize::to_ne_bytes)
            .collect();
        self.alloc(&ptrs)
    }

    pub fn read_vec(&self, addr: usize, len: usize) -> TeamResult<Vec<u8>> {
        let mut buf = std::vec![0; len];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    fn with_region<R>(&self, addr: usize, len: usize, f: impl FnOnce(&mut [u8]) -> R) -> TeamResult<R> {
        let mut regions = lock(&self.regions);
        let (base, data) = regions.range_mut(..=addr).next_back().ok_or(TeamError::BadAddress)?;
        let offset = addr - *base;
        if offset + len > data.len() {
            return Err(TeamError::BadAddress);
        }
        Ok(f(&mut data[offset..offset + len]))
    }
}

impl UserMemory for HostUserMemory {
    fn is_user_address(&self, addr: usize) -> bool {
        (USER_BASE..USER_END).contains(&addr)
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> TeamResult<()> {
        if !self.is_user_address(addr) {
            return Err(TeamError::BadAddress);
        }
        self.with_region(addr, buf.len(), |data| buf.copy_from_slice(data))
    }

    fn write(&self, addr: usize, data: &[u8]) -> TeamResult<()> {
        if !self.is_user_address(addr) {
            return Err(TeamError::BadAddress);
        }
        self.with_region(addr, data.len(), |region| region.copy_from_slice(data))
    }
}
