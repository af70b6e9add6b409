use super::lock;
use super::misc::{FaultPoint, Faults};
use crate::platform::{AddressSpace, AreaId, AreaInfo, Protection, VirtualMemory};
use std::collections::BTreeMap;
use std::string::String;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;
use team_process::{Pid, TeamError, TeamResult};

struct HostArea {
    info: AreaInfo,
    data: Vec<u8>,
}

pub struct HostAddressSpace {
    team: Pid,
    areas: Mutex<BTreeMap<usize, HostArea>>,
    next_area: Arc<AtomicI32>,
    live: Option<Arc<AtomicUsize>>,
    faults: Arc<Faults>,
}

impl HostAddressSpace {
    pub fn team(&self) -> Pid {
        self.team
    }

    fn insert(&self, name: &str, base: usize, data: Vec<u8>, protection: Protection) -> TeamResult<AreaId> {
        let size = data.len();
        if size == 0 || base.checked_add(size).is_none() {
            return Err(TeamError::BadValue);
        }
        let mut areas = lock(&self.areas);
        let below = areas.range(..base + size).next_back();
        if below.is_some_and(|(_, area)| area.info.base + area.info.size > base) {
            return Err(TeamError::NoMemory);
        }
        let id = self.next_area.fetch_add(1, Ordering::Relaxed);
        let info = AreaInfo {
            id,
            name: String::from(name),
            base,
            size,
            protection,
        };
        areas.insert(base, HostArea { info, data });
        Ok(id)
    }

    fn with_range<R>(&self, addr: usize, len: usize, f: impl FnOnce(&mut [u8]) -> R) -> TeamResult<R> {
        let mut areas = lock(&self.areas);
        let (_, area) = areas.range_mut(..=addr).next_back().ok_or(TeamError::BadAddress)?;
        let offset = addr - area.info.base;
        if offset + len > area.data.len() {
            return Err(TeamError::BadAddress);
        }
        Ok(f(&mut area.data[offset..offset + len]))
    }
}

impl AddressSpace for HostAddressSpace {
    fn areas(&self) -> Vec<AreaInfo> {
        lock(&self.areas).values().map(|area| area.info.clone()).collect()
    }

    fn create_area(&self, name: &str, base: usize, size: usize, protection: Protection) -> TeamResult<AreaId> {
        self.insert(name, base, std::vec![0; size], protection)
    }

    fn copy_area(&self, source: &dyn AddressSpace, area: &AreaInfo) -> TeamResult<AreaId> {
        if self.faults.take(FaultPoint::CopyArea) {
            return Err(TeamError::NoMemory);
        }
        let mut data = std::vec![0; area.size];
        source.read(area.base, &mut data)?;
        self.insert(&area.name, area.base, data, area.protection)
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> TeamResult<()> {
        self.with_range(addr, buf.len(), |data| buf.copy_from_slice(data))
    }

    fn write(&self, addr: usize, data: &[u8]) -> TeamResult<()> {
        self.with_range(addr, data.len(), |area| area.copy_from_slice(data))
    }

    fn delete_areas(&self) {
        lock(&self.areas).clear();
    }
}

impl Drop for HostAddressSpace {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

pub struct HostVm {
    faults: Arc<Faults>,
    next_area: Arc<AtomicI32>,
    live: Arc<AtomicUsize>,
    kernel: Arc<HostAddressSpace>,
}

impl HostVm {
    pub fn new(faults: Arc<Faults>) -> Self {
        let next_area = Arc::new(AtomicI32::new(1));
        let kernel = Arc::new(HostAddressSpace {
            team: 1,
            areas: Mutex::new(BTreeMap::new()),
            next_area: next_area.clone(),
            live: None,
            faults: faults.clone(),
        });
        Self {
            faults,
            next_area,
            live: Arc::new(AtomicUsize::new(0)),
            kernel,
        }
    }

    /// User address spaces not yet released.
    pub fn live_address_spaces(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl VirtualMemory for HostVm {
    fn create_address_space(&self, team: Pid) -> TeamResult<Arc<dyn AddressSpace>> {
        if self.faults.take(FaultPoint::AddressSpace) {
            return Err(TeamError::NoMemory);
        }
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(HostAddressSpace {
            team,
            areas: Mutex::new(BTreeMap::new()),
            next_area: self.next_area.clone(),
            live: Some(self.live.clone()),
            faults: self.faults.clone(),
        }))
    }

    fn kernel_address_space(&self) -> Arc<dyn AddressSpace> {
        self.kernel.clone()
    }
}
