use super::misc::{FaultPoint, Faults};
use crate::platform::{IoContext, IoContexts};
use std::boxed::Box;
use std::collections::BTreeMap;
use std::string::String;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use team_process::{TeamError, TeamResult};

#[derive(Debug, Clone)]
struct Descriptor {
    path: String,
    close_on_exec: bool,
}

pub struct HostIoContext {
    descriptors: BTreeMap<i32, Descriptor>,
    live: Arc<AtomicUsize>,
    faults: Arc<Faults>,
}

impl HostIoContext {
    pub fn paths(&self) -> impl Iterator<Item = (i32, &str)> {
        self.descriptors.iter().map(|(fd, d)| (*fd, d.path.as_str()))
    }
}

impl IoContext for HostIoContext {
    fn duplicate(&self) -> TeamResult<Box<dyn IoContext>> {
        if self.faults.take(FaultPoint::IoContext) {
            return Err(TeamError::NoMemory);
        }
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(HostIoContext {
            descriptors: self.descriptors.clone(),
            live: self.live.clone(),
            faults: self.faults.clone(),
        }))
    }

    fn exec(&mut self) {
        self.descriptors.retain(|_, descriptor| !descriptor.close_on_exec);
    }

    fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }
}

impl Drop for HostIoContext {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct HostIoContexts {
    faults: Arc<Faults>,
    live: Arc<AtomicUsize>,
}

impl HostIoContexts {
    pub fn new(faults: Arc<Faults>) -> Self {
        Self {
            faults,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Descriptor tables not yet released, the kernel team's included.
    pub fn live_contexts(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl IoContexts for HostIoContexts {
    /// Standard input, output and error, plus a close-on-exec log.
    fn new_io_context(&self) -> TeamResult<Box<dyn IoContext>> {
        if self.faults.take(FaultPoint::IoContext) {
            return Err(TeamError::NoMemory);
        }
        let descriptors = [
            (0, "/dev/console", false),
            (1, "/dev/console", false),
            (2, "/dev/console", false),
            (3, "/var/log/syslog", true),
        ]
        .into_iter()
        .map(|(fd, path, close_on_exec)| {
            (
                fd,
                Descriptor {
                    path: String::from(path),
                    close_on_exec,
                },
            )
        })
        .collect();
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(HostIoContext {
            descriptors,
            live: self.live.clone(),
            faults: self.faults.clone(),
        }))
    }
}
