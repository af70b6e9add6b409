use alloc::string::String;
use team_process::{TeamError, TeamResult};

/// Tunables of the team subsystem.
#[derive(Debug, Clone)]
pub struct TeamConfig {
    /// Teams that may exist at once, the kernel team included.
    pub max_teams: usize,
    /// Death entries a ledger keeps before the oldest is dropped.
    pub max_dead_children: usize,
    pub page_size: usize,
    /// Start of the region user stacks are carved from.
    pub user_stack_region: usize,
    pub user_stack_region_size: usize,
    /// Stack of a team's main thread, without TLS, environment and arguments.
    pub main_stack_size: usize,
    pub tls_size: usize,
    /// Room for the environment pointer array and its strings.
    pub env_size: usize,
    /// Longest single argument or environment string copied from user space.
    pub max_arg_length: usize,
    /// What actually gets loaded into a new team; it then loads the program.
    pub runtime_loader_path: String,
    pub kernel_team_name: String,
}

impl Default for TeamConfig {
    fn default() -> Self {
        let page_size = 4096;
        Self {
            max_teams: 2048,
            max_dead_children: 32,
            page_size,
            user_stack_region: 0x7000_0000,
            user_stack_region_size: 0x1000_0000,
            main_stack_size: 256 * 1024,
            tls_size: 64 * core::mem::size_of::<usize>(),
            env_size: 8 * page_size,
            max_arg_length: 4 * page_size,
            runtime_loader_path: String::from("/boot/system/runtime_loader"),
            kernel_team_name: String::from("kernel_team"),
        }
    }
}

impl TeamConfig {
    pub fn validate(&self) -> TeamResult<()> {
        if !self.page_size.is_power_of_two()
            || self.max_teams == 0
            || self.max_dead_children == 0
            || self.main_stack_size == 0
            || self.env_size < 2 * core::mem::size_of::<usize>()
            || self.max_arg_length < 2
        {
            return Err(TeamError::BadValue);
        }
        if self.user_stack_region.checked_add(self.user_stack_region_size).is_none() {
            return Err(TeamError::BadValue);
        }
        Ok(())
    }

    pub fn page_align_up(&self, size: usize) -> usize {
        (size + self.page_size - 1) & !(self.page_size - 1)
    }
}
