//! Copying program arguments into the kernel and laying out a new team's
//! main stack area:
//!
//! ```text
//! base                                                         base + size
//! | main stack | TLS | envp[] ...... env strings | record | argv[] | args |
//! ```
//!
//! Environment strings are packed downwards from the end of their block.

use crate::config::TeamConfig;
use crate::platform::{AddressSpace, UserMemory};
use alloc::string::String;
use alloc::vec::Vec;
use core::mem::size_of;
use static_assertions::const_assert_eq;
use team_process::{TeamError, TeamResult};

/// Bytes reserved for the program path in the program args record.
pub const PROGRAM_PATH_LENGTH: usize = 1024;

/// Path followed by argc, argv, envc and envp, one machine word each.
pub const PROGRAM_ARGS_SIZE: usize = PROGRAM_PATH_LENGTH + 4 * size_of::<usize>();

const_assert_eq!(PROGRAM_ARGS_SIZE % size_of::<usize>(), 0);

const PTR: usize = size_of::<usize>();

/// Where the arguments of a new image come from.
#[derive(Debug, Clone, Copy)]
pub enum ArgSource<'a> {
    Kernel { args: &'a [&'a str], env: &'a [&'a str] },
    /// Arrays of `count` pointers to NUL-terminated strings in user memory.
    User {
        argv: usize,
        argc: usize,
        envp: usize,
        envc: usize,
    },
}

impl ArgSource<'_> {
    pub fn arg_count(&self) -> usize {
        match self {
            ArgSource::Kernel { args, .. } => args.len(),
            ArgSource::User { argc, .. } => *argc,
        }
    }
}

/// Arguments and environment of a new image, owned by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamArgs {
    pub args: Vec<String>,
    pub env: Vec<String>,
}

impl TeamArgs {
    pub fn copy_in(source: &ArgSource<'_>, user: &dyn UserMemory, config: &TeamConfig) -> TeamResult<Self> {
        if source.arg_count() < 1 {
            return Err(TeamError::BadValue);
        }
        let team_args = match *source {
            ArgSource::Kernel { args, env } => Self {
                args: args.iter().map(|s| String::from(*s)).collect(),
                env: env.iter().map(|s| String::from(*s)).collect(),
            },
            ArgSource::User {
                argv,
                argc,
                envp,
                envc,
            } => Self {
                args: copy_string_array(user, argv, argc, config)?,
                env: copy_string_array(user, envp, envc, config)?,
            },
        };
        team_args.check_fits(config)?;
        Ok(team_args)
    }

    pub fn path(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// The path followed by the remaining arguments, space separated.
    pub fn summary(&self) -> String {
        self.args.join(" ")
    }

    /// Size of the record, the argv array and the argument strings.
    pub fn args_size(&self) -> usize {
        let strings: usize = self.args.iter().map(|s| s.len() + 1).sum();
        PROGRAM_ARGS_SIZE + (self.args.len() + 1) * PTR + strings
    }

    fn env_bytes(&self) -> usize {
        let strings: usize = self.env.iter().map(|s| s.len() + 1).sum();
        (self.env.len() + 1) * PTR + strings
    }

    fn check_fits(&self, config: &TeamConfig) -> TeamResult<()> {
        if self.env_bytes() > config.env_size {
            warn!("[mm] environment of {} bytes does not fit", self.env_bytes());
            return Err(TeamError::BadValue);
        }
        Ok(())
    }
}

fn copy_string_array(user: &dyn UserMemory, array: usize, count: usize, config: &TeamConfig) -> TeamResult<Vec<String>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    // the pointer array alone has to fit the stack region
    if count > config.user_stack_region_size / PTR {
        warn!("[mm] {} strings cannot fit a stack area", count);
        return Err(TeamError::BadValue);
    }
    let end = count.checked_mul(PTR).and_then(|len| array.checked_add(len));
    if end.is_none() || !user.is_user_address(array) {
        return Err(TeamError::BadAddress);
    }
    let mut strings = Vec::with_capacity(count);
    for i in 0..count {
        let ptr = user.read_usize(array + i * PTR)?;
        if !user.is_user_address(ptr) {
            return Err(TeamError::BadAddress);
        }
        strings.push(user.read_cstr(ptr, config.max_arg_length)?);
    }
    Ok(strings)
}

/// Placement of a main thread's stack area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    pub base: usize,
    pub size: usize,
    pub stack_top: usize,
    pub tls_base: usize,
    pub env_base: usize,
    pub args_base: usize,
}

impl StackLayout {
    /// Puts the area at the very top of the user stack region.
    pub fn new(config: &TeamConfig, args: &TeamArgs) -> TeamResult<Self> {
        let size = config.page_align_up(config.main_stack_size + config.tls_size + config.env_size + args.args_size());
        if size > config.user_stack_region_size {
            return Err(TeamError::NoMemory);
        }
        let base = config.user_stack_region + config.user_stack_region_size - size;
        let stack_top = base + config.main_stack_size;
        let tls_base = stack_top;
        let env_base = tls_base + config.tls_size;
        Ok(Self {
            base,
            size,
            stack_top,
            tls_base,
            env_base,
            args_base: env_base + config.env_size,
        })
    }
}

/// Kernel copy of what the program finds in its args record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramArgs {
    pub path: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    /// User address of the record itself.
    pub record: usize,
    pub argv: usize,
    pub envp: usize,
    pub stack_top: usize,
}

/// Writes environment, arguments and the args record into the stack area.
pub fn write_program_args(
    space: &dyn AddressSpace,
    layout: &StackLayout,
    team_args: TeamArgs,
    config: &TeamConfig,
) -> TeamResult<ProgramArgs> {
    // envp[] at the start of the env block, strings from its end downwards
    let envp = layout.env_base;
    let mut cursor = layout.env_base + config.env_size;
    let mut env_ptrs = Vec::with_capacity(team_args.env.len() + 1);
    for var in team_args.env.iter() {
        cursor -= var.len() + 1;
        write_cstr(space, cursor, var)?;
        env_ptrs.push(cursor);
    }
    env_ptrs.push(0);
    write_words(space, envp, &env_ptrs)?;

    let record = layout.args_base;
    let argv = record + PROGRAM_ARGS_SIZE;
    let mut cursor = argv + (team_args.args.len() + 1) * PTR;
    let mut arg_ptrs = Vec::with_capacity(team_args.args.len() + 1);
    for arg in team_args.args.iter() {
        write_cstr(space, cursor, arg)?;
        arg_ptrs.push(cursor);
        cursor += arg.len() + 1;
    }
    arg_ptrs.push(0);
    write_words(space, argv, &arg_ptrs)?;

    let path = String::from(team_args.path());
    let mut path_bytes = [0u8; PROGRAM_PATH_LENGTH];
    let len = path.len().min(PROGRAM_PATH_LENGTH - 1);
    path_bytes[..len].copy_from_slice(&path.as_bytes()[..len]);
    space.write(record, &path_bytes)?;
    write_words(
        space,
        record + PROGRAM_PATH_LENGTH,
        &[team_args.args.len(), argv, team_args.env.len(), envp],
    )?;

    Ok(ProgramArgs {
        path,
        args: team_args.args,
        env: team_args.env,
        record,
        argv,
        envp,
        stack_top: layout.stack_top,
    })
}

fn write_cstr(space: &dyn AddressSpace, addr: usize, s: &str) -> TeamResult<()> {
    space.write(addr, s.as_bytes())?;
    space.write(addr + s.len(), &[0])
}

fn write_words(space: &dyn AddressSpace, addr: usize, words: &[usize]) -> TeamResult<()> {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_ne_bytes()).collect();
    space.write(addr, &bytes)
}
