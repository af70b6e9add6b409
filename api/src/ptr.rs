//! Typed user-space addresses as they arrive in syscall arguments.
//!
//! Nothing is dereferenced directly: every access goes through the
//! platform's [`UserMemory`](team_core::platform::UserMemory), which
//! rejects kernel and unmapped addresses with `EFAULT`.

use crate::teams;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use bytemuck::Pod;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::size_of;
use team_core::mm::PROGRAM_PATH_LENGTH;

pub trait PtrWrapper<T>: Sized {
    fn address(&self) -> usize;

    fn is_null(&self) -> bool {
        self.address() == 0
    }

    /// The raw address, for logs.
    fn fmt_trace(&self) -> String {
        format!("{:#x}", self.address())
    }

    /// Reads the pointee.
    fn read(&self) -> LinuxResult<T>
    where
        T: Pod,
    {
        let mut value = T::zeroed();
        self.read_into(bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Reads `len` consecutive values.
    fn read_array(&self, len: usize) -> LinuxResult<Vec<T>>
    where
        T: Pod,
    {
        let mut values = vec![T::zeroed(); len];
        self.read_into(bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }

    fn read_into(&self, buf: &mut [u8]) -> LinuxResult<()> {
        if self.is_null() {
            return Err(LinuxError::EFAULT);
        }
        teams()?.platform().user.read(self.address(), buf)?;
        Ok(())
    }

    /// The pointee rendered for logs, or the address if it cannot be read.
    fn fmt_trace_content(&self) -> String
    where
        T: Pod + Debug,
    {
        match self.read() {
            Ok(value) => format!("{:#x} -> {:?}", self.address(), value),
            Err(_) => self.fmt_trace(),
        }
    }
}

/// A pointer the kernel only reads through.
#[repr(transparent)]
pub struct UserConstPtr<T> {
    address: usize,
    _marker: PhantomData<fn() -> T>,
}

/// A pointer the kernel may write through.
#[repr(transparent)]
pub struct UserPtr<T> {
    address: usize,
    _marker: PhantomData<fn() -> T>,
}

pub type UserInPtr<T> = UserConstPtr<T>;
pub type UserOutPtr<T> = UserPtr<T>;
pub type UserInOutPtr<T> = UserPtr<T>;

macro_rules! user_pointer {
    ($name:ident) => {
        impl<T> $name<T> {
            pub const fn null() -> Self {
                Self::new(0)
            }

            pub const fn new(address: usize) -> Self {
                Self {
                    address,
                    _marker: PhantomData,
                }
            }

            /// The address `count` elements further.
            pub fn add(self, count: usize) -> Self {
                Self::new(self.address.wrapping_add(count * size_of::<T>()))
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> From<usize> for $name<T> {
            fn from(address: usize) -> Self {
                Self::new(address)
            }
        }

        impl<T> Debug for $name<T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.address)
            }
        }

        impl<T> PtrWrapper<T> for $name<T> {
            fn address(&self) -> usize {
                self.address
            }
        }
    };
}

user_pointer!(UserConstPtr);
user_pointer!(UserPtr);

impl<T: Pod> UserPtr<T> {
    pub fn write(&self, value: T) -> LinuxResult<()> {
        if self.is_null() {
            return Err(LinuxError::EFAULT);
        }
        teams()?.platform().user.write(self.address, bytemuck::bytes_of(&value))?;
        Ok(())
    }

    /// Writes `value` unless the pointer is null, for optional out
    /// parameters.
    pub fn write_if_present(&self, value: T) -> LinuxResult<()> {
        if self.is_null() { Ok(()) } else { self.write(value) }
    }
}

impl UserConstPtr<u8> {
    /// Reads a NUL-terminated string, cut to `PROGRAM_PATH_LENGTH - 1`
    /// bytes.
    pub fn read_str(&self) -> LinuxResult<String> {
        if self.is_null() {
            return Err(LinuxError::EFAULT);
        }
        Ok(teams()?.platform().user.read_cstr(self.address, PROGRAM_PATH_LENGTH)?)
    }

    pub fn fmt_trace_as_str(&self) -> String {
        match self.read_str() {
            Ok(s) => format!("{:#x} -> {:?}", self.address, s),
            Err(_) => self.fmt_trace(),
        }
    }
}

impl UserPtr<u8> {
    pub fn fmt_trace_as_str(&self) -> String {
        UserConstPtr::<u8>::new(self.address).fmt_trace_as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointers_fault() {
        let ptr = UserConstPtr::<u32>::null();
        assert!(ptr.is_null());
        assert_eq!(ptr.read(), Err(LinuxError::EFAULT));
        assert_eq!(UserPtr::<u32>::null().write(1), Err(LinuxError::EFAULT));
        assert_eq!(UserPtr::<u32>::null().write_if_present(1), Ok(()));
    }

    #[test]
    fn pointer_arithmetic_scales_by_element() {
        let ptr = UserConstPtr::<u64>::from(0x1000);
        assert_eq!(ptr.add(3).address(), 0x1018);
        assert_eq!(ptr.fmt_trace(), "0x1000");
        assert_eq!(alloc::format!("{:?}", ptr), "UserConstPtr(0x1000)");
    }
}
