use strum::FromRepr;

/// Type alias for the result of general functions in this crate.
pub type SysResult<T> = Result<T, SysError>;

/// Linux-style `errno` values, trimmed to those this subsystem can return.
///
/// Only the two recoverable error categories reach this type: physical-memory
/// exhaustion (`ENOMEM`) and user-triggered invalid access (`EFAULT`). Every
/// other failure mode in the memory subsystem is a programmer-precondition
/// violation and panics instead of returning an error — see `error.rs`'s
/// module docs in the walker and address-space crates for which is which.
#[derive(FromRepr, Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum SysError {
    /// Out of memory
    ENOMEM = 12,
    /// Bad address
    EFAULT = 14,
    /// Invalid argument
    EINVAL = 22,
}

impl SysError {
    /// Returns the error description.
    pub const fn as_str(&self) -> &'static str {
        use self::SysError::*;
        match self {
            ENOMEM => "Out of memory",
            EFAULT => "Bad address",
            EINVAL => "Invalid argument",
        }
    }

    pub const fn from_i32(value: i32) -> Self {
        Self::from_repr(value).unwrap()
    }

    /// Returns the error code value in `i32`.
    pub const fn code(self) -> i32 {
        self as i32
    }
}
