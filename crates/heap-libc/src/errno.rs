//! The thread-local `errno` of the C library.

use core::ffi::c_int;

use heap::Errno;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "dragonfly"))] {
        use libc::__error as errno_location;
    } else if #[cfg(any(target_os = "android", target_os = "netbsd", target_os = "openbsd"))] {
        use libc::__errno as errno_location;
    } else {
        use libc::__errno_location as errno_location;
    }
}

/// Returns the current value of `errno`.
#[must_use]
pub fn get() -> c_int {
    unsafe { *errno_location() }
}

/// Sets `errno` to `value`.
pub fn set(value: c_int) {
    unsafe { *errno_location() = value }
}

/// An [`Errno`] writing the C library's `errno`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcErrno {}

impl Errno for LibcErrno {
    fn set_out_of_memory(&mut self) {
        set(libc::ENOMEM);
    }
}
