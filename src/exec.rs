//! Executable-memory lifecycle.
//!
//! Code pages move through two states that are distinct types: [`CodeBuffer`]
//! is readable and writable but not executable; [`ExecPage`] is readable and
//! executable but not writable. `CodeBuffer::lock` consumes the writable state,
//! so no writable alias to a live code page can exist (W^X).

use std::mem::ManuallyDrop;
use std::ptr;

use crate::error::EvalError;

/// A freshly mapped read+write region awaiting code bytes.
pub(crate) struct CodeBuffer {
    ptr: *mut u8,
    len: usize,
}

impl CodeBuffer {
    /// Maps at least `len` bytes of zero-initialized RW memory.
    pub(crate) fn acquire(len: usize) -> Result<Self, EvalError> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(EvalError::AllocationFailed);
        }
        Ok(Self {
            ptr: ptr as *mut u8,
            len,
        })
    }

    /// Copies `code` into the region. `code` must fit in the mapped length.
    pub(crate) fn fill(&mut self, code: &[u8]) {
        assert!(code.len() <= self.len);
        unsafe { ptr::copy_nonoverlapping(code.as_ptr(), self.ptr, code.len()) };
    }

    /// Flips the region to read+execute and returns the locked page.
    ///
    /// The region is unmapped if the protection change fails.
    pub(crate) fn lock(self) -> Result<ExecPage, EvalError> {
        let this = ManuallyDrop::new(self);
        let rc = unsafe {
            libc::mprotect(
                this.ptr as *mut libc::c_void,
                this.len,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if rc != 0 {
            unsafe { libc::munmap(this.ptr as *mut libc::c_void, this.len) };
            return Err(EvalError::AllocationFailed);
        }
        Ok(ExecPage {
            ptr: this.ptr,
            len: this.len,
        })
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
    }
}

/// A locked read+execute code page.
pub(crate) struct ExecPage {
    ptr: *mut u8,
    len: usize,
}

impl ExecPage {
    pub(crate) fn entry(&self) -> *const u8 {
        self.ptr
    }
}

impl Drop for ExecPage {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
    }
}
