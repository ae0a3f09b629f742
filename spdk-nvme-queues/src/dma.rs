//! DMA-capable buffer allocation.
//!
//! NVMe writes must source their data from pinned memory the controller can
//! reach by DMA. The benchmark allocates one such buffer and reuses it for
//! every write; its content is never inspected.

use std::ptr::NonNull;

use spdk_io_sys::{SPDK_ENV_SOCKET_ID_ANY, SPDK_MALLOC_DMA, spdk_free, spdk_zmalloc};

use crate::error::{Error, Result};

/// A zeroed, DMA-capable memory buffer.
///
/// # Thread Safety
///
/// `DmaBuf` is `Send` but not `Sync`.
pub struct DmaBuf {
    ptr: NonNull<u8>,
    len: usize,
}

// The underlying memory is just bytes, no thread-local state
unsafe impl Send for DmaBuf {}

impl DmaBuf {
    /// Allocate a zeroed DMA-capable buffer.
    ///
    /// # Arguments
    ///
    /// * `size` - Size in bytes to allocate
    /// * `align` - Alignment requirement (power of 2, or 0 for default)
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferAllocationFailed`] if allocation fails (e.g.,
    /// out of hugepage memory).
    pub fn alloc_zeroed(size: usize, align: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::BufferAllocationFailed(size));
        }

        let ptr = unsafe {
            spdk_zmalloc(
                size,
                align,
                std::ptr::null_mut(),
                SPDK_ENV_SOCKET_ID_ANY as i32,
                SPDK_MALLOC_DMA,
            )
        };

        NonNull::new(ptr as *mut u8)
            .map(|ptr| Self { ptr, len: size })
            .ok_or(Error::BufferAllocationFailed(size))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Zero-length buffers cannot be created.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for DmaBuf {
    fn drop(&mut self) {
        unsafe {
            spdk_free(self.ptr.as_ptr() as *mut std::ffi::c_void);
        }
    }
}

impl std::fmt::Debug for DmaBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaBuf")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_fails() {
        assert!(matches!(
            DmaBuf::alloc_zeroed(0, 0),
            Err(Error::BufferAllocationFailed(0))
        ));
    }
}
