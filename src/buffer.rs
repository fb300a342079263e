use paste::paste;
use std::alloc::{alloc, dealloc, handle_alloc_error, realloc, Layout};
use std::ptr::{self, NonNull};

/// Alignment of every allocation made by [`Buffer`].
pub const ALIGN: usize = 4;

/// Like a byte `Vec` but with underling buffer aligned with `4`.
///
/// This is the only allocating piece of the builder. Bytes are only ever
/// appended, overwritten in place (length prefixes, type tags) or truncated.
pub struct Buffer {
    ptr: *mut u8,
    cap: usize,
    len: usize,
}

// The buffer exclusively owns its allocation and has no interior mutability.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            ptr: ptr::null_mut(),
            cap: 0,
            len: 0,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        let mut buf = Buffer::new();
        buf.reserve(cap);
        buf
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.cap == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.cap == 0 {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }

    /// Makes room for at least `len` bytes in total.
    pub fn reserve(&mut self, len: usize) {
        if len <= self.cap {
            return;
        }

        let cap = len.max(self.cap * 2).max(16);
        let layout = match Layout::from_size_align(cap, ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("buffer capacity overflow"),
        };

        let ptr = unsafe {
            if self.cap == 0 {
                alloc(layout)
            } else {
                realloc(
                    self.ptr,
                    Layout::from_size_align_unchecked(self.cap, ALIGN),
                    cap,
                )
            }
        };

        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        self.ptr = ptr;
        self.cap = cap;
    }

    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        let len = slice.len() + self.len;
        self.reserve(len);

        unsafe {
            ptr::copy_nonoverlapping(slice.as_ptr(), self.ptr.add(self.len), slice.len());
        }

        self.len = len;
    }

    /// Appends `count` zero bytes.
    pub fn extend_zeroed(&mut self, count: usize) {
        if count == 0 {
            return;
        }

        let len = self.len + count;
        self.reserve(len);

        unsafe {
            ptr::write_bytes(self.ptr.add(self.len), 0, count);
        }

        self.len = len;
    }

    /// Writes `s` followed by the `'\0'` terminator.
    pub fn write_cstr(&mut self, s: &str) {
        self.extend_from_slice(s.as_bytes());
        self.write_u8(0x00);
    }

    /// Overwrites 4 bytes at `index` with `value` in little endian.
    pub fn patch_i32(&mut self, index: usize, value: i32) {
        self.as_mut_slice()[index..index + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Shortens the buffer, keeping the allocation.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Empties the buffer, keeping the allocation.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Gives up the allocation, shrunk to exactly `len` bytes so that
    /// `Layout::from_size_align(len, ALIGN)` describes it.
    ///
    /// Returns `None` if the buffer is empty.
    pub fn into_raw_parts(mut self) -> Option<(NonNull<u8>, usize)> {
        if self.len == 0 {
            return None;
        }

        if self.len != self.cap {
            let ptr = unsafe {
                realloc(
                    self.ptr,
                    Layout::from_size_align_unchecked(self.cap, ALIGN),
                    self.len,
                )
            };
            if ptr.is_null() {
                handle_alloc_error(unsafe { Layout::from_size_align_unchecked(self.len, ALIGN) });
            }
            self.ptr = ptr;
            self.cap = self.len;
        }

        let parts = NonNull::new(self.ptr).map(|ptr| (ptr, self.len));
        self.ptr = ptr::null_mut();
        self.cap = 0;
        self.len = 0;
        parts
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.cap != 0 {
            unsafe { dealloc(self.ptr, Layout::from_size_align_unchecked(self.cap, ALIGN)) }
        }
    }
}

macro_rules! write_impl {
    ($($t:ty),*) => {
        impl Buffer {
            $(paste! {
                pub fn [<write_ $t>] (&mut self, value: $t) {
                    self.extend_from_slice(&value.to_le_bytes()[..]);
                }
            })*
        }
    };
}

write_impl!(u8, i8, u32, i32, u64, i64, f64);

impl std::ops::Index<usize> for Buffer {
    type Output = u8;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl std::ops::IndexMut<usize> for Buffer {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.as_mut_slice()[index]
    }
}
