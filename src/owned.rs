//! Owned byte buffers with pluggable deleters.
//!
//! Every owned buffer carries a [`DeleterId`] naming how its memory must be
//! released. Moving a buffer into another representation (a [`RawValue`]
//! handed over a C ABI, a `Vec<u8>`) looks the pair up in [`compatible`]: a
//! compatible pair passes the pointer through, anything else copies the bytes
//! into a fresh heap buffer and releases the source.

use std::alloc::{dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;

use crate::buffer::{Buffer, ALIGN};

/// C ABI deleter, called with the pointer and length it was handed out with.
pub type DeleterFn = unsafe extern "C" fn(*mut u8, usize);

/// Capability tag of an allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeleterId {
    /// Static memory, nothing to release.
    Noop,
    /// Global allocator with byte alignment, same layout as `Box<[u8]>`.
    Heap,
    /// Builder allocation, global allocator aligned to [`ALIGN`].
    Aligned,
    /// An arbitrary C ABI function pointer.
    Foreign,
    /// A boxed Rust closure.
    Closure,
    /// Raw hand-off without any deleter, the bytes are only borrowed.
    Unowned,
}

/// Where an owned buffer is headed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// [`document::Value`](crate::document::Value) or [`array::Value`](crate::array::Value).
    Native,
    /// [`RawValue`].
    CAbi,
    /// `Vec<u8>`.
    Std,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Transfer {
    /// Pointer and length pass through unchanged.
    Move,
    /// Bytes are copied into a fresh `Heap` buffer and the source is released.
    Copy,
}

/// Decides whether a buffer tagged `src` can be handed to `dst` as is.
pub const fn compatible(src: DeleterId, dst: Domain) -> Transfer {
    use DeleterId::*;
    use Domain::*;

    match (src, dst) {
        (Unowned, _) => Transfer::Copy,
        (Heap, _) => Transfer::Move,
        (_, Native) => Transfer::Move,
        (Closure, CAbi) => Transfer::Copy,
        (_, CAbi) => Transfer::Move,
        (_, Std) => Transfer::Copy,
    }
}

pub unsafe extern "C" fn noop_deleter(_: *mut u8, _: usize) {}

/// Releases memory laid out like a `Box<[u8]>` of `len` bytes.
pub unsafe extern "C" fn heap_deleter(ptr: *mut u8, len: usize) {
    if len != 0 {
        dealloc(ptr, Layout::from_size_align_unchecked(len, 1));
    }
}

/// Releases memory handed out by a builder [`Buffer`].
pub unsafe extern "C" fn aligned_deleter(ptr: *mut u8, len: usize) {
    if len != 0 {
        dealloc(ptr, Layout::from_size_align_unchecked(len, ALIGN));
    }
}

/// Releases an owned allocation.
pub enum Deleter {
    Noop,
    Heap,
    Aligned,
    Foreign(DeleterFn),
    Closure(Box<dyn FnOnce(*mut u8, usize) + Send>),
}

impl Deleter {
    pub fn id(&self) -> DeleterId {
        match self {
            Deleter::Noop => DeleterId::Noop,
            Deleter::Heap => DeleterId::Heap,
            Deleter::Aligned => DeleterId::Aligned,
            Deleter::Foreign(_) => DeleterId::Foreign,
            Deleter::Closure(_) => DeleterId::Closure,
        }
    }

    /// Releases `len` bytes at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must describe the allocation this deleter was paired
    /// with, and it must not be used afterwards.
    pub unsafe fn invoke(self, ptr: *mut u8, len: usize) {
        match self {
            Deleter::Noop => {}
            Deleter::Heap => heap_deleter(ptr, len),
            Deleter::Aligned => aligned_deleter(ptr, len),
            Deleter::Foreign(f) => f(ptr, len),
            Deleter::Closure(f) => f(ptr, len),
        }
    }
}

impl fmt::Debug for Deleter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Deleter::{:?}", self.id())
    }
}

/// Tags carried by a [`RawValue`] alongside its deleter.
pub const RAW_NOOP: u32 = 0;
pub const RAW_HEAP: u32 = 1;
pub const RAW_ALIGNED: u32 = 2;
pub const RAW_FOREIGN: u32 = 3;

/// Owned buffer in a C compatible layout.
///
/// Carries no destructor of its own: whoever holds it must either convert it
/// back with `from_raw` or call `deleter` themselves.
#[repr(C)]
#[derive(Debug)]
pub struct RawValue {
    pub data: *mut u8,
    pub length: usize,
    pub tag: u32,
    pub deleter: Option<DeleterFn>,
}

impl RawValue {
    /// Capability of this hand-off. A builtin tag whose function pointer is
    /// not that builtin is foreign.
    pub fn deleter_id(&self) -> DeleterId {
        let f = match self.deleter {
            Some(f) => f as *const () as usize,
            None => return DeleterId::Unowned,
        };
        match self.tag {
            RAW_NOOP if f == noop_deleter as *const () as usize => DeleterId::Noop,
            RAW_HEAP if f == heap_deleter as *const () as usize => DeleterId::Heap,
            RAW_ALIGNED if f == aligned_deleter as *const () as usize => DeleterId::Aligned,
            _ => DeleterId::Foreign,
        }
    }
}

/// Pointer, length and deleter given back by `release`.
#[derive(Debug)]
pub struct RawParts {
    pub data: *mut u8,
    pub length: usize,
    pub deleter: Deleter,
}

static EMPTY_DOCUMENT: [u8; 5] = [5, 0, 0, 0, 0];

/// Owned bytes released by their deleter exactly once.
pub struct OwnedBytes {
    ptr: NonNull<u8>,
    len: usize,
    deleter: Option<Deleter>,
}

// Like a `Box<[u8]>`; the closure deleter is only reached through `&mut self`.
unsafe impl Send for OwnedBytes {}
unsafe impl Sync for OwnedBytes {}

impl OwnedBytes {
    /// The static empty document.
    pub fn empty_document() -> Self {
        OwnedBytes {
            ptr: NonNull::from(&EMPTY_DOCUMENT).cast::<u8>(),
            len: EMPTY_DOCUMENT.len(),
            deleter: Some(Deleter::Noop),
        }
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes until `deleter` runs,
    /// and `deleter` must be able to release it.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, deleter: Deleter) -> Self {
        OwnedBytes {
            ptr,
            len,
            deleter: Some(deleter),
        }
    }

    pub fn from_vec(v: Vec<u8>) -> Self {
        let len = v.len();
        let ptr = Box::into_raw(v.into_boxed_slice()) as *mut u8;
        OwnedBytes {
            ptr: NonNull::new(ptr).unwrap_or(NonNull::dangling()),
            len,
            deleter: Some(Deleter::Heap),
        }
    }

    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Self::from_vec(bytes.to_vec())
    }

    /// Takes the allocation of a builder buffer.
    pub fn from_buffer(buffer: Buffer) -> Self {
        match buffer.into_raw_parts() {
            Some((ptr, len)) => OwnedBytes {
                ptr,
                len,
                deleter: Some(Deleter::Aligned),
            },
            None => Self::from_vec(Vec::new()),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn deleter_id(&self) -> DeleterId {
        match &self.deleter {
            Some(d) => d.id(),
            None => DeleterId::Noop,
        }
    }

    /// Gives up ownership; the caller becomes responsible for the deleter.
    /// Leaves `self` empty.
    pub fn release(&mut self) -> RawParts {
        let deleter = self.deleter.replace(Deleter::Noop).unwrap_or(Deleter::Noop);
        let parts = RawParts {
            data: self.ptr.as_ptr(),
            length: self.len,
            deleter,
        };
        self.ptr = NonNull::dangling();
        self.len = 0;
        parts
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        let transfer = compatible(self.deleter_id(), Domain::Std);
        log::debug!("{:?} buffer to Vec: {:?}", self.deleter_id(), transfer);

        match transfer {
            Transfer::Move => {
                let parts = self.release();
                if parts.length == 0 {
                    return Vec::new();
                }
                // Heap buffers have the layout of a `Box<[u8]>` of exactly `length` bytes
                unsafe { Vec::from_raw_parts(parts.data, parts.length, parts.length) }
            }
            Transfer::Copy => self.as_slice().to_vec(),
        }
    }

    pub fn into_raw(mut self) -> RawValue {
        let transfer = compatible(self.deleter_id(), Domain::CAbi);
        log::debug!("{:?} buffer to RawValue: {:?}", self.deleter_id(), transfer);

        let parts = self.release();
        let (tag, deleter): (u32, DeleterFn) = match parts.deleter {
            Deleter::Noop => (RAW_NOOP, noop_deleter),
            Deleter::Heap => (RAW_HEAP, heap_deleter),
            Deleter::Aligned => (RAW_ALIGNED, aligned_deleter),
            Deleter::Foreign(f) => (RAW_FOREIGN, f),
            Deleter::Closure(f) => unsafe {
                let copy = OwnedBytes::copy_from_slice(std::slice::from_raw_parts(parts.data, parts.length));
                f(parts.data, parts.length);
                return copy.into_raw();
            },
        };
        RawValue {
            data: parts.data,
            length: parts.length,
            tag,
            deleter: Some(deleter),
        }
    }

    /// Takes over a C ABI hand-off.
    ///
    /// # Safety
    ///
    /// `raw.data` must be valid for reads of `raw.length` bytes and, when a
    /// deleter is given, releasable by it. Without a deleter the bytes are
    /// copied and `raw.data` is left untouched.
    pub unsafe fn from_raw(raw: RawValue) -> Self {
        let id = raw.deleter_id();
        let transfer = compatible(id, Domain::Native);
        log::debug!("{:?} RawValue to owned bytes: {:?}", id, transfer);

        let ptr = match NonNull::new(raw.data) {
            Some(ptr) => ptr,
            None => return Self::from_vec(Vec::new()),
        };

        match (transfer, raw.deleter) {
            (Transfer::Move, Some(f)) => {
                let deleter = match id {
                    DeleterId::Noop => Deleter::Noop,
                    DeleterId::Heap => Deleter::Heap,
                    DeleterId::Aligned => Deleter::Aligned,
                    _ => Deleter::Foreign(f),
                };
                Self::from_raw_parts(ptr, raw.length, deleter)
            }
            (_, deleter) => {
                let copy = Self::copy_from_slice(std::slice::from_raw_parts(ptr.as_ptr(), raw.length));
                if let Some(f) = deleter {
                    f(raw.data, raw.length);
                }
                copy
            }
        }
    }
}

impl Clone for OwnedBytes {
    fn clone(&self) -> Self {
        OwnedBytes::copy_from_slice(self.as_slice())
    }
}

impl Drop for OwnedBytes {
    fn drop(&mut self) {
        if let Some(deleter) = self.deleter.take() {
            unsafe { deleter.invoke(self.ptr.as_ptr(), self.len) }
        }
    }
}

impl fmt::Debug for OwnedBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OwnedBytes")
            .field("len", &self.len)
            .field("deleter", &self.deleter_id())
            .finish()
    }
}

/// Implements the owning value type wrapping an [`OwnedBytes`] for a view
/// type with a `new(&[u8])` constructor.
macro_rules! value_impl {
    ($value:ident, $view:ident) => {
        impl $value {
            /// Takes ownership of `bytes` without inspecting them.
            pub fn from_vec(bytes: Vec<u8>) -> Self {
                $value {
                    bytes: $crate::owned::OwnedBytes::from_vec(bytes),
                }
            }

            /// # Safety
            ///
            /// See [`OwnedBytes::from_raw_parts`].
            pub unsafe fn from_raw_parts(ptr: std::ptr::NonNull<u8>, len: usize, deleter: $crate::owned::Deleter) -> Self {
                $value {
                    bytes: $crate::owned::OwnedBytes::from_raw_parts(ptr, len, deleter),
                }
            }

            pub(crate) fn from_owned(bytes: $crate::owned::OwnedBytes) -> Self {
                $value { bytes }
            }

            pub fn view(&self) -> $view<'_> {
                $view::new(self.bytes.as_slice())
            }

            pub fn data(&self) -> &[u8] {
                self.bytes.as_slice()
            }

            pub fn length(&self) -> usize {
                self.bytes.len()
            }

            pub fn deleter_id(&self) -> $crate::owned::DeleterId {
                self.bytes.deleter_id()
            }

            /// Hands back the owned pointer and leaves this value empty
            /// (length 0). The caller must invoke the returned deleter.
            pub fn release(&mut self) -> $crate::owned::RawParts {
                self.bytes.release()
            }

            pub fn into_vec(self) -> Vec<u8> {
                self.bytes.into_vec()
            }

            pub fn into_raw(self) -> $crate::owned::RawValue {
                self.bytes.into_raw()
            }

            /// # Safety
            ///
            /// See [`OwnedBytes::from_raw`].
            pub unsafe fn from_raw(raw: $crate::owned::RawValue) -> Self {
                $value {
                    bytes: $crate::owned::OwnedBytes::from_raw(raw),
                }
            }
        }

        impl Default for $value {
            fn default() -> Self {
                $value {
                    bytes: $crate::owned::OwnedBytes::empty_document(),
                }
            }
        }

        impl<'a> From<$view<'a>> for $value {
            fn from(view: $view<'a>) -> Self {
                $value {
                    bytes: $crate::owned::OwnedBytes::copy_from_slice(view.data()),
                }
            }
        }

        impl PartialEq for $value {
            fn eq(&self, other: &Self) -> bool {
                self.data() == other.data()
            }
        }

        impl Eq for $value {}

        impl<'a> PartialEq<$view<'a>> for $value {
            fn eq(&self, other: &$view<'a>) -> bool {
                self.data() == other.data()
            }
        }

        impl std::fmt::Debug for $value {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Debug::fmt(&self.view(), f)
            }
        }
    };
}

pub(crate) use value_impl;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    static FOREIGN_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_deleter(ptr: *mut u8, len: usize) {
        FOREIGN_CALLS.fetch_add(1, Ordering::SeqCst);
        heap_deleter(ptr, len);
    }

    fn heap_raw(bytes: &[u8], tag: u32, deleter: DeleterFn) -> RawValue {
        let raw = OwnedBytes::copy_from_slice(bytes).into_raw();
        assert_eq!(raw.tag, RAW_HEAP);
        RawValue { tag, deleter: Some(deleter), ..raw }
    }

    #[test]
    fn transfer_table() {
        use DeleterId::*;
        use Domain::*;
        use Transfer::Copy as C;
        use Transfer::Move as M;

        let table = [
            (Noop, [M, M, C]),
            (Heap, [M, M, M]),
            (Aligned, [M, M, C]),
            (Foreign, [M, M, C]),
            (Closure, [M, C, C]),
            (Unowned, [C, C, C]),
        ];
        for (src, row) in table.iter() {
            for (dst, expected) in [Native, CAbi, Std].iter().zip(row.iter()) {
                assert_eq!(compatible(*src, *dst), *expected, "{:?} -> {:?}", src, dst);
            }
        }
    }

    #[test]
    fn heap_bytes_move_into_vec() {
        let owned = OwnedBytes::from_vec(vec![1, 2, 3]);
        let ptr = owned.as_slice().as_ptr();
        let v = owned.into_vec();
        assert_eq!(v, [1, 2, 3]);
        assert_eq!(v.as_ptr(), ptr);
    }

    #[test]
    fn aligned_bytes_copy_into_vec() {
        let mut buffer = Buffer::new();
        buffer.write_i32(5);
        buffer.write_u8(0);
        let owned = OwnedBytes::from_buffer(buffer);
        assert_eq!(owned.deleter_id(), DeleterId::Aligned);
        assert_eq!(owned.into_vec(), [5, 0, 0, 0, 0]);
    }

    #[test]
    fn closure_runs_once_when_copied_to_raw() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let bytes = Box::into_raw(vec![7u8; 4].into_boxed_slice()) as *mut u8;
        let owned = unsafe {
            OwnedBytes::from_raw_parts(
                NonNull::new(bytes).unwrap(),
                4,
                Deleter::Closure(Box::new(move |ptr, len| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    unsafe { heap_deleter(ptr, len) }
                })),
            )
        };

        let raw = owned.into_raw();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(raw.deleter_id(), DeleterId::Heap);
        assert_ne!(raw.data, bytes);

        let back = unsafe { OwnedBytes::from_raw(raw) };
        assert_eq!(back.as_slice(), &[7; 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn builtin_deleters_by_address() {
        let raw = heap_raw(&[1, 2], RAW_HEAP, heap_deleter);
        assert_eq!(raw.deleter_id(), DeleterId::Heap);
        let owned = unsafe { OwnedBytes::from_raw(raw) };
        assert_eq!(owned.into_vec(), [1, 2]);

        unsafe extern "C" fn wrapped(ptr: *mut u8, len: usize) {
            heap_deleter(ptr, len);
        }

        let raw = heap_raw(&[3], RAW_HEAP, wrapped);
        assert_eq!(raw.deleter_id(), DeleterId::Foreign);
        drop(unsafe { OwnedBytes::from_raw(raw) });
    }

    #[test]
    fn spoofed_tag_is_foreign() {
        let raw = heap_raw(&[1, 2], RAW_ALIGNED, counting_deleter);
        assert_eq!(raw.deleter_id(), DeleterId::Foreign);

        let before = FOREIGN_CALLS.load(Ordering::SeqCst);
        let owned = unsafe { OwnedBytes::from_raw(raw) };
        assert_eq!(owned.deleter_id(), DeleterId::Foreign);
        drop(owned);
        assert_eq!(FOREIGN_CALLS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn unowned_raw_is_copied() {
        let mut source = [9u8, 8, 7];
        let raw = RawValue {
            data: source.as_mut_ptr(),
            length: source.len(),
            tag: RAW_FOREIGN,
            deleter: None,
        };
        assert_eq!(raw.deleter_id(), DeleterId::Unowned);

        let owned = unsafe { OwnedBytes::from_raw(raw) };
        assert_eq!(owned.deleter_id(), DeleterId::Heap);
        assert_ne!(owned.as_slice().as_ptr(), source.as_ptr());
        assert_eq!(owned.as_slice(), &source);
    }

    #[test]
    fn release_leaves_empty() {
        let mut owned = OwnedBytes::from_vec(vec![1, 2, 3, 4]);
        let parts = owned.release();
        assert_eq!(parts.length, 4);
        assert!(owned.is_empty());
        assert_eq!(owned.deleter_id(), DeleterId::Noop);
        drop(owned);
        unsafe { parts.deleter.invoke(parts.data, parts.length) };
    }
}
