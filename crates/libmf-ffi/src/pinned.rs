//! Pinned native-layout buffers.
//!
//! A [`PinnedBuffer`] is a fixed-length run of [`NativeLayout`] records
//! allocated once and never grown, so the address handed to the engine stays
//! valid until the buffer is dropped.
//!
//! ## Lifetime Safety
//!
//! Descriptors such as `MfProblem` hold a raw pointer into the buffer. The
//! buffer must therefore outlive every native call that receives such a
//! descriptor; `libmf::Problem` ties the two together so the borrow checker
//! enforces it.

use crate::NativeLayout;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A contiguous buffer whose address does not change.
///
/// The storage is held through a raw [`NonNull`] rather than a `Box`, so
/// moving the buffer (or the value that owns it) leaves pointers already
/// handed out valid.
///
/// # Example
///
/// ```
/// use libmf_ffi::{MfNode, PinnedBuffer};
///
/// let buffer: PinnedBuffer<MfNode> = (0..3).map(|i| MfNode::new(i, i, 1.0)).collect();
/// assert_eq!(buffer.len(), 3);
/// assert_eq!(buffer.as_slice()[2].u, 2);
/// ```
#[derive(Debug)]
pub struct PinnedBuffer<T: NativeLayout> {
    /// Pointer to the first element (dangling when empty).
    ptr: NonNull<T>,
    /// Number of elements.
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: NativeLayout> PinnedBuffer<T> {
    /// Create a pinned buffer from existing data by copying.
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        Self::from(data.to_vec())
    }

    /// Get the raw pointer to the first element.
    ///
    /// Valid for `len()` elements for as long as `self` is alive.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Get a mutable raw pointer to the first element.
    ///
    /// Some C signatures take non-const pointers they only read from.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the buffer in bytes.
    #[inline]
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// View the contents.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // Safety: ptr/len describe the allocation taken over in `from`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Address of the first element, for stability checks.
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl<T: NativeLayout> From<Vec<T>> for PinnedBuffer<T> {
    fn from(data: Vec<T>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let raw = Box::into_raw(boxed).cast::<T>();
        Self {
            // Box::into_raw never returns null; empty slices get a dangling pointer
            ptr: NonNull::new(raw).unwrap_or(NonNull::dangling()),
            len,
            _marker: PhantomData,
        }
    }
}

impl<T: NativeLayout> FromIterator<T> for PinnedBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T: NativeLayout> Drop for PinnedBuffer<T> {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // Safety: reconstitutes the Box leaked in `from`, exactly once.
        drop(unsafe { Box::from_raw(slice) });
    }
}

// SAFETY: the buffer exclusively owns its allocation.
unsafe impl<T: NativeLayout + Send> Send for PinnedBuffer<T> {}
unsafe impl<T: NativeLayout + Sync> Sync for PinnedBuffer<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MfNode;

    #[test]
    fn test_pinned_buffer_from_slice() {
        let nodes = [MfNode::new(0, 1, 2.0), MfNode::new(3, 4, 5.0)];
        let buffer = PinnedBuffer::from_slice(&nodes);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.as_slice(), &nodes);
        assert_eq!(buffer.size_bytes(), 24);
    }

    #[test]
    fn test_pinned_buffer_address_stability() {
        let buffer: PinnedBuffer<MfNode> = (0..1000).map(|i| MfNode::new(i, i, 0.5)).collect();
        let addr1 = buffer.address();

        // moving the owner must not move the storage
        let moved = std::hint::black_box(buffer);
        let addr2 = moved.address();
        assert_eq!(addr1, addr2, "pinned buffer address should not change");
    }

    #[test]
    fn test_pinned_buffer_native_bytes() {
        let buffer = PinnedBuffer::from_slice(&[MfNode::new(7, 9, 1.5)]);
        let bytes =
            unsafe { std::slice::from_raw_parts(buffer.as_ptr().cast::<u8>(), buffer.size_bytes()) };

        assert_eq!(&bytes[0..4], &7i32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &9i32.to_ne_bytes());
        assert_eq!(&bytes[8..12], &1.5f32.to_ne_bytes());
    }

    #[test]
    fn test_pointer_survives_owner_move() {
        struct Owner {
            raw: *mut MfNode,
            _buffer: PinnedBuffer<MfNode>,
        }

        let mut buffer = PinnedBuffer::from(vec![MfNode::new(1, 2, 3.0), MfNode::new(4, 5, 6.0)]);
        let raw = buffer.as_mut_ptr();
        let owner = Owner { raw, _buffer: buffer };
        let moved = std::hint::black_box(owner);

        let second = unsafe { *moved.raw.add(1) };
        assert_eq!(second, MfNode::new(4, 5, 6.0));
    }

    #[test]
    fn test_empty_buffer() {
        let buffer: PinnedBuffer<MfNode> = std::iter::empty().collect();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size_bytes(), 0);
    }
}
