//! Thread safe raw pointers, used to hand disjoint tiles of an output field to the thread team.

/// Represents a threadsafe mutable raw pointer to `T`.
///
/// # Safety
///
/// Threads holding copies of the same pointer must write disjoint elements, and the pointee must outlive
/// every copy.
#[derive(Clone, Debug, Copy)]
pub struct SendPtrMut<T> {
    /// Holds the raw mutable pointer to an instance of `T`.
    pub raw: *mut T,
}

unsafe impl<T> Sync for SendPtrMut<T> {}
unsafe impl<T> Send for SendPtrMut<T> {}

impl<T> SendPtrMut<T> {
    /// Wrap the start of a mutable slice.
    pub fn new(data: &mut [T]) -> Self {
        SendPtrMut {
            raw: data.as_mut_ptr(),
        }
    }
}
