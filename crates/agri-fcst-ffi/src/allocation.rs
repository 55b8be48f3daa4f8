//! Memory allocation utilities for FFI functions.
//!
//! Arrays handed to C are allocated with `malloc` so the caller may release
//! them through the matching `agri_free_*` function.

use libc::{free, malloc};
use std::ptr;

/// Copy a Rust slice to a newly allocated C array.
///
/// # Safety
/// Returns null on allocation failure or if slice is empty.
pub unsafe fn slice_to_c_array<T: Copy>(slice: &[T]) -> *mut T {
    if slice.is_empty() {
        return ptr::null_mut();
    }

    let ptr = malloc(std::mem::size_of_val(slice)) as *mut T;
    if !ptr.is_null() {
        ptr::copy_nonoverlapping(slice.as_ptr(), ptr, slice.len());
    }
    ptr
}

/// Copy a non-empty slice, reporting allocation failure as `None`.
///
/// # Safety
/// Same as [`slice_to_c_array`].
pub unsafe fn try_copy<T: Copy>(slice: &[T]) -> Option<*mut T> {
    let ptr = slice_to_c_array(slice);
    if ptr.is_null() && !slice.is_empty() {
        None
    } else {
        Some(ptr)
    }
}

/// Free a C pointer using libc free.
///
/// # Safety
/// ptr must be either null or a valid pointer allocated by malloc.
#[inline]
pub unsafe fn free_ptr(ptr: *mut core::ffi::c_void) {
    if !ptr.is_null() {
        free(ptr);
    }
}

/// Macro to free multiple struct fields.
///
/// Usage:
/// ```ignore
/// free_fields!(result, field1, field2, field3);
/// ```
#[macro_export]
macro_rules! free_fields {
    ($result:expr, $($field:ident),+ $(,)?) => {{
        $(
            if !$result.$field.is_null() {
                $crate::allocation::free_ptr($result.$field as *mut core::ffi::c_void);
                $result.$field = std::ptr::null_mut();
            }
        )+
    }};
}
