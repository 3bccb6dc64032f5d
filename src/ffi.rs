// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// C-ABI adapter over one process-global `FileStore` (SPEC_FULL.md §6.3):
// the seam a real `LD_PRELOAD`/symbol-remap shim would bind against.
// Mirrors how `platform::posix` keeps a process-wide `OnceLock` for its
// own cached state, and how every POSIX syscall reports failure via the
// sentinel-plus-errno convention instead of a typed error.

use std::cell::Cell;
use std::ffi::{c_char, c_int, c_long, CStr};
use std::sync::OnceLock;

use crate::config::StoreConfig;
use crate::store::FileStore;

static STORE: OnceLock<FileStore> = OnceLock::new();

thread_local! {
    static LAST_ERRNO: Cell<i32> = const { Cell::new(0) };
}

fn set_errno(errno: i32) {
    LAST_ERRNO.with(|cell| cell.set(errno));
}

/// Read back the errno left by the most recent `scrfs_*` call on this
/// thread. There is no portable way to write into the host libc's real
/// `errno` from a single code path covering both platform families, so
/// this crate exposes its own thread-local cell; a real interposition
/// shim built on this ABI would copy it into the host `errno` at the
/// call boundary.
#[no_mangle]
pub extern "C" fn scrfs_errno() -> c_int {
    LAST_ERRNO.with(|cell| cell.get())
}

/// `mount(prefix, rank)`, see spec.md §6. Idempotent: a second call is a
/// no-op once a store is already mounted.
#[no_mangle]
pub extern "C" fn scrfs_mount(prefix: *const c_char, rank: c_int) -> c_int {
    let prefix = match unsafe { cstr(prefix) } {
        Some(p) => p,
        None => {
            set_errno(crate::error::errno::ENOENT);
            return -1;
        }
    };
    if STORE.get().is_some() {
        return 0;
    }
    match FileStore::mount(StoreConfig::new(prefix, rank as i32)) {
        Ok(store) => {
            let _ = STORE.set(store);
            0
        }
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

fn store() -> Result<&'static FileStore, i32> {
    STORE.get().ok_or(crate::error::errno::EBADF)
}

unsafe fn cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Returns `true` if `path` is routed into the store (spec.md §6.2).
#[no_mangle]
pub extern "C" fn scrfs_intercept_path(path: *const c_char) -> c_int {
    let Some(path) = (unsafe { cstr(path) }) else {
        return 0;
    };
    match STORE.get() {
        Some(store) => store.intercept_path(path) as c_int,
        None => 0,
    }
}

/// Splits a raw `fd` into `(store_owned, internal_fd)` (spec.md §6.2).
/// `out_internal` receives the internal fid when `fd` is store-owned, and
/// is left untouched otherwise. Returns `1`/`0` rather than a `bool` to
/// keep the signature plain-C.
#[no_mangle]
pub extern "C" fn scrfs_intercept_fd(fd: c_long, out_internal: *mut c_long) -> c_int {
    let Some(store) = STORE.get() else {
        return 0;
    };
    let (store_owned, internal) = store.intercept_fd(fd as i64);
    if store_owned && !out_internal.is_null() {
        unsafe { *out_internal = internal as c_long };
    }
    store_owned as c_int
}

#[no_mangle]
pub extern "C" fn scrfs_open(path: *const c_char, flags: c_int, _mode: c_int) -> c_long {
    let Some(path) = (unsafe { cstr(path) }) else {
        set_errno(crate::error::errno::ENOENT);
        return -1;
    };
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.open(path, flags) {
        Ok(fd) => fd as c_long,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_read(fd: c_long, buf: *mut u8, count: usize) -> c_long {
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    let slice = unsafe { std::slice::from_raw_parts_mut(buf, count) };
    match store.read(fd, slice) {
        Ok(n) => n as c_long,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_write(fd: c_long, buf: *const u8, count: usize) -> c_long {
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    let slice = unsafe { std::slice::from_raw_parts(buf, count) };
    match store.write(fd, slice) {
        Ok(n) => n as c_long,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_lseek(fd: c_long, offset: c_long, whence: c_int) -> c_long {
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.lseek(fd, offset as i64, whence) {
        Ok(pos) => pos as c_long,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_close(fd: c_long) -> c_int {
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.close(fd) {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_unlink(path: *const c_char) -> c_int {
    let Some(path) = (unsafe { cstr(path) }) else {
        set_errno(crate::error::errno::ENOENT);
        return -1;
    };
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.unlink(path) {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_rename(old: *const c_char, new: *const c_char) -> c_int {
    let (Some(old), Some(new)) = (unsafe { cstr(old) }, unsafe { cstr(new) }) else {
        set_errno(crate::error::errno::ENOENT);
        return -1;
    };
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.rename(old, new) {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_truncate(path: *const c_char, length: c_long) -> c_int {
    let Some(path) = (unsafe { cstr(path) }) else {
        set_errno(crate::error::errno::ENOENT);
        return -1;
    };
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.truncate(path, length as u64) {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_fsync(fd: c_long) -> c_int {
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.fsync(fd) {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn scrfs_fdatasync(fd: c_long) -> c_int {
    let store = match store() {
        Ok(s) => s,
        Err(errno) => {
            set_errno(errno);
            return -1;
        }
    };
    match store.fdatasync(fd) {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e.errno());
            -1
        }
    }
}

