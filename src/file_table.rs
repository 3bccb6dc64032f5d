// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// File-name table + file-meta table + free-fid stack (spec.md §4.5):
// path -> fid lookup, fid allocation/release. Built directly on top of
// `Superblock`'s raw slot/meta accessors.

use crate::config::{MAX_FILENAME, MAX_FILES};
use crate::error::{Error, Result};
use crate::superblock::Superblock;

/// Linear scan for a path already present in the table. Returns `None` if
/// absent.
pub fn lookup_fid(sb: &Superblock, path: &str) -> Option<usize> {
    let bytes = path.as_bytes();
    for fid in 0..MAX_FILES {
        let slot = sb.file_slot(fid);
        if slot.in_use == 0 {
            continue;
        }
        let stored = nul_terminated(&slot.name);
        if stored == bytes {
            return Some(fid);
        }
    }
    None
}

fn nul_terminated(buf: &[u8]) -> &[u8] {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..len]
}

/// Allocate a fresh fid for `path`: pops the free-fid stack, marks the
/// slot in use, copies the path into its fixed-width name buffer, and
/// zeroes the paired `FileMeta` (spec.md §4.5).
///
/// `path` must already have been checked against `MAX_FILENAME - 1`.
pub fn allocate_fid(sb: &Superblock, path: &str, op: &'static str) -> Result<usize> {
    let bytes = path.as_bytes();
    if bytes.len() + 1 > MAX_FILENAME {
        return Err(Error::name_too_long(op));
    }

    let fid = sb.fid_stack().pop();
    if fid < 0 {
        log::warn!("{op}: free-fid stack exhausted");
        return Err(Error::no_space(op));
    }
    let fid = fid as usize;

    let slot = sb.file_slot(fid);
    slot.in_use = 1;
    slot.name = [0u8; MAX_FILENAME];
    slot.name[..bytes.len()].copy_from_slice(bytes);

    let meta = sb.file_meta(fid);
    meta.size = 0;
    meta.chunks = 0;

    log::debug!("{op}: allocated fid {fid} for '{path}'");
    Ok(fid)
}

/// Release `fid` back to the free-fid stack. Caller must have already
/// released every chunk the file owned (spec.md §4.5).
pub fn release_fid(sb: &Superblock, fid: usize) {
    let slot = sb.file_slot(fid);
    slot.in_use = 0;
    sb.fid_stack().push(fid as i32);
}

/// Overwrite the name buffer of an in-use slot in place (used by
/// `rename`; fid and chunk list are untouched — spec.md §4.9).
pub fn rename_in_place(sb: &Superblock, fid: usize, new_path: &str, op: &'static str) -> Result<()> {
    let bytes = new_path.as_bytes();
    if bytes.len() + 1 > MAX_FILENAME {
        return Err(Error::name_too_long(op));
    }
    let slot = sb.file_slot(fid);
    slot.name = [0u8; MAX_FILENAME];
    slot.name[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}
