// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Chunk data array plus free-chunk stack (spec.md §4.3 "Chunk Store" /
// §4.6-4.8): fixed-size chunk allocation, release, and the
// offset-to-physical-address mapping every read/write walks.

use crate::config::{CHUNK_BITS, CHUNK_MASK, CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::superblock::{FileMeta, Superblock};

/// Pop one chunk off the free-chunk stack, or `ENOSPC`.
pub fn alloc_chunk(sb: &Superblock, op: &'static str) -> Result<i32> {
    let id = sb.chunk_stack().pop();
    if id < 0 {
        log::warn!("{op}: free-chunk stack exhausted");
        return Err(Error::no_space(op));
    }
    Ok(id)
}

/// Return a chunk to the free-chunk stack.
pub fn free_chunk(sb: &Superblock, chunk_id: i32) {
    sb.chunk_stack().push(chunk_id);
}

/// Split a byte offset into (logical chunk index, in-chunk offset),
/// per spec.md §4.6.
#[inline]
pub fn split_offset(off: u64) -> (usize, usize) {
    ((off >> CHUNK_BITS) as usize, (off as usize) & CHUNK_MASK)
}

/// Extend `meta` so that `chunks << CHUNK_BITS >= newpos`, popping chunks
/// from the free-chunk stack one at a time (spec.md §4.7).
///
/// On `ENOSPC` the chunks successfully popped before the failure remain
/// attached to the file — this does not roll back, matching the
/// reference behavior spec.md §4.7/§9 documents and pins.
pub fn extend_to(sb: &Superblock, meta: &mut FileMeta, newpos: u64, op: &'static str) -> Result<()> {
    let maxsize = (meta.chunks as u64) << CHUNK_BITS;
    if newpos <= maxsize {
        return Ok(());
    }
    loop {
        let chunk_id = alloc_chunk(sb, op)?;
        meta.chunk_ids[meta.chunks as usize] = chunk_id;
        meta.chunks += 1;
        if (meta.chunks as u64) << CHUNK_BITS >= newpos {
            return Ok(());
        }
    }
}

/// Release chunks from `meta` down to `target_chunks`, pushing each back
/// onto the free-chunk stack (the truncate half of spec.md §4.8).
pub fn shrink_to(sb: &Superblock, meta: &mut FileMeta, target_chunks: u32) {
    while meta.chunks > target_chunks {
        meta.chunks -= 1;
        free_chunk(sb, meta.chunk_ids[meta.chunks as usize]);
    }
}

/// Copy `dst.len()` bytes starting at `off` out of the file described by
/// `meta`, into `dst`. Caller guarantees `off + dst.len() <= meta.size`
/// (callers clamp via the read state machine, spec.md §4.9).
pub fn copy_out(sb: &Superblock, meta: &FileMeta, off: u64, dst: &mut [u8]) {
    let mut pos = off;
    let mut buf_off = 0usize;
    while buf_off < dst.len() {
        let (k, r) = split_offset(pos);
        let physical = meta.chunk_ids[k] as usize;
        let chunk = sb.chunk_bytes(physical);
        let n = (dst.len() - buf_off).min(CHUNK_SIZE - r);
        dst[buf_off..buf_off + n].copy_from_slice(&chunk[r..r + n]);
        pos += n as u64;
        buf_off += n;
    }
}

/// Copy `src` into the file described by `meta`, starting at `off`.
/// Caller has already run `extend_to` so every chunk touched exists.
pub fn copy_in(sb: &Superblock, meta: &FileMeta, off: u64, src: &[u8]) {
    let mut pos = off;
    let mut buf_off = 0usize;
    while buf_off < src.len() {
        let (k, r) = split_offset(pos);
        let physical = meta.chunk_ids[k] as usize;
        let chunk = sb.chunk_bytes(physical);
        let n = (src.len() - buf_off).min(CHUNK_SIZE - r);
        chunk[r..r + n].copy_from_slice(&src[buf_off..buf_off + n]);
        pos += n as u64;
        buf_off += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::ShmHandle;

    fn unique_name(tag: &str) -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("scrfs_cs_test_{tag}_{}_{n}", std::process::id())
    }

    fn fresh_meta() -> FileMeta {
        FileMeta {
            size: 0,
            chunks: 0,
            chunk_ids: [crate::index_stack::EMPTY; crate::config::MAX_CHUNKS_PER_FILE],
        }
    }

    #[test]
    fn split_offset_matches_chunk_math() {
        assert_eq!(split_offset(0), (0, 0));
        assert_eq!(split_offset(CHUNK_SIZE as u64), (1, 0));
        assert_eq!(split_offset(CHUNK_SIZE as u64 - 1), (0, CHUNK_SIZE - 1));
    }

    #[test]
    fn extend_allocates_enough_chunks_for_boundary_spanning_write() {
        let name = unique_name("extend");
        let sb = Superblock::create_or_open(&name).unwrap();
        let mut meta = fresh_meta();
        extend_to(&sb, &mut meta, (CHUNK_SIZE as u64) + 2, "write").unwrap();
        assert_eq!(meta.chunks, 2);
        ShmHandle::unlink_by_name(&name);
    }

    #[test]
    fn shrink_returns_chunks_to_free_stack() {
        let name = unique_name("shrink");
        let sb = Superblock::create_or_open(&name).unwrap();
        let before = sb.chunk_stack().len();
        let mut meta = fresh_meta();
        extend_to(&sb, &mut meta, 3 * CHUNK_SIZE as u64, "write").unwrap();
        assert_eq!(sb.chunk_stack().len(), before - 3);
        shrink_to(&sb, &mut meta, 0);
        assert_eq!(sb.chunk_stack().len(), before);
        assert_eq!(meta.chunks, 0);
        ShmHandle::unlink_by_name(&name);
    }

    #[test]
    fn copy_roundtrips_across_chunk_boundary() {
        let name = unique_name("copy");
        let sb = Superblock::create_or_open(&name).unwrap();
        let mut meta = fresh_meta();
        let off = CHUNK_SIZE as u64 - 1;
        extend_to(&sb, &mut meta, off + 3, "write").unwrap();
        let data = [b'X', b'Y', b'Z'];
        copy_in(&sb, &meta, off, &data);
        let mut out = [0u8; 3];
        copy_out(&sb, &meta, off, &mut out);
        assert_eq!(out, data);
        ShmHandle::unlink_by_name(&name);
    }

    #[test]
    fn exhaustion_surfaces_enospc_without_rollback() {
        let name = unique_name("enospc");
        let sb = Superblock::create_or_open(&name).unwrap();
        // Drain the free-chunk stack down to exactly 2 remaining.
        while sb.chunk_stack().len() > 2 {
            sb.chunk_stack().pop();
        }
        let mut meta = fresh_meta();
        let err = extend_to(&sb, &mut meta, 3 * CHUNK_SIZE as u64, "write").unwrap_err();
        assert_eq!(err.errno(), crate::error::errno::ENOSPC);
        assert_eq!(meta.chunks, 2, "the two successful pops are not rolled back");
        ShmHandle::unlink_by_name(&name);
    }
}
