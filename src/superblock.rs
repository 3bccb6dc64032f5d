// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The shared-memory arena: a single byte region partitioned at fixed
// offsets into free-fid stack, file-name table, file-meta table,
// free-chunk stack, and chunk data array (spec.md §4.2). Mirrors how
// `shm.rs` wraps a raw mapped pointer behind a typed handle — the
// superblock is the next layer up, giving that raw region structure.

use std::mem::size_of;

use crate::config::{CHUNK_SIZE, MAX_CHUNKS, MAX_CHUNKS_PER_FILE, MAX_FILENAME, MAX_FILES};
use crate::index_stack::{self, IndexStack};
use crate::shm::{ShmHandle, ShmOpenMode};

/// A file-table slot: whether it is occupied, and the path it names.
#[repr(C)]
pub struct FileSlot {
    pub in_use: u32,
    pub name: [u8; MAX_FILENAME],
}

/// Per-file metadata paired 1:1 with a `FileSlot` at the same index.
#[repr(C)]
pub struct FileMeta {
    pub size: u64,
    pub chunks: u32,
    pub chunk_ids: [i32; MAX_CHUNKS_PER_FILE],
}

/// The shared-memory-backed arena, partitioned per `spec.md` §4.2:
///
/// ```text
/// [ fid stack | file slots | file metas | chunk stack | chunk data ]
/// ```
///
/// Every attaching process maps the same bytes and reconstructs the same
/// view; only the process that wins the create race runs `init`.
pub struct Superblock {
    shm: ShmHandle,
}

impl Superblock {
    pub const FID_STACK_OFFSET: usize = 0;
    pub const FILE_SLOTS_OFFSET: usize = Self::FID_STACK_OFFSET + index_stack::stack_bytes(MAX_FILES);
    pub const FILE_METAS_OFFSET: usize =
        Self::FILE_SLOTS_OFFSET + MAX_FILES * size_of::<FileSlot>();
    pub const CHUNK_STACK_OFFSET: usize =
        Self::FILE_METAS_OFFSET + MAX_FILES * size_of::<FileMeta>();
    pub const CHUNK_DATA_OFFSET: usize =
        Self::CHUNK_STACK_OFFSET + index_stack::stack_bytes(MAX_CHUNKS);

    /// Total byte footprint of the arena (the size requested from shared
    /// memory).
    pub const TOTAL_SIZE: usize = Self::CHUNK_DATA_OFFSET + MAX_CHUNKS * CHUNK_SIZE;

    /// Create the named segment if absent, or attach to it if present.
    /// Only the creator initializes the free stacks; an attacher trusts
    /// the existing content (spec.md §4.2).
    pub fn create_or_open(name: &str) -> std::io::Result<Self> {
        let shm = ShmHandle::acquire(name, Self::TOTAL_SIZE, ShmOpenMode::CreateOrOpen)?;
        let sb = Self { shm };
        if sb.shm.created() {
            log::debug!("superblock '{name}' created; initializing free stacks");
            sb.init();
        } else {
            log::debug!("superblock '{name}' attached to existing segment");
        }
        Ok(sb)
    }

    fn init(&self) {
        IndexStack::init(self.region_mut(Self::FID_STACK_OFFSET, index_stack::stack_bytes(MAX_FILES)), MAX_FILES);
        IndexStack::init(
            self.region_mut(Self::CHUNK_STACK_OFFSET, index_stack::stack_bytes(MAX_CHUNKS)),
            MAX_CHUNKS,
        );
        // file slots/metas are already zeroed by the shared-memory backing
        // store (shm_open + ftruncate / CreateFileMapping both zero-fill),
        // which makes every `FileSlot.in_use == 0` — no explicit pass needed.
    }

    /// Borrow a raw byte window of the arena.
    ///
    /// # Safety contract
    /// The region is shared, mutable state: every attached process can
    /// write through an overlapping window at the same time. This is
    /// sound only because every mutating caller holds the store's
    /// `SpinLock` (spec.md §5) before touching any of these views; the
    /// borrow checker cannot see that discipline, so it is enforced by
    /// convention at the `FileStore` layer.
    fn region_mut(&self, offset: usize, len: usize) -> &'static mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.shm.as_mut_ptr().add(offset), len) }
    }

    /// View over the free-fid stack.
    pub fn fid_stack(&self) -> IndexStack<'static> {
        unsafe {
            IndexStack::attach(self.region_mut(
                Self::FID_STACK_OFFSET,
                index_stack::stack_bytes(MAX_FILES),
            ))
        }
    }

    /// View over the free-chunk stack.
    pub fn chunk_stack(&self) -> IndexStack<'static> {
        unsafe {
            IndexStack::attach(self.region_mut(
                Self::CHUNK_STACK_OFFSET,
                index_stack::stack_bytes(MAX_CHUNKS),
            ))
        }
    }

    /// Mutable reference to the `FileSlot` at `fid`.
    pub fn file_slot(&self, fid: usize) -> &'static mut FileSlot {
        debug_assert!(fid < MAX_FILES);
        let offset = Self::FILE_SLOTS_OFFSET + fid * size_of::<FileSlot>();
        unsafe { &mut *(self.shm.as_mut_ptr().add(offset) as *mut FileSlot) }
    }

    /// Mutable reference to the `FileMeta` at `fid`.
    pub fn file_meta(&self, fid: usize) -> &'static mut FileMeta {
        debug_assert!(fid < MAX_FILES);
        let offset = Self::FILE_METAS_OFFSET + fid * size_of::<FileMeta>();
        unsafe { &mut *(self.shm.as_mut_ptr().add(offset) as *mut FileMeta) }
    }

    /// Mutable byte slice over chunk `idx`'s backing storage.
    pub fn chunk_bytes(&self, idx: usize) -> &'static mut [u8] {
        debug_assert!(idx < MAX_CHUNKS);
        let offset = Self::CHUNK_DATA_OFFSET + idx * CHUNK_SIZE;
        self.region_mut(offset, CHUNK_SIZE)
    }
}
