// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Process-local descriptor table (spec.md §3, §4.4): current position per
// open descriptor, and the bias that keeps store-owned descriptor values
// disjoint from real host descriptors.

use crate::config::{FD_BIAS_MIN, MAX_FILES};
use crate::error::{Error, Result};
use crate::platform;

/// Current seek position for one open descriptor. In the current design a
/// descriptor's internal id equals its fid (spec.md §4.4 "descriptor id ==
/// fid"), so this table is just `fid -> pos`.
#[derive(Clone, Copy)]
struct Descriptor {
    in_use: bool,
    pos: u64,
}

/// Process-local table of open descriptors, plus the `FD_BIAS` value every
/// store-owned descriptor is offset by.
pub struct DescriptorTable {
    bias: i64,
    slots: Vec<Option<Descriptor>>,
}

impl DescriptorTable {
    /// Build a table with `FD_BIAS` derived from the host's soft
    /// `RLIMIT_NOFILE`, floored at `FD_BIAS_MIN` (spec.md §3).
    pub fn new() -> Self {
        let rlimit = platform::rlimit_nofile().unwrap_or(FD_BIAS_MIN);
        let bias = rlimit.max(FD_BIAS_MIN) as i64;
        log::debug!("descriptor bias set to {bias}");
        Self {
            bias,
            slots: vec![None; MAX_FILES],
        }
    }

    /// The additive bias applied to every store-owned descriptor value.
    pub fn bias(&self) -> i64 {
        self.bias
    }

    /// Whether `fd` is a store-owned (biased) descriptor, per spec.md §4.4.
    pub fn is_store_owned(&self, fd: i64) -> bool {
        fd >= self.bias
    }

    /// Subtract the bias, yielding the internal fid a store-owned
    /// descriptor refers to.
    pub fn fid_of(&self, fd: i64) -> usize {
        debug_assert!(self.is_store_owned(fd));
        (fd - self.bias) as usize
    }

    /// Register an open descriptor for `fid`, seeded at `pos` (e.g. `size`
    /// for `O_APPEND`, `0` otherwise). Returns the biased descriptor value
    /// the caller sees.
    pub fn open(&mut self, fid: usize, pos: u64) -> i64 {
        self.slots[fid] = Some(Descriptor { in_use: true, pos });
        fid as i64 + self.bias
    }

    /// Current position of an open descriptor.
    pub fn pos(&self, fd: i64, op: &'static str) -> Result<u64> {
        let fid = self.fid_of(fd);
        self.slots
            .get(fid)
            .and_then(|s| *s)
            .filter(|d| d.in_use)
            .map(|d| d.pos)
            .ok_or_else(|| Error::bad_descriptor(op))
    }

    /// Overwrite the position of an open descriptor.
    pub fn set_pos(&mut self, fd: i64, pos: u64, op: &'static str) -> Result<()> {
        let fid = self.fid_of(fd);
        match self.slots.get_mut(fid).and_then(|s| s.as_mut()) {
            Some(d) if d.in_use => {
                d.pos = pos;
                Ok(())
            }
            _ => Err(Error::bad_descriptor(op)),
        }
    }

    /// Validate that `fd` refers to a currently-open descriptor, without
    /// reading or mutating its position.
    pub fn check_open(&self, fd: i64, op: &'static str) -> Result<usize> {
        let fid = self.fid_of(fd);
        match self.slots.get(fid).and_then(|s| *s) {
            Some(d) if d.in_use => Ok(fid),
            _ => Err(Error::bad_descriptor(op)),
        }
    }

    /// `close`: validate the descriptor exists. The current design does
    /// not reclaim per-descriptor resources — files persist until
    /// `unlink` — so this only marks the slot free for a future `open` to
    /// reuse its position storage.
    pub fn close(&mut self, fd: i64, op: &'static str) -> Result<()> {
        let fid = self.fid_of(fd);
        match self.slots.get_mut(fid) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(Error::bad_descriptor(op)),
        }
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}
