// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// `FileStore`: the POSIX-shaped operation set (spec.md §4.9) wired on top
// of `Superblock`, `file_table`, `chunk_store`, `descriptor::DescriptorTable`
// and `routing`. One `SpinLock` guards every superblock mutation
// (SPEC_FULL.md §5); the descriptor table gets its own `Mutex` purely to
// keep Rust's aliasing rules happy — it carries no cross-process ordering
// guarantee, matching the scope spec.md §5 sets.

use std::sync::Mutex;

use crate::chunk_store;
use crate::config::{StoreConfig, CHUNK_BITS};
use crate::descriptor::DescriptorTable;
use crate::error::{Error, Result};
use crate::file_table;
use crate::routing;
use crate::spin_lock::SpinLock;
use crate::superblock::Superblock;

/// POSIX open(2) flag bits the store interprets (spec.md §4.9). Values
/// match the generic Linux/glibc numbering an interposition layer would
/// hand in verbatim.
pub mod flags {
    pub const O_RDONLY: i32 = 0o0;
    pub const O_WRONLY: i32 = 0o1;
    pub const O_RDWR: i32 = 0o2;
    pub const O_CREAT: i32 = 0o100;
    pub const O_EXCL: i32 = 0o200;
    pub const O_TRUNC: i32 = 0o1000;
    pub const O_APPEND: i32 = 0o2000;
}

/// lseek(2) whence values.
pub mod whence {
    pub const SEEK_SET: i32 = 0;
    pub const SEEK_CUR: i32 = 1;
    pub const SEEK_END: i32 = 2;
}

use flags::*;
use whence::*;

/// The in-memory file store: one mounted arena plus a process-local
/// descriptor table and routing prefix.
pub struct FileStore {
    config: StoreConfig,
    sb: Superblock,
    lock: SpinLock,
    descriptors: Mutex<DescriptorTable>,
}

impl FileStore {
    /// `mount(prefix, rank)`: acquire (create-or-attach) the shared
    /// segment keyed by `config.rank` and set the routing prefix
    /// (spec.md §6). Idempotent in the sense that attaching to an
    /// already-initialized segment never re-runs init.
    pub fn mount(config: StoreConfig) -> Result<Self> {
        let name = config.segment_name();
        let sb = Superblock::create_or_open(&name).map_err(|source| Error::Host {
            op: "mount",
            source,
        })?;
        log::info!("mounted store at prefix '{}' (segment '{name}')", config.prefix);
        Ok(Self {
            config,
            sb,
            lock: SpinLock::new(),
            descriptors: Mutex::new(DescriptorTable::new()),
        })
    }

    /// The prefix this store shadows.
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// `intercept_path(path) -> bool` (spec.md §6.2).
    pub fn intercept_path(&self, path: &str) -> bool {
        routing::intercept_path(&self.config.prefix, path)
    }

    /// `intercept_fd(fd) -> (bool, internal_fd)` (spec.md §6.2).
    pub fn intercept_fd(&self, fd: i64) -> (bool, i64) {
        let bias = self.descriptors.lock().unwrap().bias();
        routing::intercept_fd(bias, fd)
    }

    /// `open` (spec.md §4.9): `O_CREAT`/`O_EXCL`/`O_TRUNC`/`O_APPEND`
    /// semantics over the file table, returning a biased descriptor.
    pub fn open(&self, path: &str, flags: i32) -> Result<i64> {
        let op = "open";
        self.lock.lock();
        let outcome = (|| -> Result<(usize, u64)> {
            let existing = file_table::lookup_fid(&self.sb, path);
            let fid = match existing {
                Some(fid) => {
                    if flags & O_CREAT != 0 && flags & O_EXCL != 0 {
                        return Err(Error::exists(op));
                    }
                    fid
                }
                None => {
                    if flags & O_CREAT == 0 {
                        return Err(Error::not_found(op));
                    }
                    file_table::allocate_fid(&self.sb, path, op)?
                }
            };
            let meta = self.sb.file_meta(fid);
            let wants_write = flags & (O_WRONLY | O_RDWR) != 0;
            if flags & O_TRUNC != 0 && wants_write {
                chunk_store::shrink_to(&self.sb, meta, 0);
                meta.size = 0;
            }
            let pos = if flags & O_APPEND != 0 { meta.size } else { 0 };
            Ok((fid, pos))
        })();
        self.lock.unlock();
        let (fid, pos) = outcome?;
        let fd = self.descriptors.lock().unwrap().open(fid, pos);
        Ok(fd)
    }

    /// `read` (spec.md §4.9): clamps to `size`, returns `0` at EOF rather
    /// than an error.
    pub fn read(&self, fd: i64, buf: &mut [u8]) -> Result<usize> {
        let op = "read";
        self.lock.lock();
        let result = (|| -> Result<usize> {
            let fid = self.descriptors.lock().unwrap().check_open(fd, op)?;
            let meta = self.sb.file_meta(fid);
            let oldpos = self.descriptors.lock().unwrap().pos(fd, op)?;
            // pos may legally exceed size (e.g. after a seek past EOF); a read
            // from such a position returns zero bytes rather than underflowing.
            if oldpos >= meta.size {
                return Ok(0);
            }
            let newpos = (oldpos + buf.len() as u64).min(meta.size);
            let n = (newpos - oldpos) as usize;
            self.descriptors.lock().unwrap().set_pos(fd, newpos, op)?;
            if n > 0 {
                chunk_store::copy_out(&self.sb, meta, oldpos, &mut buf[..n]);
            }
            Ok(n)
        })();
        self.lock.unlock();
        result
    }

    /// `write` (spec.md §4.9): position is advanced by the full requested
    /// count before the extension policy runs, so a later `ENOSPC` is
    /// surfaced with `pos`/`size` already mutated — matching spec.md §4.7's
    /// documented non-rollback behavior.
    pub fn write(&self, fd: i64, buf: &[u8]) -> Result<usize> {
        let op = "write";
        self.lock.lock();
        let result = (|| -> Result<usize> {
            let fid = self.descriptors.lock().unwrap().check_open(fd, op)?;
            let oldpos = self.descriptors.lock().unwrap().pos(fd, op)?;
            let newpos = oldpos + buf.len() as u64;
            self.descriptors.lock().unwrap().set_pos(fd, newpos, op)?;

            let meta = self.sb.file_meta(fid);
            if newpos > meta.size {
                meta.size = newpos;
                chunk_store::extend_to(&self.sb, meta, newpos, op)?;
            }
            chunk_store::copy_in(&self.sb, meta, oldpos, buf);
            Ok(buf.len())
        })();
        self.lock.unlock();
        result
    }

    /// `lseek` (spec.md §4.9): `SEEK_SET`/`SEEK_CUR`/`SEEK_END`. Negative
    /// results are not validated, matching the reference (spec.md §9).
    pub fn lseek(&self, fd: i64, offset: i64, whence: i32) -> Result<u64> {
        let op = "lseek";
        self.lock.lock();
        let result = (|| -> Result<u64> {
            let fid = self.descriptors.lock().unwrap().check_open(fd, op)?;
            let meta = self.sb.file_meta(fid);
            let base = match whence {
                SEEK_SET => 0i64,
                SEEK_CUR => self.descriptors.lock().unwrap().pos(fd, op)? as i64,
                SEEK_END => meta.size as i64,
                _ => {
                    return Err(Error::Unsupported {
                        op,
                        errno: crate::error::errno::EBADF,
                    })
                }
            };
            let newpos = (base + offset) as u64;
            self.descriptors.lock().unwrap().set_pos(fd, newpos, op)?;
            Ok(newpos)
        })();
        self.lock.unlock();
        result
    }

    /// `close` (spec.md §4.9): validates the descriptor; the fid itself is
    /// not reclaimed (files persist until `unlink`).
    pub fn close(&self, fd: i64) -> Result<()> {
        self.descriptors.lock().unwrap().close(fd, "close")
    }

    /// `unlink` (spec.md §4.9): truncate to zero, releasing every chunk,
    /// then release the fid.
    pub fn unlink(&self, path: &str) -> Result<()> {
        let op = "unlink";
        self.lock.lock();
        let result = (|| -> Result<()> {
            let fid = file_table::lookup_fid(&self.sb, path).ok_or_else(|| Error::not_found(op))?;
            let meta = self.sb.file_meta(fid);
            chunk_store::shrink_to(&self.sb, meta, 0);
            meta.size = 0;
            file_table::release_fid(&self.sb, fid);
            Ok(())
        })();
        self.lock.unlock();
        result
    }

    /// `rename` (spec.md §4.9): fails `EXDEV` across the mount boundary;
    /// within the store, overwrites the name buffer in place so the fid
    /// and every open descriptor on it remain valid.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let op = "rename";
        if self.intercept_path(old) != self.intercept_path(new) {
            return Err(Error::cross_boundary(op));
        }
        self.lock.lock();
        let result = (|| -> Result<()> {
            let fid = file_table::lookup_fid(&self.sb, old).ok_or_else(|| Error::not_found(op))?;
            if file_table::lookup_fid(&self.sb, new).is_some() {
                return Err(Error::exists(op));
            }
            file_table::rename_in_place(&self.sb, fid, new, op)
        })();
        self.lock.unlock();
        result
    }

    /// `truncate_to` (spec.md §4.8): retains one extra chunk when `length`
    /// is an exact multiple of `CHUNK_SIZE` — pinned reference behavior,
    /// see DESIGN.md.
    pub fn truncate(&self, path: &str, length: u64) -> Result<()> {
        let op = "truncate";
        self.lock.lock();
        let result = (|| -> Result<()> {
            let fid = file_table::lookup_fid(&self.sb, path).ok_or_else(|| Error::not_found(op))?;
            let meta = self.sb.file_meta(fid);
            let target_chunks = if length == 0 {
                0
            } else {
                ((length >> CHUNK_BITS) + 1) as u32
            };
            chunk_store::shrink_to(&self.sb, meta, target_chunks);
            meta.size = length;
            Ok(())
        })();
        self.lock.unlock();
        result
    }

    /// `stat` (size only, spec.md §4.9): full stat is unsupported.
    pub fn stat_size(&self, path: &str) -> Result<u64> {
        let op = "stat";
        self.lock.lock();
        let result = file_table::lookup_fid(&self.sb, path)
            .map(|fid| self.sb.file_meta(fid).size)
            .ok_or_else(|| Error::not_found(op));
        self.lock.unlock();
        result
    }

    /// `fsync`/`fdatasync` (spec.md §4.9): no-ops on a valid descriptor —
    /// the arena is already coherent with the abstraction.
    pub fn fsync(&self, fd: i64) -> Result<()> {
        self.descriptors.lock().unwrap().check_open(fd, "fsync")?;
        Ok(())
    }

    pub fn fdatasync(&self, fd: i64) -> Result<()> {
        self.descriptors.lock().unwrap().check_open(fd, "fdatasync")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(tag: &str) -> FileStore {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let rank = (std::process::id() as i64 * 100_000 + n as i64) as i32;
        let mut config = StoreConfig::new("/tmp", rank);
        config.prefix = format!("/tmp_{tag}");
        FileStore::mount(config).expect("mount")
    }

    fn cleanup(store: &FileStore) {
        crate::shm::ShmHandle::unlink_by_name(&store.config.segment_name());
    }

    #[test]
    fn create_write_read_roundtrip() {
        let store = store_at("cwr");
        let fd = store.open("/tmp_cwr/a", O_CREAT | O_RDWR).unwrap();
        assert!(store.intercept_fd(fd).0);
        assert_eq!(store.write(fd, b"hello").unwrap(), 5);
        store.lseek(fd, 0, SEEK_SET).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(store.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        cleanup(&store);
    }

    #[test]
    fn boundary_spanning_write_and_read() {
        let store = store_at("span");
        let fd = store.open("/tmp_span/b", O_CREAT | O_RDWR).unwrap();
        let zeros = vec![0u8; 1_048_575];
        assert_eq!(store.write(fd, &zeros).unwrap(), 1_048_575);
        assert_eq!(store.write(fd, b"XY").unwrap(), 2);
        store.lseek(fd, 1_048_574, SEEK_SET).unwrap();
        let mut buf = [0u8; 3];
        store.read(fd, &mut buf).unwrap();
        assert_eq!(buf, [0, b'X', b'Y']);
        cleanup(&store);
    }

    #[test]
    fn o_excl_conflict() {
        let store = store_at("excl");
        store.open("/tmp_excl/c", O_CREAT | O_RDWR).unwrap();
        let err = store
            .open("/tmp_excl/c", O_CREAT | O_EXCL | O_RDWR)
            .unwrap_err();
        assert_eq!(err.errno(), crate::error::errno::EEXIST);
        cleanup(&store);
    }

    #[test]
    fn truncate_releases_chunks_and_resets_size() {
        let store = store_at("trunc");
        let fd = store.open("/tmp_trunc/d", O_CREAT | O_RDWR).unwrap();
        let three_mib = vec![0u8; 3 * 1_048_576];
        store.write(fd, &three_mib).unwrap();
        store.truncate("/tmp_trunc/d", 0).unwrap();
        assert_eq!(store.stat_size("/tmp_trunc/d").unwrap(), 0);
        let mut buf = [0u8; 8];
        store.lseek(fd, 0, SEEK_SET).unwrap();
        assert_eq!(store.read(fd, &mut buf).unwrap(), 0);
        cleanup(&store);
    }

    #[test]
    fn cross_boundary_rename_is_exdev() {
        let store = store_at("exdev");
        store.open("/tmp_exdev/e", O_CREAT | O_RDWR).unwrap();
        let err = store.rename("/tmp_exdev/e", "/var/e").unwrap_err();
        assert_eq!(err.errno(), crate::error::errno::EXDEV);
        cleanup(&store);
    }

    #[test]
    fn open_missing_without_creat_is_enoent() {
        let store = store_at("enoent");
        let err = store.open("/tmp_enoent/missing", O_RDWR).unwrap_err();
        assert_eq!(err.errno(), crate::error::errno::ENOENT);
        cleanup(&store);
    }

    #[test]
    fn rename_preserves_open_descriptor_contents() {
        let store = store_at("renamekeep");
        let fd = store.open("/tmp_renamekeep/a", O_CREAT | O_RDWR).unwrap();
        store.write(fd, b"payload").unwrap();
        store.rename("/tmp_renamekeep/a", "/tmp_renamekeep/b").unwrap();
        assert!(store.stat_size("/tmp_renamekeep/a").is_err());
        assert_eq!(store.stat_size("/tmp_renamekeep/b").unwrap(), 7);
        store.lseek(fd, 0, SEEK_SET).unwrap();
        let mut buf = [0u8; 7];
        store.read(fd, &mut buf).unwrap();
        assert_eq!(&buf, b"payload");
        cleanup(&store);
    }
}
