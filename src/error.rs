// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the store (spec.md §4.10, §7): one variant per
// condition, each mapping to a canonical POSIX errno. Mirrors how
// kata-sys-util pairs `thiserror` with raw errno constants at the syscall
// boundary.

use thiserror::Error;

/// errno values the store can surface (Linux numbering; stable across the
/// mainstream POSIX platforms this crate targets).
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EBADF: i32 = 9;
    pub const ENOSPC: i32 = 28;
    pub const EEXIST: i32 = 17;
    pub const EXDEV: i32 = 18;
    pub const ENAMETOOLONG: i32 = 36;
}

/// Errors raised by store operations.
///
/// Every variant carries the operation name it was raised from, so the
/// `Display` impl reads like a diagnostic (`"open: no such file or
/// directory"`) without needing to thread path/fd context through every
/// call site.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{op}: no such file or directory")]
    NotFound { op: &'static str },

    #[error("{op}: file exists")]
    Exists { op: &'static str },

    #[error("{op}: file name too long")]
    NameTooLong { op: &'static str },

    #[error("{op}: bad file descriptor")]
    BadDescriptor { op: &'static str },

    #[error("{op}: no space left on device")]
    NoSpace { op: &'static str },

    #[error("{op}: invalid cross-device link")]
    CrossBoundary { op: &'static str },

    #[error("{op}: operation not supported")]
    Unsupported { op: &'static str, errno: i32 },

    #[error("{op}: {source}")]
    Host {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// The canonical POSIX errno for this error, per `spec.md` §4.10/§7.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NotFound { .. } => errno::ENOENT,
            Error::Exists { .. } => errno::EEXIST,
            Error::NameTooLong { .. } => errno::ENAMETOOLONG,
            Error::BadDescriptor { .. } => errno::EBADF,
            Error::NoSpace { .. } => errno::ENOSPC,
            Error::CrossBoundary { .. } => errno::EXDEV,
            Error::Unsupported { errno, .. } => *errno,
            Error::Host { source, .. } => source.raw_os_error().unwrap_or(errno::EBADF),
        }
    }

    pub(crate) fn not_found(op: &'static str) -> Self {
        Error::NotFound { op }
    }

    pub(crate) fn exists(op: &'static str) -> Self {
        Error::Exists { op }
    }

    pub(crate) fn name_too_long(op: &'static str) -> Self {
        Error::NameTooLong { op }
    }

    pub(crate) fn bad_descriptor(op: &'static str) -> Self {
        Error::BadDescriptor { op }
    }

    pub(crate) fn no_space(op: &'static str) -> Self {
        Error::NoSpace { op }
    }

    pub(crate) fn cross_boundary(op: &'static str) -> Self {
        Error::CrossBoundary { op }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
