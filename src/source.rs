// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Random-access byte sources that elementary streams are read from.
//!
//! Streams can be far larger than memory, so the parser and the decoder never hold the whole
//! stream. They request short-lived views with [`ByteSource::map`] and drop them as soon as the
//! bytes have been consumed.

use std::fs::File;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::os::fd::AsFd;
use std::path::Path;
use std::ptr::NonNull;
use std::slice;

use bytes::Bytes;
use nix::errno::Errno;
use nix::libc;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use nix::unistd::sysconf;
use nix::unistd::SysconfVar;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to map {len} bytes at offset {offset}: {errno}")]
    Map {
        offset: usize,
        len: usize,
        errno: Errno,
    },
    #[error("range {offset}+{len} exceeds the source length {source_len}")]
    OutOfRange {
        offset: usize,
        len: usize,
        source_len: usize,
    },
}

/// A fixed-size, read-only span of bytes that can be viewed at arbitrary offsets.
pub trait ByteSource: Send + Sync {
    /// A view of part of the source. The bytes stay valid until the view is dropped.
    type Region<'a>: Deref<Target = [u8]> + 'a
    where
        Self: 'a;

    /// Total length of the source in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a view over `len` bytes starting at `offset`.
    fn map(&self, offset: usize, len: usize) -> Result<Self::Region<'_>, SourceError>;
}

fn check_range(offset: usize, len: usize, source_len: usize) -> Result<(), SourceError> {
    match offset.checked_add(len) {
        Some(end) if end <= source_len => Ok(()),
        _ => Err(SourceError::OutOfRange {
            offset,
            len,
            source_len,
        }),
    }
}

/// In-memory source, mostly useful for synthesized streams and fuzzing.
impl ByteSource for Bytes {
    type Region<'a> = Bytes;

    fn len(&self) -> usize {
        Bytes::len(self)
    }

    fn map(&self, offset: usize, len: usize) -> Result<Self::Region<'_>, SourceError> {
        check_range(offset, len, Bytes::len(self))?;
        Ok(self.slice(offset..offset + len))
    }
}

// UNSAFE: the mappings below are read-only views of a file that this crate never writes to. A
// mapping borrows its `MappedFile`, so it cannot outlive the descriptor it was created from. As
// with any file mapping, truncating the file from another process while it is mapped results in
// SIGBUS; callers are expected to decode files that are not being modified.

/// A file that is mapped into memory piecewise, one region at a time.
#[derive(Debug)]
pub struct MappedFile {
    file: File,
    len: usize,
    page_size: usize,
}

impl MappedFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        let page_size = match sysconf(SysconfVar::PAGE_SIZE) {
            Ok(Some(size)) if size > 0 => size as usize,
            _ => 4096,
        };

        Ok(Self {
            file,
            len,
            page_size,
        })
    }
}

impl ByteSource for MappedFile {
    type Region<'a> = MappedRegion<'a>;

    fn len(&self) -> usize {
        self.len
    }

    fn map(&self, offset: usize, len: usize) -> Result<Self::Region<'_>, SourceError> {
        check_range(offset, len, self.len)?;

        // mmap offsets have to be page aligned, so map from the start of the page and skip the
        // leading bytes.
        let page_offset = offset % self.page_size;
        let map_start = offset - page_offset;
        let map_len = match NonZeroUsize::new(len + page_offset) {
            Some(map_len) => map_len,
            None => {
                return Ok(MappedRegion {
                    addr: None,
                    map_len: 0,
                    page_offset: 0,
                    len: 0,
                    _file: PhantomData,
                })
            }
        };

        let addr = unsafe {
            mmap(
                None,
                map_len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                self.file.as_fd(),
                map_start as libc::off_t,
            )
        }
        .map_err(|errno| SourceError::Map { offset, len, errno })?;

        Ok(MappedRegion {
            addr: Some(addr),
            map_len: map_len.get(),
            page_offset,
            len,
            _file: PhantomData,
        })
    }
}

/// A read-only view of part of a [`MappedFile`], unmapped on drop.
pub struct MappedRegion<'a> {
    addr: Option<NonNull<libc::c_void>>,
    map_len: usize,
    page_offset: usize,
    len: usize,
    _file: PhantomData<&'a MappedFile>,
}

// The mapping is read-only and owned by this region alone.
unsafe impl Send for MappedRegion<'_> {}
unsafe impl Sync for MappedRegion<'_> {}

impl Deref for MappedRegion<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self.addr {
            Some(addr) => unsafe {
                slice::from_raw_parts(
                    (addr.as_ptr() as *const u8).add(self.page_offset),
                    self.len,
                )
            },
            None => &[],
        }
    }
}

impl Drop for MappedRegion<'_> {
    fn drop(&mut self) {
        if let Some(addr) = self.addr.take() {
            if let Err(e) = unsafe { munmap(addr, self.map_len) } {
                log::error!("Unable to unmap stream region: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn bytes_source_ranges() {
        let source = Bytes::from_static(&[1, 2, 3, 4, 5]);
        assert_eq!(&*source.map(1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(&*source.map(5, 0).unwrap(), &[] as &[u8]);
        assert!(matches!(
            source.map(3, 3),
            Err(SourceError::OutOfRange { offset: 3, len: 3, source_len: 5 })
        ));
    }

    #[test]
    fn mapped_file_unaligned_regions() {
        let path = std::env::temp_dir().join(format!("mpeg2-es-source-{}", std::process::id()));
        let contents: Vec<u8> = (0..20000u32).map(|i| (i % 251) as u8).collect();
        File::create(&path).unwrap().write_all(&contents).unwrap();

        let file = MappedFile::open(&path).unwrap();
        assert_eq!(file.len(), contents.len());

        for (offset, len) in [(0, 16), (4095, 3), (4097, 9000), (19990, 10), (100, 0)] {
            let region = file.map(offset, len).unwrap();
            assert_eq!(&*region, &contents[offset..offset + len]);
        }
        assert!(file.map(19990, 11).is_err());

        std::fs::remove_file(&path).unwrap();
    }
}
