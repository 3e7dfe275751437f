//! Growable ring-style byte buffer with separate read/write cursors.
//!
//! Mirrors `original_source/code/buffer/buffer.{h,cpp}` (the
//! `LightWebServer` C++ reference this engine was distilled from),
//! reworked around safe slice indexing instead of raw pointers.

use std::io;
use std::os::fd::AsRawFd;

const INIT_CAPACITY: usize = 1024;
const EXTRA_BUF_SIZE: usize = 65536;

/// A byte container with `read_pos <= write_pos <= capacity`.
///
/// Readable bytes live in `[read_pos, write_pos)`, writable space in
/// `[write_pos, capacity)`, and the reclaimable prefix in
/// `[0, read_pos)`.
#[derive(Debug, Clone)]
pub struct Buffer {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self::with_capacity(INIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Buffer {
            buf: vec![0u8; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn readable_bytes(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn writable_bytes(&self) -> usize {
        self.buf.len() - self.write_pos
    }

    pub fn prependable_bytes(&self) -> usize {
        self.read_pos
    }

    pub fn begin_read(&self) -> &[u8] {
        &self.buf[self.read_pos..self.write_pos]
    }

    pub fn begin_write(&mut self) -> &mut [u8] {
        &mut self.buf[self.write_pos..]
    }

    /// Advances the read cursor by `len`, consuming that much of the
    /// readable region.
    pub fn has_read(&mut self, len: usize) {
        assert!(len <= self.readable_bytes());
        self.read_pos += len;
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    /// Advances the write cursor by `len` after data was written
    /// directly into `begin_write()`.
    pub fn has_written(&mut self, len: usize) {
        assert!(len <= self.writable_bytes());
        self.write_pos += len;
    }

    /// Consumes the readable region up to (but excluding) `end`, an
    /// absolute offset into the readable window, returning the
    /// consumed bytes.
    pub fn retrieve_until(&mut self, end: usize) -> Vec<u8> {
        assert!(end >= self.read_pos && end <= self.write_pos);
        let taken = self.buf[self.read_pos..end].to_vec();
        self.has_read(end - self.read_pos);
        taken
    }

    pub fn retrieve_all_to_string(&mut self) -> String {
        let bytes = self.buf[self.read_pos..self.write_pos].to_vec();
        self.clear_all();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn append(&mut self, data: &[u8]) {
        self.ensure_writable(data.len());
        let start = self.write_pos;
        self.buf[start..start + data.len()].copy_from_slice(data);
        self.has_written(data.len());
    }

    /// Guarantees `writable_bytes() >= len` via compaction or growth.
    pub fn ensure_writable(&mut self, len: usize) {
        if self.writable_bytes() >= len {
            return;
        }
        if self.prependable_bytes() + self.writable_bytes() >= len {
            self.compact();
        } else {
            self.buf.resize(self.write_pos + len + 1, 0);
        }
    }

    fn compact(&mut self) {
        let readable = self.readable_bytes();
        self.buf.copy_within(self.read_pos..self.write_pos, 0);
        self.read_pos = 0;
        self.write_pos = readable;
    }

    pub fn clear_all(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Reads from `fd` using a scatter-read into the writable tail
    /// plus a 64 KiB stack-allocated overflow segment, so a single
    /// syscall can absorb more than the current capacity. Returns the
    /// raw syscall byte count; `WouldBlock` and other I/O errors are
    /// surfaced via `io::Error`.
    pub fn read_from_fd<S: AsRawFd>(&mut self, source: &S) -> io::Result<usize> {
        let mut extra = [0u8; EXTRA_BUF_SIZE];
        let writable = self.writable_bytes();

        let mut iov = [
            libc::iovec {
                iov_base: self.buf[self.write_pos..].as_mut_ptr() as *mut libc::c_void,
                iov_len: writable,
            },
            libc::iovec {
                iov_base: extra.as_mut_ptr() as *mut libc::c_void,
                iov_len: extra.len(),
            },
        ];

        let n = unsafe { libc::readv(source.as_raw_fd(), iov.as_mut_ptr(), iov.len() as i32) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        let n = n as usize;

        if n <= writable {
            self.has_written(n);
        } else {
            self.has_written(writable);
            self.append(&extra[..n - writable]);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursors_stay_ordered() {
        let mut buf = Buffer::with_capacity(16);
        assert_eq!(buf.readable_bytes(), 0);
        buf.append(b"hello");
        assert!(buf.read_pos <= buf.write_pos);
        assert!(buf.write_pos <= buf.capacity());
    }

    #[test]
    fn round_trip_append_retrieve() {
        let mut buf = Buffer::new();
        buf.append(b"the quick brown fox");
        assert_eq!(buf.retrieve_all_to_string(), "the quick brown fox");
        assert_eq!(buf.readable_bytes(), 0);
    }

    #[test]
    fn growth_preserves_data_and_reports_capacity() {
        let mut buf = Buffer::with_capacity(16);
        let data = vec![b'x'; 32];
        buf.append(&data);
        assert!(buf.capacity() >= 33);
        assert_eq!(buf.readable_bytes(), 32);
        assert_eq!(&buf.begin_read()[..], &data[..]);
    }

    #[test]
    fn clear_all_resets_cursors() {
        let mut buf = Buffer::new();
        buf.append(b"abc");
        buf.clear_all();
        assert_eq!(buf.readable_bytes(), 0);
        assert_eq!(buf.prependable_bytes(), 0);
    }

    #[test]
    fn compaction_reuses_prefix_after_partial_read() {
        let mut buf = Buffer::with_capacity(16);
        buf.append(b"0123456789");
        buf.has_read(8);
        let cap_before = buf.capacity();
        // A write that needs compaction rather than growth should not
        // resize the backing store.
        buf.append(b"ab");
        assert_eq!(buf.capacity(), cap_before);
        assert_eq!(buf.begin_read(), b"89ab");
    }

    #[test]
    fn ensure_writable_guarantees_capacity() {
        let mut buf = Buffer::with_capacity(4);
        buf.ensure_writable(100);
        assert!(buf.writable_bytes() >= 100);
    }
}
