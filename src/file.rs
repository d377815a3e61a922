//! POSIX file binding for the stream traits.

use std::{
  ffi::{CString, c_void},
  io,
  os::unix::ffi::OsStrExt,
  path::Path,
};

use libc::c_int;

use crate::{
  error::StreamError,
  stream::{ByteSink, ByteSource},
};

#[derive(Debug, Clone)]
pub struct OpenOptions {
  read: bool,
  write: bool,
  create: bool,
  truncate: bool,
  append: bool,
  mode: u32,
}

impl Default for OpenOptions {
  fn default() -> Self {
    Self::new()
  }
}

impl OpenOptions {
  pub fn new() -> Self {
    Self {
      read: false,
      write: false,
      create: false,
      truncate: false,
      append: false,
      mode: 0o644,
    }
  }

  pub fn read(
    &mut self,
    read: bool,
  ) -> &mut Self {
    self.read = read;
    self
  }

  pub fn write(
    &mut self,
    write: bool,
  ) -> &mut Self {
    self.write = write;
    self
  }

  pub fn create(
    &mut self,
    create: bool,
  ) -> &mut Self {
    self.create = create;
    self
  }

  pub fn truncate(
    &mut self,
    truncate: bool,
  ) -> &mut Self {
    self.truncate = truncate;
    self
  }

  pub fn append(
    &mut self,
    append: bool,
  ) -> &mut Self {
    self.append = append;
    self
  }

  /// Permission bits used when the file is created.
  pub fn mode(
    &mut self,
    mode: u32,
  ) -> &mut Self {
    self.mode = mode;
    self
  }

  fn flags(&self) -> Result<c_int, StreamError> {
    let access = match (self.read, self.write || self.append) {
      (true, false) => libc::O_RDONLY,
      (false, true) => libc::O_WRONLY,
      (true, true) => libc::O_RDWR,
      (false, false) => return Err(io::Error::from(io::ErrorKind::InvalidInput).into()),
    };

    let mut flags = access | libc::O_CLOEXEC;
    if self.create {
      flags |= libc::O_CREAT;
    }
    if self.truncate {
      flags |= libc::O_TRUNC;
    }
    if self.append {
      flags |= libc::O_APPEND;
    }

    Ok(flags)
  }

  pub fn open(
    &self,
    path: impl AsRef<Path>,
  ) -> Result<PosixFile, StreamError> {
    let path = CString::new(path.as_ref().as_os_str().as_bytes())
      .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let flags = self.flags()?;

    let fd = unsafe { libc::open(path.as_ptr(), flags, self.mode as libc::c_uint) };
    if fd < 0 {
      return Err(io::Error::last_os_error().into());
    }

    tracing::trace!(fd, flags, "file opened");

    Ok(PosixFile { fd, eof: false })
  }
}

/// An open file descriptor. Closed on drop.
#[derive(Debug)]
pub struct PosixFile {
  fd: c_int,
  eof: bool,
}

impl PosixFile {
  /// Opens `path` read-only.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
    OpenOptions::new().read(true).open(path)
  }

  /// Opens `path` write-only, creating or truncating it.
  pub fn create(path: impl AsRef<Path>) -> Result<Self, StreamError> {
    OpenOptions::new()
      .write(true)
      .create(true)
      .truncate(true)
      .open(path)
  }

  pub fn fd(&self) -> c_int {
    self.fd
  }

  /// Flushes file data and metadata to the device.
  pub fn sync_all(&self) -> Result<(), StreamError> {
    if unsafe { libc::fsync(self.fd) } < 0 {
      return Err(io::Error::last_os_error().into());
    }
    Ok(())
  }

  /// Closes the descriptor, reporting the error `Drop` would swallow.
  pub fn close(mut self) -> Result<(), StreamError> {
    let fd = std::mem::replace(&mut self.fd, -1);
    if unsafe { libc::close(fd) } < 0 {
      return Err(io::Error::last_os_error().into());
    }
    Ok(())
  }
}

impl ByteSource for PosixFile {
  fn read(
    &mut self,
    buf: &mut [u8],
  ) -> Result<usize, StreamError> {
    loop {
      let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut c_void, buf.len()) };

      if n < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
          continue;
        }
        return Err(error.into());
      }

      if n == 0 && !buf.is_empty() {
        self.eof = true;
      }

      return Ok(n as usize);
    }
  }

  fn is_end(&self) -> bool {
    self.eof
  }
}

impl ByteSink for PosixFile {
  fn write(
    &mut self,
    buf: &[u8],
  ) -> Result<usize, StreamError> {
    loop {
      let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const c_void, buf.len()) };

      if n < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
          continue;
        }
        return Err(error.into());
      }

      return Ok(n as usize);
    }
  }
}

impl Drop for PosixFile {
  fn drop(&mut self) {
    if self.fd >= 0 {
      unsafe { libc::close(self.fd) };
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{env, fs, path::PathBuf, process};

  use super::*;
  use crate::{
    defer::defer,
    stream::{ReadStream, WriteStream},
  };

  fn scratch_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("rcontainer-{}-{}", process::id(), name))
  }

  #[test]
  fn test_write_then_read_back() {
    let path = scratch_path("round-trip");
    let _cleanup = defer(|| {
      let _ = fs::remove_file(scratch_path("round-trip"));
    });

    let mut sink = WriteStream::new(PosixFile::create(&path).unwrap());
    sink.write_all(b"ring buffer").unwrap();
    assert!(sink.flush());
    sink.into_inner().close().unwrap();

    let mut source = ReadStream::new(PosixFile::open(&path).unwrap());
    let mut buf = [0u8; 11];
    source.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ring buffer");

    assert!(!source.end());
    assert_eq!(source.read(&mut buf), 0);
    assert!(source.end());
    assert!(source.error().is_none());
  }

  #[test]
  fn test_append() {
    let path = scratch_path("append");
    let _cleanup = defer(|| {
      let _ = fs::remove_file(scratch_path("append"));
    });

    fs::write(&path, b"ab").unwrap();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    assert_eq!(file.write(b"cd").unwrap(), 2);
    file.sync_all().unwrap();
    drop(file);

    assert_eq!(fs::read(&path).unwrap(), b"abcd");
  }

  #[test]
  fn test_open_missing_file() {
    let error = PosixFile::open(scratch_path("does-not-exist")).unwrap_err();

    match error {
      StreamError::Io(error) => assert_eq!(error.kind(), io::ErrorKind::NotFound),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_no_access_mode_is_rejected() {
    assert!(OpenOptions::new().open(scratch_path("unused")).is_err());
  }
}
