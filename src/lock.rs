//! Advisory locking of the report destination.
//!
//! Several probe processes may append to the same file. The lock keeps
//! their reports from interleaving. Pipes and terminals are left alone.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};

use tracing::warn;

/// Holds an exclusive `fcntl` write lock until dropped.
#[derive(Debug)]
pub struct OutputLock {
    fd: Option<RawFd>,
}

impl OutputLock {
    /// Block until the lock on `out` is held. Does nothing unless `out` is
    /// a regular file; locking errors are logged and otherwise ignored.
    pub fn acquire<F: AsRawFd + ?Sized>(out: &F) -> Self {
        let fd = out.as_raw_fd();
        if !is_regular_file(fd) {
            return Self { fd: None };
        }
        match set_lock(fd, libc::F_WRLCK) {
            Ok(()) => Self { fd: Some(fd) },
            Err(e) => {
                warn!("fcntl: {} (ignored)", e);
                Self { fd: None }
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.fd.is_some()
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Some(fd) = self.fd.take() {
            if let Err(e) = set_lock(fd, libc::F_UNLCK) {
                warn!("fcntl: {} (ignored)", e);
            }
        }
    }
}

fn is_regular_file(fd: RawFd) -> bool {
    let mut st: libc::stat = unsafe { mem::zeroed() };
    let rc = unsafe { libc::fstat(fd, &mut st) };
    rc == 0 && (st.st_mode & libc::S_IFMT) == libc::S_IFREG
}

/// Whole-file record lock, anchored at the current end of file.
fn set_lock(fd: RawFd, kind: libc::c_int) -> io::Result<()> {
    let mut fl: libc::flock = unsafe { mem::zeroed() };
    fl.l_type = kind as _;
    fl.l_whence = libc::SEEK_END as _;
    fl.l_start = 0;
    fl.l_len = 0;

    loop {
        if unsafe { libc::fcntl(fd, libc::F_SETLKW, &fl as *const libc::flock) } != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn regular_files_are_locked_and_released() {
        let mut file = tempfile::tempfile().unwrap();
        {
            let guard = OutputLock::acquire(&file);
            assert!(guard.is_held());
            writeln!(file, "HAPPY.0;0;FAIL;h;80;192.0.2.1;-1").unwrap();
        }
        // Released on drop, so it can be taken again.
        assert!(OutputLock::acquire(&file).is_held());
    }

    #[test]
    fn pipes_are_never_locked() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (rd, wr) = (fds[0], fds[1]);

        struct Fd(RawFd);
        impl AsRawFd for Fd {
            fn as_raw_fd(&self) -> RawFd {
                self.0
            }
        }

        assert!(!OutputLock::acquire(&Fd(wr)).is_held());
        unsafe {
            libc::close(rd);
            libc::close(wr);
        }
    }
}
