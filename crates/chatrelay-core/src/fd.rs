//! Nonblocking descriptors and anonymous pipes.
//!
//! Everything the relay multiplexes is put in `O_NONBLOCK` mode first, so a
//! readiness signal followed by `WouldBlock` just means "no work now".

use std::os::fd::{AsFd, OwnedFd};

use nix::fcntl::{FcntlArg, OFlag, fcntl};

use crate::error::{Error, Result};

/// Switch a descriptor to non-blocking mode, keeping its other status flags.
pub fn set_nonblocking<Fd: AsFd>(fd: Fd) -> Result<()> {
    let fd = fd.as_fd();
    let flags = fcntl(fd, FcntlArg::F_GETFL)
        .map_err(|e| Error::descriptor("fcntl (get)", e.into()))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| Error::descriptor("fcntl (set)", e.into()))?;
    Ok(())
}

/// Both ends of one unidirectional pipe.
#[derive(Debug)]
pub struct Pipe {
    pub read: OwnedFd,
    pub write: OwnedFd,
}

/// Create an anonymous pipe with both ends already non-blocking.
pub fn nonblocking_pipe() -> Result<Pipe> {
    let (read, write) = nix::unistd::pipe().map_err(|e| Error::descriptor("pipe", e.into()))?;
    set_nonblocking(&read)?;
    set_nonblocking(&write)?;
    Ok(Pipe { read, write })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs::File;
    use std::io::{ErrorKind, Read, Write};

    use super::*;

    fn is_nonblocking<Fd: AsFd>(fd: Fd) -> bool {
        let flags = fcntl(fd.as_fd(), FcntlArg::F_GETFL).unwrap();
        OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK)
    }

    #[test]
    fn pipe_ends_are_nonblocking() {
        let pipe = nonblocking_pipe().unwrap();
        assert!(is_nonblocking(&pipe.read));
        assert!(is_nonblocking(&pipe.write));
    }

    #[test]
    fn empty_pipe_read_would_block() {
        let pipe = nonblocking_pipe().unwrap();
        let mut reader = File::from(pipe.read);
        let mut buf = [0u8; 16];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        drop(pipe.write);
    }

    #[test]
    fn closed_write_end_reads_as_end_of_stream() {
        let pipe = nonblocking_pipe().unwrap();
        let mut writer = File::from(pipe.write);
        writer.write_all(b"bye").unwrap();
        drop(writer);

        let mut reader = File::from(pipe.read);
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn set_nonblocking_is_idempotent() {
        let (read, _write) = nix::unistd::pipe().unwrap();
        assert!(!is_nonblocking(&read));
        set_nonblocking(&read).unwrap();
        set_nonblocking(&read).unwrap();
        assert!(is_nonblocking(&read));
    }
}
