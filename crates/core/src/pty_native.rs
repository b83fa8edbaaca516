// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native `forkpty`-backed [`Pty`] adapter.
//!
//! Reworked from a `tokio::io::unix::AsyncFd` design into plain
//! non-blocking fds: the reactor owns a single `nix::poll` readiness set
//! and calls `read`/`write` directly when a fd is marked ready, instead of
//! each pane awaiting its own fd independently.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, ForkResult, Pid};

use crate::error::{CoreError, CoreResult};
use crate::pty::{ExitStatus, Pty};

fn set_nonblocking(fd: RawFd) -> std::io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(io_err)?;
    Ok(())
}

fn io_err(e: nix::errno::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

pub struct NativePty {
    master: OwnedFd,
    child_pid: Pid,
    cols: u16,
    rows: u16,
    reaped: bool,
}

impl NativePty {
    /// `command` must have at least one element (the program to run).
    #[allow(unsafe_code)]
    pub fn spawn(command: &[String], cols: u16, rows: u16) -> CoreResult<Self> {
        if command.is_empty() {
            return Err(CoreError::Config("pty command must not be empty".into()));
        }
        let winsize = Winsize {
            ws_col: cols,
            ws_row: rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: forkpty's child side is partially initialized until
        // exec; we exec immediately and never return from that branch.
        let result = unsafe { forkpty(&winsize, None) }
            .map_err(|e| CoreError::PtyIo(format!("forkpty failed: {e}")))?;
        let ForkptyResult {
            master,
            fork_result,
        } = result;

        match fork_result {
            ForkResult::Child => {
                std::env::set_var("TERM", "xterm-256color");

                let c_args: Result<Vec<CString>, _> =
                    command.iter().map(|s| CString::new(s.as_bytes())).collect();
                let c_args = match c_args {
                    Ok(args) => args,
                    Err(_) => libc_exit(127),
                };
                if execvp(&c_args[0], &c_args).is_err() {
                    libc_exit(127);
                }
                unreachable!();
            }
            ForkResult::Parent { child } => {
                set_nonblocking(master.as_raw_fd())
                    .map_err(|e| CoreError::PtyIo(e.to_string()))?;
                Ok(Self {
                    master,
                    child_pid: child,
                    cols,
                    rows,
                    reaped: false,
                })
            }
        }
    }
}

fn libc_exit(code: i32) -> ! {
    std::process::exit(code)
}

impl Pty for NativePty {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match nix::unistd::read(self.master.as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            Err(nix::errno::Errno::EAGAIN) => Err(std::io::ErrorKind::WouldBlock.into()),
            Err(nix::errno::Errno::EIO) => Ok(0),
            Err(e) => Err(io_err(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        match nix::unistd::write(&self.master, data) {
            Ok(n) => Ok(n),
            Err(nix::errno::Errno::EAGAIN) => Err(std::io::ErrorKind::WouldBlock.into()),
            Err(e) => Err(io_err(e)),
        }
    }

    #[allow(unsafe_code)]
    fn resize(&self, cols: u16, rows: u16) -> std::io::Result<()> {
        let ws = Winsize {
            ws_col: cols,
            ws_row: rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: TIOCSWINSZ is a well-defined ioctl on a PTY master fd
        // with a properly initialized Winsize.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn child_pid(&self) -> Option<i32> {
        Some(self.child_pid.as_raw())
    }

    fn as_raw_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        if self.reaped {
            return Ok(None);
        }
        match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => {
                self.reaped = true;
                Ok(Some(ExitStatus {
                    code: Some(code),
                    signal: None,
                }))
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                self.reaped = true;
                Ok(Some(ExitStatus {
                    code: None,
                    signal: Some(sig as i32),
                }))
            }
            Ok(_) => Ok(None),
            Err(nix::errno::Errno::EINTR) => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    fn close(&mut self) {
        let _ = kill(self.child_pid, Signal::SIGHUP);
    }
}

/// Sends SIGHUP and attempts a non-blocking reap; never waits for the
/// child to actually exit. `PaneRegistry::destroy` is responsible for
/// escalating to SIGKILL on a later reactor tick if SIGHUP wasn't enough,
/// since blocking here would stall every other pane's and client's I/O.
impl Drop for NativePty {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        let _ = kill(self.child_pid, Signal::SIGHUP);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_rejects_empty_command() {
        let err = NativePty::spawn(&[], 80, 24).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn spawn_true_and_reap() {
        let mut pty = NativePty::spawn(&["/bin/true".to_string()], 80, 24).unwrap();
        let mut status = None;
        for _ in 0..200 {
            if let Some(s) = pty.try_wait().unwrap() {
                status = Some(s);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(status, Some(ExitStatus { code: Some(0), signal: None }));
    }
}
