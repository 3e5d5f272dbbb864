//! Ownership of the running service process.

use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;

/// A spawned service. Dropping the handle terminates the process, so
/// whoever holds it controls the service's lifetime.
#[derive(Debug)]
pub struct ServiceHandle {
    child: Option<Child>,
    pid: u32,
    port: u16,
}

impl ServiceHandle {
    pub(crate) fn new(child: Child, port: u16) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
            port,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Exit code if the process has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<Option<i32>>> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?.map(|status| status.code())),
            None => Ok(None),
        }
    }

    /// Block until the service exits.
    pub fn wait(&mut self) -> Result<Option<i32>> {
        match self.child.take() {
            Some(mut child) => Ok(child.wait()?.code()),
            None => Ok(None),
        }
    }

    /// Ask the service to stop, then kill it after `grace`.
    pub fn shutdown(&mut self, grace: Duration) -> Result<Option<i32>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };

        if let Some(status) = child.try_wait()? {
            return Ok(status.code());
        }

        terminate(&child);
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                tracing::info!("service {} stopped", self.pid);
                return Ok(status.code());
            }
            thread::sleep(Duration::from_millis(50));
        }

        tracing::warn!("service {} ignored termination, killing", self.pid);
        child.kill()?;
        Ok(child.wait()?.code())
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                tracing::debug!("terminating service {} on drop", self.pid);
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    // SAFETY: kill(2) with a pid we spawned and have not yet reaped.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        tracing::debug!("SIGTERM to {} failed", child.id());
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}
