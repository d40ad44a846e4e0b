//! Background poll threads for the serial sessions.
//!
//! Serial I/O is blocking, so every session polls its module from a named OS
//! thread. The threads run until the shared [`Shutdown`] flag is raised.

use crate::error::Result;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

/// Cooperative stop flag shared by all poll threads.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run `poll` every `interval` on a new thread until `shutdown` is raised.
///
/// A failing poll is logged once; further failures are suppressed until a
/// poll succeeds again.
pub fn spawn_poller<F>(
    name: &'static str,
    interval: Duration,
    shutdown: Shutdown,
    mut poll: F,
) -> Result<thread::JoinHandle<()>>
where
    F: FnMut(Instant) -> Result<()> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            tracing::info!(device = name, ?interval, "poll thread started");
            let mut failing = false;
            while !shutdown.is_triggered() {
                let started = Instant::now();
                match poll(started) {
                    Ok(()) if failing => {
                        tracing::info!(device = name, "device answering again");
                        failing = false;
                    }
                    Ok(()) => {}
                    Err(e) if !failing => {
                        tracing::warn!(device = name, error = %e, "poll failed");
                        failing = true;
                    }
                    Err(_) => {}
                }
                if let Some(rest) = interval.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
            tracing::info!(device = name, "poll thread stopped");
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HardwareError;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_poller_runs_until_shutdown() {
        let shutdown = Shutdown::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let handle = spawn_poller("test", Duration::from_millis(1), shutdown.clone(), move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Err(HardwareError::other("still failing"))
        })
        .unwrap();

        while count.load(Ordering::Relaxed) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        shutdown.trigger();
        handle.join().unwrap();
        assert!(shutdown.is_triggered());
    }
}
