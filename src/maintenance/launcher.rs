//! Thread creation for maintenance loops.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use super::stats::LoopStats;
use super::task::{LoopKind, MaintenanceLoop, MaintenanceTask};
use crate::core::{EngineError, EngineResult};

pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Starts the OS thread that runs one loop.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, name: &str, body: WorkerBody) -> io::Result<JoinHandle<()>>;
}

/// Named OS thread per loop.
#[derive(Debug, Default, Clone)]
pub struct ThreadLauncher {
    stack_size: Option<usize>,
}

impl ThreadLauncher {
    pub fn with_stack_size(stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
        }
    }
}

impl WorkerLauncher for ThreadLauncher {
    fn launch(&self, name: &str, body: WorkerBody) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(name.to_string());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(body)
    }
}

/// A running maintenance loop.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    kind: LoopKind,
    stats: Arc<LoopStats>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    pub fn stats(&self) -> &Arc<LoopStats> {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop thread to exit. Only returns once shutdown was
    /// signalled.
    pub fn join(self) -> EngineResult<()> {
        self.join
            .join()
            .map_err(|_| EngineError::WorkerPanicked(self.name))
    }
}

/// Start `maintenance_loop` on its own thread.
///
/// The thread runs under the tracing dispatcher that is current here, so a
/// subscriber scoped around startup also receives the loop's events.
pub fn launch_loop<T: MaintenanceTask>(
    launcher: &dyn WorkerLauncher,
    maintenance_loop: MaintenanceLoop<T>,
) -> EngineResult<WorkerHandle> {
    let name = maintenance_loop.name().to_string();
    let kind = maintenance_loop.kind();
    let stats = maintenance_loop.stats();

    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    let body: WorkerBody = Box::new(move || {
        tracing::dispatcher::with_default(&dispatch, || maintenance_loop.run());
    });

    let join = launcher
        .launch(&name, body)
        .map_err(|source| EngineError::WorkerSpawn {
            worker: name.clone(),
            source,
        })?;
    debug!(worker = %name, "Maintenance worker launched");

    Ok(WorkerHandle {
        name,
        kind,
        stats,
        join,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_launcher_names_thread() {
        let launcher = ThreadLauncher::with_stack_size(256 * 1024);
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = launcher
            .launch(
                "unused-index",
                Box::new(move || {
                    let name = thread::current().name().map(str::to_string);
                    tx.send(name).unwrap();
                }),
            )
            .unwrap();
        handle.join().unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("unused-index"));
    }
}
