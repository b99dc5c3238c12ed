//! Task spawning abstraction for the single-threaded event loop.

use std::future::Future;

use tokio::task::JoinHandle;

/// Spawns local tasks on the current thread.
///
/// Hosts spawn their dispatch loop and every handler execution through this
/// trait, so an alternative executor can drive them.
pub trait TaskProvider: Clone + 'static {
    /// Spawn a named task on the current thread.
    fn spawn_task<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + 'static;
}

/// Task provider backed by `tokio::task::spawn_local`.
///
/// Must be used from inside a `tokio::task::LocalSet`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTaskProvider;

impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        let task_name = name.to_string();
        tokio::task::spawn_local(async move {
            tracing::trace!(task = %task_name, "task starting");
            future.await;
            tracing::trace!(task = %task_name, "task completed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[tokio::test]
    async fn test_spawned_task_runs_locally() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);

                TokioTaskProvider
                    .spawn_task("probe", async move { flag.set(true) })
                    .await
                    .expect("task should finish");

                assert!(ran.get());
            })
            .await;
    }
}
