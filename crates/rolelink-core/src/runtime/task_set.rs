// crates/rolelink-core/src/runtime/task_set.rs
// ============================================================================
// Module: RoleLink Bounded Task Set
// Description: JoinSet gated by a semaphore for per-resolution fan-out.
// Purpose: Run rule and community branches concurrently with a parallelism cap.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! [`ParallelTaskSet`] spawns every branch immediately but only lets
//! `max_parallelism` of them run at once. Joining never panics: a branch that
//! panicked or was cancelled is returned as a [`JoinError`] so the caller can
//! record it as a failed branch. Dropping the set aborts unfinished branches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::Id;
use tokio::task::JoinError;
use tokio::task::JoinSet;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of branches allowed to run at once.
pub const DEFAULT_MAX_PARALLELISM: usize = 16;

// ============================================================================
// SECTION: Task Set
// ============================================================================

/// Bounded collection of tokio tasks.
pub struct ParallelTaskSet<T> {
    /// Permits limiting concurrently running branches.
    semaphore: Arc<Semaphore>,
    /// Spawned branches.
    set: JoinSet<T>,
}

impl<T: Send + 'static> Default for ParallelTaskSet<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLELISM)
    }
}

impl<T: Send + 'static> ParallelTaskSet<T> {
    /// Creates a task set; a parallelism of zero is raised to one.
    #[must_use]
    pub fn new(max_parallelism: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_parallelism.max(1))),
            set: JoinSet::new(),
        }
    }

    /// Spawns a branch that starts once a permit is available.
    ///
    /// The returned id matches [`JoinError::id`] if the branch fails.
    pub fn spawn<F>(&mut self, future: F) -> Id
    where
        F: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        self.set
            .spawn(async move {
                // The semaphore is never closed, so a failed acquire only
                // means the branch runs unthrottled.
                let _permit = semaphore.acquire_owned().await.ok();
                future.await
            })
            .id()
    }

    /// Returns the number of branches not yet joined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns true when every branch has been joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Waits for the next branch to finish.
    pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
        self.set.join_next().await
    }

    /// Waits for every branch, in completion order.
    pub async fn join_all(mut self) -> Vec<Result<T, JoinError>> {
        let mut outputs = Vec::with_capacity(self.set.len());
        while let Some(output) = self.set.join_next().await {
            outputs.push(output);
        }
        outputs
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
