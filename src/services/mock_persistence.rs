//! Recording persistence backend for tests.
//!
//! This is a test double, not a production backend: nothing is stored and
//! `App` never selects it. It records every call, hands out sequential IDs,
//! and can fail or hold calls on demand so overlapping modal actions can be
//! exercised. It stays public so the integration tests under `tests/` can
//! drive `ModalController` and `HostBridge` with it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::services::bookmark_form_data::SaveData;
use crate::services::persistence::{BookmarkPersistence, CreatedBookmark, DeletedBookmark};
use crate::types::errors::PersistenceError;

/// A recorded call to the mock backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceCall {
    Create(SaveData),
    Update(i64, SaveData),
    Delete(i64),
}

/// Releases calls held by a gated [`MockPersistence`].
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    /// Lets `n` held calls proceed.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

pub struct MockPersistence {
    calls: Mutex<Vec<PersistenceCall>>,
    failures: Mutex<VecDeque<PersistenceError>>,
    next_id: Mutex<i64>,
    topic_bookmarked: Mutex<bool>,
    gate: Option<Gate>,
}

impl Default for MockPersistence {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockPersistence {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            next_id: Mutex::new(1),
            topic_bookmarked: Mutex::new(false),
            gate: None,
        }
    }

    /// Every call waits for a [`Gate::release`] after being recorded.
    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate {
            permits: Arc::new(Semaphore::new(0)),
        };
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// First ID handed out by `create`.
    pub fn with_next_id(self, id: i64) -> Self {
        *lock(&self.next_id) = id;
        self
    }

    /// Value reported by `delete`.
    pub fn with_topic_bookmarked(self, value: bool) -> Self {
        *lock(&self.topic_bookmarked) = value;
        self
    }

    /// Queues an error; the next call of any kind returns it.
    pub fn fail_next(&self, err: PersistenceError) {
        lock(&self.failures).push_back(err);
    }

    pub fn calls(&self) -> Vec<PersistenceCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    async fn enter(&self, call: PersistenceCall) -> Result<(), PersistenceError> {
        lock(&self.calls).push(call);
        if let Some(gate) = &self.gate {
            let permit = gate
                .permits
                .acquire()
                .await
                .map_err(|e| PersistenceError::Network(e.to_string()))?;
            permit.forget();
        }
        match lock(&self.failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BookmarkPersistence for MockPersistence {
    async fn create(&self, payload: &SaveData) -> Result<CreatedBookmark, PersistenceError> {
        self.enter(PersistenceCall::Create(payload.clone())).await?;
        let mut next = lock(&self.next_id);
        let id = *next;
        *next += 1;
        Ok(CreatedBookmark { id })
    }

    async fn update(&self, id: i64, payload: &SaveData) -> Result<(), PersistenceError> {
        self.enter(PersistenceCall::Update(id, payload.clone())).await
    }

    async fn delete(&self, id: i64) -> Result<DeletedBookmark, PersistenceError> {
        self.enter(PersistenceCall::Delete(id)).await?;
        Ok(DeletedBookmark {
            topic_bookmarked: *lock(&self.topic_bookmarked),
        })
    }
}
