/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Per-register extension rights.
//!
//! Each register has its own async mutex, created on first use. Holding the
//! mutex is the `Signing` state. Callers for the same register queue in FIFO
//! order; callers for different registers never touch each other's mutex.
//!
//! An entry lives only while someone holds or waits for it. Clones of the
//! per-register `Arc` are only taken under the arena lock, so an entry whose
//! strong count is one is idle and can be removed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Whether a register currently has a signing operation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterState {
    Idle,
    Signing,
}

/// Proof of holding a register's extension right. Released on drop.
#[derive(Debug)]
pub struct RegisterGuard {
    guard: Option<OwnedMutexGuard<()>>,
    register_id: String,
    locks: Arc<LockMap>,
    waited: Duration,
}

impl RegisterGuard {
    /// Time spent waiting for the right.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for RegisterGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts as a holder.
        self.guard.take();
        prune(&self.locks, &self.register_id);
    }
}

fn prune(locks: &LockMap, register_id: &str) {
    let mut locks = locks.lock();
    if locks
        .get(register_id)
        .is_some_and(|lock| Arc::strong_count(lock) == 1)
    {
        locks.remove(register_id);
    }
}

/// Arena of extension rights keyed by register id.
#[derive(Debug, Default)]
pub struct RegisterLocks {
    locks: Arc<LockMap>,
}

impl RegisterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, register_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(register_id.to_string())
            .or_default()
            .clone()
    }

    /// Acquires the extension right of `register_id`, waiting at most `timeout`.
    ///
    /// On timeout returns the time waited. Nothing is held in that case.
    pub async fn acquire(
        &self,
        register_id: &str,
        timeout: Duration,
    ) -> Result<RegisterGuard, Duration> {
        let lock = self.lock_for(register_id);
        let started = Instant::now();

        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(RegisterGuard {
                guard: Some(guard),
                register_id: register_id.to_string(),
                locks: self.locks.clone(),
                waited: started.elapsed(),
            }),
            Err(_) => {
                prune(&self.locks, register_id);
                Err(started.elapsed())
            }
        }
    }

    /// Snapshot of a register's state.
    pub fn state(&self, register_id: &str) -> RegisterState {
        let lock = match self.locks.lock().get(register_id) {
            Some(lock) => lock.clone(),
            None => return RegisterState::Idle,
        };
        let state = match lock.try_lock() {
            Ok(_) => RegisterState::Idle,
            Err(_) => RegisterState::Signing,
        };
        state
    }

    /// Number of registers currently held or waited for.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_register_waits_then_times_out() {
        let locks = RegisterLocks::new();
        let held = locks.acquire("R1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(locks.state("R1"), RegisterState::Signing);

        let waited = locks
            .acquire("R1", Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(waited >= Duration::from_millis(30));

        drop(held);
        assert_eq!(locks.state("R1"), RegisterState::Idle);
        assert!(locks.acquire("R1", Duration::from_millis(30)).await.is_ok());
    }

    #[tokio::test]
    async fn test_registers_are_independent() {
        let locks = RegisterLocks::new();
        let _r1 = locks.acquire("R1", Duration::from_secs(1)).await.unwrap();

        let r2 = locks.acquire("R2", Duration::from_millis(10)).await.unwrap();
        assert!(r2.waited() < Duration::from_millis(10));
        assert_eq!(locks.state("R2"), RegisterState::Signing);
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_unknown_register_is_idle() {
        let locks = RegisterLocks::new();
        assert_eq!(locks.state("never-seen"), RegisterState::Idle);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let locks = Arc::new(RegisterLocks::new());
        let held = locks.acquire("R1", Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("R1", Duration::from_secs(5)).await.is_ok() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_idle_registers_are_pruned() {
        let locks = RegisterLocks::new();
        for i in 0..50 {
            let guard = locks
                .acquire(&format!("R{}", i), Duration::from_secs(1))
                .await
                .unwrap();
            drop(guard);
        }
        assert!(locks.is_empty());

        let held = locks.acquire("R1", Duration::from_secs(1)).await.unwrap();
        assert!(locks
            .acquire("R1", Duration::from_millis(10))
            .await
            .is_err());
        // The timed-out waiter must not remove the entry the holder still uses.
        assert_eq!(locks.len(), 1);
        assert_eq!(locks.state("R1"), RegisterState::Signing);

        drop(held);
        assert!(locks.is_empty());
        assert_eq!(locks.state("R1"), RegisterState::Idle);
    }

    #[tokio::test]
    async fn test_entry_survives_while_waiter_queued() {
        let locks = Arc::new(RegisterLocks::new());
        let held = locks.acquire("R1", Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("R1", Duration::from_secs(5)).await.unwrap();
                locks.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        // The waiter still sees its entry after the first holder released.
        assert_eq!(waiter.await.unwrap(), 1);
        assert!(locks.is_empty());
    }
}
