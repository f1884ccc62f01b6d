// Copyright 2025 Toolgate Contributors (https://github.com/toolgate)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pending call/result keyspace and the wait-for-result primitive.
//!
//! In-memory, single-process: a load-balanced deployment must swap this
//! for an externally-addressable store with TTL semantics. The interface
//! (`enqueue` / `drain_pending` / `submit_result` / `await_result`) is the
//! swap point; nothing outside this module touches the maps.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use toolgate_core::{now_millis, BridgeOutcome, PendingBridgeCall, PendingBridgeResult, ToolCallError};
use tracing::{debug, trace};

/// Queue-and-poll RPC bridge state.
///
/// Every operation is atomic on a single key; no cross-key transactions
/// exist, so no outer lock is needed. The sweep iterates the keyspaces but
/// deletes entry by entry, never holding either map exclusively.
pub struct BridgeRpc {
    /// Queued, undelivered calls, keyed by (user_id, call_id)
    calls: DashMap<(String, String), PendingBridgeCall>,
    /// Delivered-but-unclaimed results, keyed by call_id
    results: DashMap<String, PendingBridgeResult>,
    /// Suspended callers, keyed by call_id
    waiters: DashMap<String, oneshot::Sender<BridgeOutcome>>,
    /// Age beyond which unclaimed entries are swept
    pending_ttl: Duration,
}

impl BridgeRpc {
    pub fn new(pending_ttl: Duration) -> Self {
        Self {
            calls: DashMap::new(),
            results: DashMap::new(),
            waiters: DashMap::new(),
            pending_ttl,
        }
    }

    /// Globally-unique correlation id: enqueue time plus a random suffix.
    pub fn new_call_id() -> String {
        format!("{}-{:016x}", now_millis(), rand::random::<u64>())
    }

    /// Queue a call for the user's next poll.
    pub fn enqueue(&self, call: PendingBridgeCall) {
        trace!(user_id = %call.user_id, call_id = %call.call_id, tool = %call.tool, "Enqueuing bridge call");
        self.calls
            .insert((call.user_id.clone(), call.call_id.clone()), call);
    }

    /// Atomically drain all pending calls for one user, oldest first.
    /// Each entry is deleted as it is returned: at-most-once delivery.
    pub fn drain_pending(&self, user_id: &str) -> Vec<PendingBridgeCall> {
        let keys: Vec<(String, String)> = self
            .calls
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut drained: Vec<PendingBridgeCall> = keys
            .into_iter()
            .filter_map(|key| self.calls.remove(&key).map(|(_, call)| call))
            .collect();
        drained.sort_by_key(|c| c.enqueued_at_ms);
        drained
    }

    /// Record a result reported by the bridge process. If the caller is
    /// still suspended, hand it over directly; otherwise park it for a
    /// waiter that may not have reached its receive yet. A result whose
    /// waiter already gave up is dropped by the send failing or by the
    /// sweep.
    pub fn submit_result(&self, call_id: &str, outcome: BridgeOutcome) {
        if let Some((_, tx)) = self.waiters.remove(call_id) {
            if tx.send(outcome).is_ok() {
                return;
            }
            // Receiver dropped between registration and send: nobody is
            // waiting any more, fall through and let the sweep collect it.
            debug!(call_id = %call_id, "Bridge result arrived after waiter gave up");
            return;
        }
        self.results.insert(
            call_id.to_string(),
            PendingBridgeResult {
                call_id: call_id.to_string(),
                outcome,
                arrived_at_ms: now_millis(),
            },
        );
    }

    /// Suspend until the result keyed by `call_id` arrives, or until
    /// `timeout` elapses. Consumes the result exactly once.
    pub async fn await_result(
        &self,
        call_id: &str,
        timeout: Duration,
    ) -> Result<BridgeOutcome, ToolCallError> {
        let (tx, rx) = oneshot::channel();
        // Register the waiter before checking the parked results so a
        // concurrent submit_result cannot fall between the two.
        self.waiters.insert(call_id.to_string(), tx);

        if let Some((_, parked)) = self.results.remove(call_id) {
            self.waiters.remove(call_id);
            return Ok(parked.outcome);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            // Sender dropped without a value: treated the same as a timeout.
            Ok(Err(_)) => Err(ToolCallError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            }),
            Err(_) => {
                self.waiters.remove(call_id);
                Err(ToolCallError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Enqueue a call and suspend for its result. The pending entry is not
    /// deleted on timeout: the bridge process may be about to pick it up,
    /// and the sweep bounds its lifetime either way.
    pub async fn call(
        &self,
        call: PendingBridgeCall,
        timeout: Duration,
    ) -> Result<BridgeOutcome, ToolCallError> {
        let call_id = call.call_id.clone();
        self.enqueue(call);
        self.await_result(&call_id, timeout).await
    }

    /// Number of undelivered calls queued for a user.
    pub fn pending_call_count(&self, user_id: &str) -> usize {
        self.calls.iter().filter(|e| e.key().0 == user_id).count()
    }

    /// Delete pending calls and results older than the TTL. Safety net for
    /// abandoned calls; runs independently of per-call timeouts.
    pub fn sweep(&self, now_ms: u64) -> (usize, usize) {
        let ttl_ms = self.pending_ttl.as_millis() as u64;

        let expired_calls: Vec<(String, String)> = self
            .calls
            .iter()
            .filter(|e| now_ms.saturating_sub(e.value().enqueued_at_ms) > ttl_ms)
            .map(|e| e.key().clone())
            .collect();
        let removed_calls = expired_calls
            .into_iter()
            .filter(|key| self.calls.remove(key).is_some())
            .count();

        let expired_results: Vec<String> = self
            .results
            .iter()
            .filter(|e| now_ms.saturating_sub(e.value().arrived_at_ms) > ttl_ms)
            .map(|e| e.key().clone())
            .collect();
        let removed_results = expired_results
            .into_iter()
            .filter(|key| self.results.remove(key.as_str()).is_some())
            .count();

        (removed_calls, removed_results)
    }

    /// Spawn the periodic sweep task.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let bridge = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let (calls, results) = bridge.sweep(now_millis());
                if calls > 0 || results > 0 {
                    debug!(
                        expired_calls = calls,
                        expired_results = results,
                        "Swept expired bridge entries"
                    );
                }
            }
        })
    }
}
