//! FIFO ingress queue feeding the query slots.
//!
//! At most one request per agent is live. Re-requesting replaces the live
//! request and moves the agent to the back of the queue; the superseded
//! position is skipped lazily when it reaches the front. Nothing is ever
//! dropped for lack of slots.

use crate::types::{AgentHandle, AreaMask, Vec3};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct PathRequest {
    pub agent: AgentHandle,
    pub target: Vec3,
    pub mask: AreaMask,
    /// Re-issued by the engine (purge, deviation) rather than by the host.
    pub retry: bool,
    /// Unique per request; lets completions tell a stale request apart.
    pub ticket: u64,
    /// Tick the request entered the queue.
    pub queued_at: u64,
    /// Starvation warning already logged for this request.
    pub reported_starving: bool,
}

#[derive(Default)]
pub struct RequestQueue {
    order: VecDeque<(AgentHandle, u64)>,
    live: FxHashMap<AgentHandle, PathRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) amortised. Returns the request this one replaced, if any.
    pub fn enqueue(&mut self, request: PathRequest) -> Option<PathRequest> {
        self.order.push_back((request.agent, request.ticket));
        let replaced = self.live.insert(request.agent, request);
        if self.order.len() > 2 * self.live.len() + 64 {
            self.compact();
        }
        replaced
    }

    /// Withdraw the agent's pending request.
    pub fn cancel(&mut self, agent: AgentHandle) -> Option<PathRequest> {
        self.live.remove(&agent)
    }

    /// Oldest live request in arrival order.
    pub fn pop_front(&mut self) -> Option<PathRequest> {
        while let Some((agent, ticket)) = self.order.pop_front() {
            if self.is_current(agent, ticket) {
                return self.live.remove(&agent);
            }
        }
        None
    }

    /// Put a popped request back at the head, ahead of everything queued
    /// after it. Ignored if the agent queued a newer request meanwhile.
    pub fn requeue_front(&mut self, request: PathRequest) {
        if self.live.contains_key(&request.agent) {
            return;
        }
        self.order.push_front((request.agent, request.ticket));
        self.live.insert(request.agent, request);
    }

    /// Logical depth: one per agent with a pending request.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Ticks the oldest live request has waited as of `now`.
    pub fn oldest_wait(&self, now: u64) -> u64 {
        self.live
            .values()
            .map(|r| now.saturating_sub(r.queued_at))
            .max()
            .unwrap_or(0)
    }

    /// Requests waiting at least `threshold` ticks that were not reported
    /// yet. Marks them reported.
    pub fn take_starving(&mut self, now: u64, threshold: u64) -> Vec<(AgentHandle, u64)> {
        let mut starving = Vec::new();
        for request in self.live.values_mut() {
            let waited = now.saturating_sub(request.queued_at);
            if !request.reported_starving && waited >= threshold {
                request.reported_starving = true;
                starving.push((request.agent, waited));
            }
        }
        starving.sort();
        starving
    }

    fn is_current(&self, agent: AgentHandle, ticket: u64) -> bool {
        self.live
            .get(&agent)
            .map(|r| r.ticket == ticket)
            .unwrap_or(false)
    }

    fn compact(&mut self) {
        let live = &self.live;
        self.order
            .retain(|(agent, ticket)| live.get(agent).map(|r| r.ticket == *ticket).unwrap_or(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(agent: u64, ticket: u64) -> PathRequest {
        PathRequest {
            agent: AgentHandle(agent),
            target: Vec3::zero(),
            mask: AreaMask::WALKABLE,
            retry: false,
            ticket,
            queued_at: 0,
            reported_starving: false,
        }
    }

    #[test]
    fn fifo_order() {
        let mut q = RequestQueue::new();
        q.enqueue(req(1, 1));
        q.enqueue(req(2, 2));
        q.enqueue(req(3, 3));
        let order: Vec<_> = std::iter::from_fn(|| q.pop_front()).map(|r| r.agent.0).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn replacement_moves_agent_to_back() {
        let mut q = RequestQueue::new();
        q.enqueue(req(1, 1));
        q.enqueue(req(2, 2));
        assert!(q.enqueue(req(1, 3)).is_some());
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_front().map(|r| r.ticket), Some(2));
        assert_eq!(q.pop_front().map(|r| r.ticket), Some(3));
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn cancelled_request_is_skipped() {
        let mut q = RequestQueue::new();
        q.enqueue(req(1, 1));
        q.enqueue(req(2, 2));
        q.cancel(AgentHandle(1));
        assert_eq!(q.pop_front().map(|r| r.agent.0), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn requeue_front_keeps_arrival_order() {
        let mut q = RequestQueue::new();
        q.enqueue(req(1, 1));
        q.enqueue(req(2, 2));
        let head = q.pop_front().unwrap();
        q.requeue_front(head);
        let order: Vec<_> = std::iter::from_fn(|| q.pop_front()).map(|r| r.agent.0).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn requeue_front_yields_to_newer_request() {
        let mut q = RequestQueue::new();
        q.enqueue(req(1, 1));
        let stale = q.pop_front().unwrap();
        q.enqueue(req(1, 5));
        q.requeue_front(stale);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_front().map(|r| r.ticket), Some(5));
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn repeated_replacement_stays_bounded() {
        let mut q = RequestQueue::new();
        for t in 0..1_000 {
            q.enqueue(req(7, t));
        }
        assert_eq!(q.len(), 1);
        assert!(q.order.len() <= 2 * q.live.len() + 64);
    }

    #[test]
    fn starving_reported_once() {
        let mut q = RequestQueue::new();
        q.enqueue(req(1, 1));
        assert!(q.take_starving(5, 10).is_empty());
        assert_eq!(q.take_starving(10, 10), vec![(AgentHandle(1), 10)]);
        assert!(q.take_starving(20, 10).is_empty());
        assert_eq!(q.oldest_wait(20), 20);
    }
}
