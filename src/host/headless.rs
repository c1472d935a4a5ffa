//! In-memory host with a virtual clock
//!
//! Used by the test suite and by embedders that drive rendering themselves.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::trace;

use super::{Host, NodeHandle, PixelSpec, TimerId, TimerQueue};
use crate::error::HostError;
use crate::media::Rgb;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessNode {
    pub spec: PixelSpec,
    pub color: Rgb,
}

#[derive(Debug)]
pub struct HeadlessHost {
    nodes: BTreeMap<NodeHandle, HeadlessNode>,
    next_node: u64,
    timers: TimerQueue,
    now: Duration,
    context_active: bool,
    refuse_nodes: bool,
    scheduled: Vec<Duration>,
    color_writes: usize,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_node: 0,
            timers: TimerQueue::new(),
            now: Duration::ZERO,
            context_active: true,
            refuse_nodes: false,
            scheduled: Vec::new(),
            color_writes: 0,
        }
    }

    /// Simulate the scene activity starting or expiring
    pub fn set_context_active(&mut self, active: bool) {
        self.context_active = active;
    }

    /// Make subsequent node creation fail
    pub fn set_refuse_nodes(&mut self, refuse: bool) {
        self.refuse_nodes = refuse;
    }

    /// Move the virtual clock forward and return the timers that came due
    pub fn advance(&mut self, dt: Duration) -> Vec<TimerId> {
        self.now += dt;
        self.timers.take_due(self.now)
    }

    /// Jump straight to the next pending deadline, if any
    pub fn advance_to_next(&mut self) -> Vec<TimerId> {
        match self.timers.next_deadline() {
            Some(deadline) => {
                let dt = deadline.saturating_sub(self.now);
                self.advance(dt)
            }
            None => Vec::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&HeadlessNode> {
        self.nodes.get(&handle)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node colors in creation order
    pub fn colors(&self) -> Vec<Rgb> {
        self.nodes.values().map(|n| n.color).collect()
    }

    /// Every delay passed to `schedule_timer`, in call order
    pub fn scheduled_delays(&self) -> &[Duration] {
        &self.scheduled
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn is_timer_pending(&self, id: TimerId) -> bool {
        self.timers.is_pending(id)
    }

    pub fn color_writes(&self) -> usize {
        self.color_writes
    }
}

impl Host for HeadlessHost {
    fn create_pixel_node(&mut self, spec: &PixelSpec) -> Option<NodeHandle> {
        if !self.context_active || self.refuse_nodes {
            return None;
        }
        self.next_node += 1;
        let handle = NodeHandle(self.next_node);
        self.nodes.insert(
            handle,
            HeadlessNode {
                spec: spec.clone(),
                color: spec.color,
            },
        );
        Some(handle)
    }

    fn set_node_color(&mut self, node: NodeHandle, color: Rgb) -> Result<(), HostError> {
        if !self.context_active {
            return Err(HostError::ContextUnavailable);
        }
        let entry = self
            .nodes
            .get_mut(&node)
            .ok_or(HostError::NodeMissing(node.0))?;
        entry.color = color;
        self.color_writes += 1;
        Ok(())
    }

    fn delete_node(&mut self, node: NodeHandle) {
        if self.nodes.remove(&node).is_none() {
            trace!("Delete of unknown node {}", node);
        }
    }

    fn schedule_timer(&mut self, delay: Duration) -> TimerId {
        self.scheduled.push(delay);
        self.timers.schedule(self.now, delay)
    }

    fn cancel_timer(&mut self, timer: TimerId) -> bool {
        self.timers.cancel(timer)
    }

    fn context_active(&self) -> bool {
        self.context_active
    }
}
