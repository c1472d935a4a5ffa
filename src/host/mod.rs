//! Host scene collaborator
//!
//! Nodes, timers and the activity context belong to the host engine. The
//! library only reaches them through [`Host`], always from the main thread.

pub mod headless;
pub mod timer;

use std::fmt;
use std::time::Duration;

use crate::error::HostError;
use crate::media::Rgb;

pub use headless::HeadlessHost;
pub use timer::{TimerId, TimerQueue};

/// Opaque handle to a host pixel node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attributes of a glyph node as it is created
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSpec {
    pub position: [f32; 3],
    pub color: Rgb,
    pub scale: f32,
    pub glyph: String,
}

pub trait Host {
    /// `None` when the host refused to create the node
    fn create_pixel_node(&mut self, spec: &PixelSpec) -> Option<NodeHandle>;

    fn set_node_color(&mut self, node: NodeHandle, color: Rgb) -> Result<(), HostError>;

    fn delete_node(&mut self, node: NodeHandle);

    /// One-shot timer; the id is handed back to the owner when it fires
    fn schedule_timer(&mut self, delay: Duration) -> TimerId;

    /// Returns whether the timer was still pending
    fn cancel_timer(&mut self, timer: TimerId) -> bool;

    /// Whether the scene activity is alive; node mutations need it
    fn context_active(&self) -> bool;
}
