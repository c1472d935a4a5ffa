//! ANSI truecolor terminal host
//! Draws each pixel node as its glyph, one text row per grid row.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::HostError;
use crate::host::{Host, NodeHandle, PixelSpec, TimerId, TimerQueue};
use crate::media::Rgb;

#[derive(Debug)]
struct Cell {
    glyph: String,
    color: Rgb,
}

/// Host that renders to a terminal on wall-clock timers
///
/// Nodes are drawn in creation order, `columns` per row, starting from the
/// bottom row so the first node ends up in the lower-left corner.
pub struct TerminalHost {
    columns: usize,
    cells: BTreeMap<NodeHandle, Cell>,
    next_node: u64,
    timers: TimerQueue,
    epoch: Instant,
    active: bool,
    dirty: bool,
}

impl TerminalHost {
    pub fn new(columns: u32) -> Self {
        Self {
            columns: (columns as usize).max(1),
            cells: BTreeMap::new(),
            next_node: 0,
            timers: TimerQueue::new(),
            epoch: Instant::now(),
            active: true,
            dirty: false,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Timers whose deadline has passed
    pub fn poll_timers(&mut self) -> Vec<TimerId> {
        let now = self.now();
        self.timers.take_due(now)
    }

    /// Time until the earliest pending timer
    pub fn until_next_timer(&self) -> Option<Duration> {
        self.timers
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(self.now()))
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Stop accepting node mutations, e.g. while shutting down
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Redraw the grid if anything changed since the last call
    pub fn present<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;

        let cells: Vec<&Cell> = self.cells.values().collect();
        // Cursor home, then top row down
        write!(out, "\x1b[H")?;
        for row in cells.chunks(self.columns).rev() {
            for cell in row {
                let [r, g, b] = cell.color.to_rgb8();
                write!(out, "\x1b[38;2;{r};{g};{b}m{}", cell.glyph)?;
            }
            writeln!(out, "\x1b[0m")?;
        }
        out.flush()
    }
}

impl Host for TerminalHost {
    fn create_pixel_node(&mut self, spec: &PixelSpec) -> Option<NodeHandle> {
        if !self.active {
            return None;
        }
        self.next_node += 1;
        let handle = NodeHandle(self.next_node);
        self.cells.insert(
            handle,
            Cell {
                glyph: spec.glyph.clone(),
                color: spec.color,
            },
        );
        self.dirty = true;
        Some(handle)
    }

    fn set_node_color(&mut self, node: NodeHandle, color: Rgb) -> Result<(), HostError> {
        if !self.active {
            return Err(HostError::ContextUnavailable);
        }
        let cell = self
            .cells
            .get_mut(&node)
            .ok_or(HostError::NodeMissing(node.0))?;
        if cell.color != color {
            cell.color = color;
            self.dirty = true;
        }
        Ok(())
    }

    fn delete_node(&mut self, node: NodeHandle) {
        if self.cells.remove(&node).is_some() {
            self.dirty = true;
        } else {
            trace!("Delete of unknown node {}", node);
        }
    }

    fn schedule_timer(&mut self, delay: Duration) -> TimerId {
        let now = self.now();
        self.timers.schedule(now, delay)
    }

    fn cancel_timer(&mut self, timer: TimerId) -> bool {
        self.timers.cancel(timer)
    }

    fn context_active(&self) -> bool {
        self.active
    }
}
