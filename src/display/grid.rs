//! Fixed grid of host pixel nodes

use tracing::{debug, info, instrument, warn};

use crate::error::{HostError, RenderError};
use crate::host::{Host, NodeHandle, PixelSpec};
use crate::media::{FrameBuffer, Resolution, Rgb};
use crate::ScreenConfig;

/// Pixel nodes laid out in the same bottom-left row-major order as a
/// [`FrameBuffer`]
///
/// The slot count is fixed at construction. A slot whose node the host
/// refused to create stays `None` and is skipped when rendering.
#[derive(Debug)]
pub struct DisplayGrid {
    resolution: Resolution,
    slots: Vec<Option<NodeHandle>>,
}

impl DisplayGrid {
    #[instrument(skip_all, fields(resolution = %config.resolution()))]
    pub fn new(host: &mut dyn Host, config: &ScreenConfig) -> Self {
        let resolution = config.resolution();
        if !host.context_active() {
            warn!("No active context when creating screen, pixel nodes not created");
            return Self {
                resolution,
                slots: Vec::new(),
            };
        }

        let [px, py, pz] = config.position;
        let spacing = config.spacing();
        let mut slots = Vec::with_capacity(resolution.pixel_count());
        let mut refused = 0usize;

        for row in 0..resolution.height {
            for col in 0..resolution.width {
                let spec = PixelSpec {
                    position: [
                        px + col as f32 * spacing,
                        py,
                        pz - row as f32 * spacing,
                    ],
                    color: Rgb::BLACK,
                    scale: config.scale,
                    glyph: config.glyph.clone(),
                };
                let node = host.create_pixel_node(&spec);
                if node.is_none() {
                    warn!("Failed to create pixel node at {:?}", spec.position);
                    refused += 1;
                }
                slots.push(node);
            }
        }

        info!(
            "Created {} pixel nodes ({} refused)",
            slots.len() - refused,
            refused
        );
        Self { resolution, slots }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Number of slots, including ones without a node
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Write every sample of `frame` to its node
    ///
    /// On a length mismatch nothing is written. A node that vanished on the
    /// host side is skipped; losing the context aborts the write.
    pub fn set_frame(&self, host: &mut dyn Host, frame: &FrameBuffer) -> Result<(), RenderError> {
        if !host.context_active() {
            return Err(RenderError::ContextUnavailable);
        }
        if frame.len() != self.slots.len() {
            return Err(RenderError::SizeMismatch {
                frame: frame.len(),
                grid: self.slots.len(),
            });
        }

        for (slot, &color) in self.slots.iter().zip(frame.pixels()) {
            let Some(node) = *slot else { continue };
            match host.set_node_color(node, color) {
                Ok(()) => {}
                Err(HostError::ContextUnavailable) => return Err(RenderError::ContextUnavailable),
                Err(e @ HostError::NodeMissing(_)) => debug!("Skipping pixel: {}", e),
            }
        }

        metrics::counter!("frames_rendered").increment(1);
        Ok(())
    }

    /// Delete every node and drop all slots
    pub fn clear(&mut self, host: &mut dyn Host) {
        let mut deleted = 0usize;
        for node in self.slots.drain(..).flatten() {
            host.delete_node(node);
            deleted += 1;
        }
        if deleted > 0 {
            debug!("Deleted {} pixel nodes", deleted);
        }
    }
}
