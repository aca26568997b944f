//! Aggregation of outports into one multi-attachment framebuffer.

use super::port::{PortHandle, PortStore};
use crate::{
    error::VolrenResult,
    graphics::device::{Device, FramebufferId},
};
use arrayvec::ArrayVec;
use log::error;

/// Maximum number of color attachments a group framebuffer can carry.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Groups several render outports into one framebuffer so a processor can
/// write all of them in a single pass.
///
/// The group holds port handles only; the ports stay owned by the network.
/// Attachment slots follow the order in which ports were added. All member
/// ports are expected to share one size; callers are responsible for
/// keeping that invariant, it is not checked here.
pub struct PortGroup {
    framebuffer: Option<FramebufferId>,
    ports: Vec<PortHandle>,
    ignore_connectivity: bool,
}

impl PortGroup {
    /// Creates an empty group. With `ignore_connectivity` set, disconnected
    /// member ports keep their attachment slots instead of being skipped.
    pub fn new(ignore_connectivity: bool) -> Self {
        Self {
            framebuffer: None,
            ports: Vec::new(),
            ignore_connectivity,
        }
    }

    /// Creates the group framebuffer. Calling again is a no-op.
    pub fn initialize(&mut self, device: &mut dyn Device) -> VolrenResult<()> {
        if self.framebuffer.is_none() {
            self.framebuffer = Some(device.create_framebuffer()?);
        }
        Ok(())
    }

    /// Releases the group framebuffer. The member ports' targets are not
    /// touched.
    pub fn deinitialize(&mut self, device: &mut dyn Device) {
        if let Some(framebuffer) = self.framebuffer.take() {
            device.destroy_framebuffer(framebuffer);
        }
    }

    /// Appends a port and rebuilds the attachments.
    pub fn add_port(&mut self, port: PortHandle, ports: &PortStore, device: &mut dyn Device) {
        if self.ports.len() >= MAX_COLOR_ATTACHMENTS {
            error!(
                "Port group is full, cannot add '{}'.",
                ports.display_name(port)
            );
            return;
        }
        self.ports.push(port);
        self.reattach_targets(ports, device);
    }

    pub fn ports(&self) -> &[PortHandle] {
        &self.ports
    }

    fn included(&self, ports: &PortStore, handle: PortHandle) -> bool {
        self.ignore_connectivity
            || ports
                .get(handle)
                .map(|port| port.is_connected())
                .unwrap_or(false)
    }

    /// Binds the group framebuffer, restricts drawing to the attachments of
    /// the included ports (in insertion order, gaps compacted), validates
    /// each included port's result and sets the viewport to the first member
    /// port's target size.
    pub fn activate_targets(&self, ports: &mut PortStore, device: &mut dyn Device, debug_label: &str) {
        let framebuffer = match self.framebuffer {
            Some(framebuffer) => framebuffer,
            None => {
                error!("activate_targets() called on uninitialized port group.");
                return;
            }
        };
        device.bind_framebuffer(Some(framebuffer));
        if self.ports.is_empty() {
            return;
        }

        let mut buffers = ArrayVec::<[usize; MAX_COLOR_ATTACHMENTS]>::new();
        for (slot, &handle) in self.ports.iter().enumerate() {
            if self.included(ports, handle) {
                buffers.push(slot);
                ports.validate_result(handle);
                if !debug_label.is_empty() {
                    let label = format!("{}: {}", ports.display_name(handle), debug_label);
                    if let Some(target) = ports
                        .get_mut(handle)
                        .and_then(|port| port.render_mut())
                        .and_then(|data| data.target_mut())
                    {
                        target.set_debug_label(&label);
                    }
                }
            }
        }
        device.set_draw_buffers(buffers.as_slice());
        device.set_viewport(ports.target_size(self.ports[0]));
    }

    /// Unbinds the group framebuffer.
    pub fn deactivate_targets(&self, device: &mut dyn Device) {
        device.bind_framebuffer(None);
    }

    /// Clears the color and depth buffers of the bound group framebuffer.
    pub fn clear_targets(&self, device: &mut dyn Device) {
        device.clear();
    }

    /// Rebuilds the framebuffer attachments: color textures at sequential
    /// slots in insertion order, the first available depth texture once.
    /// Idempotent.
    pub fn reattach_targets(&self, ports: &PortStore, device: &mut dyn Device) {
        let framebuffer = match self.framebuffer {
            Some(framebuffer) => framebuffer,
            None => return,
        };
        device.bind_framebuffer(Some(framebuffer));
        device.detach_all(framebuffer);
        if self.ports.is_empty() {
            return;
        }

        let mut has_depth = false;
        for (slot, &handle) in self.ports.iter().enumerate() {
            if !self.included(ports, handle) {
                continue;
            }
            if let Some(texture) = ports.color_texture(handle) {
                device.attach_color_texture(framebuffer, slot, texture);
            }
            if !has_depth {
                if let Some(texture) = ports.depth_texture(handle) {
                    has_depth = true;
                    device.attach_depth_texture(framebuffer, texture);
                }
            }
        }
    }

    /// Resizes every member port.
    pub fn resize(&self, ports: &mut PortStore, device: &mut dyn Device, size: glam::UVec2) {
        for &handle in &self.ports {
            ports.resize_outport(handle, device, size);
        }
    }

    /// Maps member ports to their draw-buffer indices for shader code:
    /// one `#define OPn index` line per included port, with indices exactly
    /// matching the compacted attachment order used by `activate_targets`.
    pub fn generate_header(&self, ports: &PortStore) -> String {
        let mut header = String::new();
        let mut target_index = 0;
        for (slot, &handle) in self.ports.iter().enumerate() {
            if self.included(ports, handle) {
                header.push_str(&format!("#define OP{} {}\n", slot, target_index));
                target_index += 1;
            }
        }
        header
    }
}
