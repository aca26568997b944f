//! Render target management.

use super::{
    device::{Device, FramebufferId, TextureData, TextureFormat, TextureId, TextureUnit},
    RenderingError,
};
use crate::error::{VolrenError, VolrenResult};
use glam::UVec2;
use log::error;

/// An offscreen color/depth buffer pair a processor renders into.
///
/// Construction acquires the device resources; [`destroy`] releases them.
/// Since releasing needs the device, `Drop` cannot do it. A target that is
/// dropped without having been destroyed leaks its buffers and reports the
/// leak through the log instead of failing.
///
/// [`destroy`]: RenderTarget::destroy
#[derive(Debug)]
pub struct RenderTarget {
    color_texture: TextureId,
    depth_texture: TextureId,
    framebuffer: FramebufferId,
    size: UVec2,
    color_format: TextureFormat,
    depth_format: TextureFormat,
    num_updates: u64,
    active: bool,
    debug_label: String,
    released: bool,
}

impl RenderTarget {
    /// Creates a new render target with the given formats, sized to at least
    /// 1x1 in each dimension.
    pub fn new(
        device: &mut dyn Device,
        color_format: TextureFormat,
        depth_format: TextureFormat,
        size: UVec2,
    ) -> VolrenResult<Self> {
        if !color_format.is_color() || !depth_format.is_depth() {
            return Err(VolrenError::RenderingError(RenderingError::from_string(
                format!(
                    "Could not create render target with formats {:?}/{:?}.",
                    color_format, depth_format
                ),
            )));
        }
        let size = size.max(UVec2::ONE);
        let color_texture = device.create_texture(color_format, size)?;
        let depth_texture = match device.create_texture(depth_format, size) {
            Ok(texture) => texture,
            Err(err) => {
                device.destroy_texture(color_texture);
                return Err(err);
            }
        };
        let framebuffer = match device.create_framebuffer() {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                device.destroy_texture(color_texture);
                device.destroy_texture(depth_texture);
                return Err(err);
            }
        };
        device.attach_color_texture(framebuffer, 0, color_texture);
        device.attach_depth_texture(framebuffer, depth_texture);

        Ok(Self {
            color_texture,
            depth_texture,
            framebuffer,
            size,
            color_format,
            depth_format,
            num_updates: 0,
            active: false,
            debug_label: String::new(),
            released: false,
        })
    }

    /// Releases the device resources held by the target.
    pub fn destroy(mut self, device: &mut dyn Device) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_texture(self.color_texture);
        device.destroy_texture(self.depth_texture);
        self.released = true;
    }

    /// Binds the target as the active render destination, sets the viewport
    /// to its size and records the given debug label.
    pub fn activate(&mut self, device: &mut dyn Device, debug_label: &str) {
        device.bind_framebuffer(Some(self.framebuffer));
        device.set_viewport(self.size);
        if !debug_label.is_empty() {
            self.debug_label = debug_label.to_string();
        }
        self.active = true;
    }

    /// Unbinds the target.
    pub fn deactivate(&mut self, device: &mut dyn Device) {
        device.bind_framebuffer(None);
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reallocates both buffers for the given size. Contents are discarded.
    pub fn resize(&mut self, device: &mut dyn Device, size: UVec2) {
        let size = size.max(UVec2::ONE);
        if size == self.size {
            return;
        }
        device.resize_texture(self.color_texture, size);
        device.resize_texture(self.depth_texture, size);
        self.size = size;
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn color_format(&self) -> TextureFormat {
        self.color_format
    }

    pub fn depth_format(&self) -> TextureFormat {
        self.depth_format
    }

    pub fn color_texture(&self) -> TextureId {
        self.color_texture
    }

    pub fn depth_texture(&self) -> TextureId {
        self.depth_texture
    }

    /// Number of times the target's content has been revalidated.
    pub fn num_updates(&self) -> u64 {
        self.num_updates
    }

    pub fn increase_num_updates(&mut self) {
        self.num_updates += 1;
    }

    pub fn set_debug_label(&mut self, label: &str) {
        self.debug_label = label.to_string();
    }

    pub fn debug_label(&self) -> &str {
        &self.debug_label
    }

    /// Binds the color buffer to the given texture unit.
    pub fn bind_color_texture(&self, device: &mut dyn Device, unit: TextureUnit) {
        device.bind_texture(unit, Some(self.color_texture));
    }

    /// Binds the depth buffer to the given texture unit.
    pub fn bind_depth_texture(&self, device: &mut dyn Device, unit: TextureUnit) {
        device.bind_texture(unit, Some(self.depth_texture));
    }

    /// Downloads the color buffer in its storage format.
    pub fn download_color_buffer(&self, device: &dyn Device) -> VolrenResult<TextureData> {
        device.download_texture(self.color_texture)
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if !self.released {
            error!(
                "Render target '{}' was dropped without being released.",
                self.debug_label
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::software::SoftwareDevice;

    #[test]
    fn construction_acquires_and_destroy_releases() {
        let mut device = SoftwareDevice::new();
        let target = RenderTarget::new(
            &mut device,
            TextureFormat::Rgba16,
            TextureFormat::Depth24,
            UVec2::new(32, 32),
        )
        .unwrap();
        assert_eq!(device.live_textures(), 2);
        assert_eq!(device.live_framebuffers(), 1);

        target.destroy(&mut device);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_framebuffers(), 0);
    }

    #[test]
    fn zero_sized_requests_are_clamped_to_one() {
        let mut device = SoftwareDevice::new();
        let target = RenderTarget::new(
            &mut device,
            TextureFormat::Rgba8,
            TextureFormat::DepthF32,
            UVec2::ZERO,
        )
        .unwrap();
        assert_eq!(target.size(), UVec2::ONE);
        target.destroy(&mut device);
    }

    #[test]
    fn swapped_formats_are_rejected() {
        let mut device = SoftwareDevice::new();
        assert!(RenderTarget::new(
            &mut device,
            TextureFormat::Depth24,
            TextureFormat::Rgba8,
            UVec2::new(8, 8),
        )
        .is_err());
    }

    #[test]
    fn resizing_to_the_same_size_is_a_no_op() {
        let mut device = SoftwareDevice::new();
        let mut target = RenderTarget::new(
            &mut device,
            TextureFormat::Rgba16,
            TextureFormat::Depth24,
            UVec2::new(16, 16),
        )
        .unwrap();
        target.resize(&mut device, UVec2::new(16, 16));
        assert_eq!(target.size(), UVec2::new(16, 16));
        target.resize(&mut device, UVec2::new(64, 32));
        assert_eq!(target.size(), UVec2::new(64, 32));
        target.destroy(&mut device);
    }
}
