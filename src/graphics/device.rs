//! Graphics device interface.

use crate::error::VolrenResult;
use glam::{UVec2, Vec2, Vec4};
use std::{cell::RefCell, rc::Rc};

/// Identifier of a texture owned by a device. Identifiers are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

/// Identifier of a framebuffer owned by a device. Identifiers are never
/// reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub(crate) u32);

/// Internal storage formats for device textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Rgba16,
    RgbaF32,
    Depth24,
    DepthF32,
}

impl TextureFormat {
    pub fn is_color(self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8 | TextureFormat::Rgba16 | TextureFormat::RgbaF32
        )
    }

    pub fn is_depth(self) -> bool {
        !self.is_color()
    }
}

/// Depth comparison functions supported by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthFunc {
    Less,
    Always,
}

/// A texture unit index used when binding textures for sampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureUnit(pub u32);

/// Hands out distinct texture units in ascending order, for passes that bind
/// several textures without tracking unit numbers themselves.
#[derive(Default)]
pub struct TextureUnits {
    next: u32,
}

impl TextureUnits {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next unused unit.
    pub fn acquire(&mut self) -> TextureUnit {
        let unit = TextureUnit(self.next);
        self.next += 1;
        unit
    }
}

/// Placement of the unit quad in normalized device coordinates: each vertex
/// of the quad spanning [-1, 1] in both axes is scaled and then translated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadTransform {
    pub translate: Vec2,
    pub scale: Vec2,
}

impl QuadTransform {
    /// The identity transform, covering the full viewport.
    pub fn full() -> Self {
        Self {
            translate: Vec2::ZERO,
            scale: Vec2::ONE,
        }
    }

    pub fn new(translate: Vec2, scale: Vec2) -> Self {
        Self { translate, scale }
    }
}

/// Raw texel data downloaded from a device texture, in the texture's own
/// storage format with channels interleaved row by row, top row first.
#[derive(Clone, Debug)]
pub enum TextureData {
    Rgba8(Vec<u8>),
    Rgba16(Vec<u16>),
    RgbaF32(Vec<f32>),
    DepthF32(Vec<f32>),
}

/// The GPU capability consumed by the render-graph layer.
///
/// A device instance is constructed explicitly and handed to the network that
/// needs it; components never reach for global state. All operations are
/// synchronous. Sampling state is deliberately minimal: `draw_quad` samples
/// whatever texture is bound to unit 0 and writes to every active draw buffer
/// of the bound framebuffer.
pub trait Device {
    fn create_texture(&mut self, format: TextureFormat, size: UVec2) -> VolrenResult<TextureId>;

    fn resize_texture(&mut self, texture: TextureId, size: UVec2);

    fn destroy_texture(&mut self, texture: TextureId);

    fn create_framebuffer(&mut self) -> VolrenResult<FramebufferId>;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Attaches a color texture to the given attachment slot.
    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        slot: usize,
        texture: TextureId,
    );

    fn attach_depth_texture(&mut self, framebuffer: FramebufferId, texture: TextureId);

    fn detach_all(&mut self, framebuffer: FramebufferId);

    /// Binds the given framebuffer as the render destination, or unbinds the
    /// current one when `None` is passed.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Restricts drawing to the given color attachment slots of the bound
    /// framebuffer, in the given order.
    fn set_draw_buffers(&mut self, slots: &[usize]);

    fn set_viewport(&mut self, size: UVec2);

    fn set_clear_color(&mut self, color: Vec4);

    /// Clears the color and depth buffers of the bound framebuffer.
    fn clear(&mut self);

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<TextureId>);

    fn set_depth_func(&mut self, func: DepthFunc);

    /// Draws the textured unit quad under the given transform.
    fn draw_quad(&mut self, transform: QuadTransform);

    /// Draws line segments given in normalized device coordinates.
    fn draw_lines(&mut self, lines: &[[Vec2; 2]], color: Vec4);

    /// Downloads the texels of the given texture in its storage format.
    fn download_texture(&self, texture: TextureId) -> VolrenResult<TextureData>;

    /// Presents the given color texture on the device's output surface.
    fn present(&mut self, texture: TextureId) -> VolrenResult<()>;
}

/// A device handle that can be shared between the owning network and an
/// embedder, e.g. to let tests or canvases inspect device state after the
/// network has taken ownership of its half.
pub struct SharedDevice<D: Device> {
    device: Rc<RefCell<D>>,
}

impl<D: Device> SharedDevice<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Rc::new(RefCell::new(device)),
        }
    }

    /// Returns the shared handle to the underlying device.
    pub fn handle(&self) -> Rc<RefCell<D>> {
        Rc::clone(&self.device)
    }
}

impl<D: Device> Clone for SharedDevice<D> {
    fn clone(&self) -> Self {
        Self {
            device: Rc::clone(&self.device),
        }
    }
}

impl<D: Device> Device for SharedDevice<D> {
    fn create_texture(&mut self, format: TextureFormat, size: UVec2) -> VolrenResult<TextureId> {
        self.device.borrow_mut().create_texture(format, size)
    }

    fn resize_texture(&mut self, texture: TextureId, size: UVec2) {
        self.device.borrow_mut().resize_texture(texture, size);
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.device.borrow_mut().destroy_texture(texture);
    }

    fn create_framebuffer(&mut self) -> VolrenResult<FramebufferId> {
        self.device.borrow_mut().create_framebuffer()
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.device.borrow_mut().destroy_framebuffer(framebuffer);
    }

    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        slot: usize,
        texture: TextureId,
    ) {
        self.device
            .borrow_mut()
            .attach_color_texture(framebuffer, slot, texture);
    }

    fn attach_depth_texture(&mut self, framebuffer: FramebufferId, texture: TextureId) {
        self.device
            .borrow_mut()
            .attach_depth_texture(framebuffer, texture);
    }

    fn detach_all(&mut self, framebuffer: FramebufferId) {
        self.device.borrow_mut().detach_all(framebuffer);
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.device.borrow_mut().bind_framebuffer(framebuffer);
    }

    fn set_draw_buffers(&mut self, slots: &[usize]) {
        self.device.borrow_mut().set_draw_buffers(slots);
    }

    fn set_viewport(&mut self, size: UVec2) {
        self.device.borrow_mut().set_viewport(size);
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.device.borrow_mut().set_clear_color(color);
    }

    fn clear(&mut self) {
        self.device.borrow_mut().clear();
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<TextureId>) {
        self.device.borrow_mut().bind_texture(unit, texture);
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.device.borrow_mut().set_depth_func(func);
    }

    fn draw_quad(&mut self, transform: QuadTransform) {
        self.device.borrow_mut().draw_quad(transform);
    }

    fn draw_lines(&mut self, lines: &[[Vec2; 2]], color: Vec4) {
        self.device.borrow_mut().draw_lines(lines, color);
    }

    fn download_texture(&self, texture: TextureId) -> VolrenResult<TextureData> {
        self.device.borrow().download_texture(texture)
    }

    fn present(&mut self, texture: TextureId) -> VolrenResult<()> {
        self.device.borrow_mut().present(texture)
    }
}
