//! Software reference implementation of the graphics device.

use super::{
    device::{
        DepthFunc, Device, FramebufferId, QuadTransform, TextureData, TextureFormat, TextureId,
        TextureUnit,
    },
    RenderingError,
};
use crate::error::{VolrenError, VolrenResult};
use glam::{UVec2, Vec2, Vec4};
use log::error;
use std::collections::HashMap;

/// Depth written by rasterized primitives, between the cleared far plane
/// (1.0) and the near plane (0.0).
const PRIMITIVE_DEPTH: f32 = 0.5;

#[derive(Clone, Debug)]
enum TexelData {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Floats(Vec<f32>),
}

#[derive(Clone, Debug)]
struct SoftwareTexture {
    format: TextureFormat,
    size: UVec2,
    data: TexelData,
}

impl SoftwareTexture {
    fn channel_count(format: TextureFormat) -> usize {
        if format.is_color() {
            4
        } else {
            1
        }
    }

    fn new(format: TextureFormat, size: UVec2) -> VolrenResult<Self> {
        if size.x == 0 || size.y == 0 {
            return Err(VolrenError::RenderingError(RenderingError::from_string(
                format!("Could not allocate texture with zero extent: {:?}", size),
            )));
        }
        let texels = (size.x as usize)
            .checked_mul(size.y as usize)
            .and_then(|n| n.checked_mul(Self::channel_count(format)))
            .ok_or_else(|| {
                VolrenError::RenderingError(RenderingError::from_string(format!(
                    "Could not allocate texture storage for size {:?}",
                    size
                )))
            })?;
        let data = match format {
            TextureFormat::Rgba8 => TexelData::Bytes(vec![0; texels]),
            TextureFormat::Rgba16 => TexelData::Shorts(vec![0; texels]),
            TextureFormat::RgbaF32 | TextureFormat::Depth24 | TextureFormat::DepthF32 => {
                TexelData::Floats(vec![0.0; texels])
            }
        };
        Ok(Self { format, size, data })
    }

    fn texel_index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.size.x as usize + x as usize) * Self::channel_count(self.format)
    }

    fn read_rgba(&self, x: u32, y: u32) -> Vec4 {
        let index = self.texel_index(x, y);
        match self.data {
            TexelData::Bytes(ref texels) => Vec4::new(
                f32::from(texels[index]) / 255.0,
                f32::from(texels[index + 1]) / 255.0,
                f32::from(texels[index + 2]) / 255.0,
                f32::from(texels[index + 3]) / 255.0,
            ),
            TexelData::Shorts(ref texels) => Vec4::new(
                f32::from(texels[index]) / 65535.0,
                f32::from(texels[index + 1]) / 65535.0,
                f32::from(texels[index + 2]) / 65535.0,
                f32::from(texels[index + 3]) / 65535.0,
            ),
            TexelData::Floats(ref texels) => Vec4::new(
                texels[index],
                texels[index + 1],
                texels[index + 2],
                texels[index + 3],
            ),
        }
    }

    fn write_rgba(&mut self, x: u32, y: u32, color: Vec4) {
        let index = self.texel_index(x, y);
        match self.data {
            TexelData::Bytes(ref mut texels) => {
                for (offset, value) in color.to_array().iter().enumerate() {
                    texels[index + offset] = (value.max(0.0).min(1.0) * 255.0).round() as u8;
                }
            }
            TexelData::Shorts(ref mut texels) => {
                for (offset, value) in color.to_array().iter().enumerate() {
                    texels[index + offset] = (value.max(0.0).min(1.0) * 65535.0).round() as u16;
                }
            }
            TexelData::Floats(ref mut texels) => {
                for (offset, value) in color.to_array().iter().enumerate() {
                    texels[index + offset] = *value;
                }
            }
        }
    }

    fn read_depth(&self, x: u32, y: u32) -> f32 {
        match self.data {
            TexelData::Floats(ref texels) => texels[self.texel_index(x, y)],
            _ => 1.0,
        }
    }

    fn write_depth(&mut self, x: u32, y: u32, depth: f32) {
        let index = self.texel_index(x, y);
        if let TexelData::Floats(ref mut texels) = self.data {
            texels[index] = depth;
        }
    }

    fn fill(&mut self, color: Vec4) {
        let size = self.size;
        for y in 0..size.y {
            for x in 0..size.x {
                self.write_rgba(x, y, color);
            }
        }
    }

    fn fill_depth(&mut self, depth: f32) {
        if let TexelData::Floats(ref mut texels) = self.data {
            for texel in texels.iter_mut() {
                *texel = depth;
            }
        }
    }
}

#[derive(Default)]
struct SoftwareFramebuffer {
    color_attachments: HashMap<usize, TextureId>,
    depth_attachment: Option<TextureId>,
}

/// A device that rasterizes into CPU pixel buffers.
///
/// Buffers use flat row-major storage with row 0 at the top. Only the
/// orchestration-level subset of a real device is implemented: nearest
/// sampled quad blits, line segments, multi-draw-buffer writes and a
/// less/always depth toggle.
pub struct SoftwareDevice {
    textures: HashMap<u32, SoftwareTexture>,
    next_texture_id: u32,
    framebuffers: HashMap<u32, SoftwareFramebuffer>,
    next_framebuffer_id: u32,
    bound_framebuffer: Option<FramebufferId>,
    draw_buffers: Vec<usize>,
    viewport: UVec2,
    clear_color: Vec4,
    depth_func: DepthFunc,
    texture_units: HashMap<u32, TextureId>,
    screen: Option<(UVec2, Vec<u8>)>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            next_texture_id: 0,
            framebuffers: HashMap::new(),
            next_framebuffer_id: 0,
            bound_framebuffer: None,
            draw_buffers: vec![0],
            viewport: UVec2::ONE,
            clear_color: Vec4::ZERO,
            depth_func: DepthFunc::Less,
            texture_units: HashMap::new(),
            screen: None,
        }
    }

    /// Number of live textures, for leak checks.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live framebuffers, for leak checks.
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// The most recently presented image, as packed RGBA bytes.
    pub fn screen(&self) -> Option<(UVec2, &[u8])> {
        self.screen
            .as_ref()
            .map(|(size, pixels)| (*size, pixels.as_slice()))
    }

    fn bound_targets(&self) -> Option<(Vec<TextureId>, Option<TextureId>)> {
        let framebuffer = match self.bound_framebuffer {
            Some(FramebufferId(id)) => match self.framebuffers.get(&id) {
                Some(framebuffer) => framebuffer,
                None => return None,
            },
            None => return None,
        };
        let colors = self
            .draw_buffers
            .iter()
            .filter_map(|slot| framebuffer.color_attachments.get(slot).copied())
            .collect();
        Some((colors, framebuffer.depth_attachment))
    }

    /// Converts a normalized device coordinate to a pixel position in the
    /// current viewport, with row 0 at the top.
    fn ndc_to_pixel(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            (position.x + 1.0) * 0.5 * self.viewport.x as f32,
            (1.0 - position.y) * 0.5 * self.viewport.y as f32,
        )
    }

    fn depth_test_passes(&self, depth_texture: Option<TextureId>, x: u32, y: u32) -> bool {
        match self.depth_func {
            DepthFunc::Always => true,
            DepthFunc::Less => match depth_texture.and_then(|id| self.textures.get(&id.0)) {
                Some(texture) if x < texture.size.x && y < texture.size.y => {
                    PRIMITIVE_DEPTH < texture.read_depth(x, y)
                }
                _ => true,
            },
        }
    }

    fn write_fragment(
        &mut self,
        colors: &[TextureId],
        depth: Option<TextureId>,
        x: u32,
        y: u32,
        color: Vec4,
    ) {
        if !self.depth_test_passes(depth, x, y) {
            return;
        }
        for id in colors {
            if let Some(texture) = self.textures.get_mut(&id.0) {
                if x < texture.size.x && y < texture.size.y {
                    texture.write_rgba(x, y, color);
                }
            }
        }
        if let Some(texture) = depth.and_then(|id| self.textures.get_mut(&id.0)) {
            if x < texture.size.x && y < texture.size.y {
                texture.write_depth(x, y, PRIMITIVE_DEPTH);
            }
        }
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for SoftwareDevice {
    fn create_texture(&mut self, format: TextureFormat, size: UVec2) -> VolrenResult<TextureId> {
        let texture = SoftwareTexture::new(format, size)?;
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);
        Ok(TextureId(id))
    }

    fn resize_texture(&mut self, texture: TextureId, size: UVec2) {
        let format = match self.textures.get(&texture.0) {
            Some(texture) => texture.format,
            None => {
                error!("Attempted to resize unknown texture {:?}.", texture);
                return;
            }
        };
        match SoftwareTexture::new(format, size) {
            Ok(reallocated) => {
                self.textures.insert(texture.0, reallocated);
            }
            Err(err) => error!("Could not resize texture {:?}: {}", texture, err),
        }
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture.0).is_none() {
            error!("Attempted to destroy unknown texture {:?}.", texture);
        }
    }

    fn create_framebuffer(&mut self) -> VolrenResult<FramebufferId> {
        let id = self.next_framebuffer_id;
        self.next_framebuffer_id += 1;
        self.framebuffers.insert(id, SoftwareFramebuffer::default());
        Ok(FramebufferId(id))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer.0).is_none() {
            error!("Attempted to destroy unknown framebuffer {:?}.", framebuffer);
        }
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        slot: usize,
        texture: TextureId,
    ) {
        match self.framebuffers.get_mut(&framebuffer.0) {
            Some(state) => {
                state.color_attachments.insert(slot, texture);
            }
            None => error!("Attempted to attach to unknown framebuffer {:?}.", framebuffer),
        }
    }

    fn attach_depth_texture(&mut self, framebuffer: FramebufferId, texture: TextureId) {
        match self.framebuffers.get_mut(&framebuffer.0) {
            Some(state) => state.depth_attachment = Some(texture),
            None => error!("Attempted to attach to unknown framebuffer {:?}.", framebuffer),
        }
    }

    fn detach_all(&mut self, framebuffer: FramebufferId) {
        match self.framebuffers.get_mut(&framebuffer.0) {
            Some(state) => {
                state.color_attachments.clear();
                state.depth_attachment = None;
            }
            None => error!("Attempted to detach from unknown framebuffer {:?}.", framebuffer),
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
        // Binding resets the draw-buffer list to the first attachment.
        self.draw_buffers = vec![0];
    }

    fn set_draw_buffers(&mut self, slots: &[usize]) {
        self.draw_buffers = slots.to_vec();
    }

    fn set_viewport(&mut self, size: UVec2) {
        self.viewport = size;
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        let (colors, depth) = match self.bound_targets() {
            Some(targets) => targets,
            None => {
                error!("clear() called without a bound framebuffer.");
                return;
            }
        };
        let clear_color = self.clear_color;
        for id in colors {
            if let Some(texture) = self.textures.get_mut(&id.0) {
                texture.fill(clear_color);
            }
        }
        if let Some(texture) = depth.and_then(|id| self.textures.get_mut(&id.0)) {
            texture.fill_depth(1.0);
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<TextureId>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(unit.0, texture);
            }
            None => {
                self.texture_units.remove(&unit.0);
            }
        }
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.depth_func = func;
    }

    fn draw_quad(&mut self, transform: QuadTransform) {
        let (colors, depth) = match self.bound_targets() {
            Some(targets) => targets,
            None => {
                error!("draw_quad() called without a bound framebuffer.");
                return;
            }
        };
        let source = match self
            .texture_units
            .get(&0)
            .and_then(|id| self.textures.get(&id.0))
        {
            Some(texture) => texture.clone(),
            None => {
                error!("draw_quad() called without a texture bound to unit 0.");
                return;
            }
        };

        let top_left = self.ndc_to_pixel(transform.translate + transform.scale * Vec2::new(-1.0, 1.0));
        let bottom_right =
            self.ndc_to_pixel(transform.translate + transform.scale * Vec2::new(1.0, -1.0));
        let x_begin = top_left.x.round().max(0.0) as u32;
        let y_begin = top_left.y.round().max(0.0) as u32;
        let x_end = (bottom_right.x.round().max(0.0) as u32).min(self.viewport.x);
        let y_end = (bottom_right.y.round().max(0.0) as u32).min(self.viewport.y);
        if x_end <= x_begin || y_end <= y_begin {
            return;
        }

        let width = (x_end - x_begin) as f32;
        let height = (y_end - y_begin) as f32;
        for y in y_begin..y_end {
            for x in x_begin..x_end {
                let u = (x - x_begin) as f32 + 0.5;
                let v = (y - y_begin) as f32 + 0.5;
                let source_x =
                    (((u / width) * source.size.x as f32) as u32).min(source.size.x - 1);
                let source_y =
                    (((v / height) * source.size.y as f32) as u32).min(source.size.y - 1);
                let color = source.read_rgba(source_x, source_y);
                self.write_fragment(&colors, depth, x, y, color);
            }
        }
    }

    fn draw_lines(&mut self, lines: &[[Vec2; 2]], color: Vec4) {
        let (colors, depth) = match self.bound_targets() {
            Some(targets) => targets,
            None => {
                error!("draw_lines() called without a bound framebuffer.");
                return;
            }
        };
        for line in lines {
            let start = self.ndc_to_pixel(line[0]);
            let end = self.ndc_to_pixel(line[1]);
            let delta = end - start;
            let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0);
            for step in 0..=steps as u32 {
                let position = start + delta * (step as f32 / steps);
                let x = position.x.floor();
                let y = position.y.floor();
                if x < 0.0
                    || y < 0.0
                    || x >= self.viewport.x as f32
                    || y >= self.viewport.y as f32
                {
                    continue;
                }
                self.write_fragment(&colors, depth, x as u32, y as u32, color);
            }
        }
    }

    fn download_texture(&self, texture: TextureId) -> VolrenResult<TextureData> {
        let texture = self.textures.get(&texture.0).ok_or_else(|| {
            VolrenError::RenderingError(RenderingError::from_str(
                "Could not download unknown texture.",
            ))
        })?;
        Ok(match (texture.format, &texture.data) {
            (TextureFormat::Rgba8, TexelData::Bytes(texels)) => TextureData::Rgba8(texels.clone()),
            (TextureFormat::Rgba16, TexelData::Shorts(texels)) => {
                TextureData::Rgba16(texels.clone())
            }
            (TextureFormat::RgbaF32, TexelData::Floats(texels)) => {
                TextureData::RgbaF32(texels.clone())
            }
            (_, TexelData::Floats(texels)) => TextureData::DepthF32(texels.clone()),
            _ => {
                return Err(VolrenError::RenderingError(RenderingError::from_str(
                    "Texture storage does not match its declared format.",
                )))
            }
        })
    }

    fn present(&mut self, texture: TextureId) -> VolrenResult<()> {
        let texture = match self.textures.get(&texture.0) {
            Some(texture) => texture,
            None => {
                return Err(VolrenError::RenderingError(RenderingError::from_str(
                    "Could not present unknown texture.",
                )))
            }
        };
        if !texture.format.is_color() {
            return Err(VolrenError::RenderingError(RenderingError::from_str(
                "Could not present a depth texture.",
            )));
        }
        let size = texture.size;
        let mut pixels = Vec::with_capacity((size.x * size.y * 4) as usize);
        for y in 0..size.y {
            for x in 0..size.x {
                for value in texture.read_rgba(x, y).to_array().iter() {
                    pixels.push((value.max(0.0).min(1.0) * 255.0).round() as u8);
                }
            }
        }
        self.screen = Some((size, pixels));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Vec4 {
        Vec4::new(1.0, 0.0, 0.0, 1.0)
    }

    fn pixel(device: &SoftwareDevice, texture: TextureId, x: u32, y: u32) -> Vec4 {
        let size = device.textures[&texture.0].size;
        match device.download_texture(texture).unwrap() {
            TextureData::Rgba16(texels) => {
                let index = ((y * size.x + x) * 4) as usize;
                Vec4::new(
                    f32::from(texels[index]) / 65535.0,
                    f32::from(texels[index + 1]) / 65535.0,
                    f32::from(texels[index + 2]) / 65535.0,
                    f32::from(texels[index + 3]) / 65535.0,
                )
            }
            _ => panic!("unexpected texture data"),
        }
    }

    fn target(device: &mut SoftwareDevice, size: UVec2) -> (FramebufferId, TextureId) {
        let color = device.create_texture(TextureFormat::Rgba16, size).unwrap();
        let depth = device.create_texture(TextureFormat::Depth24, size).unwrap();
        let framebuffer = device.create_framebuffer().unwrap();
        device.attach_color_texture(framebuffer, 0, color);
        device.attach_depth_texture(framebuffer, depth);
        (framebuffer, color)
    }

    #[test]
    fn zero_extent_textures_are_rejected() {
        let mut device = SoftwareDevice::new();
        assert!(device
            .create_texture(TextureFormat::Rgba8, UVec2::new(0, 4))
            .is_err());
    }

    #[test]
    fn clear_fills_the_bound_color_attachment() {
        let mut device = SoftwareDevice::new();
        let (framebuffer, color) = target(&mut device, UVec2::new(4, 4));
        device.bind_framebuffer(Some(framebuffer));
        device.set_viewport(UVec2::new(4, 4));
        device.set_clear_color(red());
        device.clear();
        assert_eq!(pixel(&device, color, 3, 3), red());
    }

    #[test]
    fn quad_transform_places_the_source_in_one_quadrant() {
        let mut device = SoftwareDevice::new();
        let source = device
            .create_texture(TextureFormat::Rgba16, UVec2::new(2, 2))
            .unwrap();
        let (framebuffer, color) = target(&mut device, UVec2::new(8, 8));

        device.bind_framebuffer(Some(framebuffer));
        device.set_viewport(UVec2::new(8, 8));
        device.set_clear_color(Vec4::ZERO);
        device.clear();

        if let Some(texture) = device.textures.get_mut(&source.0) {
            texture.fill(red());
        }
        device.bind_texture(TextureUnit(0), Some(source));
        device.set_depth_func(DepthFunc::Always);
        // Top-left quadrant: translate (-0.5, 0.5), scale 0.5.
        device.draw_quad(QuadTransform::new(
            Vec2::new(-0.5, 0.5),
            Vec2::new(0.5, 0.5),
        ));

        assert_eq!(pixel(&device, color, 1, 1), red());
        assert_eq!(pixel(&device, color, 5, 1), Vec4::ZERO);
        assert_eq!(pixel(&device, color, 1, 5), Vec4::ZERO);
        assert_eq!(pixel(&device, color, 5, 5), Vec4::ZERO);
    }

    #[test]
    fn draw_writes_every_active_draw_buffer() {
        let mut device = SoftwareDevice::new();
        let size = UVec2::new(4, 4);
        let source = device.create_texture(TextureFormat::Rgba16, size).unwrap();
        if let Some(texture) = device.textures.get_mut(&source.0) {
            texture.fill(red());
        }

        let first = device.create_texture(TextureFormat::Rgba16, size).unwrap();
        let second = device.create_texture(TextureFormat::Rgba16, size).unwrap();
        let framebuffer = device.create_framebuffer().unwrap();
        device.attach_color_texture(framebuffer, 0, first);
        device.attach_color_texture(framebuffer, 2, second);

        device.bind_framebuffer(Some(framebuffer));
        device.set_draw_buffers(&[0, 2]);
        device.set_viewport(size);
        device.bind_texture(TextureUnit(0), Some(source));
        device.set_depth_func(DepthFunc::Always);
        device.draw_quad(QuadTransform::full());

        assert_eq!(pixel(&device, first, 2, 2), red());
        assert_eq!(pixel(&device, second, 2, 2), red());
    }

    #[test]
    fn presenting_publishes_packed_bytes() {
        let mut device = SoftwareDevice::new();
        let source = device
            .create_texture(TextureFormat::Rgba16, UVec2::new(2, 1))
            .unwrap();
        if let Some(texture) = device.textures.get_mut(&source.0) {
            texture.fill(red());
        }
        device.present(source).unwrap();
        let (size, pixels) = device.screen().unwrap();
        assert_eq!(size, UVec2::new(2, 1));
        assert_eq!(pixels, &[255, 0, 0, 255, 255, 0, 0, 255]);
    }
}
