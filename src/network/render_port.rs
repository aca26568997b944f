//! Render ports: connection endpoints exchanging render targets.

use super::port::{InvalidationLevel, PortHandle, PortStore};
use crate::{
    color::ByteColor,
    error::{VolrenError, VolrenResult},
    graphics::{
        device::{Device, TextureData, TextureFormat, TextureId, TextureUnit},
        target::RenderTarget,
        RenderingError,
    },
};
use glam::UVec2;
use log::{error, warn};
use std::path::Path;

/// Default negotiated size of a render port before any consumer has dictated
/// one.
pub const DEFAULT_RENDER_SIZE: UVec2 = UVec2::new(128, 128);

/// Identity token of the consumer that dictates a render chain's resolution.
///
/// The token is the generational handle of the consuming inport itself, so a
/// recycled arena slot can never be mistaken for an origin that no longer
/// exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SizeOrigin(PortHandle);

impl SizeOrigin {
    pub(crate) fn of(handle: PortHandle) -> Self {
        Self(handle)
    }

    /// The inport the token identifies.
    pub fn port(&self) -> PortHandle {
        self.0
    }
}

/// Configuration of a render port at registration time.
#[derive(Clone, Debug)]
pub struct RenderPortConfig {
    pub allow_multiple: bool,
    pub invalidation: InvalidationLevel,
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub size_origin: bool,
}

impl RenderPortConfig {
    /// Defaults for outports: multiple consumers allowed.
    pub fn outport() -> Self {
        Self {
            allow_multiple: true,
            invalidation: InvalidationLevel::InvalidResult,
            color_format: TextureFormat::Rgba16,
            depth_format: TextureFormat::Depth24,
            size_origin: false,
        }
    }

    /// Defaults for inports: a single upstream producer.
    pub fn inport() -> Self {
        Self {
            allow_multiple: false,
            invalidation: InvalidationLevel::InvalidResult,
            color_format: TextureFormat::Rgba16,
            depth_format: TextureFormat::Depth24,
            size_origin: false,
        }
    }

    /// Declares the port an authoritative size origin for its chain.
    pub fn with_size_origin(mut self) -> Self {
        self.size_origin = true;
        self
    }

    pub fn with_formats(mut self, color: TextureFormat, depth: TextureFormat) -> Self {
        self.color_format = color;
        self.depth_format = depth;
        self
    }

    pub fn with_invalidation(mut self, invalidation: InvalidationLevel) -> Self {
        self.invalidation = invalidation;
        self
    }

    pub fn with_multiple_connections(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }
}

/// Render-specific state of a port.
#[derive(Debug)]
pub struct RenderPortData {
    target: Option<RenderTarget>,
    sharing: bool,
    valid_result: bool,
    size: UVec2,
    declared_origin: bool,
    inherited_origin: Option<SizeOrigin>,
    color_format: TextureFormat,
    depth_format: TextureFormat,
}

impl RenderPortData {
    pub(crate) fn new(config: &RenderPortConfig) -> Self {
        Self {
            target: None,
            sharing: false,
            valid_result: false,
            size: DEFAULT_RENDER_SIZE,
            declared_origin: config.size_origin,
            inherited_origin: None,
            color_format: config.color_format,
            depth_format: config.depth_format,
        }
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    pub fn valid_result(&self) -> bool {
        self.valid_result
    }

    /// The negotiated size of the port.
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn sharing(&self) -> bool {
        self.sharing
    }

    pub fn is_declared_origin(&self) -> bool {
        self.declared_origin
    }

    pub fn color_format(&self) -> TextureFormat {
        self.color_format
    }

    pub fn depth_format(&self) -> TextureFormat {
        self.depth_format
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    pub(crate) fn target_mut(&mut self) -> Option<&mut RenderTarget> {
        self.target.as_mut()
    }
}

impl PortStore {
    /// Allocates the render target of an outport at its negotiated size.
    ///
    /// Ports in target-sharing mode are skipped (the network evaluator
    /// supplies their targets), inports own no target, and a second
    /// initialization without an intervening deinitialization is a reported
    /// misuse.
    pub fn initialize_port(&mut self, handle: PortHandle, device: &mut dyn Device) -> VolrenResult<()> {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("initialize_port() called with an unknown port handle.");
                return Ok(());
            }
        };
        if port.is_inport() {
            return Ok(());
        }
        let label = port.qualified_name();
        let data = match port.render_mut() {
            Some(data) => data,
            None => return Ok(()),
        };
        if data.sharing {
            return Ok(());
        }
        if data.target.is_some() {
            error!("Render port '{}' is already initialized.", label);
            return Ok(());
        }
        let mut target = RenderTarget::new(device, data.color_format, data.depth_format, data.size)?;
        target.set_debug_label(&label);
        data.target = Some(target);
        data.valid_result = false;
        Ok(())
    }

    /// Releases the render target owned by an outport. Safe to call again
    /// afterwards; a no-op on inports. Targets of sharing-mode ports are
    /// left in place for the evaluator that supplied them to reclaim.
    pub fn deinitialize_port(&mut self, handle: PortHandle, device: &mut dyn Device) {
        if let Some(data) = self.get_mut(handle).and_then(|port| port.render_mut()) {
            if !data.sharing {
                if let Some(target) = data.target.take() {
                    target.destroy(device);
                }
            }
            data.valid_result = false;
        }
    }

    /// Binds an outport's target as the active render destination, marks the
    /// result valid and bumps the target's update counter.
    pub fn activate_target(&mut self, handle: PortHandle, device: &mut dyn Device, debug_label: &str) {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("activate_target() called with an unknown port handle.");
                return;
            }
        };
        if port.is_inport() {
            error!("activate_target() called on inport '{}'.", port.qualified_name());
            return;
        }
        let label = port.qualified_name();
        let data = match port.render_mut() {
            Some(data) => data,
            None => return,
        };
        match data.target {
            Some(ref mut target) => {
                let full_label = if debug_label.is_empty() {
                    label
                } else {
                    format!("{}: {}", label, debug_label)
                };
                target.activate(device, &full_label);
                target.increase_num_updates();
                data.valid_result = true;
            }
            None => {
                error!("Tried to activate render port '{}' without render target.", label);
            }
        }
    }

    /// Unbinds an outport's target.
    pub fn deactivate_target(&mut self, handle: PortHandle, device: &mut dyn Device) {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("deactivate_target() called with an unknown port handle.");
                return;
            }
        };
        if port.is_inport() {
            error!("deactivate_target() called on inport '{}'.", port.qualified_name());
            return;
        }
        let label = port.qualified_name();
        match port.render_mut().and_then(|data| data.target.as_mut()) {
            Some(target) => target.deactivate(device),
            None => {
                error!("Tried to deactivate render port '{}' without render target.", label);
            }
        }
    }

    pub fn is_target_active(&self, handle: PortHandle) -> bool {
        self.get(handle)
            .and_then(|port| port.render())
            .and_then(|data| data.target.as_ref())
            .map(RenderTarget::is_active)
            .unwrap_or(false)
    }

    /// Clears the color and depth buffers of an active outport.
    pub fn clear_target(&self, handle: PortHandle, device: &mut dyn Device) {
        let port = match self.get(handle) {
            Some(port) => port,
            None => {
                error!("clear_target() called with an unknown port handle.");
                return;
            }
        };
        if port.is_inport() {
            error!("clear_target() called on inport '{}'.", port.qualified_name());
        } else if !self.is_target_active(handle) {
            error!(
                "clear_target() called on inactive outport '{}'.",
                port.qualified_name()
            );
        } else {
            device.clear();
        }
    }

    /// Marks an outport's result valid and bumps its update counter.
    pub fn validate_result(&mut self, handle: PortHandle) {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("validate_result() called with an unknown port handle.");
                return;
            }
        };
        if port.is_inport() {
            error!("validate_result() called on inport '{}'.", port.qualified_name());
            return;
        }
        let label = port.qualified_name();
        match port.render_mut() {
            Some(data) => match data.target {
                Some(ref mut target) => {
                    data.valid_result = true;
                    target.increase_num_updates();
                }
                None => error!("validate_result(): render port '{}' has no render target.", label),
            },
            None => {}
        }
    }

    /// Marks an outport's result invalid.
    pub fn invalidate_result(&mut self, handle: PortHandle) {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("invalidate_result() called with an unknown port handle.");
                return;
            }
        };
        if port.is_inport() {
            error!("invalidate_result() called on inport '{}'.", port.qualified_name());
            return;
        }
        if let Some(data) = port.render_mut() {
            data.valid_result = false;
        }
    }

    /// Whether the port carries a valid rendering. Inports delegate to their
    /// first connected outport; only one upstream producer matters even when
    /// multiple connections are allowed.
    pub fn has_valid_result(&self, handle: PortHandle) -> bool {
        let port = match self.get(handle) {
            Some(port) => port,
            None => return false,
        };
        if port.is_outport() {
            match port.render() {
                Some(data) => data.target.is_some() && data.valid_result,
                None => false,
            }
        } else {
            match port.connections().first() {
                Some(&upstream) => match self.get(upstream) {
                    Some(producer) if producer.is_outport() => self.has_valid_result(upstream),
                    _ => false,
                },
                None => false,
            }
        }
    }

    /// Whether the port can take part in processing: it must be connected,
    /// and an inport needs a valid upstream result while an outport needs a
    /// render target to write to.
    pub fn is_ready(&self, handle: PortHandle) -> bool {
        let port = match self.get(handle) {
            Some(port) => port,
            None => return false,
        };
        if !port.is_connected() {
            return false;
        }
        if port.is_inport() {
            self.has_valid_result(handle)
        } else {
            port.render().map(|data| data.target.is_some()).unwrap_or(false)
        }
    }

    /// The negotiated size of a render port.
    pub fn render_size(&self, handle: PortHandle) -> UVec2 {
        self.get(handle)
            .and_then(|port| port.render())
            .map(|data| data.size)
            .unwrap_or(UVec2::ZERO)
    }

    pub(crate) fn set_render_size(&mut self, handle: PortHandle, size: UVec2) {
        if let Some(data) = self.get_mut(handle).and_then(|port| port.render_mut()) {
            data.size = size;
        }
    }

    /// The actual size of the port's render target, zero if it has none.
    pub fn target_size(&self, handle: PortHandle) -> UVec2 {
        self.render_target(handle)
            .map(RenderTarget::size)
            .unwrap_or(UVec2::ZERO)
    }

    /// The render target visible through this port: an outport's own target,
    /// or for inports the target of the first connected outport.
    pub fn render_target(&self, handle: PortHandle) -> Option<&RenderTarget> {
        let port = self.get(handle)?;
        if port.is_outport() {
            port.render()?.target.as_ref()
        } else {
            for &upstream in port.connections() {
                match self.get(upstream) {
                    Some(producer) if producer.is_outport() => {
                        return self.render_target(upstream);
                    }
                    _ => continue,
                }
            }
            None
        }
    }

    pub fn has_render_target(&self, handle: PortHandle) -> bool {
        self.render_target(handle).is_some()
    }

    pub fn color_texture(&self, handle: PortHandle) -> Option<TextureId> {
        self.render_target(handle).map(RenderTarget::color_texture)
    }

    pub fn depth_texture(&self, handle: PortHandle) -> Option<TextureId> {
        self.render_target(handle).map(RenderTarget::depth_texture)
    }

    /// Number of content revalidations of the port's target.
    pub fn num_updates(&self, handle: PortHandle) -> u64 {
        self.render_target(handle)
            .map(RenderTarget::num_updates)
            .unwrap_or(0)
    }

    /// Binds the port's color buffer to the given unit. Returns `false`
    /// without a target.
    pub fn bind_color_texture(
        &self,
        handle: PortHandle,
        device: &mut dyn Device,
        unit: TextureUnit,
    ) -> bool {
        match self.render_target(handle) {
            Some(target) => {
                target.bind_color_texture(device, unit);
                true
            }
            None => false,
        }
    }

    /// Binds the port's depth buffer to the given unit. Returns `false`
    /// without a target.
    pub fn bind_depth_texture(
        &self,
        handle: PortHandle,
        device: &mut dyn Device,
        unit: TextureUnit,
    ) -> bool {
        match self.render_target(handle) {
            Some(target) => {
                target.bind_depth_texture(device, unit);
                true
            }
            None => false,
        }
    }

    /// The size-origin token governing the port. Outports answer with the
    /// first token found among their connected consumers.
    pub fn size_origin(&self, handle: PortHandle) -> Option<SizeOrigin> {
        let port = self.get(handle)?;
        if port.is_outport() {
            for &consumer in port.connections() {
                if let Some(origin) = self.size_origin(consumer) {
                    return Some(origin);
                }
            }
            None
        } else {
            let data = port.render()?;
            if data.declared_origin {
                Some(SizeOrigin::of(handle))
            } else {
                data.inherited_origin
            }
        }
    }

    pub fn is_declared_size_origin(&self, handle: PortHandle) -> bool {
        self.get(handle)
            .and_then(|port| port.render())
            .map(|data| data.declared_origin)
            .unwrap_or(false)
    }

    pub(crate) fn set_inherited_origin(&mut self, handle: PortHandle, origin: Option<SizeOrigin>) {
        if let Some(data) = self.get_mut(handle).and_then(|port| port.render_mut()) {
            data.inherited_origin = origin;
        }
    }

    /// Resizes an outport's target. Unchanged sizes are ignored and sizes
    /// with a zero component are rejected with a warning.
    pub fn resize_outport(&mut self, handle: PortHandle, device: &mut dyn Device, size: UVec2) {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("resize_outport() called with an unknown port handle.");
                return;
            }
        };
        if port.is_inport() {
            error!("resize_outport() called on inport '{}'.", port.qualified_name());
            return;
        }
        let data = match port.render_mut() {
            Some(data) => data,
            None => return,
        };
        if data.size == size {
            return;
        }
        if size.x == 0 || size.y == 0 {
            warn!("resize_outport(): invalid size {:?}.", size);
            return;
        }
        if let Some(target) = data.target.as_mut() {
            target.resize(device, size);
        }
        data.valid_result = false;
        data.size = size;
    }

    /// Downloads the port's color buffer and packs it into one byte per
    /// channel: 16-bit channels keep their high byte, floating point
    /// channels are clamped to [0, 1] and scaled.
    pub fn read_color_buffer(
        &self,
        handle: PortHandle,
        device: &dyn Device,
    ) -> VolrenResult<Vec<ByteColor>> {
        let target = self.render_target(handle).ok_or_else(|| {
            VolrenError::RenderingError(RenderingError::from_string(format!(
                "read_color_buffer() called on render port '{}' without render target.",
                self.display_name(handle)
            )))
        })?;
        match target.download_color_buffer(device)? {
            TextureData::Rgba8(texels) => Ok(texels
                .chunks_exact(4)
                .map(|texel| ByteColor::new(texel[0], texel[1], texel[2], texel[3]))
                .collect()),
            TextureData::Rgba16(texels) => Ok(texels
                .chunks_exact(4)
                .map(|texel| ByteColor::from_unorm16([texel[0], texel[1], texel[2], texel[3]]))
                .collect()),
            TextureData::RgbaF32(texels) => Ok(texels
                .chunks_exact(4)
                .map(|texel| ByteColor::from_float([texel[0], texel[1], texel[2], texel[3]]))
                .collect()),
            TextureData::DepthF32(_) => Err(VolrenError::RenderingError(RenderingError::from_string(
                format!(
                    "read_color_buffer(): unsupported data type on render port '{}'.",
                    self.display_name(handle)
                ),
            ))),
        }
    }

    /// Writes the port's color buffer to an image file.
    pub fn save_to_image(
        &self,
        handle: PortHandle,
        device: &dyn Device,
        path: &Path,
    ) -> VolrenResult<()> {
        let pixels = self.read_color_buffer(handle, device)?;
        let size = self
            .render_target(handle)
            .map(RenderTarget::size)
            .unwrap_or(UVec2::ZERO);
        let mut bytes = Vec::with_capacity(pixels.len() * 4);
        for pixel in &pixels {
            bytes.extend_from_slice(&pixel.to_slice());
        }
        image::save_buffer(path, &bytes, size.x, size.y, image::ColorType::Rgba8).map_err(|err| {
            VolrenError::RenderingError(RenderingError::from_error(
                "Could not save rendering to file: ",
                err,
            ))
        })
    }

    /// Installs an externally owned render target on an outport, used by
    /// evaluators running in target-sharing mode. Returns the previously
    /// installed target, or gives the new target back when the port cannot
    /// accept it.
    pub fn set_render_target(
        &mut self,
        handle: PortHandle,
        target: RenderTarget,
    ) -> Option<RenderTarget> {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("set_render_target() called with an unknown port handle.");
                return Some(target);
            }
        };
        if port.is_inport() {
            error!("set_render_target() called on inport '{}'.", port.qualified_name());
            return Some(target);
        }
        match port.render_mut() {
            Some(data) => {
                let previous = data.target.replace(target);
                data.valid_result = false;
                previous
            }
            None => Some(target),
        }
    }

    /// Removes and returns an outport's render target without destroying it.
    pub fn take_render_target(&mut self, handle: PortHandle) -> Option<RenderTarget> {
        let port = self.get_mut(handle)?;
        if port.is_inport() {
            error!("take_render_target() called on inport '{}'.", port.qualified_name());
            return None;
        }
        port.render_mut().and_then(|data| data.target.take())
    }

    /// Switches an outport in or out of target-sharing mode. Ports that have
    /// already allocated a target cannot be switched.
    pub fn set_target_sharing(&mut self, handle: PortHandle, sharing: bool) {
        let port = match self.get_mut(handle) {
            Some(port) => port,
            None => {
                error!("set_target_sharing() called with an unknown port handle.");
                return;
            }
        };
        let label = port.qualified_name();
        if let Some(data) = port.render_mut() {
            if data.target.is_some() {
                error!(
                    "Cannot change target sharing of initialized render port '{}'.",
                    label
                );
                return;
            }
            data.sharing = sharing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graphics::software::SoftwareDevice,
        network::port::{Port, PortDirection, PortKind},
        network::ProcessorHandle,
    };
    use glam::Vec4;

    fn add_port(
        store: &mut PortStore,
        name: &str,
        direction: PortDirection,
        config: RenderPortConfig,
    ) -> PortHandle {
        store.insert(Port::new(
            name.to_string(),
            direction,
            ProcessorHandle {
                index: 0,
                generation: 0,
            },
            "proc".to_string(),
            config.allow_multiple,
            config.invalidation,
            PortKind::Render(RenderPortData::new(&config)),
        ))
    }

    fn connect_raw(store: &mut PortStore, outport: PortHandle, inport: PortHandle) {
        store.get_mut(outport).unwrap().connections_mut().push(inport);
        store.get_mut(inport).unwrap().connections_mut().push(outport);
    }

    #[test]
    fn double_initialization_is_a_reported_no_op() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let outport = add_port(
            &mut store,
            "out",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );

        store.initialize_port(outport, &mut device).unwrap();
        assert_eq!(device.live_textures(), 2);
        store.initialize_port(outport, &mut device).unwrap();
        assert_eq!(device.live_textures(), 2);

        store.deinitialize_port(outport, &mut device);
        assert_eq!(device.live_textures(), 0);
        // Deinitializing again stays silent and harmless.
        store.deinitialize_port(outport, &mut device);
    }

    #[test]
    fn activating_an_inport_changes_nothing() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let inport = add_port(
            &mut store,
            "in",
            PortDirection::In,
            RenderPortConfig::inport(),
        );
        store.activate_target(inport, &mut device, "");
        assert!(!store.is_target_active(inport));
        assert_eq!(store.num_updates(inport), 0);
    }

    #[test]
    fn activation_validates_and_counts_updates() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let outport = add_port(
            &mut store,
            "out",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );
        store.initialize_port(outport, &mut device).unwrap();

        assert!(!store.has_valid_result(outport));
        store.activate_target(outport, &mut device, "pass");
        assert!(store.is_target_active(outport));
        assert_eq!(store.num_updates(outport), 1);
        store.deactivate_target(outport, &mut device);

        // The port is an outport with a target but not connected yet.
        assert!(!store.is_ready(outport));

        store.deinitialize_port(outport, &mut device);
    }

    #[test]
    fn resize_skips_unchanged_and_zero_sizes() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let outport = add_port(
            &mut store,
            "out",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );
        store.initialize_port(outport, &mut device).unwrap();
        store.activate_target(outport, &mut device, "");
        store.deactivate_target(outport, &mut device);
        assert!(store.has_valid_result(outport));

        store.resize_outport(outport, &mut device, DEFAULT_RENDER_SIZE);
        assert!(store.has_valid_result(outport));
        assert_eq!(store.num_updates(outport), 1);

        store.resize_outport(outport, &mut device, UVec2::new(0, 64));
        assert!(store.has_valid_result(outport));
        assert_eq!(store.render_size(outport), DEFAULT_RENDER_SIZE);

        store.resize_outport(outport, &mut device, UVec2::new(64, 64));
        assert!(!store.has_valid_result(outport));
        assert_eq!(store.render_size(outport), UVec2::new(64, 64));
        assert_eq!(store.target_size(outport), UVec2::new(64, 64));

        store.deinitialize_port(outport, &mut device);
    }

    #[test]
    fn inports_delegate_validity_to_their_first_connection() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let first = add_port(
            &mut store,
            "first",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );
        let second = add_port(
            &mut store,
            "second",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );
        let inport = add_port(
            &mut store,
            "in",
            PortDirection::In,
            RenderPortConfig::inport().with_multiple_connections(true),
        );
        store.initialize_port(first, &mut device).unwrap();
        store.initialize_port(second, &mut device).unwrap();
        connect_raw(&mut store, first, inport);
        connect_raw(&mut store, second, inport);

        // Only the second producer has rendered; the first connection wins.
        store.validate_result(second);
        assert!(!store.has_valid_result(inport));
        store.validate_result(first);
        assert!(store.has_valid_result(inport));
        assert!(store.is_ready(inport));

        store.deinitialize_port(first, &mut device);
        store.deinitialize_port(second, &mut device);
    }

    #[test]
    fn sixteen_bit_readback_keeps_the_high_byte() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let outport = add_port(
            &mut store,
            "out",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );
        store.initialize_port(outport, &mut device).unwrap();
        store.activate_target(outport, &mut device, "");
        device.set_clear_color(Vec4::new(1.0, 0.5, 0.0, 1.0));
        store.clear_target(outport, &mut device);
        store.deactivate_target(outport, &mut device);

        let pixels = store.read_color_buffer(outport, &device).unwrap();
        // 0.5 stored as round(0.5 * 65535) = 32768, whose high byte is 128.
        assert_eq!(pixels[0], ByteColor::new(255, 128, 0, 255));

        store.deinitialize_port(outport, &mut device);
    }

    #[test]
    fn float_readback_clamps_and_rounds() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let outport = add_port(
            &mut store,
            "out",
            PortDirection::Out,
            RenderPortConfig::outport()
                .with_formats(TextureFormat::RgbaF32, TextureFormat::DepthF32),
        );
        store.initialize_port(outport, &mut device).unwrap();
        store.activate_target(outport, &mut device, "");
        device.set_clear_color(Vec4::new(1.0, 1.75, -0.5, 0.25));
        store.clear_target(outport, &mut device);
        store.deactivate_target(outport, &mut device);

        let pixels = store.read_color_buffer(outport, &device).unwrap();
        assert_eq!(pixels[0], ByteColor::new(255, 255, 0, 64));

        store.deinitialize_port(outport, &mut device);
    }

    #[test]
    fn readback_without_a_target_is_a_resource_error() {
        let device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let inport = add_port(
            &mut store,
            "in",
            PortDirection::In,
            RenderPortConfig::inport(),
        );
        assert!(store.read_color_buffer(inport, &device).is_err());
    }

    #[test]
    fn sharing_ports_expect_their_target_from_outside() {
        let mut device = SoftwareDevice::new();
        let mut store = PortStore::new();
        let outport = add_port(
            &mut store,
            "out",
            PortDirection::Out,
            RenderPortConfig::outport(),
        );
        store.set_target_sharing(outport, true);
        store.initialize_port(outport, &mut device).unwrap();
        assert!(!store.has_render_target(outport));

        let target = RenderTarget::new(
            &mut device,
            TextureFormat::Rgba16,
            TextureFormat::Depth24,
            UVec2::new(32, 32),
        )
        .unwrap();
        assert!(store.set_render_target(outport, target).is_none());
        assert!(store.has_render_target(outport));

        let target = store.take_render_target(outport).unwrap();
        target.destroy(&mut device);
        assert_eq!(device.live_textures(), 0);
    }
}
