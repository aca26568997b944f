//! Render processors: the units of computation in a network.

use super::{
    port::{InvalidationLevel, PortHandle, PortStore},
    render_port::SizeOrigin,
    Network, ProcessorHandle,
};
use crate::{
    error::{VolrenError, VolrenResult},
    graphics::{
        device::{DepthFunc, Device, QuadTransform, TextureUnit},
        RenderingError,
    },
    input::MouseEvent,
};
use glam::{UVec2, Vec2, Vec4};

/// Everything a processor may touch while being initialized, processed or
/// deinitialized: its network's port store and the graphics device, plus its
/// own name and registered ports.
pub struct RenderContext<'a> {
    pub ports: &'a mut PortStore,
    pub device: &'a mut dyn Device,
    processor_name: &'a str,
    own_ports: &'a [PortHandle],
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        ports: &'a mut PortStore,
        device: &'a mut dyn Device,
        processor_name: &'a str,
        own_ports: &'a [PortHandle],
    ) -> Self {
        Self {
            ports,
            device,
            processor_name,
            own_ports,
        }
    }

    pub fn processor_name(&self) -> &str {
        self.processor_name
    }

    /// The ports registered by this processor, in registration order.
    pub fn own_ports(&self) -> &[PortHandle] {
        self.own_ports
    }

    pub fn activate_target(&mut self, port: PortHandle, debug_label: &str) {
        let Self { ports, device, .. } = self;
        ports.activate_target(port, &mut **device, debug_label);
    }

    pub fn deactivate_target(&mut self, port: PortHandle) {
        let Self { ports, device, .. } = self;
        ports.deactivate_target(port, &mut **device);
    }

    pub fn clear_target(&mut self, port: PortHandle) {
        let Self { ports, device, .. } = self;
        ports.clear_target(port, &mut **device);
    }

    pub fn is_ready(&self, port: PortHandle) -> bool {
        self.ports.is_ready(port)
    }

    pub fn render_size(&self, port: PortHandle) -> UVec2 {
        self.ports.render_size(port)
    }

    pub fn bind_color_texture(&mut self, port: PortHandle, unit: TextureUnit) -> bool {
        let Self { ports, device, .. } = self;
        ports.bind_color_texture(port, &mut **device, unit)
    }

    pub fn bind_depth_texture(&mut self, port: PortHandle, unit: TextureUnit) -> bool {
        let Self { ports, device, .. } = self;
        ports.bind_depth_texture(port, &mut **device, unit)
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.device.set_clear_color(color);
    }

    /// Clears the currently bound render destination.
    pub fn clear(&mut self) {
        self.device.clear();
    }

    pub fn set_depth_func(&mut self, func: DepthFunc) {
        self.device.set_depth_func(func);
    }

    pub fn draw_quad(&mut self, transform: QuadTransform) {
        self.device.draw_quad(transform);
    }

    pub fn draw_lines(&mut self, lines: &[[Vec2; 2]], color: Vec4) {
        self.device.draw_lines(lines, color);
    }

    /// Presents the port's color texture on the device output.
    pub fn present(&mut self, port: PortHandle) -> VolrenResult<()> {
        let Self { ports, device, .. } = self;
        match ports.color_texture(port) {
            Some(texture) => device.present(texture),
            None => Err(VolrenError::RenderingError(RenderingError::from_string(
                format!(
                    "Could not present render port '{}' without render target.",
                    ports.display_name(port)
                ),
            ))),
        }
    }
}

/// A unit of computation owning ports in a render network.
///
/// The network evaluator drives the lifecycle: `initialize` and
/// `deinitialize` are invoked once each, `process` only while `is_ready`
/// holds, and the size-negotiation hooks whenever the surrounding topology
/// changes. The provided implementations cover the common single-chain
/// processor; composite views override the hooks they redefine.
pub trait RenderProcessor {
    /// Prepares the processor for processing. The default allocates the
    /// render targets of all registered outports.
    fn initialize(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        initialize_outports(ctx)
    }

    /// Releases what `initialize` acquired. The default releases the
    /// registered outports' render targets.
    fn deinitialize(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        deinitialize_outports(ctx)
    }

    /// Whether the processor can produce a result. The default requires
    /// every registered port to be ready.
    fn is_ready(&self, network: &Network, this: ProcessorHandle) -> bool {
        default_is_ready(network, this)
    }

    /// Produces the processor's result from its inports into its outports.
    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()>;

    /// Handles an event delivered to this processor. The default forwards it
    /// untouched to the render inports until some recipient accepts it.
    fn on_event(&mut self, network: &mut Network, this: ProcessorHandle, event: &mut MouseEvent) {
        forward_event_to_inports(network, this, event);
    }

    /// Called when a downstream consumer dictated a new size for one of the
    /// processor's outports. The default adopts the size for the outport and
    /// requests it from every render inport.
    fn port_resized(
        &mut self,
        network: &mut Network,
        this: ProcessorHandle,
        port: PortHandle,
        size: UVec2,
    ) {
        default_port_resized(network, this, port, size);
    }

    /// Called when the size origin visible through one of the processor's
    /// outports changed. The default propagates the recomputed origin to
    /// every render inport.
    fn size_origin_changed(&mut self, network: &mut Network, this: ProcessorHandle, port: PortHandle) {
        default_size_origin_changed(network, this, port);
    }

    /// Whether connecting a consumer with the given size origin to the given
    /// outport is acceptable. The default rejects a second, different origin
    /// anywhere in the processor's reach.
    fn test_size_origin(
        &self,
        network: &Network,
        this: ProcessorHandle,
        port: PortHandle,
        origin: SizeOrigin,
    ) -> bool {
        default_test_size_origin(network, this, port, origin)
    }
}

/// Allocates render targets for every registered outport.
pub fn initialize_outports(ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
    for &port in ctx.own_ports {
        let RenderContext { ports, device, .. } = ctx;
        ports.initialize_port(port, &mut **device)?;
    }
    Ok(())
}

/// Releases the render targets of every registered outport.
pub fn deinitialize_outports(ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
    for &port in ctx.own_ports {
        let RenderContext { ports, device, .. } = ctx;
        ports.deinitialize_port(port, &mut **device);
    }
    Ok(())
}

/// Ready when every registered port is ready.
pub fn default_is_ready(network: &Network, this: ProcessorHandle) -> bool {
    network
        .ports_of(this)
        .iter()
        .all(|&port| network.ports().is_ready(port))
}

/// Forwards an event to the processor's render inports, upstream, stopping
/// once it has been accepted.
pub fn forward_event_to_inports(network: &mut Network, this: ProcessorHandle, event: &mut MouseEvent) {
    for inport in network.render_inports(this) {
        if event.is_accepted() {
            break;
        }
        network.distribute_event(inport, event);
    }
}

/// Adopts a consumer-dictated size for the notified outport and requests the
/// same size from every render inport, invalidating the processor.
pub fn default_port_resized(
    network: &mut Network,
    this: ProcessorHandle,
    port: PortHandle,
    size: UVec2,
) {
    network.resize_port(port, size);
    for inport in network.render_inports(this) {
        network.resize_port(inport, size);
    }
    network.invalidate(this, InvalidationLevel::InvalidResult);
}

/// Propagates the origin now visible through the notified outport to every
/// render inport.
pub fn default_size_origin_changed(network: &mut Network, this: ProcessorHandle, port: PortHandle) {
    let origin = network.ports().size_origin(port);
    for inport in network.render_inports(this) {
        network.propagate_size_origin(inport, origin);
    }
}

/// Rejects the candidate origin if any outport already answers to a
/// different one, if an inport declares its own origin, or if an upstream
/// processor objects.
pub fn default_test_size_origin(
    network: &Network,
    this: ProcessorHandle,
    port: PortHandle,
    origin: SizeOrigin,
) -> bool {
    if let Some(existing) = network.ports().size_origin(port) {
        if existing != origin {
            return false;
        }
    }
    for outport in network.render_outports(this) {
        if outport == port {
            continue;
        }
        if let Some(existing) = network.ports().size_origin(outport) {
            if existing != origin {
                return false;
            }
        }
    }
    for inport in network.render_inports(this) {
        if network.ports().is_declared_size_origin(inport) {
            return false;
        }
        let upstream: Vec<PortHandle> = network
            .ports()
            .get(inport)
            .map(|port| port.connections().to_vec())
            .unwrap_or_default();
        for producer in upstream {
            if !network.test_size_origin_on(producer, origin) {
                return false;
            }
        }
    }
    true
}
