//! One-pass distribution of an input rendering to several outputs.

use crate::{
    error::VolrenResult,
    graphics::device::{DepthFunc, QuadTransform, TextureUnits},
    network::{
        processor::{deinitialize_outports, initialize_outports},
        InvalidationLevel, Network, PortBuilder, PortGroup, PortHandle, ProcessorHandle,
        RenderContext, RenderProcessor,
    },
};
use glam::UVec2;
use log::debug;

/// Copies its input into two outputs in a single multi-target pass.
///
/// Both outports are aggregated in a [`PortGroup`], so the copy is written to
/// every connected output at once. The group's generated header tells shader
/// code which output index corresponds to which port.
pub struct ImageSplitter {
    inport: PortHandle,
    outports: [PortHandle; 2],
    group: PortGroup,
}

impl ImageSplitter {
    pub fn new(builder: &mut PortBuilder<'_>) -> Self {
        let inport = builder.render_inport("image.input");
        let outports = [
            builder.render_outport("image.output1"),
            builder.render_outport("image.output2"),
        ];
        Self {
            inport,
            outports,
            group: PortGroup::new(false),
        }
    }

    pub fn inport(&self) -> PortHandle {
        self.inport
    }

    pub fn outports(&self) -> [PortHandle; 2] {
        self.outports
    }
}

impl RenderProcessor for ImageSplitter {
    fn initialize(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        initialize_outports(ctx)?;
        self.group.initialize(&mut *ctx.device)?;
        for &outport in &self.outports {
            self.group.add_port(outport, ctx.ports, &mut *ctx.device);
        }
        // The mapping the (external) shader layer compiles against.
        debug!(
            "Output mapping of '{}':\n{}",
            ctx.processor_name(),
            self.group.generate_header(ctx.ports)
        );
        Ok(())
    }

    fn deinitialize(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        self.group.deinitialize(&mut *ctx.device);
        deinitialize_outports(ctx)
    }

    fn is_ready(&self, network: &Network, _this: ProcessorHandle) -> bool {
        network.ports().is_ready(self.inport)
            && self
                .outports
                .iter()
                .any(|&outport| network.ports().is_ready(outport))
    }

    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        // Connectivity may have changed since the last pass.
        self.group.reattach_targets(ctx.ports, &mut *ctx.device);
        self.group.activate_targets(ctx.ports, &mut *ctx.device, "split");
        self.group.clear_targets(&mut *ctx.device);
        let mut units = TextureUnits::new();
        ctx.bind_color_texture(self.inport, units.acquire());
        ctx.set_depth_func(DepthFunc::Always);
        ctx.draw_quad(QuadTransform::full());
        ctx.set_depth_func(DepthFunc::Less);
        self.group.deactivate_targets(&mut *ctx.device);
        Ok(())
    }

    fn port_resized(
        &mut self,
        network: &mut Network,
        this: ProcessorHandle,
        _port: PortHandle,
        size: UVec2,
    ) {
        // The grouped outputs must share one size.
        for &outport in &self.outports {
            network.resize_port(outport, size);
        }
        network.resize_port(self.inport, size);
        network.invalidate(this, InvalidationLevel::InvalidResult);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color::ByteColor,
        network::NetworkEvaluator,
        processors::canvas::CanvasRenderer,
        testutil::{self, add_pass_through, add_solid_color},
    };
    use glam::Vec4;

    #[test]
    fn both_connected_outputs_receive_the_input_in_one_pass() {
        let (mut network, device) = testutil::network();
        let source = add_solid_color(&mut network, "source", Vec4::new(0.0, 1.0, 0.0, 1.0));

        let mut splitter_ports = None;
        let splitter = network.add_processor("splitter", |builder| {
            let splitter = ImageSplitter::new(builder);
            splitter_ports = Some((splitter.inport(), splitter.outports()));
            splitter
        });
        let (split_in, split_outs) = splitter_ports.unwrap();

        let mut canvas_in = None;
        network.add_processor("canvas", |builder| {
            let canvas = CanvasRenderer::new(builder);
            canvas_in = Some(canvas.inport());
            canvas
        });
        let through = add_pass_through(&mut network, "through");

        network.connect(source.outport, split_in).unwrap();
        network.connect(split_outs[0], canvas_in.unwrap()).unwrap();
        network.connect(split_outs[1], through.inport).unwrap();

        network.resize_port(canvas_in.unwrap(), UVec2::new(32, 32));

        let mut evaluator = NetworkEvaluator::new();
        evaluator.initialize(&mut network).unwrap();
        evaluator.evaluate(&mut network).unwrap();

        let green = ByteColor::new(0, 255, 0, 255);
        for &outport in split_outs.iter() {
            let pixels = {
                let device = device.borrow();
                network.ports().read_color_buffer(outport, &*device).unwrap()
            };
            assert!(pixels.iter().all(|&pixel| pixel == green));
        }

        evaluator.deinitialize(&mut network).unwrap();
        assert_eq!(device.borrow().live_framebuffers(), 0);
    }

    #[test]
    fn disconnected_outputs_are_skipped_by_the_pass() {
        let (mut network, device) = testutil::network();
        let source = add_solid_color(&mut network, "source", Vec4::new(1.0, 0.0, 0.0, 1.0));

        let mut splitter_ports = None;
        network.add_processor("splitter", |builder| {
            let splitter = ImageSplitter::new(builder);
            splitter_ports = Some((splitter.inport(), splitter.outports()));
            splitter
        });
        let (split_in, split_outs) = splitter_ports.unwrap();
        let through = add_pass_through(&mut network, "through");

        network.connect(source.outport, split_in).unwrap();
        // Only the second output is connected.
        network.connect(split_outs[1], through.inport).unwrap();

        let mut evaluator = NetworkEvaluator::new();
        evaluator.initialize(&mut network).unwrap();
        evaluator.evaluate(&mut network).unwrap();

        let red = ByteColor::new(255, 0, 0, 255);
        let zero = ByteColor::new(0, 0, 0, 0);
        let device_ref = device.borrow();
        let skipped = network
            .ports()
            .read_color_buffer(split_outs[0], &*device_ref)
            .unwrap();
        assert!(skipped.iter().all(|&pixel| pixel == zero));
        let written = network
            .ports()
            .read_color_buffer(split_outs[1], &*device_ref)
            .unwrap();
        assert!(written.iter().all(|&pixel| pixel == red));
    }
}
