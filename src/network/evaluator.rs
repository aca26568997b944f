//! Driving a network: ordering, lifecycle and lazy evaluation.

use super::{
    port::{InvalidationLevel, PortHandle},
    Network, NetworkError, ProcessorHandle,
};
use crate::{
    error::{VolrenError, VolrenResult},
    graphics::target::RenderTarget,
};
use log::warn;
use std::collections::HashMap;

/// Returns the processors of the network in dependency order: every producer
/// before each of its consumers.
pub fn topological_order(network: &Network) -> VolrenResult<Vec<ProcessorHandle>> {
    let handles = network.processor_handles();
    let mut indegree: HashMap<ProcessorHandle, usize> = handles.iter().map(|&h| (h, 0)).collect();
    for &handle in &handles {
        for consumer in network.downstream_processors(handle) {
            if let Some(count) = indegree.get_mut(&consumer) {
                *count += 1;
            }
        }
    }

    let mut queue: Vec<ProcessorHandle> = handles
        .iter()
        .copied()
        .filter(|handle| indegree[handle] == 0)
        .collect();
    let mut order = Vec::with_capacity(handles.len());
    let mut next = 0;
    while next < queue.len() {
        let current = queue[next];
        next += 1;
        order.push(current);
        for consumer in network.downstream_processors(current) {
            if let Some(count) = indegree.get_mut(&consumer) {
                *count -= 1;
                if *count == 0 {
                    queue.push(consumer);
                }
            }
        }
    }

    if order.len() != handles.len() {
        return Err(VolrenError::NetworkError(NetworkError::from_str(
            "The network contains a cycle.",
        )));
    }
    Ok(order)
}

/// Drives a network: initializes processors once, processes the ready and
/// invalidated ones in dependency order, and tears everything down again.
///
/// When the network runs in target-sharing mode the evaluator owns the
/// render targets of all sharing outports: it supplies them before processor
/// initialization and reclaims and destroys them at deinitialization.
#[derive(Default)]
pub struct NetworkEvaluator {
    shared_ports: Vec<PortHandle>,
}

impl NetworkEvaluator {
    pub fn new() -> Self {
        Self {
            shared_ports: Vec::new(),
        }
    }

    /// Initializes every processor in dependency order. In target-sharing
    /// mode the sharing outports receive their targets first.
    pub fn initialize(&mut self, network: &mut Network) -> VolrenResult<()> {
        let order = topological_order(network)?;
        if network.target_sharing() {
            for &handle in &order {
                for outport in network.render_outports(handle) {
                    self.supply_shared_target(network, outport)?;
                }
            }
        }
        for &handle in &order {
            network.initialize_processor(handle)?;
        }
        Ok(())
    }

    fn supply_shared_target(&mut self, network: &mut Network, outport: PortHandle) -> VolrenResult<()> {
        let data = match network.ports().get(outport).and_then(|port| port.render()) {
            Some(data) => data,
            None => return Ok(()),
        };
        if !data.sharing() || data.has_target() {
            return Ok(());
        }
        let color_format = data.color_format();
        let depth_format = data.depth_format();
        let size = data.size();
        let label = network.ports().display_name(outport);

        let mut target = RenderTarget::new(network.device_mut(), color_format, depth_format, size)?;
        target.set_debug_label(&label);
        if let Some(previous) = network.ports_mut().set_render_target(outport, target) {
            previous.destroy(network.device_mut());
        }
        self.shared_ports.push(outport);
        Ok(())
    }

    /// Deinitializes every processor in reverse dependency order and
    /// reclaims the targets supplied in target-sharing mode.
    pub fn deinitialize(&mut self, network: &mut Network) -> VolrenResult<()> {
        let order = topological_order(network)?;
        for &handle in order.iter().rev() {
            network.deinitialize_processor(handle)?;
        }
        for outport in self.shared_ports.drain(..) {
            if let Some(target) = network.ports_mut().take_render_target(outport) {
                target.destroy(network.device_mut());
            }
        }
        Ok(())
    }

    /// Processes, in dependency order, every initialized processor that is
    /// ready and whose invalidation level is above `Valid`, then marks it
    /// valid. Processors that stay valid are skipped entirely.
    pub fn evaluate(&mut self, network: &mut Network) -> VolrenResult<()> {
        let order = topological_order(network)?;
        for handle in order {
            if !network.is_initialized(handle) {
                warn!(
                    "Skipping uninitialized processor '{}'.",
                    network.processor_name(handle).unwrap_or("<removed>")
                );
                continue;
            }
            if network.invalidation(handle) > InvalidationLevel::Valid
                && network.is_processor_ready(handle)
            {
                network.process_processor(handle)?;
                network.mark_valid(handle);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::canvas::CanvasRenderer;
    use crate::testutil::{self, add_pass_through, add_solid_color};
    use glam::{UVec2, Vec4};

    #[test]
    fn producers_come_before_their_consumers() {
        let (mut network, _device) = testutil::network();
        // Insert in reverse so insertion order alone cannot pass the test.
        let through = add_pass_through(&mut network, "through");
        let source = add_solid_color(&mut network, "source", Vec4::ONE);
        network.connect(source.outport, through.inport).unwrap();

        let order = topological_order(&network).unwrap();
        let source_position = order.iter().position(|&h| h == source.processor).unwrap();
        let through_position = order.iter().position(|&h| h == through.processor).unwrap();
        assert!(source_position < through_position);
    }

    #[test]
    fn evaluation_is_lazy_and_driven_by_invalidation() {
        let (mut network, _device) = testutil::network();
        let source = add_solid_color(&mut network, "source", Vec4::ONE);
        let through = add_pass_through(&mut network, "through");
        let mut canvas_in = None;
        let canvas = network.add_processor("canvas", |builder| {
            let canvas = CanvasRenderer::new(builder);
            canvas_in = Some(canvas.inport());
            canvas
        });
        network.connect(source.outport, through.inport).unwrap();
        network.connect(through.outport, canvas_in.unwrap()).unwrap();
        network.resize_port(canvas_in.unwrap(), UVec2::new(64, 64));

        let mut evaluator = NetworkEvaluator::new();
        evaluator.initialize(&mut network).unwrap();
        evaluator.evaluate(&mut network).unwrap();
        assert_eq!(source.processed.get(), 1);

        // Nothing changed, nothing runs.
        evaluator.evaluate(&mut network).unwrap();
        assert_eq!(source.processed.get(), 1);

        network.invalidate(
            source.processor,
            crate::network::InvalidationLevel::InvalidResult,
        );
        evaluator.evaluate(&mut network).unwrap();
        assert_eq!(source.processed.get(), 2);
        assert_eq!(network.invalidation(canvas), crate::network::InvalidationLevel::Valid);

        evaluator.deinitialize(&mut network).unwrap();
    }

    #[test]
    fn sharing_mode_targets_come_from_the_evaluator() {
        let (mut network, device) = testutil::network();
        network.set_target_sharing(true);
        let source = add_solid_color(&mut network, "source", Vec4::ONE);
        let mut canvas_in = None;
        network.add_processor("canvas", |builder| {
            let canvas = CanvasRenderer::new(builder);
            canvas_in = Some(canvas.inport());
            canvas
        });
        network.connect(source.outport, canvas_in.unwrap()).unwrap();

        let mut evaluator = NetworkEvaluator::new();
        evaluator.initialize(&mut network).unwrap();
        assert!(network
            .ports()
            .get(source.outport)
            .and_then(|port| port.render())
            .map(|data| data.has_target())
            .unwrap_or(false));

        evaluator.evaluate(&mut network).unwrap();
        assert!(device.borrow().screen().is_some());

        evaluator.deinitialize(&mut network).unwrap();
        assert_eq!(device.borrow().live_textures(), 0);
        assert_eq!(device.borrow().live_framebuffers(), 0);
    }
}
