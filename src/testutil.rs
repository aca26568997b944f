//! Shared processors and fixtures for the crate's tests.

use crate::{
    error::VolrenResult,
    graphics::{
        device::{DepthFunc, QuadTransform, SharedDevice, TextureUnit},
        software::SoftwareDevice,
    },
    input::MouseEvent,
    network::{Network, PortBuilder, PortHandle, ProcessorHandle, RenderContext, RenderProcessor},
};
use glam::Vec4;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

pub fn init_logging() {
    let _ = simple_logger::init();
}

/// A network over a software device, plus a handle for inspecting the device
/// after the network has taken ownership of its half.
pub fn network() -> (Network, Rc<RefCell<SoftwareDevice>>) {
    init_logging();
    let shared = SharedDevice::new(SoftwareDevice::new());
    let handle = shared.handle();
    (Network::new(Box::new(shared)), handle)
}

/// Handles into an added [`SolidColor`] source.
pub struct SourceHandles {
    pub processor: ProcessorHandle,
    pub outport: PortHandle,
    /// Every event the source received, in delivery order.
    pub events: Rc<RefCell<Vec<MouseEvent>>>,
    /// Number of completed `process` calls.
    pub processed: Rc<Cell<usize>>,
    /// When set, the source accepts every event it receives.
    pub accept_events: Rc<Cell<bool>>,
}

/// Source processor clearing its output to one color, recording the events
/// and process calls it sees.
pub struct SolidColor {
    outport: PortHandle,
    color: Vec4,
    events: Rc<RefCell<Vec<MouseEvent>>>,
    processed: Rc<Cell<usize>>,
    accept_events: Rc<Cell<bool>>,
}

impl RenderProcessor for SolidColor {
    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        ctx.activate_target(self.outport, "solid");
        ctx.set_clear_color(self.color);
        ctx.clear();
        ctx.deactivate_target(self.outport);
        self.processed.set(self.processed.get() + 1);
        Ok(())
    }

    fn on_event(&mut self, _network: &mut Network, _this: ProcessorHandle, event: &mut MouseEvent) {
        self.events.borrow_mut().push(event.clone());
        if self.accept_events.get() {
            event.accept();
        }
    }
}

pub fn add_solid_color(network: &mut Network, name: &str, color: Vec4) -> SourceHandles {
    let events = Rc::new(RefCell::new(Vec::new()));
    let processed = Rc::new(Cell::new(0));
    let accept_events = Rc::new(Cell::new(false));
    let mut outport = None;
    let processor = network.add_processor(name, |builder| {
        let port = builder.render_outport("image.output");
        outport = Some(port);
        SolidColor {
            outport: port,
            color,
            events: Rc::clone(&events),
            processed: Rc::clone(&processed),
            accept_events: Rc::clone(&accept_events),
        }
    });
    SourceHandles {
        processor,
        outport: outport.unwrap(),
        events,
        processed,
        accept_events,
    }
}

/// Handles into an added [`PassThrough`].
pub struct PassThroughHandles {
    pub processor: ProcessorHandle,
    pub inport: PortHandle,
    pub outport: PortHandle,
}

/// Copies its input to its output, relying on every default hook.
pub struct PassThrough {
    inport: PortHandle,
    outport: PortHandle,
}

impl RenderProcessor for PassThrough {
    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        ctx.activate_target(self.outport, "copy");
        ctx.clear();
        ctx.bind_color_texture(self.inport, TextureUnit(0));
        ctx.set_depth_func(DepthFunc::Always);
        ctx.draw_quad(QuadTransform::full());
        ctx.set_depth_func(DepthFunc::Less);
        ctx.deactivate_target(self.outport);
        Ok(())
    }
}

pub fn add_pass_through(network: &mut Network, name: &str) -> PassThroughHandles {
    let mut handles = None;
    let processor = network.add_processor(name, |builder: &mut PortBuilder<'_>| {
        let inport = builder.render_inport("image.input");
        let outport = builder.render_outport("image.output");
        handles = Some((inport, outport));
        PassThrough { inport, outport }
    });
    let (inport, outport) = handles.unwrap();
    PassThroughHandles {
        processor,
        inport,
        outport,
    }
}
