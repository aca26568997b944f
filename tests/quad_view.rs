//! End-to-end exercise of a quad-view network over the software device.

use glam::{UVec2, Vec4};
use volren::{
    color::ByteColor,
    error::VolrenResult,
    graphics::{device::SharedDevice, software::SoftwareDevice},
    input::{Modifiers, MouseAction, MouseButton, MouseEvent},
    network::{
        Network, NetworkEvaluator, PortHandle, ProcessorHandle, RenderContext, RenderProcessor,
    },
    processors::{canvas::CanvasRenderer, quad_view::QuadView},
};

/// Minimal source clearing its output to one flat color.
struct FlatColor {
    outport: PortHandle,
    color: Vec4,
}

impl RenderProcessor for FlatColor {
    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        ctx.activate_target(self.outport, "flat");
        ctx.set_clear_color(self.color);
        ctx.clear();
        ctx.deactivate_target(self.outport);
        Ok(())
    }
}

fn add_flat_color(network: &mut Network, name: &str, color: Vec4) -> PortHandle {
    let mut outport = None;
    network.add_processor(name, |builder| {
        let port = builder.render_outport("image.output");
        outport = Some(port);
        FlatColor {
            outport: port,
            color,
        }
    });
    outport.unwrap()
}

fn double_click(x: i32, y: i32, viewport: UVec2) -> MouseEvent {
    MouseEvent::new(
        x,
        y,
        MouseAction::DOUBLE_CLICK,
        MouseButton::Left,
        Modifiers::empty(),
        viewport,
    )
}

fn pixel(pixels: &[ByteColor], width: u32, x: u32, y: u32) -> ByteColor {
    pixels[(y * width + x) as usize]
}

#[test]
fn quad_view_composites_resizes_and_maximizes() {
    let _ = simple_logger::init();

    let shared = SharedDevice::new(SoftwareDevice::new());
    let device = shared.handle();
    let mut network = Network::new(Box::new(shared));

    let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
    let green = Vec4::new(0.0, 1.0, 0.0, 1.0);
    let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
    let yellow = Vec4::new(1.0, 1.0, 0.0, 1.0);
    let sources = [
        add_flat_color(&mut network, "flat1", red),
        add_flat_color(&mut network, "flat2", green),
        add_flat_color(&mut network, "flat3", blue),
        add_flat_color(&mut network, "flat4", yellow),
    ];

    let mut quad_ports = None;
    let _quad: ProcessorHandle = network.add_processor("quad", |builder| {
        let view = QuadView::new(builder);
        quad_ports = Some((view.outport(), view.inports()));
        view
    });
    let (quad_outport, quad_inports) = quad_ports.unwrap();

    let mut canvas_in = None;
    let canvas = network.add_processor("canvas", |builder| {
        let canvas = CanvasRenderer::new(builder);
        canvas_in = Some(canvas.inport());
        canvas
    });
    let canvas_in = canvas_in.unwrap();

    for (&source, &inport) in sources.iter().zip(quad_inports.iter()) {
        network.connect(source, inport).unwrap();
    }
    network.connect(quad_outport, canvas_in).unwrap();

    // The canvas dictates the resolution of the whole downstream chain.
    network.resize_port(canvas_in, UVec2::new(512, 512));
    assert_eq!(network.ports().render_size(quad_outport), UVec2::new(512, 512));
    for &source in sources.iter() {
        assert_eq!(network.ports().render_size(source), UVec2::new(256, 256));
    }

    let mut evaluator = NetworkEvaluator::new();
    evaluator.initialize(&mut network).unwrap();
    evaluator.evaluate(&mut network).unwrap();

    // Each input occupies its quadrant of the composed output.
    let pixels = {
        let device = device.borrow();
        network
            .ports()
            .read_color_buffer(quad_outport, &*device)
            .unwrap()
    };
    assert_eq!(pixel(&pixels, 512, 128, 128), ByteColor::new(255, 0, 0, 255));
    assert_eq!(pixel(&pixels, 512, 384, 128), ByteColor::new(0, 255, 0, 255));
    assert_eq!(pixel(&pixels, 512, 128, 384), ByteColor::new(0, 0, 255, 255));
    assert_eq!(pixel(&pixels, 512, 384, 384), ByteColor::new(255, 255, 0, 255));
    // The grid cross runs along the midlines in the default white.
    assert_eq!(pixel(&pixels, 512, 256, 100), ByteColor::new(255, 255, 255, 255));
    assert_eq!(pixel(&pixels, 512, 100, 256), ByteColor::new(255, 255, 255, 255));

    // The canvas presented the same image.
    {
        let device = device.borrow();
        let (screen_size, screen) = device.screen().unwrap();
        assert_eq!(screen_size, UVec2::new(512, 512));
        let index = ((128 * 512 + 384) * 4) as usize;
        assert_eq!(&screen[index..index + 4], &[0, 255, 0, 255]);
    }

    // Nothing changed, so nothing re-renders.
    let updates = network.ports().num_updates(quad_outport);
    evaluator.evaluate(&mut network).unwrap();
    assert_eq!(network.ports().num_updates(quad_outport), updates);

    // Double click on the top-right quadrant, entering through the canvas:
    // view 2 fills the whole output and is renegotiated to full size.
    let mut click = double_click(384, 128, UVec2::new(512, 512));
    network.dispatch_event(canvas, &mut click);
    assert!(click.is_accepted());
    evaluator.evaluate(&mut network).unwrap();

    assert_eq!(network.ports().render_size(quad_inports[1]), UVec2::new(512, 512));
    assert_eq!(network.ports().render_size(quad_inports[0]), UVec2::new(256, 256));

    let pixels = {
        let device = device.borrow();
        network
            .ports()
            .read_color_buffer(quad_outport, &*device)
            .unwrap()
    };
    assert_eq!(pixel(&pixels, 512, 10, 10), ByteColor::new(0, 255, 0, 255));
    assert_eq!(pixel(&pixels, 512, 500, 500), ByteColor::new(0, 255, 0, 255));

    // A second double click restores the tiled view.
    let mut click = double_click(40, 40, UVec2::new(512, 512));
    network.dispatch_event(canvas, &mut click);
    evaluator.evaluate(&mut network).unwrap();
    let pixels = {
        let device = device.borrow();
        network
            .ports()
            .read_color_buffer(quad_outport, &*device)
            .unwrap()
    };
    assert_eq!(pixel(&pixels, 512, 128, 384), ByteColor::new(0, 0, 255, 255));

    // The composed output can be exported.
    let path = std::env::temp_dir().join("volren_quad_view_test.png");
    {
        let device = device.borrow();
        network
            .ports()
            .save_to_image(quad_outport, &*device, &path)
            .unwrap();
    }
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);

    // Teardown releases every device resource.
    evaluator.deinitialize(&mut network).unwrap();
    assert_eq!(device.borrow().live_textures(), 0);
    assert_eq!(device.borrow().live_framebuffers(), 0);
}
