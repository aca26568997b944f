//! Composite view tiling four renderings into one viewport.

use crate::{
    color::Color,
    error::VolrenResult,
    graphics::device::{DepthFunc, QuadTransform, TextureUnit},
    input::{MouseAction, MouseEvent},
    network::{
        InvalidationLevel, Network, PortBuilder, PortHandle, ProcessorHandle, RenderContext,
        RenderPortConfig, RenderProcessor, SizeOrigin,
    },
};
use glam::{UVec2, Vec2};
use log::error;
use serde::{Deserialize, Serialize};

/// Persisted settings of a [`QuadView`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadViewSettings {
    pub show_grid: bool,
    pub grid_color: Color,
    /// 0 shows the tiled quadrants, 1 to 4 maximize the corresponding input.
    pub maximized: u8,
    pub maximize_on_double_click: bool,
}

impl Default for QuadViewSettings {
    fn default() -> Self {
        Self {
            show_grid: true,
            grid_color: Color::white(),
            maximized: 0,
            maximize_on_double_click: true,
        }
    }
}

/// Composes up to four input renderings into one output.
///
/// In tiled mode every ready input occupies one quadrant of the output and
/// pointer events are re-routed into the quadrant under the cursor, with
/// coordinates re-projected into that sub-view's halved viewport. A double
/// click maximizes the clicked quadrant: the selected input fills the whole
/// viewport, is dictated the full output resolution, and receives all events
/// unmodified. Each inport is its own size origin, so the four upstream
/// chains can be negotiated independently of the chain downstream of the
/// outport.
pub struct QuadView {
    settings: QuadViewSettings,
    outport: PortHandle,
    inports: [PortHandle; 4],
    /// Quadrant (1-4) currently owning pointer focus.
    current_port: Option<u8>,
    is_dragging: bool,
}

impl QuadView {
    pub fn new(builder: &mut PortBuilder<'_>) -> Self {
        Self::with_settings(builder, QuadViewSettings::default())
    }

    pub fn with_settings(builder: &mut PortBuilder<'_>, settings: QuadViewSettings) -> Self {
        let outport = builder.render_outport("outport");
        let inports = [
            builder.render_inport_with("inport1", RenderPortConfig::inport().with_size_origin()),
            builder.render_inport_with("inport2", RenderPortConfig::inport().with_size_origin()),
            builder.render_inport_with("inport3", RenderPortConfig::inport().with_size_origin()),
            builder.render_inport_with("inport4", RenderPortConfig::inport().with_size_origin()),
        ];
        Self {
            settings,
            outport,
            inports,
            current_port: None,
            is_dragging: false,
        }
    }

    pub fn outport(&self) -> PortHandle {
        self.outport
    }

    pub fn inports(&self) -> [PortHandle; 4] {
        self.inports
    }

    pub fn settings(&self) -> &QuadViewSettings {
        &self.settings
    }

    /// Replaces the settings, renegotiating sub-view sizes.
    pub fn set_settings(
        &mut self,
        network: &mut Network,
        this: ProcessorHandle,
        settings: QuadViewSettings,
    ) {
        if settings.maximized > 4 {
            error!("Invalid sub-view selector {}.", settings.maximized);
            return;
        }
        self.settings = settings;
        self.update_sizes(network);
        network.invalidate(this, InvalidationLevel::InvalidResult);
    }

    fn maximized_inport(&self) -> Option<PortHandle> {
        match self.settings.maximized {
            0 => None,
            selected => Some(self.inports[(selected - 1) as usize]),
        }
    }

    /// Maps a pointer position to its quadrant: top-left 1, top-right 2,
    /// bottom-left 3, bottom-right 4.
    fn quadrant_of(event: &MouseEvent) -> u8 {
        let half_x = (event.viewport().x / 2) as i32;
        let half_y = (event.viewport().y / 2) as i32;
        if event.y() < half_y {
            if event.x() < half_x {
                1
            } else {
                2
            }
        } else if event.x() < half_x {
            3
        } else {
            4
        }
    }

    fn quadrant_transform(index: usize) -> QuadTransform {
        const TRANSLATIONS: [[f32; 2]; 4] = [[-0.5, 0.5], [0.5, 0.5], [-0.5, -0.5], [0.5, -0.5]];
        QuadTransform::new(
            Vec2::new(TRANSLATIONS[index][0], TRANSLATIONS[index][1]),
            Vec2::splat(0.5),
        )
    }

    fn quadrant_offset(quadrant: u8, half: UVec2) -> (i32, i32) {
        match quadrant {
            1 => (0, 0),
            2 => (half.x as i32, 0),
            3 => (0, half.y as i32),
            _ => (half.x as i32, half.y as i32),
        }
    }

    /// Renegotiates sub-view sizes: quarter viewport for every input while
    /// tiled, full viewport for only the maximized input. Inactive inports
    /// keep their previous negotiation.
    fn update_sizes(&self, network: &mut Network) {
        let size = network.ports().render_size(self.outport);
        if size.x == 0 || size.y == 0 {
            return;
        }
        match self.maximized_inport() {
            None => {
                let sub_size = size / 2;
                for &inport in &self.inports {
                    network.resize_port(inport, sub_size);
                }
            }
            Some(inport) => network.resize_port(inport, size),
        }
    }

    fn toggle_maximization(
        &mut self,
        network: &mut Network,
        this: ProcessorHandle,
        event: &mut MouseEvent,
    ) {
        self.settings.maximized = if self.settings.maximized == 0 {
            Self::quadrant_of(event)
        } else {
            0
        };
        self.update_sizes(network);
        network.invalidate(this, InvalidationLevel::InvalidResult);
        event.accept();
    }

    /// Rewrites the event relative to the quadrant origin with a halved
    /// viewport, delivers it to that quadrant's inport and mirrors the
    /// accepted state back.
    fn route_to_quadrant(&self, network: &mut Network, quadrant: u8, event: &mut MouseEvent) {
        let half = event.viewport() / 2;
        let (offset_x, offset_y) = Self::quadrant_offset(quadrant, half);
        let mut routed = event.relative_to(offset_x, offset_y, half);
        network.distribute_event(self.inports[(quadrant - 1) as usize], &mut routed);
        if routed.is_accepted() {
            event.accept();
        }
    }

    fn handle_tiled_pointer(&mut self, network: &mut Network, event: &mut MouseEvent) {
        let previous = self.current_port;

        if event.action().contains(MouseAction::PRESSED) {
            self.is_dragging = true;
        }
        if event.action().contains(MouseAction::RELEASED) {
            self.is_dragging = false;
        }
        if event.action().contains(MouseAction::EXIT) {
            self.current_port = None;
        } else if event.action().contains(MouseAction::MOTION) && !self.is_dragging {
            self.current_port = Some(Self::quadrant_of(event));
        }

        if self.current_port != previous {
            let half = event.viewport() / 2;
            if let Some(quadrant) = previous {
                let mut leave =
                    MouseEvent::new(1, 1, MouseAction::EXIT, event.button(), event.modifiers(), half);
                leave.ignore();
                network.distribute_event(self.inports[(quadrant - 1) as usize], &mut leave);
            }
            if let Some(quadrant) = self.current_port {
                let mut enter =
                    MouseEvent::new(1, 1, MouseAction::ENTER, event.button(), event.modifiers(), half);
                enter.ignore();
                network.distribute_event(self.inports[(quadrant - 1) as usize], &mut enter);
            }
        }

        if let Some(quadrant) = self.current_port {
            self.route_to_quadrant(network, quadrant, event);
        }
    }
}

impl RenderProcessor for QuadView {
    fn is_ready(&self, network: &Network, _this: ProcessorHandle) -> bool {
        let ports = network.ports();
        if !ports.is_ready(self.outport) {
            return false;
        }
        if !self.inports.iter().any(|&inport| ports.is_ready(inport)) {
            return false;
        }
        match self.maximized_inport() {
            Some(inport) => ports.is_ready(inport),
            None => true,
        }
    }

    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        match self.maximized_inport() {
            None => {
                ctx.activate_target(self.outport, "");
                ctx.clear();
                for (index, &inport) in self.inports.iter().enumerate() {
                    if !ctx.is_ready(inport) {
                        continue;
                    }
                    ctx.bind_color_texture(inport, TextureUnit(0));
                    // Each quadrant overwrites the cleared background
                    // regardless of prior depth.
                    ctx.set_depth_func(DepthFunc::Always);
                    ctx.draw_quad(Self::quadrant_transform(index));
                    ctx.set_depth_func(DepthFunc::Less);
                }
                if self.settings.show_grid {
                    ctx.set_depth_func(DepthFunc::Always);
                    ctx.draw_lines(
                        &[
                            [Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)],
                            [Vec2::new(0.0, 1.0), Vec2::new(0.0, -1.0)],
                        ],
                        self.settings.grid_color.to_vec4(),
                    );
                    ctx.set_depth_func(DepthFunc::Less);
                }
                ctx.deactivate_target(self.outport);
            }
            Some(inport) => {
                // The selected input is not ready: leave the previous output
                // untouched rather than clearing it.
                if !ctx.is_ready(inport) {
                    return Ok(());
                }
                ctx.activate_target(self.outport, "");
                ctx.clear();
                ctx.bind_color_texture(inport, TextureUnit(0));
                ctx.set_depth_func(DepthFunc::Always);
                ctx.draw_quad(QuadTransform::full());
                ctx.set_depth_func(DepthFunc::Less);
                ctx.deactivate_target(self.outport);
            }
        }
        Ok(())
    }

    fn on_event(&mut self, network: &mut Network, this: ProcessorHandle, event: &mut MouseEvent) {
        if event.action().contains(MouseAction::DOUBLE_CLICK)
            && self.settings.maximize_on_double_click
        {
            self.toggle_maximization(network, this, event);
            return;
        }
        if let Some(inport) = self.maximized_inport() {
            network.distribute_event(inport, event);
            return;
        }

        let pointer = MouseAction::MOTION
            | MouseAction::PRESSED
            | MouseAction::RELEASED
            | MouseAction::ENTER
            | MouseAction::EXIT;
        if event.action().intersects(pointer) {
            self.handle_tiled_pointer(network, event);
        } else {
            let quadrant = Self::quadrant_of(event);
            self.route_to_quadrant(network, quadrant, event);
        }
    }

    fn port_resized(
        &mut self,
        network: &mut Network,
        this: ProcessorHandle,
        port: PortHandle,
        size: UVec2,
    ) {
        network.resize_port(port, size);
        self.update_sizes(network);
        network.invalidate(this, InvalidationLevel::InvalidResult);
    }

    fn size_origin_changed(&mut self, _network: &mut Network, _this: ProcessorHandle, _port: PortHandle) {
        // The sub-views keep their own origins; nothing propagates through.
    }

    fn test_size_origin(
        &self,
        _network: &Network,
        _this: ProcessorHandle,
        _port: PortHandle,
        _origin: SizeOrigin,
    ) -> bool {
        // A composite view legitimately hosts several independent origins.
        true
    }
}
