//! Canvas renderer: the downstream consumer anchoring a render chain.

use crate::{
    error::VolrenResult,
    network::{
        Network, PortBuilder, PortHandle, ProcessorHandle, RenderContext, RenderPortConfig,
        RenderProcessor,
    },
};

/// Presents the rendering arriving at its inport on the device output.
///
/// The inport is a declared size origin: whatever resolution the embedding
/// layer requests for the canvas (via [`Network::resize_port`] on the
/// inport) is dictated to the whole upstream chain.
pub struct CanvasRenderer {
    inport: PortHandle,
}

impl CanvasRenderer {
    pub fn new(builder: &mut PortBuilder<'_>) -> Self {
        let inport = builder
            .render_inport_with("image.input", RenderPortConfig::inport().with_size_origin());
        Self { inport }
    }

    pub fn inport(&self) -> PortHandle {
        self.inport
    }
}

impl RenderProcessor for CanvasRenderer {
    fn is_ready(&self, network: &Network, _this: ProcessorHandle) -> bool {
        network.ports().is_ready(self.inport)
    }

    fn process(&mut self, ctx: &mut RenderContext<'_>) -> VolrenResult<()> {
        ctx.present(self.inport)
    }
}
