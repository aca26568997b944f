//! Processor networks: topology, size negotiation and event routing.

use crate::{
    error::{VolrenError, VolrenResult},
    graphics::device::Device,
    input::MouseEvent,
};
use glam::UVec2;
use log::{debug, error, warn};
use std::{borrow::Cow, collections::HashSet, fmt};

pub mod evaluator;
pub mod port;
pub mod port_group;
pub mod processor;
pub mod render_port;

pub use self::{
    evaluator::NetworkEvaluator,
    port::{InvalidationLevel, Port, PortDirection, PortHandle, PortKind, PortStore},
    port_group::PortGroup,
    processor::{RenderContext, RenderProcessor},
    render_port::{RenderPortConfig, SizeOrigin, DEFAULT_RENDER_SIZE},
};

use self::render_port::RenderPortData;

/// Error produced by the network layer.
#[derive(Clone, Debug)]
pub struct NetworkError {
    message: Cow<'static, str>,
}

impl NetworkError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_string(message: String) -> Self {
        Self {
            message: Cow::from(message),
        }
    }

    pub(crate) fn from_str(message: &'static str) -> Self {
        Self {
            message: Cow::from(message),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Handle to a processor in a [`Network`]. Generational, like port handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcessorHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

struct ProcessorSlot {
    name: String,
    ports: Vec<PortHandle>,
    invalidation: InvalidationLevel,
    initialized: bool,
    /// Taken out of the slot while one of the processor's hooks runs, so the
    /// hook can be handed the network without aliasing. An empty slot during
    /// delivery therefore also doubles as a reentrancy guard.
    state: Option<Box<dyn RenderProcessor>>,
}

struct SlotEntry {
    generation: u32,
    slot: Option<ProcessorSlot>,
}

/// Registers the ports of a processor while it is being added to a network.
pub struct PortBuilder<'a> {
    ports: &'a mut PortStore,
    owner: ProcessorHandle,
    owner_name: &'a str,
    sharing: bool,
    created: Vec<PortHandle>,
}

impl<'a> PortBuilder<'a> {
    /// Registers a render outport with default configuration.
    pub fn render_outport(&mut self, name: &str) -> PortHandle {
        self.render_outport_with(name, RenderPortConfig::outport())
    }

    pub fn render_outport_with(&mut self, name: &str, config: RenderPortConfig) -> PortHandle {
        self.add(name, PortDirection::Out, config)
    }

    /// Registers a render inport with default configuration.
    pub fn render_inport(&mut self, name: &str) -> PortHandle {
        self.render_inport_with(name, RenderPortConfig::inport())
    }

    pub fn render_inport_with(&mut self, name: &str, config: RenderPortConfig) -> PortHandle {
        self.add(name, PortDirection::In, config)
    }

    fn add(&mut self, name: &str, direction: PortDirection, config: RenderPortConfig) -> PortHandle {
        let duplicate = self.created.iter().any(|&handle| {
            self.ports
                .get(handle)
                .map(|port| port.name() == name)
                .unwrap_or(false)
        });
        if duplicate {
            error!(
                "Processor '{}' already has a port named '{}'.",
                self.owner_name, name
            );
        }
        let handle = self.ports.insert(Port::new(
            name.to_string(),
            direction,
            self.owner,
            self.owner_name.to_string(),
            config.allow_multiple,
            config.invalidation,
            PortKind::Render(RenderPortData::new(&config)),
        ));
        if direction == PortDirection::Out && self.sharing {
            self.ports.set_target_sharing(handle, true);
        }
        self.created.push(handle);
        handle
    }
}

/// A network of render processors connected through ports.
///
/// The network owns the processors, the port store and the graphics device;
/// everything a processor needs reaches it through an explicit context. All
/// operations run on the single rendering thread.
pub struct Network {
    slots: Vec<SlotEntry>,
    ports: PortStore,
    device: Box<dyn Device>,
    target_sharing: bool,
}

impl Network {
    pub fn new(device: Box<dyn Device>) -> Self {
        Self {
            slots: Vec::new(),
            ports: PortStore::new(),
            device,
            target_sharing: false,
        }
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }

    pub fn ports(&self) -> &PortStore {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut PortStore {
        &mut self.ports
    }

    /// Whether render outports hand target ownership to the evaluator.
    pub fn target_sharing(&self) -> bool {
        self.target_sharing
    }

    /// Switches target sharing for all current and future render outports.
    pub fn set_target_sharing(&mut self, enabled: bool) {
        self.target_sharing = enabled;
        let outports: Vec<PortHandle> = self
            .processor_handles()
            .into_iter()
            .flat_map(|handle| self.render_outports(handle))
            .collect();
        for outport in outports {
            self.ports.set_target_sharing(outport, enabled);
        }
    }

    /// Adds a processor. The builder closure registers the processor's ports
    /// and returns the processor itself.
    pub fn add_processor<P, F>(&mut self, name: &str, build: F) -> ProcessorHandle
    where
        P: RenderProcessor + 'static,
        F: FnOnce(&mut PortBuilder<'_>) -> P,
    {
        let index = self.slots.len() as u32;
        let handle = ProcessorHandle {
            index,
            generation: 0,
        };
        self.slots.push(SlotEntry {
            generation: 0,
            slot: None,
        });

        let mut builder = PortBuilder {
            ports: &mut self.ports,
            owner: handle,
            owner_name: name,
            sharing: self.target_sharing,
            created: Vec::new(),
        };
        let processor = build(&mut builder);
        let created = builder.created;

        self.slots[index as usize].slot = Some(ProcessorSlot {
            name: name.to_string(),
            ports: created,
            invalidation: InvalidationLevel::InvalidProcessor,
            initialized: false,
            state: Some(Box::new(processor)),
        });
        handle
    }

    /// Removes a processor: disconnects its ports (re-propagating size
    /// origins), releases its render targets and frees its port slots.
    pub fn remove_processor(&mut self, handle: ProcessorHandle) -> VolrenResult<()> {
        let port_list = match self.entry(handle) {
            Some(slot) => slot.ports.clone(),
            None => {
                return Err(VolrenError::NetworkError(NetworkError::from_str(
                    "Could not remove unknown processor.",
                )))
            }
        };

        for &port in &port_list {
            let (is_outport, peers) = match self.ports.get(port) {
                Some(port) => (port.is_outport(), port.connections().to_vec()),
                None => continue,
            };
            for peer in peers {
                let result = if is_outport {
                    self.disconnect(port, peer)
                } else {
                    self.disconnect(peer, port)
                };
                if let Err(err) = result {
                    warn!("Could not disconnect while removing processor: {}", err);
                }
            }
        }

        for &port in &port_list {
            let Network { ports, device, .. } = self;
            ports.deinitialize_port(port, device.as_mut());
            ports.remove(port);
        }

        let entry = &mut self.slots[handle.index as usize];
        entry.slot = None;
        entry.generation += 1;
        Ok(())
    }

    pub fn processor_name(&self, handle: ProcessorHandle) -> Option<&str> {
        self.entry(handle).map(|slot| slot.name.as_str())
    }

    /// All live processors, in insertion order.
    pub fn processor_handles(&self) -> Vec<ProcessorHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry.slot.as_ref().map(|_| ProcessorHandle {
                    index: index as u32,
                    generation: entry.generation,
                })
            })
            .collect()
    }

    /// The ports a processor registered, in registration order.
    pub fn ports_of(&self, handle: ProcessorHandle) -> &[PortHandle] {
        self.entry(handle)
            .map(|slot| slot.ports.as_slice())
            .unwrap_or(&[])
    }

    pub fn render_inports(&self, handle: ProcessorHandle) -> Vec<PortHandle> {
        self.ports_by_direction(handle, PortDirection::In)
    }

    pub fn render_outports(&self, handle: ProcessorHandle) -> Vec<PortHandle> {
        self.ports_by_direction(handle, PortDirection::Out)
    }

    fn ports_by_direction(&self, handle: ProcessorHandle, direction: PortDirection) -> Vec<PortHandle> {
        self.ports_of(handle)
            .iter()
            .copied()
            .filter(|&port| {
                self.ports
                    .get(port)
                    .map(|port| port.direction() == direction && port.render().is_some())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Processors directly consuming any of the given processor's outports.
    pub fn downstream_processors(&self, handle: ProcessorHandle) -> Vec<ProcessorHandle> {
        let mut downstream = Vec::new();
        for outport in self.render_outports(handle) {
            let consumers = match self.ports.get(outport) {
                Some(port) => port.connections().to_vec(),
                None => continue,
            };
            for consumer in consumers {
                if let Some(port) = self.ports.get(consumer) {
                    if !downstream.contains(&port.owner()) {
                        downstream.push(port.owner());
                    }
                }
            }
        }
        downstream
    }

    pub fn invalidation(&self, handle: ProcessorHandle) -> InvalidationLevel {
        self.entry(handle)
            .map(|slot| slot.invalidation)
            .unwrap_or(InvalidationLevel::Valid)
    }

    pub fn is_initialized(&self, handle: ProcessorHandle) -> bool {
        self.entry(handle).map(|slot| slot.initialized).unwrap_or(false)
    }

    /// Raises the processor's invalidation level and cascades an
    /// `InvalidResult` to every downstream consumer. Monotonic, so cascades
    /// terminate even on (malformed) cyclic topologies.
    pub fn invalidate(&mut self, handle: ProcessorHandle, level: InvalidationLevel) {
        let raised = match self.entry_mut(handle) {
            Some(slot) => {
                if level > slot.invalidation {
                    slot.invalidation = level;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if raised {
            for consumer in self.downstream_processors(handle) {
                self.invalidate(consumer, InvalidationLevel::InvalidResult);
            }
        }
    }

    pub(crate) fn mark_valid(&mut self, handle: ProcessorHandle) {
        if let Some(slot) = self.entry_mut(handle) {
            slot.invalidation = InvalidationLevel::Valid;
        }
    }

    /// Whether a connection between the two ports would pass the
    /// compatibility predicate.
    pub fn test_connectivity(&self, outport: PortHandle, inport: PortHandle) -> bool {
        self.connect_failure_reason(outport, inport).is_none()
    }

    fn connect_failure_reason(&self, outport: PortHandle, inport: PortHandle) -> Option<String> {
        let producer = match self.ports.get(outport) {
            Some(port) => port,
            None => return Some("unknown outport handle".to_string()),
        };
        let consumer = match self.ports.get(inport) {
            Some(port) => port,
            None => return Some("unknown inport handle".to_string()),
        };
        if !producer.is_outport() {
            return Some(format!("'{}' is not an outport", producer.qualified_name()));
        }
        if !consumer.is_inport() {
            return Some(format!("'{}' is not an inport", consumer.qualified_name()));
        }
        if producer.owner() == consumer.owner() {
            return Some("both ports belong to the same processor".to_string());
        }
        if producer.is_connected_to(inport) {
            return Some("the ports are already connected".to_string());
        }
        if !consumer.allows_multiple_connections() && consumer.is_connected() {
            return Some(format!(
                "inport '{}' already has a connection",
                consumer.qualified_name()
            ));
        }
        if !producer.allows_multiple_connections() && producer.is_connected() {
            return Some(format!(
                "outport '{}' already has a connection",
                producer.qualified_name()
            ));
        }
        if !producer.kind_matches(consumer) {
            return Some("incompatible port kinds".to_string());
        }
        if self.would_create_cycle(producer.owner(), consumer.owner()) {
            return Some("the connection would create a cycle".to_string());
        }
        if let Some(origin) = self.ports.size_origin(inport) {
            if self.ports.size_origin(outport) != Some(origin)
                && !self.test_size_origin_on(outport, origin)
            {
                return Some("conflicting size origins".to_string());
            }
        }
        None
    }

    fn would_create_cycle(&self, producer: ProcessorHandle, consumer: ProcessorHandle) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![consumer];
        while let Some(current) = stack.pop() {
            if current == producer {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.downstream_processors(current));
        }
        false
    }

    /// Asks the outport's owning processor whether it accepts the given size
    /// origin on that port.
    pub(crate) fn test_size_origin_on(&self, outport: PortHandle, origin: SizeOrigin) -> bool {
        let owner = match self.ports.get(outport) {
            Some(port) => port.owner(),
            None => return true,
        };
        match self.entry(owner).and_then(|slot| slot.state.as_ref()) {
            Some(state) => state.test_size_origin(self, owner, outport, origin),
            None => true,
        }
    }

    /// Connects an outport to an inport.
    ///
    /// The connection is only established when the compatibility predicate
    /// passes; a failed predicate reports why without touching the network.
    /// On success the consumer side is invalidated, the inport's size-origin
    /// token is propagated upstream and, when such a token exists, the
    /// inport's negotiated size is replayed through the producer's
    /// `port_resized` hook.
    pub fn connect(&mut self, outport: PortHandle, inport: PortHandle) -> VolrenResult<()> {
        if let Some(reason) = self.connect_failure_reason(outport, inport) {
            return Err(VolrenError::NetworkError(NetworkError::from_string(format!(
                "Could not connect '{}' to '{}': {}.",
                self.ports.display_name(outport),
                self.ports.display_name(inport),
                reason
            ))));
        }

        if let Some(port) = self.ports.get_mut(outport) {
            port.connections_mut().push(inport);
        }
        if let Some(port) = self.ports.get_mut(inport) {
            port.connections_mut().push(outport);
        }

        let consumer_owner = self.ports.get(inport).map(Port::owner);
        let consumer_level = self
            .ports
            .get(inport)
            .map(Port::invalidation_level)
            .unwrap_or(InvalidationLevel::InvalidResult);
        if let Some(owner) = consumer_owner {
            self.invalidate(owner, consumer_level);
        }

        self.size_origin_changed_on_outport(outport);
        if self.ports.size_origin(inport).is_some() {
            let size = self.ports.render_size(inport);
            if let Some(owner) = self.ports.get(outport).map(Port::owner) {
                self.notify_port_resized(owner, outport, size);
            }
        }
        Ok(())
    }

    /// Removes the connection between the two ports. If the origin visible
    /// through the outport changed, the new (possibly absent) origin is
    /// re-propagated upstream.
    pub fn disconnect(&mut self, outport: PortHandle, inport: PortHandle) -> VolrenResult<()> {
        let connected = self
            .ports
            .get(outport)
            .map(|port| port.is_connected_to(inport))
            .unwrap_or(false);
        if !connected {
            return Err(VolrenError::NetworkError(NetworkError::from_string(format!(
                "Could not disconnect '{}' from '{}': the ports are not connected.",
                self.ports.display_name(outport),
                self.ports.display_name(inport)
            ))));
        }

        let origin_before = self.ports.size_origin(outport);
        if let Some(port) = self.ports.get_mut(outport) {
            port.connections_mut().retain(|&peer| peer != inport);
        }
        if let Some(port) = self.ports.get_mut(inport) {
            port.connections_mut().retain(|&peer| peer != outport);
        }

        if self.ports.size_origin(outport) != origin_before {
            self.size_origin_changed_on_outport(outport);
        }

        let consumer_owner = self.ports.get(inport).map(Port::owner);
        let consumer_level = self
            .ports
            .get(inport)
            .map(Port::invalidation_level)
            .unwrap_or(InvalidationLevel::InvalidResult);
        if let Some(owner) = consumer_owner {
            self.invalidate(owner, consumer_level);
        }
        Ok(())
    }

    /// Resizes a render port.
    ///
    /// Outports adopt the size directly. Inports record it as their request
    /// and, when they carry a size-origin token, replay it upstream through
    /// every connected producer's `port_resized` hook.
    pub fn resize_port(&mut self, port: PortHandle, size: UVec2) {
        let direction = match self.ports.get(port) {
            Some(port) => port.direction(),
            None => {
                error!("resize_port() called with an unknown port handle.");
                return;
            }
        };
        match direction {
            PortDirection::Out => {
                let Network { ports, device, .. } = self;
                ports.resize_outport(port, device.as_mut(), size);
            }
            PortDirection::In => {
                self.ports.set_render_size(port, size);
                if self.ports.size_origin(port).is_none() {
                    return;
                }
                let producers = self
                    .ports
                    .get(port)
                    .map(|port| port.connections().to_vec())
                    .unwrap_or_default();
                for producer in producers {
                    if let Some(owner) = self.ports.get(producer).map(Port::owner) {
                        self.notify_port_resized(owner, producer, size);
                    }
                }
            }
        }
    }

    fn notify_port_resized(&mut self, owner: ProcessorHandle, port: PortHandle, size: UVec2) {
        let delivered = self
            .with_processor_mut(owner, |state, network| {
                state.port_resized(network, owner, port, size);
            })
            .is_some();
        if !delivered {
            debug!("Dropped port_resized notification for a processor already being notified.");
        }
    }

    /// Notifies an outport's owner that the origin visible through the port
    /// may have changed, invalidating the port's result.
    pub(crate) fn size_origin_changed_on_outport(&mut self, outport: PortHandle) {
        let owner = match self.ports.get(outport) {
            Some(port) if port.is_outport() => port.owner(),
            _ => return,
        };
        self.ports.invalidate_result(outport);
        let delivered = self
            .with_processor_mut(owner, |state, network| {
                state.size_origin_changed(network, owner, outport);
            })
            .is_some();
        if !delivered {
            debug!("Dropped size_origin_changed notification for a processor already being notified.");
        }
    }

    /// Installs an origin token on an inport and carries it further
    /// upstream, resizing producers to the inport's negotiated size.
    /// Declared origins are never overwritten.
    pub(crate) fn propagate_size_origin(&mut self, inport: PortHandle, origin: Option<SizeOrigin>) {
        let port = match self.ports.get(inport) {
            Some(port) => port,
            None => return,
        };
        if !port.is_inport() || port.render().is_none() {
            return;
        }
        if self.ports.is_declared_size_origin(inport) {
            return;
        }
        if self.ports.size_origin(inport) == origin {
            return;
        }
        let size = self.ports.render_size(inport);
        let producers = port.connections().to_vec();
        self.ports.set_inherited_origin(inport, origin);
        for producer in producers {
            self.size_origin_changed_on_outport(producer);
            if origin.is_some() {
                self.resize_port(producer, size);
            }
        }
    }

    /// Delivers an event to a processor, resetting its accepted state first
    /// so recipients decide whether to consume it.
    pub fn dispatch_event(&mut self, processor: ProcessorHandle, event: &mut MouseEvent) {
        event.ignore();
        self.deliver_event(processor, event);
    }

    fn deliver_event(&mut self, processor: ProcessorHandle, event: &mut MouseEvent) {
        let delivered = self
            .with_processor_mut(processor, |state, network| {
                state.on_event(network, processor, event);
            })
            .is_some();
        if !delivered {
            debug!("Dropped event for a processor that is gone or already handling an event.");
        }
    }

    /// Sends an event upstream through an inport: each connected producer's
    /// processor receives it until one accepts.
    pub fn distribute_event(&mut self, inport: PortHandle, event: &mut MouseEvent) {
        let port = match self.ports.get(inport) {
            Some(port) => port,
            None => {
                error!("distribute_event() called with an unknown port handle.");
                return;
            }
        };
        if !port.is_inport() {
            error!(
                "distribute_event() called on outport '{}'.",
                port.qualified_name()
            );
            return;
        }
        let producers = port.connections().to_vec();
        for producer in producers {
            if event.is_accepted() {
                break;
            }
            if let Some(owner) = self.ports.get(producer).map(Port::owner) {
                self.deliver_event(owner, event);
            }
        }
    }

    /// Runs the processor's `initialize` hook once.
    pub fn initialize_processor(&mut self, handle: ProcessorHandle) -> VolrenResult<()> {
        match self.entry(handle) {
            Some(slot) if slot.initialized => {
                error!("Processor '{}' is already initialized.", slot.name);
                return Ok(());
            }
            Some(_) => {}
            None => {
                return Err(VolrenError::NetworkError(NetworkError::from_str(
                    "Could not initialize unknown processor.",
                )))
            }
        }
        match self.with_processor_ctx(handle, |state, ctx| state.initialize(ctx)) {
            Some(result) => {
                result?;
                if let Some(slot) = self.entry_mut(handle) {
                    slot.initialized = true;
                }
                Ok(())
            }
            None => Err(VolrenError::NetworkError(NetworkError::from_str(
                "Could not initialize processor while it is busy.",
            ))),
        }
    }

    /// Runs the processor's `deinitialize` hook if it was initialized.
    pub fn deinitialize_processor(&mut self, handle: ProcessorHandle) -> VolrenResult<()> {
        match self.entry(handle) {
            Some(slot) if !slot.initialized => {
                warn!("Processor '{}' was never initialized.", slot.name);
                return Ok(());
            }
            Some(_) => {}
            None => {
                return Err(VolrenError::NetworkError(NetworkError::from_str(
                    "Could not deinitialize unknown processor.",
                )))
            }
        }
        match self.with_processor_ctx(handle, |state, ctx| state.deinitialize(ctx)) {
            Some(result) => {
                result?;
                if let Some(slot) = self.entry_mut(handle) {
                    slot.initialized = false;
                }
                Ok(())
            }
            None => Err(VolrenError::NetworkError(NetworkError::from_str(
                "Could not deinitialize processor while it is busy.",
            ))),
        }
    }

    /// Runs the processor's `process` hook.
    pub fn process_processor(&mut self, handle: ProcessorHandle) -> VolrenResult<()> {
        match self.with_processor_ctx(handle, |state, ctx| state.process(ctx)) {
            Some(result) => result,
            None => Err(VolrenError::NetworkError(NetworkError::from_str(
                "Could not process unknown or busy processor.",
            ))),
        }
    }

    pub fn is_processor_ready(&self, handle: ProcessorHandle) -> bool {
        match self.entry(handle).and_then(|slot| slot.state.as_ref()) {
            Some(state) => state.is_ready(self, handle),
            None => false,
        }
    }

    fn entry(&self, handle: ProcessorHandle) -> Option<&ProcessorSlot> {
        let entry = self.slots.get(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        entry.slot.as_ref()
    }

    fn entry_mut(&mut self, handle: ProcessorHandle) -> Option<&mut ProcessorSlot> {
        let entry = self.slots.get_mut(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        entry.slot.as_mut()
    }

    /// Takes the processor out of its slot, runs the action with both the
    /// processor and the network, and puts it back. Returns `None` when the
    /// processor is missing or its slot is empty because one of its hooks is
    /// already running further down the call stack.
    fn with_processor_mut<R>(
        &mut self,
        handle: ProcessorHandle,
        action: impl FnOnce(&mut dyn RenderProcessor, &mut Network) -> R,
    ) -> Option<R> {
        let mut state = self.entry_mut(handle)?.state.take()?;
        let result = action(state.as_mut(), self);
        if let Some(slot) = self.entry_mut(handle) {
            slot.state = Some(state);
        } else {
            warn!("Processor was removed while one of its hooks was running.");
        }
        Some(result)
    }

    /// Like `with_processor_mut`, but hands the action a render context over
    /// the port store and device instead of the whole network.
    fn with_processor_ctx<R>(
        &mut self,
        handle: ProcessorHandle,
        action: impl FnOnce(&mut dyn RenderProcessor, &mut RenderContext<'_>) -> R,
    ) -> Option<R> {
        let mut state = self.entry_mut(handle)?.state.take()?;
        let result = {
            let Network {
                slots,
                ports,
                device,
                ..
            } = self;
            let slot = slots
                .get(handle.index as usize)
                .filter(|entry| entry.generation == handle.generation)
                .and_then(|entry| entry.slot.as_ref());
            slot.map(|slot| {
                let mut ctx = RenderContext::new(ports, device.as_mut(), &slot.name, &slot.ports);
                action(state.as_mut(), &mut ctx)
            })
        };
        if let Some(slot) = self.entry_mut(handle) {
            slot.state = Some(state);
        } else {
            warn!("Processor was removed while one of its hooks was running.");
        }
        result
    }
}
