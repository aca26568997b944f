//! Port base types and storage.

use super::{render_port::RenderPortData, ProcessorHandle};
use std::mem;

/// Direction of a port relative to its owning processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    In,
    Out,
}

/// How strongly a change arriving at a port invalidates its owning
/// processor. Levels are ordered; higher levels subsume lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InvalidationLevel {
    Valid,
    InvalidResult,
    InvalidPorts,
    InvalidProcessor,
}

/// Handle to a port slot in a [`PortStore`].
///
/// Handles are generational: removing a port bumps its slot's generation, so
/// handles to removed ports can never alias a port that later reuses the
/// slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// The closed set of port payloads.
///
/// Connection endpoints are compared by payload kind during compatibility
/// checks, and components query a typed view instead of downcasting.
#[derive(Debug)]
pub enum PortKind {
    Render(RenderPortData),
}

/// A connection endpoint on a processor.
#[derive(Debug)]
pub struct Port {
    name: String,
    direction: PortDirection,
    owner: ProcessorHandle,
    owner_name: String,
    allow_multiple: bool,
    invalidation: InvalidationLevel,
    connections: Vec<PortHandle>,
    kind: PortKind,
}

impl Port {
    pub(crate) fn new(
        name: String,
        direction: PortDirection,
        owner: ProcessorHandle,
        owner_name: String,
        allow_multiple: bool,
        invalidation: InvalidationLevel,
        kind: PortKind,
    ) -> Self {
        Self {
            name,
            direction,
            owner,
            owner_name,
            allow_multiple,
            invalidation,
            connections: Vec::new(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The port name qualified with its owning processor's name, used for
    /// diagnostics and debug labels.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner_name, self.name)
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn is_inport(&self) -> bool {
        self.direction == PortDirection::In
    }

    pub fn is_outport(&self) -> bool {
        self.direction == PortDirection::Out
    }

    pub fn owner(&self) -> ProcessorHandle {
        self.owner
    }

    pub fn allows_multiple_connections(&self) -> bool {
        self.allow_multiple
    }

    /// The invalidation level signaled to the owning processor when the
    /// port's connectivity or content changes.
    pub fn invalidation_level(&self) -> InvalidationLevel {
        self.invalidation
    }

    /// Connected ports, in the order the connections were established.
    pub fn connections(&self) -> &[PortHandle] {
        &self.connections
    }

    pub(crate) fn connections_mut(&mut self) -> &mut Vec<PortHandle> {
        &mut self.connections
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn is_connected_to(&self, other: PortHandle) -> bool {
        self.connections.contains(&other)
    }

    /// Whether this port's payload kind matches another port's, the
    /// type-compatibility half of the connection predicate.
    pub fn kind_matches(&self, other: &Port) -> bool {
        mem::discriminant(&self.kind) == mem::discriminant(&other.kind)
    }

    /// Typed view of the render payload, if this is a render port.
    pub fn render(&self) -> Option<&RenderPortData> {
        match self.kind {
            PortKind::Render(ref data) => Some(data),
        }
    }

    pub fn render_mut(&mut self) -> Option<&mut RenderPortData> {
        match self.kind {
            PortKind::Render(ref mut data) => Some(data),
        }
    }
}

struct Slot {
    generation: u32,
    port: Option<Port>,
}

/// Generational arena holding every port of a network.
#[derive(Default)]
pub struct PortStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl PortStore {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, port: Port) -> PortHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.port = Some(port);
                PortHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    port: Some(port),
                });
                PortHandle {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub fn remove(&mut self, handle: PortHandle) -> Option<Port> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.port.is_none() {
            return None;
        }
        let port = slot.port.take();
        slot.generation += 1;
        self.free.push(handle.index);
        port
    }

    pub fn get(&self, handle: PortHandle) -> Option<&Port> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.port.as_ref()
    }

    pub fn get_mut(&mut self, handle: PortHandle) -> Option<&mut Port> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.port.as_mut()
    }

    pub fn contains(&self, handle: PortHandle) -> bool {
        self.get(handle).is_some()
    }

    /// A printable name for the given handle, usable even when the handle is
    /// stale.
    pub fn display_name(&self, handle: PortHandle) -> String {
        match self.get(handle) {
            Some(port) => port.qualified_name(),
            None => format!("<removed port {}v{}>", handle.index, handle.generation),
        }
    }
}
