//! GPU-based volume rendering engine core.
//!
//! The crate is organized around a network of render processors connected
//! through typed ports that exchange GPU render targets. Processors are
//! driven in dependency order by a network evaluator, sizes are negotiated
//! from downstream consumers towards upstream producers, and input events
//! travel the opposite way, from the output viewport into sub-views.

pub mod color;
pub mod error;
pub mod graphics;
pub mod input;
pub mod network;
pub mod processors;

#[cfg(test)]
mod testutil;
