//! Effect graph
//!
//! `topology` describes the wiring, `mapping` turns parameter values into node
//! settings and `effect_graph` renders the chain.

pub mod effect_graph;
pub mod mapping;
pub mod topology;

pub use effect_graph::{EffectGraph, GraphMode, GraphSettings};
pub use topology::{Edge, NodeKind, Topology};
