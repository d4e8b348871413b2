//! Parameter model
//!
//! The parameter vector, its snapshot store, constrained randomization and
//! preset catalogs. Nothing here touches the rendering graph.

pub mod preset;
pub mod random;
pub mod state;
pub mod store;

pub use preset::{Preset, PresetCatalog, PresetCategory};
pub use random::RandomizationEngine;
pub use state::{AudioState, Field, ParamSpec};
pub use store::ParameterStore;
