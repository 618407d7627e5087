//! ready-core - Reaction-diffusion system model and loader
//!
//! This crate turns RD files (VTK XML datasets carrying an `RD` descriptor)
//! into runnable reaction-diffusion systems, and writes them back.
//!
//! # Key Components
//!
//! - **SystemFactory**: Loads a file into the right system variant
//! - **ReactionDiffusionSystem**: The common contract of image and mesh systems
//! - **RuleEngine**: Inbuilt rules, or formula and kernel rules on a compute backend
//! - **Properties**: Typed render settings with XML overlay
//! - **InitialPatternGenerator**: Overlays that seed chemical concentrations
//! - **Compute**: Backend traits plus a CPU backend for formula rules
//!
//! # Topologies and rules
//!
//! A system is one of two topologies (regular grid, unstructured mesh)
//! paired with one of three rule kinds (inbuilt, formula, kernel), giving
//! six concrete combinations behind a single trait.

pub mod adapter;
pub mod compute;
pub mod config;
pub mod error;
pub mod factory;
pub mod locale;
pub mod pattern;
pub mod properties;
pub mod rule;
pub mod system;

pub use compute::{
    BackendProvider, ComputeBackend, ComputeTarget, HostBackend, HostBackendProvider,
    KernelProgram, Neighbourhood,
};
pub use config::{ConfigError, ReadyConfig};
pub use error::*;
pub use factory::{save_to_file, ComputeOptions, LoadedSystem, SystemFactory};
pub use locale::NumericLocaleGuard;
pub use pattern::InitialPatternGenerator;
pub use properties::{Axis, Properties, Property, PropertyValue};
pub use rule::{GrayScott, InbuiltRegistry, InbuiltRule, RuleKind};
pub use system::{
    chemical_index, chemical_name, ImageRd, MeshRd, Parameters, ReactionDiffusionSystem,
    RuleEngine, SystemCore,
};

// Container and encoding types callers need alongside the factory
pub use ready_io::{DataFormat, ScalarType, Topology};
