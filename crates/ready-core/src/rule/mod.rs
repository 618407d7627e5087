//! Rules: how chemicals react at each cell
//!
//! A rule is one of three kinds. Inbuilt rules are implemented in Rust and
//! looked up by name in an [`InbuiltRegistry`]. Formula and kernel rules are
//! user-supplied source run by a compute backend.

pub mod gray_scott;
pub mod registry;

pub use gray_scott::GrayScott;
pub use registry::InbuiltRegistry;

use crate::compute::Neighbourhood;
use crate::error::ReadyResult;
use crate::system::Parameters;
use serde::{Deserialize, Serialize};

/// The `type` attribute of a `<rule>` element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Inbuilt,
    Formula,
    Kernel,
}

impl RuleKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "inbuilt" => Some(RuleKind::Inbuilt),
            "formula" => Some(RuleKind::Formula),
            "kernel" => Some(RuleKind::Kernel),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Inbuilt => "inbuilt",
            RuleKind::Formula => "formula",
            RuleKind::Kernel => "kernel",
        }
    }

    /// Whether systems of this kind need a compute backend
    pub fn needs_compute(&self) -> bool {
        !matches!(self, RuleKind::Inbuilt)
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A rule implemented natively
pub trait InbuiltRule: Send + Sync + std::fmt::Debug {
    /// Name used in `<rule name="...">`
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Chemicals the rule reads and writes
    fn number_of_chemicals(&self) -> usize;

    /// Parameters with their default values
    fn default_parameters(&self) -> Parameters;

    /// Advance all chemicals by one timestep
    fn step(
        &self,
        chemicals: &mut [Vec<f64>],
        neighbourhood: &Neighbourhood,
        parameters: &Parameters,
    ) -> ReadyResult<()>;

    fn box_clone(&self) -> Box<dyn InbuiltRule>;
}

impl Clone for Box<dyn InbuiltRule> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_kind_names() {
        for kind in [RuleKind::Inbuilt, RuleKind::Formula, RuleKind::Kernel] {
            assert_eq!(RuleKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(RuleKind::from_name("Inbuilt"), None);
        assert!(RuleKind::Kernel.needs_compute());
        assert!(!RuleKind::Inbuilt.needs_compute());
    }
}
