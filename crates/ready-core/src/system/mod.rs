//! Reaction-diffusion systems
//!
//! A system is the pairing of a rule engine with a spatial representation.
//! The rule engine is one of:
//!
//! - an inbuilt rule implemented in Rust (no compute backend),
//! - a formula rule run by a compute backend,
//! - a full kernel run by a compute backend.
//!
//! The spatial representation is either a regular grid ([`ImageRd`]) or an
//! unstructured mesh ([`MeshRd`]). Both share a [`SystemCore`] holding the
//! chemicals, parameters and descriptor state, and implement
//! [`ReactionDiffusionSystem`].

pub mod image;
pub mod mesh;
pub mod params;

pub use image::ImageRd;
pub use mesh::MeshRd;
pub use params::Parameters;

use crate::compute::{ComputeBackend, ComputeTarget, KernelProgram, Neighbourhood};
use crate::error::{validation, FormatError, ReadyResult};
use crate::pattern::{InitialPatternGenerator, PatternDomain};
use crate::properties::Properties;
use crate::rule::{InbuiltRule, RuleKind};
use ready_io::{DataObject, ImageData, ScalarType, Topology, UnstructuredGrid, XmlElement};
use std::path::{Path, PathBuf};

/// Format version written by this crate
pub const CURRENT_FORMAT_VERSION: i64 = 6;

/// Oldest format version that can still be read
pub const OLDEST_READABLE_FORMAT_VERSION: i64 = 1;

/// Name of the chemical at `index`: `a`..`z`, then `aa`, `ab`...
pub fn chemical_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Index of a chemical name, the inverse of [`chemical_name`]
pub fn chemical_index(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    let n = name
        .bytes()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add((b - b'a') as usize + 1)
        })?;
    Some(n - 1)
}

/// User source bound to a compute backend
#[derive(Debug)]
pub struct DeviceRule {
    source: String,
    declared_chemicals: Option<usize>,
    block_size: [usize; 3],
    backend: Box<dyn ComputeBackend>,
    compiled: bool,
}

impl DeviceRule {
    pub fn new(backend: Box<dyn ComputeBackend>) -> Self {
        Self {
            source: String::new(),
            declared_chemicals: None,
            block_size: [1, 1, 1],
            backend,
            compiled: false,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.compiled = false;
    }

    pub fn block_size(&self) -> [usize; 3] {
        self.block_size
    }

    pub fn target(&self) -> ComputeTarget {
        self.backend.target()
    }
}

/// The computational engine behind a system
#[derive(Debug)]
pub enum RuleEngine {
    Inbuilt(Box<dyn InbuiltRule>),
    Formula(DeviceRule),
    Kernel(DeviceRule),
}

impl RuleEngine {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleEngine::Inbuilt(_) => RuleKind::Inbuilt,
            RuleEngine::Formula(_) => RuleKind::Formula,
            RuleEngine::Kernel(_) => RuleKind::Kernel,
        }
    }

    /// Chemical count the rule requires, if it fixes one
    pub fn declared_chemicals(&self) -> Option<usize> {
        match self {
            RuleEngine::Inbuilt(rule) => Some(rule.number_of_chemicals()),
            RuleEngine::Formula(device) | RuleEngine::Kernel(device) => device.declared_chemicals,
        }
    }

    /// The bound compute target; inbuilt rules have none
    pub fn compute_target(&self) -> Option<ComputeTarget> {
        match self {
            RuleEngine::Inbuilt(_) => None,
            RuleEngine::Formula(device) | RuleEngine::Kernel(device) => Some(device.target()),
        }
    }

    fn invalidate(&mut self) {
        if let RuleEngine::Formula(device) | RuleEngine::Kernel(device) = self {
            device.compiled = false;
        }
    }
}

/// State shared by every system regardless of topology
#[derive(Debug)]
pub struct SystemCore {
    engine: RuleEngine,
    rule_name: String,
    description: String,
    parameters: Parameters,
    wrap: bool,
    dimensions: [usize; 3],
    chemicals: Vec<Vec<f64>>,
    scalar_type: ScalarType,
    pattern: InitialPatternGenerator,
    timesteps_taken: u64,
    filename: Option<PathBuf>,
    modified: bool,
}

impl SystemCore {
    pub fn new(engine: RuleEngine) -> Self {
        let (rule_name, parameters) = match &engine {
            RuleEngine::Inbuilt(rule) => (rule.name().to_string(), rule.default_parameters()),
            _ => (String::new(), Parameters::new()),
        };
        let scalar_type = engine
            .compute_target()
            .map(|t| t.scalar_type)
            .unwrap_or(ScalarType::Float32);
        Self {
            engine,
            rule_name,
            description: String::new(),
            parameters,
            wrap: true,
            dimensions: [1, 1, 1],
            chemicals: Vec::new(),
            scalar_type,
            pattern: InitialPatternGenerator::default(),
            timesteps_taken: 0,
            filename: None,
            modified: false,
        }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn number_of_cells(&self) -> usize {
        self.dimensions.iter().product()
    }

    fn resize_chemicals(&mut self, n_chemicals: usize) {
        let n_cells = self.number_of_cells();
        self.chemicals.resize_with(n_chemicals, Vec::new);
        for field in &mut self.chemicals {
            field.resize(n_cells, 0.0);
        }
        self.engine.invalidate();
    }

    /// Replace every chemical field; `channels` must match the current sizes
    fn copy_channels(&mut self, channels: Vec<Vec<f64>>) -> ReadyResult<()> {
        if channels.len() != self.chemicals.len() {
            return Err(FormatError::ChemicalCountMismatch {
                rule: self.rule_name.clone(),
                declared: self.chemicals.len(),
                found: channels.len(),
            }
            .into());
        }
        let n_cells = self.number_of_cells();
        if let Some(bad) = channels.iter().find(|c| c.len() != n_cells) {
            return Err(FormatError::InvalidValue {
                element: "DataArray".to_string(),
                message: format!("expected {} values, found {}", n_cells, bad.len()),
            }
            .into());
        }
        self.chemicals = channels;
        self.modified = true;
        Ok(())
    }

    fn read_descriptor(&mut self, rd: &XmlElement, warn_to_update: &mut bool) -> ReadyResult<()> {
        match rd.parse_attribute::<i64>("format_version")? {
            Some(version) if version < OLDEST_READABLE_FORMAT_VERSION => {
                return Err(FormatError::UnreadableVersion { version }.into());
            }
            Some(CURRENT_FORMAT_VERSION) => {}
            Some(version) => {
                tracing::warn!(
                    version,
                    current = CURRENT_FORMAT_VERSION,
                    "file uses a different format version; re-save to update"
                );
                *warn_to_update = true;
            }
            None => {
                tracing::warn!("file has no format_version; assuming the oldest format");
                *warn_to_update = true;
            }
        }

        self.description = rd
            .child("description")
            .map(|d| d.text().to_string())
            .unwrap_or_default();

        let rule = rd
            .child("rule")
            .ok_or_else(|| FormatError::Malformed("RD element has no <rule>".to_string()))?;
        let declared_type = rule.required_attribute("type")?;
        if RuleKind::from_name(declared_type) != Some(self.engine.kind()) {
            return Err(FormatError::InvalidValue {
                element: "rule".to_string(),
                message: format!(
                    "rule type '{}' does not match a {} system",
                    declared_type,
                    self.engine.kind()
                ),
            }
            .into());
        }
        self.rule_name = rule.required_attribute("name")?.to_string();
        self.wrap = rule.parse_bool_attribute("wrap")?.unwrap_or(true);

        match &mut self.engine {
            RuleEngine::Inbuilt(inbuilt) => {
                self.parameters = inbuilt.default_parameters();
            }
            RuleEngine::Formula(device) => {
                self.parameters = Parameters::new();
                let formula = rule.child("formula").ok_or_else(|| {
                    FormatError::Malformed("formula rule has no <formula>".to_string())
                })?;
                device.declared_chemicals = formula.parse_attribute("number_of_chemicals")?;
                device.set_source(formula.text());
            }
            RuleEngine::Kernel(device) => {
                self.parameters = Parameters::new();
                let kernel = rule.child("kernel").ok_or_else(|| {
                    FormatError::Malformed("kernel rule has no <kernel>".to_string())
                })?;
                device.declared_chemicals = kernel.parse_attribute("number_of_chemicals")?;
                device.block_size = [
                    kernel.parse_attribute("block_size_x")?.unwrap_or(1),
                    kernel.parse_attribute("block_size_y")?.unwrap_or(1),
                    kernel.parse_attribute("block_size_z")?.unwrap_or(1),
                ];
                device.set_source(kernel.text());
            }
        }
        self.parameters.read_from_rule(rule)?;

        self.pattern = match rd.child("initial_pattern_generator") {
            Some(element) => InitialPatternGenerator::from_xml(element)?,
            None => InitialPatternGenerator::default(),
        };

        tracing::debug!(
            rule_type = %self.engine.kind(),
            rule_name = %self.rule_name,
            parameters = self.parameters.len(),
            "read RD descriptor"
        );
        Ok(())
    }

    fn write_descriptor(&self, properties: &Properties) -> XmlElement {
        let mut rule = XmlElement::new("rule")
            .with_attribute("type", self.engine.kind().name())
            .with_attribute("name", &self.rule_name)
            .with_attribute("wrap", if self.wrap { 1 } else { 0 });
        self.parameters.write_to_rule(&mut rule);
        match &self.engine {
            RuleEngine::Inbuilt(_) => {}
            RuleEngine::Formula(device) => {
                let mut formula = XmlElement::new("formula").with_text(device.source.clone());
                if let Some(n) = device.declared_chemicals {
                    formula.set_attribute("number_of_chemicals", n);
                }
                rule.push_child(formula);
            }
            RuleEngine::Kernel(device) => {
                let [bx, by, bz] = device.block_size;
                let mut kernel = XmlElement::new("kernel")
                    .with_attribute("block_size_x", bx)
                    .with_attribute("block_size_y", by)
                    .with_attribute("block_size_z", bz)
                    .with_text(device.source.clone());
                if let Some(n) = device.declared_chemicals {
                    kernel.set_attribute("number_of_chemicals", n);
                }
                rule.push_child(kernel);
            }
        }

        XmlElement::new("RD")
            .with_attribute("format_version", CURRENT_FORMAT_VERSION)
            .with_child(XmlElement::new("description").with_text(self.description.clone()))
            .with_child(rule)
            .with_child(self.pattern.to_xml())
            .with_child(properties.to_xml())
    }

    fn step(&mut self, neighbourhood: &Neighbourhood, steps: usize) -> ReadyResult<()> {
        let kind = self.engine.kind();
        match &mut self.engine {
            RuleEngine::Inbuilt(rule) => {
                for _ in 0..steps {
                    rule.step(&mut self.chemicals, neighbourhood, &self.parameters)?;
                }
            }
            RuleEngine::Formula(device) | RuleEngine::Kernel(device) => {
                if !device.compiled {
                    let chemicals: Vec<String> =
                        (0..self.chemicals.len()).map(chemical_name).collect();
                    let program = if kind == RuleKind::Formula {
                        KernelProgram::Formula {
                            source: device.source.clone(),
                            chemicals,
                            parameters: self.parameters.to_vec(),
                            timestep: self.parameters.get_or("timestep", 1.0),
                        }
                    } else {
                        KernelProgram::FullKernel {
                            source: device.source.clone(),
                            chemicals,
                            parameters: self.parameters.to_vec(),
                            block_size: device.block_size,
                        }
                    };
                    device.backend.compile(&program)?;
                    device.compiled = true;
                }
                device
                    .backend
                    .run(&mut self.chemicals, neighbourhood, steps)?;
            }
        }
        self.timesteps_taken += steps as u64;
        Ok(())
    }
}

/// A reaction-diffusion system: chemicals on a spatial domain plus a rule
///
/// Most operations are provided in terms of [`SystemCore`]; the topology
/// types supply sizing, data copying, stepping and container output.
pub trait ReactionDiffusionSystem: Send + std::fmt::Debug {
    /// Shared state
    fn core(&self) -> &SystemCore;

    fn core_mut(&mut self) -> &mut SystemCore;

    fn topology(&self) -> Topology;

    /// Resize the domain; chemical values are reset to zero
    fn set_dimensions(&mut self, dimensions: [usize; 3]) -> ReadyResult<()>;

    /// Copy chemical values from an image (image systems only)
    fn copy_from_image(&mut self, image: &ImageData) -> ReadyResult<()>;

    /// Copy geometry and chemical values from a mesh (mesh systems only)
    fn copy_from_mesh(&mut self, grid: &UnstructuredGrid) -> ReadyResult<()>;

    /// Advance the simulation
    fn update(&mut self, steps: usize) -> ReadyResult<()>;

    /// Cells as seen by the initial-pattern generator
    fn pattern_domain(&self) -> PatternDomain;

    /// The chemicals in a container ready for writing
    fn to_container(&self) -> DataObject;

    fn set_filename(&mut self, path: &Path) {
        self.core_mut().filename = Some(path.to_path_buf());
    }

    fn filename(&self) -> Option<&Path> {
        self.core().filename.as_deref()
    }

    fn set_modified(&mut self, modified: bool) {
        self.core_mut().modified = modified;
    }

    fn is_modified(&self) -> bool {
        self.core().modified
    }

    fn dimensions(&self) -> [usize; 3] {
        self.core().dimensions
    }

    fn number_of_chemicals(&self) -> usize {
        self.core().chemicals.len()
    }

    /// Set the chemical count, which must agree with the rule if it fixes one
    fn set_number_of_chemicals(&mut self, n: usize) -> ReadyResult<()> {
        let core = self.core_mut();
        let rule = match &core.engine {
            RuleEngine::Inbuilt(rule) => rule.name(),
            _ => core.rule_name.as_str(),
        };
        validation::validate_chemical_count(rule, core.engine.declared_chemicals(), n)?;
        core.resize_chemicals(n);
        core.modified = true;
        Ok(())
    }

    /// Hydrate rule, parameters, description and pattern generator from an
    /// `RD` element; sets `warn_to_update` for files in another format version
    fn initialize_from_xml(&mut self, rd: &XmlElement, warn_to_update: &mut bool) -> ReadyResult<()> {
        self.core_mut().read_descriptor(rd, warn_to_update)
    }

    /// Build the `RD` element for saving
    fn to_descriptor(&self, properties: &Properties) -> XmlElement {
        self.core().write_descriptor(properties)
    }

    fn should_generate_initial_pattern_when_loading(&self) -> bool {
        self.core().pattern.apply_when_loading
    }

    fn initial_pattern_generator(&self) -> &InitialPatternGenerator {
        &self.core().pattern
    }

    fn set_initial_pattern_generator(&mut self, generator: InitialPatternGenerator) {
        let core = self.core_mut();
        core.pattern = generator;
        core.modified = true;
    }

    /// Overwrite the chemicals using the initial-pattern generator
    fn generate_initial_pattern(&mut self) -> ReadyResult<()> {
        let domain = self.pattern_domain();
        let core = self.core_mut();
        core.pattern
            .apply(&mut core.chemicals, &domain, &core.parameters)?;
        core.timesteps_taken = 0;
        core.modified = true;
        Ok(())
    }

    fn timesteps_taken(&self) -> u64 {
        self.core().timesteps_taken
    }

    fn parameters(&self) -> &Parameters {
        &self.core().parameters
    }

    /// Change a parameter; device programs are recompiled on the next update
    fn set_parameter(&mut self, name: &str, value: f64) {
        let core = self.core_mut();
        core.parameters.set(name, value);
        core.engine.invalidate();
        core.modified = true;
    }

    fn rule_kind(&self) -> RuleKind {
        self.core().engine.kind()
    }

    fn rule_name(&self) -> &str {
        &self.core().rule_name
    }

    fn description(&self) -> &str {
        &self.core().description
    }

    fn wrap(&self) -> bool {
        self.core().wrap
    }

    fn scalar_type(&self) -> ScalarType {
        self.core().scalar_type
    }

    fn compute_target(&self) -> Option<ComputeTarget> {
        self.core().engine.compute_target()
    }

    /// Values of one chemical, in cell order
    fn chemical_values(&self, index: usize) -> Option<&[f64]> {
        self.core().chemicals.get(index).map(Vec::as_slice)
    }

    /// Minimum and maximum over all chemicals
    fn value_range(&self) -> Option<(f64, f64)> {
        let values = self.core().chemicals.iter().flatten();
        values.fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
