//! Creating systems from RD files, and saving them back
//!
//! [`SystemFactory::create_from_file`] is the single entry point for
//! loading. It peeks at the file's root tag to pick the image or mesh path,
//! parses the file once, then picks the rule engine from the descriptor:
//! inbuilt rules come from the [`InbuiltRegistry`], formula and kernel rules
//! are bound to a backend opened by the factory's [`BackendProvider`].
//!
//! Loading and saving run under a [`NumericLocaleGuard`].

use crate::adapter;
use crate::compute::{BackendProvider, ComputeTarget, HostBackendProvider};
use crate::error::{FormatError, ReadyError, ReadyResult};
use crate::locale::NumericLocaleGuard;
use crate::properties::Properties;
use crate::rule::{InbuiltRegistry, RuleKind};
use crate::system::{DeviceRule, ImageRd, MeshRd, ReactionDiffusionSystem, RuleEngine};
use ready_io::{
    DataFormat, DataObject, DataObjectType, ImageData, ScalarType, Topology, UnstructuredGrid,
    VtkDocument, XmlElement,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Whether and where formula and kernel rules may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeOptions {
    /// False forbids loading any rule that needs a compute backend
    pub available: bool,
    pub platform: usize,
    pub device: usize,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            available: true,
            platform: 0,
            device: 0,
        }
    }
}

impl ComputeOptions {
    /// Options that forbid compute-backed rules
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }
}

/// A freshly loaded system
#[derive(Debug)]
pub struct LoadedSystem {
    pub system: Box<dyn ReactionDiffusionSystem>,
    /// The file uses another format version and should be re-saved
    pub warn_to_update: bool,
}

/// Builds systems from files
pub struct SystemFactory {
    provider: Arc<dyn BackendProvider>,
    registry: InbuiltRegistry,
}

impl std::fmt::Debug for SystemFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemFactory")
            .field("provider", &self.provider.name())
            .field("inbuilt_rules", &self.registry.names())
            .finish()
    }
}

impl Default for SystemFactory {
    fn default() -> Self {
        Self::new(Arc::new(HostBackendProvider::new()))
    }
}

impl SystemFactory {
    /// A factory with the built-in rules and the given compute provider
    pub fn new(provider: Arc<dyn BackendProvider>) -> Self {
        Self::with_registry(provider, InbuiltRegistry::new())
    }

    pub fn with_registry(provider: Arc<dyn BackendProvider>, registry: InbuiltRegistry) -> Self {
        Self { provider, registry }
    }

    pub fn registry(&self) -> &InbuiltRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &dyn BackendProvider {
        self.provider.as_ref()
    }

    /// Load a system from an RD file
    ///
    /// Render settings found in the file are overlaid onto `render_settings`
    /// only if the whole load succeeds. The returned system has its filename
    /// set and is not marked modified.
    pub fn create_from_file(
        &self,
        path: impl AsRef<Path>,
        options: &ComputeOptions,
        render_settings: &mut Properties,
    ) -> ReadyResult<LoadedSystem> {
        let path = path.as_ref();
        let _locale = NumericLocaleGuard::acquire();

        let mut settings = render_settings.clone();
        let mut loaded = match ready_io::sniff_output_type(path)? {
            DataObjectType::ImageData => {
                tracing::debug!(path = %path.display(), "loading image system");
                self.create_from_image_file(path, options, &mut settings)?
            }
            DataObjectType::UnstructuredGrid => {
                tracing::debug!(path = %path.display(), "loading mesh system");
                self.create_from_mesh_file(path, options, &mut settings)?
            }
            DataObjectType::Other(name) => {
                return Err(FormatError::UnsupportedContainer(format!(
                    "{}: unsupported VTK data type '{}'",
                    path.display(),
                    name
                ))
                .into());
            }
        };

        loaded.system.set_filename(path);
        loaded.system.set_modified(false);
        *render_settings = settings;
        tracing::debug!(
            path = %path.display(),
            topology = loaded.system.topology().name(),
            rule = loaded.system.rule_name(),
            chemicals = loaded.system.number_of_chemicals(),
            "loaded system"
        );
        Ok(loaded)
    }

    fn create_from_image_file(
        &self,
        path: &Path,
        options: &ComputeOptions,
        settings: &mut Properties,
    ) -> ReadyResult<LoadedSystem> {
        let document = ready_io::read_file(path)?;
        let rd = descriptor(&document)?;
        let DataObject::Image(image) = &document.data else {
            return Err(container_mismatch(path, Topology::Image));
        };
        let engine = self.select_engine(rd, image.point_data.as_ref(), Topology::Image, options)?;

        let mut system = ImageRd::new(engine);
        let warn_to_update = hydrate(&mut system, rd, settings)?;
        system.set_dimensions(image.dimensions)?;
        system.set_number_of_chemicals(image_channels(image))?;
        system.copy_from_image(image)?;
        finish(Box::new(system), warn_to_update)
    }

    fn create_from_mesh_file(
        &self,
        path: &Path,
        options: &ComputeOptions,
        settings: &mut Properties,
    ) -> ReadyResult<LoadedSystem> {
        let document = ready_io::read_file(path)?;
        let rd = descriptor(&document)?;
        let DataObject::Mesh(grid) = &document.data else {
            return Err(container_mismatch(path, Topology::Mesh));
        };
        let engine = self.select_engine(rd, grid.cell_data.as_ref(), Topology::Mesh, options)?;

        let mut system = MeshRd::new(engine);
        let warn_to_update = hydrate(&mut system, rd, settings)?;
        system.set_number_of_chemicals(mesh_channels(grid))?;
        system.copy_from_mesh(grid)?;
        finish(Box::new(system), warn_to_update)
    }

    /// Pick the rule engine named by the descriptor
    ///
    /// Compute availability is checked before the data section, so a
    /// compute-backed file is refused the same way whatever its content.
    fn select_engine(
        &self,
        rd: &XmlElement,
        attributes: Option<&ready_io::DataAttributes>,
        topology: Topology,
        options: &ComputeOptions,
    ) -> ReadyResult<RuleEngine> {
        let rule = rd
            .child("rule")
            .ok_or_else(|| FormatError::Malformed("RD element has no <rule>".to_string()))?;
        let rule_type = rule.required_attribute("type")?;
        let kind = RuleKind::from_name(rule_type).ok_or_else(|| ReadyError::UnsupportedRuleType {
            rule_type: rule_type.to_string(),
        })?;
        if kind.needs_compute() && !options.available {
            return Err(ReadyError::ComputeUnavailable {
                hints: self.provider.installation_hints(),
            });
        }

        let scalar_type = adapter::validate_attributes(attributes, topology)?;
        let name = rule.required_attribute("name")?;

        match kind {
            RuleKind::Inbuilt => self
                .registry
                .create(name)
                .map(RuleEngine::Inbuilt)
                .ok_or_else(|| ReadyError::UnsupportedRule {
                    name: name.to_string(),
                }),
            RuleKind::Formula => Ok(RuleEngine::Formula(self.open_device(options, scalar_type)?)),
            RuleKind::Kernel => Ok(RuleEngine::Kernel(self.open_device(options, scalar_type)?)),
        }
    }

    fn open_device(
        &self,
        options: &ComputeOptions,
        scalar_type: ScalarType,
    ) -> ReadyResult<DeviceRule> {
        let target = ComputeTarget {
            platform: options.platform,
            device: options.device,
            scalar_type,
        };
        let backend = self.provider.open(target)?;
        tracing::debug!(
            provider = self.provider.name(),
            platform = target.platform,
            device = target.device,
            "bound compute backend"
        );
        Ok(DeviceRule::new(backend))
    }
}

fn descriptor(document: &VtkDocument) -> ReadyResult<&XmlElement> {
    document
        .rd
        .as_ref()
        .ok_or_else(|| FormatError::MissingDescriptor.into())
}

fn container_mismatch(path: &Path, expected: Topology) -> ReadyError {
    FormatError::UnsupportedContainer(format!(
        "{}: root declares {} data but the file holds something else",
        path.display(),
        expected.name()
    ))
    .into()
}

fn image_channels(image: &ImageData) -> usize {
    image
        .point_data
        .as_ref()
        .map(adapter::channel_count)
        .unwrap_or(0)
}

fn mesh_channels(grid: &UnstructuredGrid) -> usize {
    grid.cell_data
        .as_ref()
        .map(adapter::channel_count)
        .unwrap_or(0)
}

/// Read the descriptor and overlay any render settings it carries
fn hydrate(
    system: &mut dyn ReactionDiffusionSystem,
    rd: &XmlElement,
    settings: &mut Properties,
) -> ReadyResult<bool> {
    let mut warn_to_update = false;
    system.initialize_from_xml(rd, &mut warn_to_update)?;
    if let Some(render_settings) = rd.nested_element("render_settings") {
        settings.overlay_from_xml(render_settings)?;
    }
    Ok(warn_to_update)
}

fn finish(
    mut system: Box<dyn ReactionDiffusionSystem>,
    warn_to_update: bool,
) -> ReadyResult<LoadedSystem> {
    if system.should_generate_initial_pattern_when_loading() {
        system.generate_initial_pattern()?;
    }
    Ok(LoadedSystem {
        system,
        warn_to_update,
    })
}

/// Write a system and its render settings to an RD file
///
/// On success the system records `path` as its filename and is no longer
/// marked modified.
pub fn save_to_file(
    system: &mut dyn ReactionDiffusionSystem,
    path: impl AsRef<Path>,
    render_settings: &Properties,
    format: DataFormat,
) -> ReadyResult<()> {
    let path = path.as_ref();
    let _locale = NumericLocaleGuard::acquire();
    let document = VtkDocument::new(
        Some(system.to_descriptor(render_settings)),
        system.to_container(),
    );
    ready_io::write_file(path, &document, format)?;
    system.set_filename(path);
    system.set_modified(false);
    tracing::debug!(path = %path.display(), "saved system");
    Ok(())
}
