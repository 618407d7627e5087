//! Systems on a regular grid

use super::{ReactionDiffusionSystem, RuleEngine, SystemCore};
use crate::adapter;
use crate::compute::Neighbourhood;
use crate::error::{validation, FormatError, ReadyResult};
use crate::pattern::PatternDomain;
use ndarray::ArrayView3;
use ready_io::{DataObject, ImageData, Topology, UnstructuredGrid};

/// A reaction-diffusion system on a `width x height x depth` grid
#[derive(Debug)]
pub struct ImageRd {
    core: SystemCore,
    origin: [f64; 3],
    spacing: [f64; 3],
}

impl ImageRd {
    pub fn new(engine: RuleEngine) -> Self {
        Self {
            core: SystemCore::new(engine),
            origin: [0.0; 3],
            spacing: [1.0; 3],
        }
    }

    /// One chemical as a `(depth, height, width)` array
    pub fn chemical_view(&self, index: usize) -> Option<ArrayView3<'_, f64>> {
        let [w, h, d] = self.core.dimensions;
        let values = self.core.chemicals.get(index)?;
        ArrayView3::from_shape((d, h, w), values).ok()
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Grid {
            dims: self.core.dimensions,
            wrap: self.core.wrap,
        }
    }
}

impl ReactionDiffusionSystem for ImageRd {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn topology(&self) -> Topology {
        Topology::Image
    }

    fn set_dimensions(&mut self, dimensions: [usize; 3]) -> ReadyResult<()> {
        validation::validate_dimensions(dimensions)?;
        self.core.dimensions = dimensions;
        let n = self.core.chemicals.len();
        self.core.chemicals.clear();
        self.core.resize_chemicals(n);
        self.core.modified = true;
        Ok(())
    }

    fn copy_from_image(&mut self, image: &ImageData) -> ReadyResult<()> {
        let field = adapter::image_to_field(image)?;
        if field.dims != self.core.dimensions {
            return Err(FormatError::InvalidValue {
                element: "ImageData".to_string(),
                message: format!(
                    "image is {:?}, system is {:?}",
                    field.dims, self.core.dimensions
                ),
            }
            .into());
        }
        self.core.copy_channels(field.channels)?;
        self.core.scalar_type = field.scalar_type;
        self.origin = image.origin;
        self.spacing = image.spacing;
        Ok(())
    }

    fn copy_from_mesh(&mut self, _grid: &UnstructuredGrid) -> ReadyResult<()> {
        Err(FormatError::UnsupportedContainer(
            "an image system cannot take mesh data".to_string(),
        )
        .into())
    }

    fn update(&mut self, steps: usize) -> ReadyResult<()> {
        let neighbourhood = self.neighbourhood();
        self.core.step(&neighbourhood, steps)
    }

    fn pattern_domain(&self) -> PatternDomain {
        PatternDomain::grid(self.core.dimensions)
    }

    fn to_container(&self) -> DataObject {
        let mut image = adapter::field_to_image(
            self.core.dimensions,
            &self.core.chemicals,
            self.core.scalar_type,
        );
        image.origin = self.origin;
        image.spacing = self.spacing;
        DataObject::Image(image)
    }
}
