//! Systems on an unstructured mesh
//!
//! Each cell holds one value per chemical. Two cells are neighbours when
//! they share a face: at least one point for line cells, two for surface
//! cells, three for volume cells.

use super::{ReactionDiffusionSystem, RuleEngine, SystemCore};
use crate::adapter;
use crate::compute::Neighbourhood;
use crate::error::{FormatError, ReadyResult};
use crate::pattern::PatternDomain;
use ready_io::{DataObject, ImageData, Topology, UnstructuredGrid};
use std::collections::HashMap;

/// A reaction-diffusion system on the cells of an unstructured grid
#[derive(Debug)]
pub struct MeshRd {
    core: SystemCore,
    geometry: UnstructuredGrid,
    neighbourhood: Neighbourhood,
}

impl MeshRd {
    pub fn new(engine: RuleEngine) -> Self {
        Self {
            core: SystemCore::new(engine),
            geometry: UnstructuredGrid::default(),
            neighbourhood: Neighbourhood::Graph {
                neighbours: Vec::new(),
                weights: Vec::new(),
            },
        }
    }

    /// Points and cells, without data
    pub fn geometry(&self) -> &UnstructuredGrid {
        &self.geometry
    }

    pub fn neighbourhood(&self) -> &Neighbourhood {
        &self.neighbourhood
    }

    pub fn number_of_cells(&self) -> usize {
        self.geometry.number_of_cells()
    }
}

/// Face-sharing adjacency of a grid's cells, unit weights
pub fn face_neighbours(grid: &UnstructuredGrid) -> Neighbourhood {
    let mut point_cells: Vec<Vec<usize>> = vec![Vec::new(); grid.number_of_points()];
    for (c, cell) in grid.cells.iter().enumerate() {
        for &p in &cell.points {
            if let Some(cells) = point_cells.get_mut(p) {
                cells.push(c);
            }
        }
    }

    let mut neighbours = Vec::with_capacity(grid.number_of_cells());
    for (c, cell) in grid.cells.iter().enumerate() {
        let mut shared: HashMap<usize, usize> = HashMap::new();
        for &p in &cell.points {
            for &other in point_cells.get(p).map(Vec::as_slice).unwrap_or_default() {
                if other != c {
                    *shared.entry(other).or_insert(0) += 1;
                }
            }
        }
        let mut adjacent: Vec<usize> = shared
            .into_iter()
            .filter(|&(other, count)| {
                let dim = cell
                    .cell_type
                    .dimension()
                    .min(grid.cells[other].cell_type.dimension());
                count >= usize::from(dim.max(1))
            })
            .map(|(other, _)| other)
            .collect();
        adjacent.sort_unstable();
        neighbours.push(adjacent);
    }

    let weights = neighbours.iter().map(|n| vec![1.0; n.len()]).collect();
    Neighbourhood::Graph {
        neighbours,
        weights,
    }
}

impl ReactionDiffusionSystem for MeshRd {
    fn core(&self) -> &SystemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }

    fn topology(&self) -> Topology {
        Topology::Mesh
    }

    fn set_dimensions(&mut self, _dimensions: [usize; 3]) -> ReadyResult<()> {
        Err(FormatError::InvalidValue {
            element: "UnstructuredGrid".to_string(),
            message: "mesh systems take their size from their cells".to_string(),
        }
        .into())
    }

    fn copy_from_image(&mut self, _image: &ImageData) -> ReadyResult<()> {
        Err(FormatError::UnsupportedContainer(
            "a mesh system cannot take image data".to_string(),
        )
        .into())
    }

    fn copy_from_mesh(&mut self, grid: &UnstructuredGrid) -> ReadyResult<()> {
        let field = adapter::mesh_to_field(grid)?;
        let n_chemicals = self.core.chemicals.len();
        self.geometry = UnstructuredGrid::new(grid.points.clone(), grid.cells.clone());
        self.neighbourhood = face_neighbours(&self.geometry);
        self.core.dimensions = field.dims;
        self.core.resize_chemicals(n_chemicals);
        self.core.copy_channels(field.channels)?;
        self.core.scalar_type = field.scalar_type;
        tracing::debug!(
            cells = self.geometry.number_of_cells(),
            points = self.geometry.number_of_points(),
            "copied mesh"
        );
        Ok(())
    }

    fn update(&mut self, steps: usize) -> ReadyResult<()> {
        self.core.step(&self.neighbourhood, steps)
    }

    fn pattern_domain(&self) -> PatternDomain {
        let centroids: Vec<[f64; 3]> = (0..self.geometry.number_of_cells())
            .map(|c| self.geometry.cell_centroid(c))
            .collect();
        PatternDomain::points(&centroids, self.geometry.bounds())
    }

    fn to_container(&self) -> DataObject {
        DataObject::Mesh(adapter::field_to_mesh(
            &self.geometry,
            &self.core.chemicals,
            self.core.scalar_type,
        ))
    }
}
