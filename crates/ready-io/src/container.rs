//! Spatial containers: regular image volumes and unstructured grids
//!
//! These mirror the two VTK XML dataset kinds that RD files embed. They are
//! plain data holders; converting them to and from chemical fields is the
//! job of the adapter in `ready-core`.

use crate::schema::DataAttributes;

/// Which of the two supported topologies a container has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Regular 3-D grid with per-point data
    Image,
    /// Unstructured cells with per-cell data
    Mesh,
}

impl Topology {
    pub fn name(&self) -> &'static str {
        match self {
            Topology::Image => "image",
            Topology::Mesh => "mesh",
        }
    }
}

/// A regular grid of points
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Points along x, y and z
    pub dimensions: [usize; 3],

    pub origin: [f64; 3],

    pub spacing: [f64; 3],

    /// Per-point arrays; `None` when the file has no `PointData` section
    pub point_data: Option<DataAttributes>,
}

impl ImageData {
    /// Create an image with unit spacing and no data section
    pub fn new(dimensions: [usize; 3]) -> Self {
        Self {
            dimensions,
            origin: [0.0; 3],
            spacing: [1.0; 3],
            point_data: None,
        }
    }

    /// Total number of points, saturating at `usize::MAX`
    pub fn number_of_points(&self) -> usize {
        self.checked_number_of_points().unwrap_or(usize::MAX)
    }

    /// Total number of points, or `None` if the product overflows
    pub fn checked_number_of_points(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
    }

    /// Components of the first point array (1 when there is none)
    pub fn number_of_scalar_components(&self) -> usize {
        self.point_data
            .as_ref()
            .and_then(|pd| pd.array(0))
            .map(|a| a.components)
            .unwrap_or(1)
    }

    /// The `WholeExtent` string for these dimensions
    pub fn extent(&self) -> [i64; 6] {
        let [x, y, z] = self.dimensions;
        [0, x as i64 - 1, 0, y as i64 - 1, 0, z as i64 - 1]
    }
}

/// VTK cell type codes for the cells RD meshes use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Vertex,
    Line,
    Triangle,
    Polygon,
    Pixel,
    Quad,
    Tetra,
    Voxel,
    Hexahedron,
    Wedge,
    Pyramid,
    Other(u8),
}

impl CellType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => CellType::Vertex,
            3 => CellType::Line,
            5 => CellType::Triangle,
            7 => CellType::Polygon,
            8 => CellType::Pixel,
            9 => CellType::Quad,
            10 => CellType::Tetra,
            11 => CellType::Voxel,
            12 => CellType::Hexahedron,
            13 => CellType::Wedge,
            14 => CellType::Pyramid,
            other => CellType::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            CellType::Vertex => 1,
            CellType::Line => 3,
            CellType::Triangle => 5,
            CellType::Polygon => 7,
            CellType::Pixel => 8,
            CellType::Quad => 9,
            CellType::Tetra => 10,
            CellType::Voxel => 11,
            CellType::Hexahedron => 12,
            CellType::Wedge => 13,
            CellType::Pyramid => 14,
            CellType::Other(code) => *code,
        }
    }

    /// Topological dimension of the cell
    pub fn dimension(&self) -> u8 {
        match self {
            CellType::Vertex => 0,
            CellType::Line => 1,
            CellType::Triangle | CellType::Polygon | CellType::Pixel | CellType::Quad => 2,
            CellType::Tetra
            | CellType::Voxel
            | CellType::Hexahedron
            | CellType::Wedge
            | CellType::Pyramid => 3,
            CellType::Other(_) => 2,
        }
    }
}

/// One cell: its type and the indices of its points
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub cell_type: CellType,
    pub points: Vec<usize>,
}

/// A collection of arbitrary cells over a shared point list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnstructuredGrid {
    pub points: Vec<[f64; 3]>,

    pub cells: Vec<Cell>,

    /// Per-cell arrays; `None` when the file has no `CellData` section
    pub cell_data: Option<DataAttributes>,
}

impl UnstructuredGrid {
    pub fn new(points: Vec<[f64; 3]>, cells: Vec<Cell>) -> Self {
        Self {
            points,
            cells,
            cell_data: None,
        }
    }

    pub fn number_of_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    /// Axis-aligned bounds of the points as `(min, max)`
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        if self.points.is_empty() {
            return ([0.0; 3], [0.0; 3]);
        }
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for p in &self.points {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        (min, max)
    }

    /// Mean position of a cell's points
    pub fn cell_centroid(&self, cell: usize) -> [f64; 3] {
        let mut c = [0.0; 3];
        let Some(cell) = self.cells.get(cell) else {
            return c;
        };
        let n = cell.points.len().max(1) as f64;
        for &p in &cell.points {
            if let Some(point) = self.points.get(p) {
                for axis in 0..3 {
                    c[axis] += point[axis] / n;
                }
            }
        }
        c
    }
}

/// The dataset embedded in a file
#[derive(Debug, Clone, PartialEq)]
pub enum DataObject {
    Image(ImageData),
    Mesh(UnstructuredGrid),
}

impl DataObject {
    pub fn topology(&self) -> Topology {
        match self {
            DataObject::Image(_) => Topology::Image,
            DataObject::Mesh(_) => Topology::Mesh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> UnstructuredGrid {
        UnstructuredGrid::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![
                Cell {
                    cell_type: CellType::Triangle,
                    points: vec![0, 1, 2],
                },
                Cell {
                    cell_type: CellType::Triangle,
                    points: vec![0, 2, 3],
                },
            ],
        )
    }

    #[test]
    fn test_image_extent() {
        let image = ImageData::new([32, 16, 1]);
        assert_eq!(image.extent(), [0, 31, 0, 15, 0, 0]);
        assert_eq!(image.number_of_points(), 512);
        assert_eq!(image.number_of_scalar_components(), 1);

        let huge = ImageData::new([usize::MAX, 2, 1]);
        assert_eq!(huge.checked_number_of_points(), None);
        assert_eq!(huge.number_of_points(), usize::MAX);
    }

    #[test]
    fn test_mesh_bounds_and_centroid() {
        let grid = unit_square();
        assert_eq!(grid.bounds(), ([0.0, 0.0, 0.0], [1.0, 1.0, 0.0]));
        let c = grid.cell_centroid(0);
        assert!((c[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((c[1] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cell_type_codes() {
        assert_eq!(CellType::from_code(5), CellType::Triangle);
        assert_eq!(CellType::Hexahedron.code(), 12);
        assert_eq!(CellType::Tetra.dimension(), 3);
        assert_eq!(CellType::from_code(42), CellType::Other(42));
    }
}
