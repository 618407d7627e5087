//! Conversion between spatial containers and chemical fields
//!
//! Reading flattens every component of every data array into one channel
//! per chemical: channel `c` comes from array `c / ncomp`, component
//! `c % ncomp`, where `ncomp` is the component count of the first array.
//! Writing emits one single-component array per chemical, named `a`, `b`,
//! `c`... and stored in the system's scalar type.

use crate::error::{FormatError, MissingDataKind, ReadyError, ReadyResult};
use crate::system::chemical_name;
use ready_io::{
    DataArray, DataAttributes, ImageData, ScalarType, Topology, UnstructuredGrid,
};

/// Chemical channels extracted from a container
#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    /// Width, height, depth for images; `(cells, 1, 1)` for meshes
    pub dims: [usize; 3],
    /// Scalar type of the first array
    pub scalar_type: ScalarType,
    /// One vector of values per chemical
    pub channels: Vec<Vec<f64>>,
}

impl FieldData {
    pub fn number_of_chemicals(&self) -> usize {
        self.channels.len()
    }
}

/// Check that a data section exists, has arrays and a known scalar type
///
/// Returns the first array's scalar type.
pub fn validate_attributes(
    attributes: Option<&DataAttributes>,
    topology: Topology,
) -> ReadyResult<ScalarType> {
    let missing = |kind| ReadyError::MissingData {
        kind,
        topology: topology.name().to_string(),
    };
    let attributes = attributes.ok_or_else(|| missing(MissingDataKind::NoDataSection))?;
    let first = attributes
        .array(0)
        .ok_or_else(|| missing(MissingDataKind::NoArrays))?;
    first
        .scalar_type
        .ok_or_else(|| missing(MissingDataKind::UnknownScalarType))
}

/// Number of chemicals a data section describes: components times arrays
pub fn channel_count(attributes: &DataAttributes) -> usize {
    let ncomp = attributes.array(0).map(|a| a.components).unwrap_or(1);
    ncomp * attributes.number_of_arrays()
}

fn split_channels(attributes: &DataAttributes, tuples: usize) -> ReadyResult<Vec<Vec<f64>>> {
    let ncomp = attributes.array(0).map(|a| a.components).unwrap_or(1);
    let mut channels = Vec::with_capacity(ncomp * attributes.number_of_arrays());
    for array in attributes.arrays() {
        if array.components != ncomp {
            return Err(FormatError::InvalidValue {
                element: "DataArray".to_string(),
                message: format!(
                    "array '{}' has {} components, expected {}",
                    array.name, array.components, ncomp
                ),
            }
            .into());
        }
        if array.tuples() != tuples {
            return Err(FormatError::InvalidValue {
                element: "DataArray".to_string(),
                message: format!(
                    "array '{}' has {} tuples, expected {}",
                    array.name,
                    array.tuples(),
                    tuples
                ),
            }
            .into());
        }
        for component in 0..ncomp {
            channels.push(array.component(component).unwrap_or_default());
        }
    }
    Ok(channels)
}

/// Extract chemical channels from an image's point data
pub fn image_to_field(image: &ImageData) -> ReadyResult<FieldData> {
    let scalar_type = validate_attributes(image.point_data.as_ref(), Topology::Image)?;
    let attributes = image.point_data.as_ref().ok_or_else(|| ReadyError::MissingData {
        kind: MissingDataKind::NoDataSection,
        topology: Topology::Image.name().to_string(),
    })?;
    Ok(FieldData {
        dims: image.dimensions,
        scalar_type,
        channels: split_channels(attributes, image.number_of_points())?,
    })
}

/// Extract chemical channels from a mesh's cell data
pub fn mesh_to_field(grid: &UnstructuredGrid) -> ReadyResult<FieldData> {
    let scalar_type = validate_attributes(grid.cell_data.as_ref(), Topology::Mesh)?;
    let attributes = grid.cell_data.as_ref().ok_or_else(|| ReadyError::MissingData {
        kind: MissingDataKind::NoDataSection,
        topology: Topology::Mesh.name().to_string(),
    })?;
    Ok(FieldData {
        dims: [grid.number_of_cells(), 1, 1],
        scalar_type,
        channels: split_channels(attributes, grid.number_of_cells())?,
    })
}

/// Build data attributes with one named array per chemical
pub fn chemicals_to_attributes(chemicals: &[Vec<f64>], scalar_type: ScalarType) -> DataAttributes {
    let mut attributes = DataAttributes::new();
    for (i, values) in chemicals.iter().enumerate() {
        let values = values.iter().map(|&v| scalar_type.quantize(v)).collect();
        attributes.add_array(DataArray::new(chemical_name(i), scalar_type, values));
    }
    attributes
}

/// Build an image holding the given chemicals as point data
pub fn field_to_image(
    dims: [usize; 3],
    chemicals: &[Vec<f64>],
    scalar_type: ScalarType,
) -> ImageData {
    let mut image = ImageData::new(dims);
    image.point_data = Some(chemicals_to_attributes(chemicals, scalar_type));
    image
}

/// Copy a mesh's geometry and attach the given chemicals as cell data
pub fn field_to_mesh(
    geometry: &UnstructuredGrid,
    chemicals: &[Vec<f64>],
    scalar_type: ScalarType,
) -> UnstructuredGrid {
    let mut grid = UnstructuredGrid::new(geometry.points.clone(), geometry.cells.clone());
    grid.cell_data = Some(chemicals_to_attributes(chemicals, scalar_type));
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ready_io::{Cell, CellType};

    #[test]
    fn test_channels_from_components_and_arrays() {
        let mut image = ImageData::new([2, 1, 1]);
        let mut pd = DataAttributes::new();
        pd.add_array(
            DataArray::new("ab", ScalarType::Float32, vec![1.0, 2.0, 3.0, 4.0]).with_components(2),
        );
        pd.add_array(
            DataArray::new("cd", ScalarType::Float64, vec![5.0, 6.0, 7.0, 8.0]).with_components(2),
        );
        image.point_data = Some(pd);

        let field = image_to_field(&image).unwrap();
        assert_eq!(field.number_of_chemicals(), 4);
        assert_eq!(field.scalar_type, ScalarType::Float32);
        assert_eq!(field.channels[0], vec![1.0, 3.0]);
        assert_eq!(field.channels[1], vec![2.0, 4.0]);
        assert_eq!(field.channels[3], vec![6.0, 8.0]);
    }

    #[test]
    fn test_missing_data_kinds() {
        let mut image = ImageData::new([2, 1, 1]);
        let kind = |image: &ImageData| match image_to_field(image) {
            Err(ReadyError::MissingData { kind, .. }) => Some(kind),
            _ => None,
        };
        assert_eq!(kind(&image), Some(MissingDataKind::NoDataSection));

        image.point_data = Some(DataAttributes::new());
        assert_eq!(kind(&image), Some(MissingDataKind::NoArrays));

        let mut pd = DataAttributes::new();
        pd.add_array(DataArray {
            name: "a".into(),
            scalar_type: None,
            components: 1,
            values: vec![0.0, 0.0],
        });
        image.point_data = Some(pd);
        assert_eq!(kind(&image), Some(MissingDataKind::UnknownScalarType));
    }

    #[test]
    fn test_writer_names_and_quantizes() {
        let image = field_to_image([2, 1, 1], &[vec![0.4, 300.0], vec![1.0, 2.0]], ScalarType::UInt8);
        let pd = image.point_data.unwrap();
        assert_eq!(pd.array(0).unwrap().name, "a");
        assert_eq!(pd.array(0).unwrap().values, vec![0.0, 255.0]);
        assert_eq!(pd.array(1).unwrap().name, "b");
    }

    #[test]
    fn test_mesh_field() {
        let mut grid = UnstructuredGrid::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![Cell {
                cell_type: CellType::Triangle,
                points: vec![0, 1, 2],
            }],
        );
        let mut cd = DataAttributes::new();
        cd.add_array(DataArray::new("a", ScalarType::Float64, vec![0.5]));
        grid.cell_data = Some(cd);

        let field = mesh_to_field(&grid).unwrap();
        assert_eq!(field.dims, [1, 1, 1]);
        assert_eq!(field.channels, vec![vec![0.5]]);

        let back = field_to_mesh(&grid, &field.channels, field.scalar_type);
        assert_eq!(back, grid);
    }
}
