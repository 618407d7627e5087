//! Conversion of a parsed VTK XML tree into containers
//!
//! Supports inline `ascii` and uncompressed `binary` (base64) data arrays for
//! `ImageData` and `UnstructuredGrid` files.

use crate::container::{Cell, CellType, DataObject, ImageData, UnstructuredGrid};
use crate::element::XmlElement;
use crate::reader::{DataObjectType, IoError, IoResult};
use crate::schema::{DataArray, DataAttributes, ScalarType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A parsed RD file: the optional `RD` descriptor and the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct VtkDocument {
    /// The `RD` element, if the file carries one
    pub rd: Option<XmlElement>,

    pub data: DataObject,
}

impl VtkDocument {
    pub fn new(rd: Option<XmlElement>, data: DataObject) -> Self {
        Self { rd, data }
    }
}

/// Binary layout options declared on the root element
#[derive(Debug, Clone, Copy)]
struct Encoding {
    little_endian: bool,
    header: ScalarType,
}

/// Build a document from the `VTKFile` root element
pub fn document_from_element(root: XmlElement) -> IoResult<VtkDocument> {
    if root.name() != "VTKFile" {
        return Err(IoError::InvalidFormat(format!(
            "expected <VTKFile> root, found <{}>",
            root.name()
        )));
    }
    if let Some(compressor) = root.attribute("compressor") {
        return Err(IoError::UnsupportedFormat(format!(
            "compressed data ({}) is not supported",
            compressor
        )));
    }

    let encoding = Encoding {
        little_endian: root.attribute("byte_order") != Some("BigEndian"),
        header: match root.attribute("header_type") {
            None | Some("UInt32") => ScalarType::UInt32,
            Some("UInt64") => ScalarType::UInt64,
            Some(other) => {
                return Err(IoError::InvalidFormat(format!(
                    "unknown header_type '{}'",
                    other
                )))
            }
        },
    };

    let kind = DataObjectType::from_type_name(root.attribute("type").unwrap_or_default());
    let data = match kind {
        DataObjectType::ImageData => {
            let element = root
                .child("ImageData")
                .ok_or_else(|| IoError::InvalidFormat("missing <ImageData> element".into()))?;
            DataObject::Image(read_image(element, encoding)?)
        }
        DataObjectType::UnstructuredGrid => {
            let element = root.child("UnstructuredGrid").ok_or_else(|| {
                IoError::InvalidFormat("missing <UnstructuredGrid> element".into())
            })?;
            DataObject::Mesh(read_unstructured_grid(element, encoding)?)
        }
        DataObjectType::Other(name) => {
            return Err(IoError::UnsupportedFormat(format!(
                "unsupported dataset type '{}'",
                name
            )))
        }
    };

    let rd = root.child("RD").cloned();
    Ok(VtkDocument { rd, data })
}

fn read_image(element: &XmlElement, encoding: Encoding) -> IoResult<ImageData> {
    let extent = element
        .parse_list_attribute::<i64>("WholeExtent")?
        .ok_or_else(|| IoError::InvalidFormat("<ImageData> has no WholeExtent".into()))?;
    if extent.len() != 6 {
        return Err(IoError::InvalidFormat(format!(
            "WholeExtent needs 6 values, found {}",
            extent.len()
        )));
    }
    let mut dimensions = [0usize; 3];
    for axis in 0..3 {
        let span = extent[2 * axis + 1]
            .checked_sub(extent[2 * axis])
            .and_then(|d| d.checked_add(1))
            .ok_or_else(|| {
                IoError::InvalidFormat(format!("WholeExtent overflows on axis {}", axis))
            })?;
        if span < 1 {
            return Err(IoError::InvalidFormat(format!(
                "WholeExtent has an empty range on axis {}",
                axis
            )));
        }
        dimensions[axis] = usize::try_from(span).map_err(|_| {
            IoError::InvalidFormat(format!("WholeExtent is too large on axis {}", axis))
        })?;
    }

    let mut image = ImageData::new(dimensions);
    if let Some(origin) = element.parse_list_attribute::<f64>("Origin")? {
        image.origin = to_triple(&origin, "Origin")?;
    }
    if let Some(spacing) = element.parse_list_attribute::<f64>("Spacing")? {
        image.spacing = to_triple(&spacing, "Spacing")?;
    }

    if let Some(point_data) = element.child("Piece").and_then(|p| p.child("PointData")) {
        let n_points = image.checked_number_of_points().ok_or_else(|| {
            IoError::InvalidFormat("WholeExtent describes too many points".into())
        })?;
        image.point_data = Some(read_attributes(point_data, n_points, encoding)?);
    }
    Ok(image)
}

fn read_unstructured_grid(element: &XmlElement, encoding: Encoding) -> IoResult<UnstructuredGrid> {
    let piece = element
        .child("Piece")
        .ok_or_else(|| IoError::InvalidFormat("<UnstructuredGrid> has no <Piece>".into()))?;
    let n_points: usize = piece.parse_required_attribute("NumberOfPoints")?;
    let n_cells: usize = piece.parse_required_attribute("NumberOfCells")?;

    let points = match piece.child("Points").and_then(|p| p.child("DataArray")) {
        Some(array) => {
            let array = read_data_array(array, encoding)?;
            if array.components != 3 || array.tuples() != n_points {
                return Err(IoError::InvalidFormat(format!(
                    "<Points> must hold {} 3-component tuples",
                    n_points
                )));
            }
            array
                .values
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]])
                .collect()
        }
        None if n_points == 0 => Vec::new(),
        None => return Err(IoError::InvalidFormat("missing <Points> array".into())),
    };

    let cells_element = piece
        .child("Cells")
        .ok_or_else(|| IoError::InvalidFormat("missing <Cells> section".into()))?;
    let named = |name: &str| -> IoResult<Vec<f64>> {
        let array = cells_element
            .children_named("DataArray")
            .find(|a| a.attribute("Name") == Some(name))
            .ok_or_else(|| IoError::InvalidFormat(format!("missing cell array '{}'", name)))?;
        Ok(read_data_array(array, encoding)?.values)
    };
    let connectivity = named("connectivity")?;
    let offsets = named("offsets")?;
    let types = named("types")?;
    if offsets.len() != n_cells || types.len() != n_cells {
        return Err(IoError::InvalidFormat(format!(
            "expected {} cell offsets and types",
            n_cells
        )));
    }

    let mut cells = Vec::with_capacity(n_cells);
    let mut start = 0usize;
    for (offset, cell_type) in offsets.iter().zip(&types) {
        let end = *offset as usize;
        if end < start || end > connectivity.len() {
            return Err(IoError::InvalidFormat(format!(
                "cell offset {} out of range",
                end
            )));
        }
        let points: Vec<usize> = connectivity[start..end].iter().map(|&i| i as usize).collect();
        if points.iter().any(|&p| p >= n_points) {
            return Err(IoError::InvalidFormat("cell refers to a missing point".into()));
        }
        cells.push(Cell {
            cell_type: CellType::from_code(*cell_type as u8),
            points,
        });
        start = end;
    }

    let mut grid = UnstructuredGrid::new(points, cells);
    if let Some(cell_data) = piece.child("CellData") {
        grid.cell_data = Some(read_attributes(cell_data, n_cells, encoding)?);
    }
    Ok(grid)
}

fn read_attributes(
    element: &XmlElement,
    expected_tuples: usize,
    encoding: Encoding,
) -> IoResult<DataAttributes> {
    let mut attributes = DataAttributes::new();
    for array in element.children_named("DataArray") {
        let array = read_data_array(array, encoding)?;
        if array.tuples() != expected_tuples || array.values.len() % array.components != 0 {
            return Err(IoError::InvalidFormat(format!(
                "array '{}' has {} values, expected {} tuples of {} components",
                array.name,
                array.values.len(),
                expected_tuples,
                array.components
            )));
        }
        attributes.add_array(array);
    }
    Ok(attributes)
}

fn read_data_array(element: &XmlElement, encoding: Encoding) -> IoResult<DataArray> {
    let name = element.attribute("Name").unwrap_or_default().to_string();
    let scalar_type = element.attribute("type").and_then(ScalarType::from_vtk_name);
    let components = element
        .parse_attribute::<usize>("NumberOfComponents")?
        .unwrap_or(1)
        .max(1);

    let values = match element.attribute("format").unwrap_or("ascii") {
        "ascii" => parse_ascii(element.text(), &name)?,
        "binary" => {
            let scalar_type = scalar_type.ok_or_else(|| {
                IoError::InvalidFormat(format!("binary array '{}' has no known type", name))
            })?;
            decode_binary(element.text(), scalar_type, encoding)?
        }
        other => {
            return Err(IoError::UnsupportedFormat(format!(
                "data array format '{}'",
                other
            )))
        }
    };

    Ok(DataArray {
        name,
        scalar_type,
        components,
        values,
    })
}

fn parse_ascii(text: &str, name: &str) -> IoResult<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                IoError::InvalidFormat(format!("array '{}' has non-numeric value '{}'", name, token))
            })
        })
        .collect()
}

fn decode_binary(text: &str, scalar_type: ScalarType, encoding: Encoding) -> IoResult<Vec<f64>> {
    let compact: String = text.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| IoError::InvalidFormat(format!("invalid base64 data: {}", e)))?;

    let header_size = encoding.header.byte_size();
    if bytes.len() < header_size {
        return Err(IoError::InvalidFormat("binary block shorter than its header".into()));
    }
    let declared = encoding
        .header
        .decode(&bytes[..header_size], encoding.little_endian) as usize;
    let payload = &bytes[header_size..];
    if payload.len() < declared {
        return Err(IoError::InvalidFormat(format!(
            "binary block declares {} bytes but holds {}",
            declared,
            payload.len()
        )));
    }

    let size = scalar_type.byte_size();
    Ok(payload[..declared]
        .chunks_exact(size)
        .map(|chunk| scalar_type.decode(chunk, encoding.little_endian))
        .collect())
}

fn to_triple(values: &[f64], what: &str) -> IoResult<[f64; 3]> {
    match values {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(IoError::InvalidFormat(format!("{} needs 3 values", what))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_str;

    const IMAGE: &str = r#"<?xml version="1.0"?>
<VTKFile type="ImageData" version="0.1" byte_order="LittleEndian">
  <RD format_version="6"><rule type="inbuilt" name="Gray-Scott"/></RD>
  <ImageData WholeExtent="0 2 0 1 0 0" Origin="0 0 0" Spacing="1 1 1">
    <Piece Extent="0 2 0 1 0 0">
      <PointData>
        <DataArray type="Float32" Name="a" format="ascii">1 2 3 4 5 6</DataArray>
        <DataArray type="Float32" Name="b" format="ascii">0 0 0 0 0 0.5</DataArray>
      </PointData>
    </Piece>
  </ImageData>
</VTKFile>"#;

    const MESH: &str = r#"<VTKFile type="UnstructuredGrid" version="0.1">
  <UnstructuredGrid>
    <Piece NumberOfPoints="4" NumberOfCells="2">
      <Points><DataArray type="Float32" NumberOfComponents="3" format="ascii">0 0 0 1 0 0 1 1 0 0 1 0</DataArray></Points>
      <Cells>
        <DataArray type="Int64" Name="connectivity" format="ascii">0 1 2 0 2 3</DataArray>
        <DataArray type="Int64" Name="offsets" format="ascii">3 6</DataArray>
        <DataArray type="UInt8" Name="types" format="ascii">5 5</DataArray>
      </Cells>
      <CellData><DataArray type="Float64" Name="a" format="ascii">0.25 0.75</DataArray></CellData>
    </Piece>
  </UnstructuredGrid>
</VTKFile>"#;

    #[test]
    fn test_read_image() {
        let doc = read_str(IMAGE).unwrap();
        assert!(doc.rd.is_some());
        let DataObject::Image(image) = doc.data else {
            panic!("expected image data");
        };
        assert_eq!(image.dimensions, [3, 2, 1]);
        let pd = image.point_data.unwrap();
        assert_eq!(pd.number_of_arrays(), 2);
        assert_eq!(pd.array(1).unwrap().values[5], 0.5);
        assert_eq!(pd.array(0).unwrap().scalar_type, Some(ScalarType::Float32));
    }

    #[test]
    fn test_read_mesh() {
        let doc = read_str(MESH).unwrap();
        assert!(doc.rd.is_none());
        let DataObject::Mesh(grid) = doc.data else {
            panic!("expected unstructured grid");
        };
        assert_eq!(grid.number_of_points(), 4);
        assert_eq!(grid.cells[1].points, vec![0, 2, 3]);
        assert_eq!(grid.cells[0].cell_type, CellType::Triangle);
        assert_eq!(grid.cell_data.unwrap().array(0).unwrap().values, vec![0.25, 0.75]);
    }

    #[test]
    fn test_missing_point_data_section_is_none() {
        let xml = r#"<VTKFile type="ImageData"><ImageData WholeExtent="0 3 0 3 0 0"><Piece/></ImageData></VTKFile>"#;
        let DataObject::Image(image) = read_str(xml).unwrap().data else {
            panic!("expected image data");
        };
        assert!(image.point_data.is_none());
    }

    #[test]
    fn test_wrong_tuple_count_fails() {
        let xml = r#"<VTKFile type="ImageData"><ImageData WholeExtent="0 3 0 0 0 0"><Piece>
            <PointData><DataArray type="Float32" Name="a">1 2 3</DataArray></PointData>
            </Piece></ImageData></VTKFile>"#;
        assert!(matches!(read_str(xml), Err(IoError::InvalidFormat(_))));
    }

    #[test]
    fn test_overflowing_extent_fails() {
        for extent in [
            "-1 9223372036854775807 0 0 0 0",
            "0 0 9223372036854775807 -9223372036854775808 0 0",
        ] {
            let xml = format!(
                r#"<VTKFile type="ImageData"><ImageData WholeExtent="{}"><Piece/></ImageData></VTKFile>"#,
                extent
            );
            assert!(matches!(read_str(&xml), Err(IoError::InvalidFormat(_))));
        }
    }

    #[test]
    fn test_too_many_points_fails() {
        let xml = r#"<VTKFile type="ImageData"><ImageData WholeExtent="0 4294967296 0 4294967296 0 4294967296"><Piece>
            <PointData><DataArray type="Float32" Name="a">1</DataArray></PointData>
            </Piece></ImageData></VTKFile>"#;
        assert!(matches!(read_str(xml), Err(IoError::InvalidFormat(_))));
    }

    #[test]
    fn test_compressed_is_unsupported() {
        let xml = r#"<VTKFile type="ImageData" compressor="vtkZLibDataCompressor"/>"#;
        assert!(matches!(read_str(xml), Err(IoError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_binary_array() {
        let mut bytes = Vec::new();
        ScalarType::UInt32.encode_le(8.0, &mut bytes);
        ScalarType::Float32.encode_le(1.5, &mut bytes);
        ScalarType::Float32.encode_le(-2.0, &mut bytes);
        let encoded = STANDARD.encode(&bytes);
        let xml = format!(
            r#"<VTKFile type="ImageData"><ImageData WholeExtent="0 1 0 0 0 0"><Piece>
            <PointData><DataArray type="Float32" Name="a" format="binary">{}</DataArray></PointData>
            </Piece></ImageData></VTKFile>"#,
            encoded
        );
        let DataObject::Image(image) = read_str(&xml).unwrap().data else {
            panic!("expected image data");
        };
        assert_eq!(image.point_data.unwrap().array(0).unwrap().values, vec![1.5, -2.0]);
    }
}
