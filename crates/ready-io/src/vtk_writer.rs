//! Writing RD/VTK XML files

use crate::container::{DataObject, ImageData, UnstructuredGrid};
use crate::element::XmlElement;
use crate::reader::{IoError, IoResult};
use crate::schema::{DataArray, DataAttributes, ScalarType};
use crate::vtk_reader::VtkDocument;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

/// How data array values are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    /// Whitespace separated text
    #[default]
    Ascii,
    /// Base64 with a UInt32 byte-count header, little endian
    Binary,
}

/// Build the `VTKFile` element tree for a document
pub fn document_to_element(document: &VtkDocument, format: DataFormat) -> XmlElement {
    let type_name = match &document.data {
        DataObject::Image(_) => "ImageData",
        DataObject::Mesh(_) => "UnstructuredGrid",
    };
    let mut root = XmlElement::new("VTKFile")
        .with_attribute("type", type_name)
        .with_attribute("version", "1.0")
        .with_attribute("byte_order", "LittleEndian")
        .with_attribute("header_type", "UInt32");

    if let Some(rd) = &document.rd {
        root.push_child(rd.clone());
    }
    match &document.data {
        DataObject::Image(image) => root.push_child(image_element(image, format)),
        DataObject::Mesh(grid) => root.push_child(grid_element(grid, format)),
    }
    root
}

/// Serialize a document to a string
pub fn write_str(document: &VtkDocument, format: DataFormat) -> IoResult<String> {
    document_to_element(document, format)
        .to_xml_string()
        .map_err(IoError::from)
}

/// Serialize a document to a file
pub fn write_file(
    path: impl AsRef<Path>,
    document: &VtkDocument,
    format: DataFormat,
) -> IoResult<()> {
    let path = path.as_ref();
    let content = write_str(document, format)?;
    std::fs::write(path, content)
        .map_err(|e| IoError::Io(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), "wrote VTK XML file");
    Ok(())
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn image_element(image: &ImageData, format: DataFormat) -> XmlElement {
    let extent = join(&image.extent()[..]);
    let mut piece = XmlElement::new("Piece").with_attribute("Extent", &extent);
    if let Some(point_data) = &image.point_data {
        piece.push_child(attributes_element("PointData", point_data, format));
    }
    XmlElement::new("ImageData")
        .with_attribute("WholeExtent", extent)
        .with_attribute("Origin", join(&image.origin[..]))
        .with_attribute("Spacing", join(&image.spacing[..]))
        .with_child(piece)
}

fn grid_element(grid: &UnstructuredGrid, format: DataFormat) -> XmlElement {
    let points: Vec<f64> = grid.points.iter().flatten().copied().collect();
    let points = DataArray::new("Points", ScalarType::Float32, points).with_components(3);

    let mut connectivity = Vec::new();
    let mut offsets = Vec::with_capacity(grid.cells.len());
    let mut types = Vec::with_capacity(grid.cells.len());
    for cell in &grid.cells {
        connectivity.extend(cell.points.iter().map(|&p| p as f64));
        offsets.push(connectivity.len() as f64);
        types.push(cell.cell_type.code() as f64);
    }

    let mut piece = XmlElement::new("Piece")
        .with_attribute("NumberOfPoints", grid.number_of_points())
        .with_attribute("NumberOfCells", grid.number_of_cells())
        .with_child(XmlElement::new("Points").with_child(array_element(&points, format)))
        .with_child(
            XmlElement::new("Cells")
                .with_child(array_element(
                    &DataArray::new("connectivity", ScalarType::Int64, connectivity),
                    format,
                ))
                .with_child(array_element(
                    &DataArray::new("offsets", ScalarType::Int64, offsets),
                    format,
                ))
                .with_child(array_element(
                    &DataArray::new("types", ScalarType::UInt8, types),
                    format,
                )),
        );
    if let Some(cell_data) = &grid.cell_data {
        piece.push_child(attributes_element("CellData", cell_data, format));
    }
    XmlElement::new("UnstructuredGrid").with_child(piece)
}

fn attributes_element(name: &str, attributes: &DataAttributes, format: DataFormat) -> XmlElement {
    let mut element = XmlElement::new(name);
    if let Some(first) = attributes.array(0) {
        element.set_attribute("Scalars", &first.name);
    }
    for array in attributes.arrays() {
        element.push_child(array_element(array, format));
    }
    element
}

fn array_element(array: &DataArray, format: DataFormat) -> XmlElement {
    let scalar_type = array.scalar_type.unwrap_or(ScalarType::Float64);
    let mut element = XmlElement::new("DataArray")
        .with_attribute("type", scalar_type.vtk_name())
        .with_attribute("Name", &array.name)
        .with_attribute("NumberOfComponents", array.components);

    match format {
        DataFormat::Ascii => {
            let text = array
                .values
                .iter()
                .map(|&v| scalar_type.format_ascii(v))
                .collect::<Vec<_>>()
                .join(" ");
            element.set_attribute("format", "ascii");
            element.with_text(text)
        }
        DataFormat::Binary => {
            let mut payload = Vec::with_capacity(array.values.len() * scalar_type.byte_size());
            for &v in &array.values {
                scalar_type.encode_le(v, &mut payload);
            }
            let mut block = Vec::with_capacity(payload.len() + 4);
            ScalarType::UInt32.encode_le(payload.len() as f64, &mut block);
            block.extend_from_slice(&payload);
            element.set_attribute("format", "binary");
            element.with_text(STANDARD.encode(&block))
        }
    }
}
