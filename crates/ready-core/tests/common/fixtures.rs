//! Test fixture loading and RD file builders

use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures")
        .join(name)
}

/// One `DataArray` to embed in a generated file
pub struct ArraySpec {
    pub name: &'static str,
    pub vtk_type: &'static str,
    pub components: usize,
    pub values: Vec<f64>,
}

impl ArraySpec {
    pub fn new(name: &'static str, vtk_type: &'static str, values: Vec<f64>) -> Self {
        Self {
            name,
            vtk_type,
            components: 1,
            values,
        }
    }

    pub fn with_components(mut self, components: usize) -> Self {
        self.components = components;
        self
    }
}

fn data_section(tag: &str, arrays: &[ArraySpec]) -> String {
    let mut out = format!("<{}>", tag);
    for array in arrays {
        let values: Vec<String> = array.values.iter().map(|v| v.to_string()).collect();
        write!(
            out,
            "<DataArray type=\"{}\" Name=\"{}\" NumberOfComponents=\"{}\" format=\"ascii\">{}</DataArray>",
            array.vtk_type,
            array.name,
            array.components,
            values.join(" ")
        )
        .unwrap();
    }
    write!(out, "</{}>", tag).unwrap();
    out
}

/// A `VTKFile` holding an image; `point_data: None` omits the section
pub fn image_document(rd: &str, dims: [usize; 3], point_data: Option<&[ArraySpec]>) -> String {
    let extent = format!("0 {} 0 {} 0 {}", dims[0] - 1, dims[1] - 1, dims[2] - 1);
    let data = point_data
        .map(|arrays| data_section("PointData", arrays))
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\"?>\n<VTKFile type=\"ImageData\" version=\"0.1\">{rd}\
         <ImageData WholeExtent=\"{extent}\" Origin=\"0 0 0\" Spacing=\"1 1 1\">\
         <Piece Extent=\"{extent}\">{data}</Piece></ImageData></VTKFile>\n"
    )
}

/// A `VTKFile` holding two triangles over the unit square
pub fn mesh_document(rd: &str, cell_data: Option<&[ArraySpec]>) -> String {
    let data = cell_data
        .map(|arrays| data_section("CellData", arrays))
        .unwrap_or_default();
    format!(
        "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\">{rd}<UnstructuredGrid>\
         <Piece NumberOfPoints=\"4\" NumberOfCells=\"2\">\
         <Points><DataArray type=\"Float32\" NumberOfComponents=\"3\" format=\"ascii\">\
         0 0 0 1 0 0 1 1 0 0 1 0</DataArray></Points>\
         <Cells>\
         <DataArray type=\"Int64\" Name=\"connectivity\" format=\"ascii\">0 1 2 0 2 3</DataArray>\
         <DataArray type=\"Int64\" Name=\"offsets\" format=\"ascii\">3 6</DataArray>\
         <DataArray type=\"UInt8\" Name=\"types\" format=\"ascii\">5 5</DataArray>\
         </Cells>{data}</Piece></UnstructuredGrid></VTKFile>\n"
    )
}

/// An `RD` element for an inbuilt rule
pub fn inbuilt_rd(name: &str) -> String {
    format!(
        "<RD format_version=\"6\"><rule type=\"inbuilt\" name=\"{}\"/></RD>",
        name
    )
}

/// An `RD` element for a formula rule with Gray-Scott parameters
pub fn formula_rd(source: &str) -> String {
    format!(
        "<RD format_version=\"6\"><description>formula</description>\
         <rule type=\"formula\" name=\"Custom\" wrap=\"1\">\
         <param name=\"timestep\">1</param><param name=\"D_a\">0.082</param>\
         <param name=\"D_b\">0.041</param><param name=\"k\">0.064</param>\
         <param name=\"F\">0.035</param>\
         <formula>{}</formula></rule></RD>",
        source
    )
}

/// An `RD` element for a full kernel rule
pub fn kernel_rd() -> String {
    "<RD format_version=\"6\"><rule type=\"kernel\" name=\"Custom kernel\">\
     <kernel number_of_chemicals=\"2\" block_size_x=\"4\" block_size_y=\"1\" block_size_z=\"1\">\
     __kernel void rd_compute(__global float *a_in) {}</kernel></rule></RD>"
        .to_string()
}

/// Two Float32 chemicals over `n` cells: `a` ramps from 1, `b` has a bump
pub fn two_chemicals(n: usize) -> Vec<ArraySpec> {
    let a = (0..n).map(|i| 1.0 - i as f64 / (2 * n) as f64).collect();
    let b = (0..n)
        .map(|i| if i == n / 2 { 0.5 } else { 0.0 })
        .collect();
    vec![
        ArraySpec::new("a", "Float32", a),
        ArraySpec::new("b", "Float32", b),
    ]
}

/// Write `content` to `dir/name`
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
