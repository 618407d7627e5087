//! ready-io - Spatial containers and descriptor trees for RD files
//!
//! RD files are VTK XML datasets with an embedded `RD` descriptor element:
//!
//! - **ImageData** (`.vti`): regular grids carrying per-point arrays
//! - **UnstructuredGrid** (`.vtu`): meshes carrying per-cell arrays
//!
//! # Design
//!
//! [`sniff_output_type`] reads only the root tag so unsupported files are
//! rejected cheaply. [`read_file`] then parses the document once into an
//! [`XmlElement`] tree and converts it to a [`VtkDocument`].

pub mod container;
pub mod element;
pub mod reader;
pub mod schema;
pub mod vtk_reader;
pub mod vtk_writer;

pub use container::*;
pub use element::{parse_file, parse_str, ElementError, ElementResult, XmlElement};
pub use reader::*;
pub use schema::*;
pub use vtk_reader::VtkDocument;
pub use vtk_writer::{write_file, write_str, DataFormat};
