//! Scalar types and data arrays carried by spatial containers

use serde::{Deserialize, Serialize};

/// Element scalar type of a data array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Parse a VTK type name such as `Float32`
    pub fn from_vtk_name(name: &str) -> Option<Self> {
        match name {
            "Int8" | "Char" => Some(ScalarType::Int8),
            "UInt8" | "UnsignedChar" => Some(ScalarType::UInt8),
            "Int16" | "Short" => Some(ScalarType::Int16),
            "UInt16" | "UnsignedShort" => Some(ScalarType::UInt16),
            "Int32" | "Int" => Some(ScalarType::Int32),
            "UInt32" | "UnsignedInt" => Some(ScalarType::UInt32),
            "Int64" | "Long" => Some(ScalarType::Int64),
            "UInt64" | "UnsignedLong" => Some(ScalarType::UInt64),
            "Float32" | "Float" => Some(ScalarType::Float32),
            "Float64" | "Double" => Some(ScalarType::Float64),
            _ => None,
        }
    }

    /// VTK type name used when writing
    pub fn vtk_name(&self) -> &'static str {
        match self {
            ScalarType::Int8 => "Int8",
            ScalarType::UInt8 => "UInt8",
            ScalarType::Int16 => "Int16",
            ScalarType::UInt16 => "UInt16",
            ScalarType::Int32 => "Int32",
            ScalarType::UInt32 => "UInt32",
            ScalarType::Int64 => "Int64",
            ScalarType::UInt64 => "UInt64",
            ScalarType::Float32 => "Float32",
            ScalarType::Float64 => "Float64",
        }
    }

    /// Size in bytes of one element
    pub fn byte_size(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }

    /// Whether this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }

    /// Representable range for integer types
    fn integer_range(&self) -> Option<(f64, f64)> {
        match self {
            ScalarType::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
            ScalarType::UInt8 => Some((0.0, u8::MAX as f64)),
            ScalarType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            ScalarType::UInt16 => Some((0.0, u16::MAX as f64)),
            ScalarType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            ScalarType::UInt32 => Some((0.0, u32::MAX as f64)),
            ScalarType::Int64 => Some((i64::MIN as f64, i64::MAX as f64)),
            ScalarType::UInt64 => Some((0.0, u64::MAX as f64)),
            ScalarType::Float32 | ScalarType::Float64 => None,
        }
    }

    /// Round a value to what this type can store
    pub fn quantize(&self, value: f64) -> f64 {
        match self {
            ScalarType::Float64 => value,
            ScalarType::Float32 => value as f32 as f64,
            _ => {
                let (lo, hi) = self.integer_range().unwrap_or((f64::MIN, f64::MAX));
                if value.is_nan() {
                    0.0
                } else {
                    value.round().clamp(lo, hi)
                }
            }
        }
    }

    /// Decode one element from raw bytes
    ///
    /// `bytes` must hold exactly `byte_size()` bytes.
    pub fn decode(&self, bytes: &[u8], little_endian: bool) -> f64 {
        macro_rules! read {
            ($t:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                if little_endian {
                    <$t>::from_le_bytes(raw) as f64
                } else {
                    <$t>::from_be_bytes(raw) as f64
                }
            }};
        }
        match self {
            ScalarType::Int8 => read!(i8),
            ScalarType::UInt8 => read!(u8),
            ScalarType::Int16 => read!(i16),
            ScalarType::UInt16 => read!(u16),
            ScalarType::Int32 => read!(i32),
            ScalarType::UInt32 => read!(u32),
            ScalarType::Int64 => read!(i64),
            ScalarType::UInt64 => read!(u64),
            ScalarType::Float32 => read!(f32),
            ScalarType::Float64 => read!(f64),
        }
    }

    /// Encode one element as little-endian bytes
    pub fn encode_le(&self, value: f64, out: &mut Vec<u8>) {
        let value = self.quantize(value);
        match self {
            ScalarType::Int8 => out.extend_from_slice(&(value as i8).to_le_bytes()),
            ScalarType::UInt8 => out.extend_from_slice(&(value as u8).to_le_bytes()),
            ScalarType::Int16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            ScalarType::UInt16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            ScalarType::Int32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            ScalarType::UInt32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            ScalarType::Int64 => out.extend_from_slice(&(value as i64).to_le_bytes()),
            ScalarType::UInt64 => out.extend_from_slice(&(value as u64).to_le_bytes()),
            ScalarType::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            ScalarType::Float64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Format one element for ASCII output
    pub fn format_ascii(&self, value: f64) -> String {
        let value = self.quantize(value);
        match self {
            ScalarType::Float32 => (value as f32).to_string(),
            ScalarType::Float64 => value.to_string(),
            _ => format!("{}", value as i64),
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.vtk_name())
    }
}

/// A named array of tuples, e.g. one chemical's concentrations
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    /// Array name (chemical name for RD data)
    pub name: String,

    /// Element type, when the file declares one we understand
    pub scalar_type: Option<ScalarType>,

    /// Components per tuple
    pub components: usize,

    /// Values, tuple-major
    pub values: Vec<f64>,
}

impl DataArray {
    /// Create a single-component array
    pub fn new(name: impl Into<String>, scalar_type: ScalarType, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            scalar_type: Some(scalar_type),
            components: 1,
            values,
        }
    }

    /// Set the number of components
    pub fn with_components(mut self, components: usize) -> Self {
        self.components = components.max(1);
        self
    }

    /// Number of tuples
    pub fn tuples(&self) -> usize {
        self.values.len() / self.components.max(1)
    }

    /// Extract one component as a contiguous vector
    pub fn component(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.components {
            return None;
        }
        Some(
            self.values
                .iter()
                .skip(index)
                .step_by(self.components)
                .copied()
                .collect(),
        )
    }
}

/// The arrays attached to the points or cells of a container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataAttributes {
    arrays: Vec<DataArray>,
}

impl DataAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array
    pub fn add_array(&mut self, array: DataArray) {
        self.arrays.push(array);
    }

    /// Array by position
    pub fn array(&self, index: usize) -> Option<&DataArray> {
        self.arrays.get(index)
    }

    /// Array by name
    pub fn array_by_name(&self, name: &str) -> Option<&DataArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    pub fn arrays(&self) -> &[DataArray] {
        &self.arrays
    }

    pub fn number_of_arrays(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}
