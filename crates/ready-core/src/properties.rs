//! Render settings: an ordered store of named, typed values
//!
//! A file's `render_settings` element overlays values onto the defaults,
//! one child element per property:
//!
//! ```xml
//! <render_settings>
//!   <low value="0.1"/>
//!   <color_low r="0" g="0" b="1"/>
//!   <slice_3D_axis value="x"/>
//! </render_settings>
//! ```

use crate::error::{FormatError, FormatResult};
use ready_io::XmlElement;
use serde::{Deserialize, Serialize};

/// Slicing axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// A typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    /// RGB components in [0, 1]
    Color([f64; 3]),
    /// A chemical name such as `a`
    Chemical(String),
    Axis(Axis),
}

impl PropertyValue {
    /// Get a human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Float(_) => "float",
            PropertyValue::Int(_) => "int",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Color(_) => "color",
            PropertyValue::Chemical(_) => "chemical",
            PropertyValue::Axis(_) => "axis",
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<[f64; 3]> {
        match self {
            PropertyValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_chemical(&self) -> Option<&str> {
        match self {
            PropertyValue::Chemical(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_axis(&self) -> Option<Axis> {
        match self {
            PropertyValue::Axis(v) => Some(*v),
            _ => None,
        }
    }

    fn same_type(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Parse a value of the same type as `self` from a property element
    fn parse_like(&self, element: &XmlElement) -> FormatResult<PropertyValue> {
        let invalid = |message: String| FormatError::InvalidValue {
            element: element.name().to_string(),
            message,
        };
        let value = match self {
            PropertyValue::Float(_) => {
                PropertyValue::Float(element.parse_required_attribute("value")?)
            }
            PropertyValue::Int(_) => PropertyValue::Int(element.parse_required_attribute("value")?),
            PropertyValue::Bool(_) => PropertyValue::Bool(
                element
                    .parse_bool_attribute("value")?
                    .ok_or_else(|| invalid("missing attribute 'value'".to_string()))?,
            ),
            PropertyValue::Color(_) => {
                let r: f64 = element.parse_required_attribute("r")?;
                let g: f64 = element.parse_required_attribute("g")?;
                let b: f64 = element.parse_required_attribute("b")?;
                if [r, g, b].iter().any(|c| !(0.0..=1.0).contains(c)) {
                    return Err(invalid(format!("color ({}, {}, {}) outside [0, 1]", r, g, b)));
                }
                PropertyValue::Color([r, g, b])
            }
            PropertyValue::Chemical(_) => {
                let name = element.required_attribute("value")?.trim();
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(invalid(format!("'{}' is not a chemical name", name)));
                }
                PropertyValue::Chemical(name.to_string())
            }
            PropertyValue::Axis(_) => {
                let name = element.required_attribute("value")?.trim();
                PropertyValue::Axis(
                    Axis::from_name(name)
                        .ok_or_else(|| invalid(format!("'{}' is not an axis", name)))?,
                )
            }
        };
        Ok(value)
    }

    fn to_element(&self, name: &str) -> XmlElement {
        let element = XmlElement::new(name);
        match self {
            PropertyValue::Float(v) => element.with_attribute("value", v),
            PropertyValue::Int(v) => element.with_attribute("value", v),
            PropertyValue::Bool(v) => element.with_attribute("value", v),
            PropertyValue::Color([r, g, b]) => element
                .with_attribute("r", r)
                .with_attribute("g", g)
                .with_attribute("b", b),
            PropertyValue::Chemical(v) => element.with_attribute("value", v),
            PropertyValue::Axis(v) => element.with_attribute("value", v.name()),
        }
    }
}

/// A named property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

/// An ordered set of properties with unique names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    name: String,
    properties: Vec<Property>,
}

impl Properties {
    /// Create an empty set; `name` is the XML element name used when saving
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// The default render settings
    pub fn render_settings() -> Self {
        let mut p = Self::new("render_settings");
        p.add("surface_color", PropertyValue::Color([1.0, 1.0, 1.0]));
        p.add("color_low", PropertyValue::Color([0.0, 0.0, 1.0]));
        p.add("color_high", PropertyValue::Color([1.0, 0.0, 0.0]));
        p.add("show_color_scale", PropertyValue::Bool(true));
        p.add("show_multiple_chemicals", PropertyValue::Bool(true));
        p.add("active_chemical", PropertyValue::Chemical("a".into()));
        p.add("low", PropertyValue::Float(0.0));
        p.add("high", PropertyValue::Float(1.0));
        p.add("vertical_scale_1D", PropertyValue::Float(30.0));
        p.add("vertical_scale_2D", PropertyValue::Float(15.0));
        p.add("contour_level", PropertyValue::Float(0.25));
        p.add("use_image_interpolation", PropertyValue::Bool(true));
        p.add("timesteps_per_render", PropertyValue::Int(100));
        p.add("slice_3D", PropertyValue::Bool(true));
        p.add("slice_3D_axis", PropertyValue::Axis(Axis::Z));
        p.add("slice_3D_position", PropertyValue::Float(0.5));
        p.add("show_displacement_mapped_surface", PropertyValue::Bool(true));
        p.add("color_displacement_mapped_surface", PropertyValue::Bool(true));
        p.add("use_wireframe", PropertyValue::Bool(false));
        p.add("show_cell_edges", PropertyValue::Bool(false));
        p.add("show_bounding_box", PropertyValue::Bool(true));
        p.add("show_chemical_label", PropertyValue::Bool(true));
        p.add("show_phase_plot", PropertyValue::Bool(false));
        p.add("phase_plot_x_axis", PropertyValue::Chemical("a".into()));
        p.add("phase_plot_y_axis", PropertyValue::Chemical("b".into()));
        p.add("phase_plot_z_axis", PropertyValue::Chemical("c".into()));
        p
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a property, replacing any existing one with the same name
    pub fn add(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.properties.push(Property { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_float())
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_int())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    pub fn get_color(&self, name: &str) -> Option<[f64; 3]> {
        self.get(name).and_then(|v| v.as_color())
    }

    pub fn get_chemical(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_chemical())
    }

    pub fn get_axis(&self, name: &str) -> Option<Axis> {
        self.get(name).and_then(|v| v.as_axis())
    }

    /// Change an existing property, keeping its type
    pub fn set(&mut self, name: &str, value: PropertyValue) -> FormatResult<()> {
        let property = self
            .properties
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| FormatError::InvalidValue {
                element: name.to_string(),
                message: "unknown property".to_string(),
            })?;
        if !property.value.same_type(&value) {
            return Err(FormatError::InvalidValue {
                element: name.to_string(),
                message: format!(
                    "expected a {} value, got {}",
                    property.value.type_name(),
                    value.type_name()
                ),
            });
        }
        property.value = value;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Overlay values from an XML element onto this set
    ///
    /// Unknown property names are skipped with a warning. A known property
    /// whose value cannot be parsed fails the whole overlay and leaves the
    /// set unchanged.
    pub fn overlay_from_xml(&mut self, element: &XmlElement) -> FormatResult<()> {
        let mut updates = Vec::new();
        for child in element.children() {
            match self.get(child.name()) {
                Some(current) => updates.push((child.name().to_string(), current.parse_like(child)?)),
                None => {
                    tracing::warn!(property = child.name(), "skipping unknown render setting")
                }
            }
        }
        for (name, value) in updates {
            self.add(name, value);
        }
        Ok(())
    }

    /// Serialize to an XML element
    pub fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new(&self.name);
        for property in &self.properties {
            element.push_child(property.value.to_element(&property.name));
        }
        element
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self::render_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ready_io::parse_str;

    #[test]
    fn test_defaults() {
        let p = Properties::render_settings();
        assert_eq!(p.len(), 26);
        assert_eq!(p.get_float("contour_level"), Some(0.25));
        assert_eq!(p.get_int("timesteps_per_render"), Some(100));
        assert_eq!(p.get_color("color_low"), Some([0.0, 0.0, 1.0]));
        assert_eq!(p.get_axis("slice_3D_axis"), Some(Axis::Z));
        assert_eq!(p.get_chemical("phase_plot_z_axis"), Some("c"));
        assert_eq!(p.get_bool("use_wireframe"), Some(false));
    }

    #[test]
    fn test_overlay_changes_only_named() {
        let mut p = Properties::render_settings();
        let xml = parse_str(
            r#"<render_settings>
                 <low value="0.1"/>
                 <color_high r="0" g="1" b="0"/>
                 <slice_3D_axis value="x"/>
                 <show_bounding_box value="false"/>
               </render_settings>"#,
        )
        .unwrap();
        p.overlay_from_xml(&xml).unwrap();

        assert_eq!(p.get_float("low"), Some(0.1));
        assert_eq!(p.get_color("color_high"), Some([0.0, 1.0, 0.0]));
        assert_eq!(p.get_axis("slice_3D_axis"), Some(Axis::X));
        assert_eq!(p.get_bool("show_bounding_box"), Some(false));
        assert_eq!(p.get_float("high"), Some(1.0));
    }

    #[test]
    fn test_unknown_names_skipped() {
        let mut p = Properties::render_settings();
        let xml = parse_str(r#"<render_settings><glow value="3"/><high value="2"/></render_settings>"#)
            .unwrap();
        p.overlay_from_xml(&xml).unwrap();
        assert!(!p.contains("glow"));
        assert_eq!(p.get_float("high"), Some(2.0));
    }

    #[test]
    fn test_bad_value_leaves_set_unchanged() {
        let mut p = Properties::render_settings();
        let xml = parse_str(
            r#"<render_settings><low value="0.5"/><high value="lots"/></render_settings>"#,
        )
        .unwrap();
        assert!(p.overlay_from_xml(&xml).is_err());
        assert_eq!(p.get_float("low"), Some(0.0));

        let xml = parse_str(r#"<render_settings><slice_3D_axis value="w"/></render_settings>"#)
            .unwrap();
        assert!(matches!(
            p.overlay_from_xml(&xml),
            Err(FormatError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_set_checks_type() {
        let mut p = Properties::render_settings();
        assert!(p.set("low", PropertyValue::Float(-1.0)).is_ok());
        assert!(p.set("low", PropertyValue::Bool(true)).is_err());
        assert!(p.set("missing", PropertyValue::Int(1)).is_err());
    }

    #[test]
    fn test_xml_round_trip() {
        let mut p = Properties::render_settings();
        p.set("active_chemical", PropertyValue::Chemical("b".into()))
            .unwrap();
        p.set("surface_color", PropertyValue::Color([0.5, 0.25, 1.0]))
            .unwrap();
        let xml = p.to_xml();

        let mut back = Properties::render_settings();
        back.overlay_from_xml(&xml).unwrap();
        assert_eq!(back, p);
    }
}
