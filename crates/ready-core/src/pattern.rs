//! Initial-pattern generator
//!
//! A generator is an ordered list of overlays. Each overlay picks a target
//! chemical, a fill (what value), an operation (how to combine it with the
//! current value) and one or more shapes (where). Shape coordinates are
//! relative: 0 to 1 along each axis of the grid or the mesh bounding box.
//!
//! ```xml
//! <initial_pattern_generator apply_when_loading="true" zero_first="true" seed="1">
//!   <overlay chemical="a"> <overwrite/> <constant value="1"/> <everywhere/> </overlay>
//!   <overlay chemical="b">
//!     <add/> <white_noise low="0" high="0.1"/>
//!     <circle radius="0.1"> <point3D x="0.5" y="0.5" z="0.5"/> </circle>
//!   </overlay>
//! </initial_pattern_generator>
//! ```

use crate::error::{FormatError, FormatResult};
use crate::system::{chemical_index, Parameters};
use ready_io::XmlElement;
use serde::{Deserialize, Serialize};

/// How a fill value is combined with the current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Overwrite,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    const NAMES: [&'static str; 5] = ["overwrite", "add", "subtract", "multiply", "divide"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "overwrite" => Some(Operation::Overwrite),
            "add" => Some(Operation::Add),
            "subtract" => Some(Operation::Subtract),
            "multiply" => Some(Operation::Multiply),
            "divide" => Some(Operation::Divide),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Overwrite => "overwrite",
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    pub fn apply(&self, current: f64, value: f64) -> f64 {
        match self {
            Operation::Overwrite => value,
            Operation::Add => current + value,
            Operation::Subtract => current - value,
            Operation::Multiply => current * value,
            Operation::Divide => current / value,
        }
    }
}

/// Where an overlay's value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fill {
    Constant {
        value: f64,
    },
    /// Uniform noise in `[low, high]`
    WhiteNoise {
        low: f64,
        high: f64,
    },
    /// The current value of another chemical at the same cell
    OtherChemical {
        chemical: String,
    },
    /// The value of a rule parameter
    Parameter {
        name: String,
    },
    /// Linear ramp from `val1` at `p1` to `val2` at `p2`
    LinearGradient {
        val1: f64,
        val2: f64,
        p1: [f64; 3],
        p2: [f64; 3],
    },
    Gaussian {
        height: f64,
        sigma: f64,
        center: [f64; 3],
    },
}

impl Fill {
    const NAMES: [&'static str; 6] = [
        "constant",
        "white_noise",
        "other_chemical",
        "parameter",
        "linear_gradient",
        "gaussian",
    ];
}

/// The region an overlay applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Everywhere,
    /// Axis-aligned box between two corners
    Rectangle { a: [f64; 3], b: [f64; 3] },
    Circle { center: [f64; 3], radius: f64 },
    /// One grid cell by absolute index
    Pixel { x: usize, y: usize, z: usize },
}

impl Shape {
    const NAMES: [&'static str; 4] = ["everywhere", "rectangle", "circle", "pixel"];

    fn contains(&self, site: &Site, active_axes: [bool; 3]) -> bool {
        match self {
            Shape::Everywhere => true,
            Shape::Rectangle { a, b } => (0..3).all(|axis| {
                !active_axes[axis] || {
                    let lo = a[axis].min(b[axis]);
                    let hi = a[axis].max(b[axis]);
                    (lo..=hi).contains(&site.relative[axis])
                }
            }),
            Shape::Circle { center, radius } => {
                distance_squared(&site.relative, center, active_axes) <= radius * radius
            }
            Shape::Pixel { x, y, z } => site.index == Some([*x, *y, *z]),
        }
    }
}

/// One step of the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub chemical: String,
    pub operation: Operation,
    pub fill: Fill,
    pub shapes: Vec<Shape>,
}

/// A cell as seen by the generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    /// Position in [0, 1] per axis
    pub relative: [f64; 3],
    /// Grid index, for image systems
    pub index: Option<[usize; 3]>,
}

/// The cells of a system plus which axes it extends along
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDomain {
    pub sites: Vec<Site>,
    /// Axes with more than one cell; shapes ignore the others
    pub active_axes: [bool; 3],
}

impl PatternDomain {
    /// Sites of a regular grid, at cell centres
    pub fn grid(dims: [usize; 3]) -> Self {
        let [w, h, d] = dims;
        let mut sites = Vec::with_capacity(w * h * d);
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let index = [x, y, z];
                    let mut relative = [0.0; 3];
                    for axis in 0..3 {
                        relative[axis] = (index[axis] as f64 + 0.5) / dims[axis].max(1) as f64;
                    }
                    sites.push(Site {
                        relative,
                        index: Some(index),
                    });
                }
            }
        }
        Self {
            sites,
            active_axes: [w > 1, h > 1, d > 1],
        }
    }

    /// Sites at cell centroids, relative to the bounding box
    pub fn points(centroids: &[[f64; 3]], bounds: ([f64; 3], [f64; 3])) -> Self {
        let (min, max) = bounds;
        let mut active_axes = [false; 3];
        for axis in 0..3 {
            active_axes[axis] = max[axis] > min[axis];
        }
        let sites = centroids
            .iter()
            .map(|c| {
                let mut relative = [0.5; 3];
                for axis in 0..3 {
                    if active_axes[axis] {
                        relative[axis] = (c[axis] - min[axis]) / (max[axis] - min[axis]);
                    }
                }
                Site {
                    relative,
                    index: None,
                }
            })
            .collect();
        Self { sites, active_axes }
    }
}

/// Generates initial chemical concentrations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitialPatternGenerator {
    pub apply_when_loading: bool,
    pub zero_first: bool,
    pub seed: u64,
    pub overlays: Vec<Overlay>,
}

impl InitialPatternGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlays.push(overlay);
        self
    }

    /// Parse an `initial_pattern_generator` element
    pub fn from_xml(element: &XmlElement) -> FormatResult<Self> {
        let mut generator = Self {
            apply_when_loading: element
                .parse_bool_attribute("apply_when_loading")?
                .unwrap_or(false),
            zero_first: element.parse_bool_attribute("zero_first")?.unwrap_or(false),
            seed: element.parse_attribute("seed")?.unwrap_or(0),
            overlays: Vec::new(),
        };
        for child in element.children_named("overlay") {
            generator.overlays.push(parse_overlay(child)?);
        }
        Ok(generator)
    }

    /// Serialize to an `initial_pattern_generator` element
    pub fn to_xml(&self) -> XmlElement {
        let mut element = XmlElement::new("initial_pattern_generator")
            .with_attribute("apply_when_loading", self.apply_when_loading)
            .with_attribute("zero_first", self.zero_first);
        if self.seed != 0 {
            element.set_attribute("seed", self.seed);
        }
        for overlay in &self.overlays {
            element.push_child(overlay_to_xml(overlay));
        }
        element
    }

    /// Fill `chemicals` according to the overlays
    ///
    /// Every overlay's target and fill are resolved before any value is
    /// written, so on error `chemicals` is unchanged.
    pub fn apply(
        &self,
        chemicals: &mut [Vec<f64>],
        domain: &PatternDomain,
        parameters: &Parameters,
    ) -> FormatResult<()> {
        let n_chemicals = chemicals.len();
        let resolved = self
            .overlays
            .iter()
            .map(|overlay| -> FormatResult<_> {
                Ok((
                    overlay,
                    resolve_chemical(&overlay.chemical, n_chemicals)?,
                    ResolvedFill::new(&overlay.fill, n_chemicals, parameters)?,
                ))
            })
            .collect::<FormatResult<Vec<_>>>()?;

        if self.zero_first {
            for field in chemicals.iter_mut() {
                field.iter_mut().for_each(|v| *v = 0.0);
            }
        }

        let mut rng = SimpleRng::new(self.seed);
        for (overlay, target, fill) in resolved {
            let mut updates = Vec::new();
            for (cell, site) in domain.sites.iter().enumerate() {
                if !overlay
                    .shapes
                    .iter()
                    .any(|s| s.contains(site, domain.active_axes))
                {
                    continue;
                }
                let value = fill.value(cell, site, chemicals, &mut rng);
                updates.push((cell, value));
            }

            let field = &mut chemicals[target];
            for (cell, value) in updates {
                if let Some(current) = field.get_mut(cell) {
                    *current = overlay.operation.apply(*current, value);
                }
            }
        }
        Ok(())
    }
}

enum ResolvedFill<'a> {
    Fill(&'a Fill),
    OtherChemical(usize),
    Constant(f64),
}

impl<'a> ResolvedFill<'a> {
    fn new(fill: &'a Fill, n_chemicals: usize, parameters: &Parameters) -> FormatResult<Self> {
        match fill {
            Fill::OtherChemical { chemical } => Ok(ResolvedFill::OtherChemical(
                resolve_chemical(chemical, n_chemicals)?,
            )),
            Fill::Parameter { name } => parameters
                .get(name)
                .map(ResolvedFill::Constant)
                .ok_or_else(|| FormatError::InvalidValue {
                    element: "parameter".to_string(),
                    message: format!("no rule parameter named '{}'", name),
                }),
            other => Ok(ResolvedFill::Fill(other)),
        }
    }

    fn value(&self, cell: usize, site: &Site, chemicals: &[Vec<f64>], rng: &mut SimpleRng) -> f64 {
        match self {
            ResolvedFill::Constant(v) => *v,
            ResolvedFill::OtherChemical(i) => chemicals[*i].get(cell).copied().unwrap_or(0.0),
            ResolvedFill::Fill(fill) => match fill {
                Fill::Constant { value } => *value,
                Fill::WhiteNoise { low, high } => low + (high - low) * rng.next_f64(),
                Fill::LinearGradient { val1, val2, p1, p2 } => {
                    let mut along = 0.0;
                    let mut length_sq = 0.0;
                    for axis in 0..3 {
                        let d = p2[axis] - p1[axis];
                        along += (site.relative[axis] - p1[axis]) * d;
                        length_sq += d * d;
                    }
                    let t = if length_sq > 0.0 {
                        (along / length_sq).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    val1 + t * (val2 - val1)
                }
                Fill::Gaussian {
                    height,
                    sigma,
                    center,
                } => {
                    let d2 = distance_squared(&site.relative, center, [true; 3]);
                    height * (-d2 / (2.0 * sigma * sigma)).exp()
                }
                Fill::OtherChemical { .. } | Fill::Parameter { .. } => 0.0,
            },
        }
    }
}

fn resolve_chemical(name: &str, n_chemicals: usize) -> FormatResult<usize> {
    chemical_index(name)
        .filter(|&i| i < n_chemicals)
        .ok_or_else(|| FormatError::InvalidValue {
            element: "overlay".to_string(),
            message: format!(
                "chemical '{}' does not exist in a {}-chemical system",
                name, n_chemicals
            ),
        })
}

fn distance_squared(p: &[f64; 3], q: &[f64; 3], axes: [bool; 3]) -> f64 {
    (0..3)
        .filter(|&axis| axes[axis])
        .map(|axis| (p[axis] - q[axis]).powi(2))
        .sum()
}

fn overlay_error(message: String) -> FormatError {
    FormatError::InvalidValue {
        element: "overlay".to_string(),
        message,
    }
}

fn parse_overlay(element: &XmlElement) -> FormatResult<Overlay> {
    let chemical = element.required_attribute("chemical")?.to_string();
    let mut operation = None;
    let mut fill = None;
    let mut shapes = Vec::new();

    for child in element.children() {
        let name = child.name();
        if let Some(op) = Operation::from_name(name) {
            if operation.replace(op).is_some() {
                return Err(overlay_error("more than one operation".to_string()));
            }
        } else if Fill::NAMES.contains(&name) {
            if fill.replace(parse_fill(child)?).is_some() {
                return Err(overlay_error("more than one fill".to_string()));
            }
        } else if Shape::NAMES.contains(&name) {
            shapes.push(parse_shape(child)?);
        } else {
            return Err(overlay_error(format!("unknown element <{}>", name)));
        }
    }

    Ok(Overlay {
        chemical,
        operation: operation.ok_or_else(|| {
            overlay_error(format!("needs one of {}", Operation::NAMES.join(", ")))
        })?,
        fill: fill.ok_or_else(|| overlay_error(format!("needs one of {}", Fill::NAMES.join(", "))))?,
        shapes,
    })
}

fn parse_point(element: &XmlElement) -> FormatResult<[f64; 3]> {
    Ok([
        element.parse_required_attribute("x")?,
        element.parse_required_attribute("y")?,
        element.parse_attribute("z")?.unwrap_or(0.5),
    ])
}

fn parse_points(element: &XmlElement, count: usize) -> FormatResult<Vec<[f64; 3]>> {
    let points = element
        .children_named("point3D")
        .map(parse_point)
        .collect::<FormatResult<Vec<_>>>()?;
    if points.len() != count {
        return Err(FormatError::InvalidValue {
            element: element.name().to_string(),
            message: format!("expected {} point3D elements, found {}", count, points.len()),
        });
    }
    Ok(points)
}

fn parse_fill(element: &XmlElement) -> FormatResult<Fill> {
    Ok(match element.name() {
        "constant" => Fill::Constant {
            value: element.parse_required_attribute("value")?,
        },
        "white_noise" => Fill::WhiteNoise {
            low: element.parse_required_attribute("low")?,
            high: element.parse_required_attribute("high")?,
        },
        "other_chemical" => Fill::OtherChemical {
            chemical: element.required_attribute("chemical")?.to_string(),
        },
        "parameter" => Fill::Parameter {
            name: element.required_attribute("name")?.to_string(),
        },
        "linear_gradient" => {
            let points = parse_points(element, 2)?;
            Fill::LinearGradient {
                val1: element.parse_required_attribute("val1")?,
                val2: element.parse_required_attribute("val2")?,
                p1: points[0],
                p2: points[1],
            }
        }
        "gaussian" => {
            let sigma: f64 = element.parse_required_attribute("sigma")?;
            if sigma <= 0.0 {
                return Err(FormatError::InvalidValue {
                    element: "gaussian".to_string(),
                    message: "sigma must be positive".to_string(),
                });
            }
            Fill::Gaussian {
                height: element.parse_required_attribute("height")?,
                sigma,
                center: parse_points(element, 1)?[0],
            }
        }
        other => return Err(overlay_error(format!("unknown fill <{}>", other))),
    })
}

fn parse_shape(element: &XmlElement) -> FormatResult<Shape> {
    Ok(match element.name() {
        "everywhere" => Shape::Everywhere,
        "rectangle" => {
            let points = parse_points(element, 2)?;
            Shape::Rectangle {
                a: points[0],
                b: points[1],
            }
        }
        "circle" => Shape::Circle {
            radius: element.parse_required_attribute("radius")?,
            center: parse_points(element, 1)?[0],
        },
        "pixel" => Shape::Pixel {
            x: element.parse_required_attribute("x")?,
            y: element.parse_required_attribute("y")?,
            z: element.parse_attribute("z")?.unwrap_or(0),
        },
        other => return Err(overlay_error(format!("unknown shape <{}>", other))),
    })
}

fn point_element(p: &[f64; 3]) -> XmlElement {
    XmlElement::new("point3D")
        .with_attribute("x", p[0])
        .with_attribute("y", p[1])
        .with_attribute("z", p[2])
}

fn overlay_to_xml(overlay: &Overlay) -> XmlElement {
    let fill = match &overlay.fill {
        Fill::Constant { value } => XmlElement::new("constant").with_attribute("value", value),
        Fill::WhiteNoise { low, high } => XmlElement::new("white_noise")
            .with_attribute("low", low)
            .with_attribute("high", high),
        Fill::OtherChemical { chemical } => {
            XmlElement::new("other_chemical").with_attribute("chemical", chemical)
        }
        Fill::Parameter { name } => XmlElement::new("parameter").with_attribute("name", name),
        Fill::LinearGradient { val1, val2, p1, p2 } => XmlElement::new("linear_gradient")
            .with_attribute("val1", val1)
            .with_attribute("val2", val2)
            .with_child(point_element(p1))
            .with_child(point_element(p2)),
        Fill::Gaussian {
            height,
            sigma,
            center,
        } => XmlElement::new("gaussian")
            .with_attribute("height", height)
            .with_attribute("sigma", sigma)
            .with_child(point_element(center)),
    };

    let mut element = XmlElement::new("overlay")
        .with_attribute("chemical", &overlay.chemical)
        .with_child(XmlElement::new(overlay.operation.name()))
        .with_child(fill);
    for shape in &overlay.shapes {
        element.push_child(match shape {
            Shape::Everywhere => XmlElement::new("everywhere"),
            Shape::Rectangle { a, b } => XmlElement::new("rectangle")
                .with_child(point_element(a))
                .with_child(point_element(b)),
            Shape::Circle { center, radius } => XmlElement::new("circle")
                .with_attribute("radius", radius)
                .with_child(point_element(center)),
            Shape::Pixel { x, y, z } => XmlElement::new("pixel")
                .with_attribute("x", x)
                .with_attribute("y", y)
                .with_attribute("z", z),
        });
    }
    element
}

/// Simple seeded random number generator (SplitMix64 variant)
#[derive(Debug, Clone)]
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E3779B97F4A7C15),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }
}
