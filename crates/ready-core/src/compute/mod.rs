//! Compute backend abstraction
//!
//! Formula and kernel rules are executed by a [`ComputeBackend`] bound to a
//! `(platform, device, scalar type)` target when the system is created. A
//! [`BackendProvider`] opens backends and knows how to tell a user what to
//! install when no device is available.
//!
//! The crate ships one provider, [`host::HostBackendProvider`], which runs
//! formula programs on the CPU. Device backends live outside this crate.

pub mod host;

use crate::error::ComputeResult;
use ndarray::ArrayView3;
use ready_io::ScalarType;
use serde::{Deserialize, Serialize};

pub use host::{HostBackend, HostBackendProvider};

/// Where a backend runs and at what precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeTarget {
    pub platform: usize,
    pub device: usize,
    pub scalar_type: ScalarType,
}

/// A program handed to a backend for compilation
#[derive(Debug, Clone, PartialEq)]
pub enum KernelProgram {
    /// Per-cell statements assigning `delta_<chemical>`
    Formula {
        source: String,
        chemicals: Vec<String>,
        parameters: Vec<(String, f64)>,
        timestep: f64,
    },
    /// A complete user kernel, passed through verbatim
    FullKernel {
        source: String,
        chemicals: Vec<String>,
        parameters: Vec<(String, f64)>,
        block_size: [usize; 3],
    },
}

impl KernelProgram {
    pub fn source(&self) -> &str {
        match self {
            KernelProgram::Formula { source, .. } | KernelProgram::FullKernel { source, .. } => {
                source
            }
        }
    }

    pub fn chemicals(&self) -> &[String] {
        match self {
            KernelProgram::Formula { chemicals, .. }
            | KernelProgram::FullKernel { chemicals, .. } => chemicals,
        }
    }
}

/// How cells are connected, for Laplacians
#[derive(Debug, Clone, PartialEq)]
pub enum Neighbourhood {
    /// Regular grid; `dims` are width, height, depth
    Grid { dims: [usize; 3], wrap: bool },
    /// Explicit adjacency with per-edge weights
    Graph {
        neighbours: Vec<Vec<usize>>,
        weights: Vec<Vec<f64>>,
    },
}

impl Neighbourhood {
    /// Number of cells
    pub fn len(&self) -> usize {
        match self {
            Neighbourhood::Grid { dims, .. } => dims.iter().product(),
            Neighbourhood::Graph { neighbours, .. } => neighbours.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index coordinates of a cell (graph cells use their index as x)
    pub fn coordinates(&self, cell: usize) -> [usize; 3] {
        match self {
            Neighbourhood::Grid { dims, .. } => {
                let [w, h, _] = *dims;
                [cell % w, (cell / w) % h, cell / (w * h)]
            }
            Neighbourhood::Graph { .. } => [cell, 0, 0],
        }
    }

    /// Discrete Laplacian of one field
    ///
    /// On a grid this is the sum over the six axis neighbours of
    /// `neighbour - centre`. Without wrap-around, neighbours beyond the edge
    /// contribute nothing. A singleton axis contributes nothing either way.
    pub fn laplacian(&self, field: &[f64]) -> ComputeResult<Vec<f64>> {
        if field.len() != self.len() {
            return Err(crate::error::ComputeError::Run(format!(
                "field has {} values, neighbourhood has {} cells",
                field.len(),
                self.len()
            )));
        }
        match self {
            Neighbourhood::Grid { dims, wrap } => Ok(grid_laplacian(field, *dims, *wrap)),
            Neighbourhood::Graph {
                neighbours,
                weights,
            } => Ok(neighbours
                .iter()
                .zip(weights)
                .enumerate()
                .map(|(i, (ns, ws))| {
                    ns.iter()
                        .zip(ws)
                        .map(|(&n, &w)| w * (field[n] - field[i]))
                        .sum()
                })
                .collect()),
        }
    }
}

fn grid_laplacian(field: &[f64], dims: [usize; 3], wrap: bool) -> Vec<f64> {
    let [w, h, d] = dims;
    let view = match ArrayView3::from_shape((d, h, w), field) {
        Ok(view) => view,
        Err(_) => return vec![0.0; field.len()],
    };

    let step = |i: usize, n: usize, forward: bool| -> Option<usize> {
        match (forward, wrap) {
            (true, _) if i + 1 < n => Some(i + 1),
            (true, true) => Some(0),
            (false, _) if i > 0 => Some(i - 1),
            (false, true) => Some(n - 1),
            _ => None,
        }
    };

    let mut out = Vec::with_capacity(field.len());
    for ((z, y, x), &c) in view.indexed_iter() {
        let mut sum = 0.0;
        for forward in [false, true] {
            if let Some(nx) = step(x, w, forward) {
                sum += view[[z, y, nx]] - c;
            }
            if let Some(ny) = step(y, h, forward) {
                sum += view[[z, ny, x]] - c;
            }
            if let Some(nz) = step(z, d, forward) {
                sum += view[[nz, y, x]] - c;
            }
        }
        out.push(sum);
    }
    out
}

/// Opens compute backends and describes how to install them
pub trait BackendProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Bind a backend to a target
    fn open(&self, target: ComputeTarget) -> ComputeResult<Box<dyn ComputeBackend>>;

    /// Guidance shown when compute support is unavailable
    fn installation_hints(&self) -> String;
}

/// A backend bound to one target
pub trait ComputeBackend: Send + std::fmt::Debug {
    fn target(&self) -> ComputeTarget;

    /// Compile a program; replaces any previously compiled one
    fn compile(&mut self, program: &KernelProgram) -> ComputeResult<()>;

    /// Advance `chemicals` by `iterations` timesteps with the compiled program
    fn run(
        &mut self,
        chemicals: &mut [Vec<f64>],
        neighbourhood: &Neighbourhood,
        iterations: usize,
    ) -> ComputeResult<()>;
}
