//! CPU backend for formula rules
//!
//! Formula programs are parsed and checked at compile time, then evaluated
//! once per cell per timestep. Every cell sees the values from the start of
//! the timestep; updates are applied after all cells are evaluated.
//!
//! Full kernels are written for a device runtime and are rejected.
//!
//! The target's scalar type does not narrow host arithmetic: values are
//! evaluated and kept as `f64` between steps, and are only quantized to the
//! system's scalar type when the system is written back to a container.

use super::{BackendProvider, ComputeBackend, ComputeTarget, KernelProgram, Neighbourhood};
use crate::error::{ComputeError, ComputeResult};
use ready_formula::{check_functions, parse_program, EvalContext, Evaluator, Program};
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Provider for [`HostBackend`]s; the host has a single platform and device
#[derive(Debug, Default, Clone)]
pub struct HostBackendProvider;

impl HostBackendProvider {
    pub fn new() -> Self {
        Self
    }
}

impl BackendProvider for HostBackendProvider {
    fn name(&self) -> &str {
        "host"
    }

    fn open(&self, target: ComputeTarget) -> ComputeResult<Box<dyn ComputeBackend>> {
        if target.platform != 0 || target.device != 0 {
            return Err(ComputeError::Device {
                platform: target.platform,
                device: target.device,
                message: "the host backend only has platform 0, device 0".to_string(),
            });
        }
        tracing::debug!(scalar_type = %target.scalar_type, "opened host compute backend");
        Ok(Box::new(HostBackend::new(target)))
    }

    fn installation_hints(&self) -> String {
        "Formula rules run on the built-in host backend. Kernel rules need a \
         device backend: install an OpenCL runtime for your GPU or CPU (vendor \
         driver, or pocl on Linux) and build with a device provider."
            .to_string()
    }
}

#[derive(Debug)]
struct CompiledFormula {
    program: Program,
    chemicals: Vec<String>,
    parameters: HashMap<String, f64>,
    timestep: f64,
}

/// Runs formula programs on the CPU
#[derive(Debug)]
pub struct HostBackend {
    target: ComputeTarget,
    compiled: Option<CompiledFormula>,
}

impl HostBackend {
    pub fn new(target: ComputeTarget) -> Self {
        Self {
            target,
            compiled: None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }
}

impl ComputeBackend for HostBackend {
    fn target(&self) -> ComputeTarget {
        self.target
    }

    fn compile(&mut self, program: &KernelProgram) -> ComputeResult<()> {
        let KernelProgram::Formula {
            source,
            chemicals,
            parameters,
            timestep,
        } = program
        else {
            return Err(ComputeError::Unsupported(
                "full kernels need a device backend".to_string(),
            ));
        };

        let parsed = parse_program(source)?;
        check_functions(&parsed)?;

        let parameters: HashMap<String, f64> = parameters.iter().cloned().collect();
        for name in parsed.free_variables() {
            if !is_known(&name, chemicals, &parameters) {
                return Err(ComputeError::Compile(format!("unknown identifier '{}'", name)));
            }
        }

        tracing::debug!(
            statements = parsed.statements.len(),
            chemicals = chemicals.len(),
            "compiled formula"
        );
        self.compiled = Some(CompiledFormula {
            program: parsed,
            chemicals: chemicals.clone(),
            parameters,
            timestep: *timestep,
        });
        Ok(())
    }

    fn run(
        &mut self,
        chemicals: &mut [Vec<f64>],
        neighbourhood: &Neighbourhood,
        iterations: usize,
    ) -> ComputeResult<()> {
        let compiled = self.compiled.as_ref().ok_or(ComputeError::NotCompiled)?;
        if chemicals.len() != compiled.chemicals.len() {
            return Err(ComputeError::Run(format!(
                "program has {} chemicals, data has {}",
                compiled.chemicals.len(),
                chemicals.len()
            )));
        }
        for _ in 0..iterations {
            step(compiled, chemicals, neighbourhood)?;
        }
        Ok(())
    }
}

fn is_known(name: &str, chemicals: &[String], parameters: &HashMap<String, f64>) -> bool {
    let is_chemical = |n: &str| chemicals.iter().any(|c| c == n);
    is_chemical(name)
        || name.strip_prefix("laplacian_").is_some_and(is_chemical)
        || name.strip_prefix("delta_").is_some_and(is_chemical)
        || parameters.contains_key(name)
        || matches!(name, "x" | "y" | "z")
}

struct CellContext<'a> {
    cell: usize,
    coordinates: [usize; 3],
    compiled: &'a CompiledFormula,
    chemicals: &'a [Vec<f64>],
    laplacians: &'a [Vec<f64>],
}

impl CellContext<'_> {
    fn chemical_index(&self, name: &str) -> Option<usize> {
        self.compiled.chemicals.iter().position(|c| c == name)
    }
}

impl EvalContext for CellContext<'_> {
    fn variable(&self, name: &str) -> Option<f64> {
        if let Some(i) = self.chemical_index(name) {
            return Some(self.chemicals[i][self.cell]);
        }
        if let Some(i) = name
            .strip_prefix("laplacian_")
            .and_then(|c| self.chemical_index(c))
        {
            return Some(self.laplacians[i][self.cell]);
        }
        if name
            .strip_prefix("delta_")
            .and_then(|c| self.chemical_index(c))
            .is_some()
        {
            return Some(0.0);
        }
        if let Some(v) = self.compiled.parameters.get(name) {
            return Some(*v);
        }
        match name {
            "x" => Some(self.coordinates[0] as f64),
            "y" => Some(self.coordinates[1] as f64),
            "z" => Some(self.coordinates[2] as f64),
            _ => None,
        }
    }
}

fn step(
    compiled: &CompiledFormula,
    chemicals: &mut [Vec<f64>],
    neighbourhood: &Neighbourhood,
) -> ComputeResult<()> {
    let laplacians = chemicals
        .iter()
        .map(|field| neighbourhood.laplacian(field))
        .collect::<ComputeResult<Vec<_>>>()?;

    let n_cells = neighbourhood.len();
    let current: &[Vec<f64>] = chemicals;
    let evaluate = |cell: usize| -> ComputeResult<Vec<f64>> {
        let context = CellContext {
            cell,
            coordinates: neighbourhood.coordinates(cell),
            compiled,
            chemicals: current,
            laplacians: &laplacians,
        };
        let locals = Evaluator::new(&context).run(&compiled.program)?;
        Ok(compiled
            .chemicals
            .iter()
            .map(|c| locals.get(&format!("delta_{}", c)).copied().unwrap_or(0.0))
            .collect())
    };

    #[cfg(feature = "parallel")]
    let deltas = (0..n_cells)
        .into_par_iter()
        .map(evaluate)
        .collect::<ComputeResult<Vec<_>>>()?;

    #[cfg(not(feature = "parallel"))]
    let deltas = (0..n_cells)
        .map(evaluate)
        .collect::<ComputeResult<Vec<_>>>()?;

    for (cell, delta) in deltas.iter().enumerate() {
        for (field, d) in chemicals.iter_mut().zip(delta) {
            field[cell] += compiled.timestep * d;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ready_io::ScalarType;

    fn target() -> ComputeTarget {
        ComputeTarget {
            platform: 0,
            device: 0,
            scalar_type: ScalarType::Float32,
        }
    }

    fn formula(source: &str, parameters: Vec<(String, f64)>) -> KernelProgram {
        KernelProgram::Formula {
            source: source.to_string(),
            chemicals: vec!["a".to_string(), "b".to_string()],
            parameters,
            timestep: 0.5,
        }
    }

    #[test]
    fn test_open_rejects_other_devices() {
        let provider = HostBackendProvider::new();
        assert!(provider.open(target()).is_ok());
        let err = provider
            .open(ComputeTarget {
                device: 3,
                ..target()
            })
            .unwrap_err();
        assert!(matches!(err, ComputeError::Device { device: 3, .. }));
        assert!(provider.installation_hints().contains("OpenCL"));
    }

    #[test]
    fn test_values_stay_f64_between_steps() {
        let mut backend = HostBackend::new(target());
        backend
            .compile(&formula("delta_a = 0.1;", vec![]))
            .unwrap();
        let nb = Neighbourhood::Grid {
            dims: [1, 1, 1],
            wrap: true,
        };
        let mut chems = vec![vec![0.0], vec![0.0]];
        backend.run(&mut chems, &nb, 1).unwrap();
        assert_eq!(chems[0][0], 0.05);
        assert_ne!(chems[0][0], ScalarType::Float32.quantize(0.05));
    }

    #[test]
    fn test_run_requires_compile() {
        let mut backend = HostBackend::new(target());
        let nb = Neighbourhood::Grid {
            dims: [2, 1, 1],
            wrap: true,
        };
        let mut chems = vec![vec![0.0; 2], vec![0.0; 2]];
        assert_eq!(
            backend.run(&mut chems, &nb, 1),
            Err(ComputeError::NotCompiled)
        );
    }

    #[test]
    fn test_full_kernel_rejected() {
        let mut backend = HostBackend::new(target());
        let program = KernelProgram::FullKernel {
            source: "__kernel void rd_compute() {}".to_string(),
            chemicals: vec!["a".to_string()],
            parameters: vec![],
            block_size: [4, 1, 1],
        };
        assert!(matches!(
            backend.compile(&program),
            Err(ComputeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unknown_identifier_fails_compile() {
        let mut backend = HostBackend::new(target());
        let err = backend
            .compile(&formula("delta_a = q * a;", vec![]))
            .unwrap_err();
        assert!(matches!(err, ComputeError::Compile(ref m) if m.contains("'q'")));
    }

    #[test]
    fn test_decay_step() {
        let mut backend = HostBackend::new(target());
        backend
            .compile(&formula(
                "delta_a = -k * a; delta_b += x;",
                vec![("k".to_string(), 1.0)],
            ))
            .unwrap();
        assert!(backend.is_compiled());

        let nb = Neighbourhood::Grid {
            dims: [3, 1, 1],
            wrap: true,
        };
        let mut chems = vec![vec![1.0, 2.0, 4.0], vec![0.0; 3]];
        backend.run(&mut chems, &nb, 2).unwrap();
        assert_eq!(chems[0], vec![0.25, 0.5, 1.0]);
        assert_eq!(chems[1], vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_diffusion_conserves_mass() {
        let mut backend = HostBackend::new(target());
        backend
            .compile(&formula(
                "delta_a = D * laplacian_a; delta_b = 0;",
                vec![("D".to_string(), 0.2)],
            ))
            .unwrap();
        let nb = Neighbourhood::Grid {
            dims: [5, 1, 1],
            wrap: true,
        };
        let mut chems = vec![vec![0.0, 0.0, 5.0, 0.0, 0.0], vec![0.0; 5]];
        backend.run(&mut chems, &nb, 10).unwrap();
        let total: f64 = chems[0].iter().sum();
        assert!((total - 5.0).abs() < 1e-9);
        assert!(chems[0][2] < 5.0);
    }
}
