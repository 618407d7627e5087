//! The Gray-Scott model
//!
//! ```text
//! delta_a = D_a * laplacian_a - a*b*b + F*(1-a)
//! delta_b = D_b * laplacian_b + a*b*b - (F+k)*b
//! ```

use super::InbuiltRule;
use crate::compute::Neighbourhood;
use crate::error::{FormatError, ReadyResult};
use crate::system::Parameters;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Gray-Scott reaction-diffusion with two chemicals
#[derive(Debug, Clone, Default)]
pub struct GrayScott;

impl GrayScott {
    pub const NAME: &'static str = "Gray-Scott";

    pub fn new() -> Self {
        Self
    }

    /// The same rule written in the formula language
    pub fn formula_source() -> &'static str {
        "delta_a = D_a * laplacian_a - a*b*b + F*(1.0-a);\n\
         delta_b = D_b * laplacian_b + a*b*b - (F+k)*b;\n"
    }
}

impl InbuiltRule for GrayScott {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Two-chemical autocatalytic reaction: a + 2b -> 3b, fed with a and draining b"
    }

    fn number_of_chemicals(&self) -> usize {
        2
    }

    fn default_parameters(&self) -> Parameters {
        Parameters::new()
            .with("timestep", 1.0)
            .with("D_a", 0.082)
            .with("D_b", 0.041)
            .with("k", 0.064)
            .with("F", 0.035)
    }

    fn step(
        &self,
        chemicals: &mut [Vec<f64>],
        neighbourhood: &Neighbourhood,
        parameters: &Parameters,
    ) -> ReadyResult<()> {
        let found = chemicals.len();
        let [a, b] = chemicals else {
            return Err(FormatError::ChemicalCountMismatch {
                rule: self.name().to_string(),
                declared: 2,
                found,
            }
            .into());
        };

        let dt = parameters.get_or("timestep", 1.0);
        let d_a = parameters.get_or("D_a", 0.082);
        let d_b = parameters.get_or("D_b", 0.041);
        let k = parameters.get_or("k", 0.064);
        let f = parameters.get_or("F", 0.035);

        let lap_a = neighbourhood.laplacian(a)?;
        let lap_b = neighbourhood.laplacian(b)?;

        let react = |i: usize| -> (f64, f64) {
            let (av, bv) = (a[i], b[i]);
            let abb = av * bv * bv;
            let da = d_a * lap_a[i] - abb + f * (1.0 - av);
            let db = d_b * lap_b[i] + abb - (f + k) * bv;
            (av + dt * da, bv + dt * db)
        };

        #[cfg(feature = "parallel")]
        let next: Vec<(f64, f64)> = (0..a.len()).into_par_iter().map(react).collect();

        #[cfg(not(feature = "parallel"))]
        let next: Vec<(f64, f64)> = (0..a.len()).map(react).collect();

        for (i, (na, nb)) in next.into_iter().enumerate() {
            a[i] = na;
            b[i] = nb;
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn InbuiltRule> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Neighbourhood {
        Neighbourhood::Grid {
            dims: [n, 1, 1],
            wrap: true,
        }
    }

    #[test]
    fn test_steady_state_is_fixed() {
        // a=1, b=0 everywhere is a fixed point
        let mut chems = vec![vec![1.0; 8], vec![0.0; 8]];
        let rule = GrayScott::new();
        rule.step(&mut chems, &grid(8), &rule.default_parameters())
            .unwrap();
        assert!(chems[0].iter().all(|&v| v == 1.0));
        assert!(chems[1].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_single_cell_reaction() {
        let rule = GrayScott::new();
        let mut chems = vec![vec![0.5], vec![0.25]];
        rule.step(&mut chems, &grid(1), &rule.default_parameters())
            .unwrap();
        let abb = 0.5 * 0.25 * 0.25;
        assert!((chems[0][0] - (0.5 - abb + 0.035 * 0.5)).abs() < 1e-12);
        assert!((chems[1][0] - (0.25 + abb - 0.099 * 0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_chemical_count() {
        let rule = GrayScott::new();
        let mut chems = vec![vec![0.0; 4]];
        assert!(rule
            .step(&mut chems, &grid(4), &rule.default_parameters())
            .is_err());
    }
}
