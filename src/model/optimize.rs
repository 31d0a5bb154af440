//! Derivative-free Nelder-Mead minimisation used by the likelihood fits

/// Outcome of a minimisation run
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Nelder-Mead simplex settings
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Absolute tolerance on the simplex spread in parameter space
    pub x_tolerance: f64,
    /// Absolute tolerance on the spread of objective values
    pub f_tolerance: f64,
}

impl NelderMead {
    pub fn for_dimension(n: usize) -> Self {
        Self {
            max_iterations: 1000 * n.max(1),
            x_tolerance: 1e-5,
            f_tolerance: 1e-7,
        }
    }

    /// Minimise `objective` starting from `start`.
    ///
    /// Non-finite objective values are treated as `+inf`, which keeps the
    /// simplex out of invalid regions.
    pub fn minimize<F>(&self, objective: F, start: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        const REFLECT: f64 = 1.0;
        const EXPAND: f64 = 2.0;
        const CONTRACT: f64 = 0.5;
        const SHRINK: f64 = 0.5;

        let n = start.len();
        let eval = |x: &[f64]| {
            let value = objective(x);
            if value.is_finite() {
                value
            } else {
                f64::INFINITY
            }
        };

        // Initial simplex: perturb each coordinate by 5% (or 0.00025 at zero)
        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(start.to_vec());
        for i in 0..n {
            let mut vertex = start.to_vec();
            vertex[i] = if vertex[i] != 0.0 {
                vertex[i] * 1.05
            } else {
                0.00025
            };
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| eval(v.as_slice())).collect();

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            sort_simplex(&mut simplex, &mut values);

            let x_spread = simplex[1..]
                .iter()
                .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);
            let f_spread = values[1..]
                .iter()
                .map(|v| (v - values[0]).abs())
                .fold(0.0, f64::max);
            if x_spread <= self.x_tolerance && f_spread <= self.f_tolerance {
                converged = true;
                break;
            }

            iterations += 1;

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let worst = simplex[n].clone();
            let toward = |coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&worst)
                    .map(|(c, w)| c + coef * (c - w))
                    .collect()
            };

            let reflected = toward(REFLECT);
            let f_reflected = eval(reflected.as_slice());

            if f_reflected < values[0] {
                let expanded = toward(REFLECT * EXPAND);
                let f_expanded = eval(expanded.as_slice());
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            // Contract outside when the reflection improved on the worst point,
            // inside otherwise
            let (contracted, f_contracted) = if f_reflected < values[n] {
                let point = toward(REFLECT * CONTRACT);
                let value = eval(point.as_slice());
                (point, value)
            } else {
                let point = toward(-CONTRACT);
                let value = eval(point.as_slice());
                (point, value)
            };

            if f_contracted < values[n].min(f_reflected) {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            let best = simplex[0].clone();
            for k in 1..=n {
                for j in 0..n {
                    simplex[k][j] = best[j] + SHRINK * (simplex[k][j] - best[j]);
                }
                values[k] = eval(simplex[k].as_slice());
            }
        }

        sort_simplex(&mut simplex, &mut values);
        Minimum {
            point: simplex.swap_remove(0),
            value: values[0],
            iterations,
            converged,
        }
    }
}

fn sort_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}
