//! Stress majorization by projected gradient descent.
//!
//! Positions are a `k x n` matrix stored as `k` coordinate rows. Each step computes the gradient
//! and a per-dimension Hessian of the stress, takes the step size that minimises the local
//! quadratic along the gradient, and hands the stepped rows to an optional [`Projector`] which
//! moves them back onto the region allowed by the layout constraints.

use crate::error::{Error, Result};
use crate::projection::Projector;
use crate::random::PseudoRandom;
use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};

/// Squared distance below which two nodes count as coincident.
const COINCIDENT_DISTANCE_SQUARED: f64 = 1e-9;

/// Pull of the first `nodes` nodes toward the nearest point of a square grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSnap {
    pub nodes: usize,
    pub grid_size: f64,
    pub strength: f64,
    /// Scale the pull by the largest diagonal Hessian entry so it keeps pace with the stress.
    pub scale_by_max_h: bool,
}

impl Default for GridSnap {
    fn default() -> Self {
        Self {
            nodes: 0,
            grid_size: 100.0,
            strength: 1000.0,
            scale_by_max_h: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescentOptions {
    /// [`Descent::run`] stops once the relative change in stress drops below this.
    pub threshold: f64,
    /// Seed for the nudges that separate coincident nodes.
    pub random_seed: u64,
    pub grid_snap: GridSnap,
}

impl Default for DescentOptions {
    fn default() -> Self {
        Self {
            threshold: 1e-4,
            random_seed: 1,
            grid_snap: GridSnap::default(),
        }
    }
}

/// Nodes held near a position, typically while being dragged.
#[derive(Debug, Clone, Default)]
pub struct Locks {
    locks: IndexMap<usize, Vec<f64>>,
}

impl Locks {
    /// Locks node `id` at `position` (one coordinate per dimension), replacing any earlier lock.
    pub fn add(&mut self, id: usize, position: Vec<f64>) {
        self.locks.insert(id, position);
    }

    pub fn clear(&mut self) {
        self.locks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f64])> {
        self.locks.iter().map(|(&id, p)| (id, p.as_slice()))
    }
}

/// Placeholder projector for unconstrained descent; it has no values.
#[derive(Debug, Clone, Copy)]
pub enum NoProjection {}

impl Projector for NoProjection {
    fn node_count(&self) -> usize {
        match *self {}
    }

    fn project_x(&mut self, _: &[f64], _: &[f64], _: &mut [f64]) {
        match *self {}
    }

    fn project_y(&mut self, _: &[f64], _: &[f64], _: &mut [f64]) {
        match *self {}
    }
}

/// Scratch rows for the four Runge-Kutta stages and their midpoints.
#[derive(Debug, Default)]
struct RkBuffers {
    a: Vec<DVector<f64>>,
    b: Vec<DVector<f64>>,
    c: Vec<DVector<f64>>,
    d: Vec<DVector<f64>>,
    ia: Vec<DVector<f64>>,
    ib: Vec<DVector<f64>>,
}

impl RkBuffers {
    fn new(k: usize, n: usize) -> Self {
        let rows = || vec![DVector::zeros(n); k];
        Self {
            a: rows(),
            b: rows(),
            c: rows(),
            d: rows(),
            ia: rows(),
            ib: rows(),
        }
    }
}

/// Stress minimiser over a `k x n` position matrix.
///
/// Stress is `sum over u < v of (|x_u - x_v| - D_uv)^2 / D_uv^2`. Pairs without a finite positive
/// ideal distance are ignored. An optional weight matrix `G` lets pairs with `G_uv > 1` stop
/// attracting once they are further apart than ideal.
#[derive(Debug)]
pub struct Descent<P = NoProjection> {
    x: Vec<DVector<f64>>,
    d: DMatrix<f64>,
    weights: Option<DMatrix<f64>>,
    g: Vec<DVector<f64>>,
    h: Vec<DMatrix<f64>>,
    hd: Vec<DVector<f64>>,
    e: Vec<DVector<f64>>,
    rk: RkBuffers,
    k: usize,
    n: usize,
    min_d: f64,
    pub locks: Locks,
    random: PseudoRandom,
    options: DescentOptions,
    projector: Option<P>,
}

impl Descent<NoProjection> {
    /// Unconstrained descent from `x` (`k` rows of `n` coordinates) toward ideal distances `d`.
    pub fn new(x: Vec<Vec<f64>>, d: DMatrix<f64>) -> Result<Self> {
        Self::build(x, d, None)
    }

    /// An `n x n` matrix with entry `(i, j) = f(i, j)`.
    pub fn create_square_matrix(n: usize, f: impl FnMut(usize, usize) -> f64) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, f)
    }

    /// Moves `x` by `-step_size * d`.
    pub fn take_descent_step(x: &mut DVector<f64>, d: &DVector<f64>, step_size: f64) {
        take_descent_step(x, d, step_size);
    }
}

impl<P: Projector> Descent<P> {
    /// Descent whose every step is projected through `projector`. Needs at least two dimensions.
    pub fn with_projection(x: Vec<Vec<f64>>, d: DMatrix<f64>, projector: P) -> Result<Self> {
        if x.len() < 2 {
            return Err(Error::DimensionMismatch {
                what: "dimensions for a projected layout",
                expected: 2,
                got: x.len(),
            });
        }
        let nodes = projector.node_count();
        let descent = Self::build(x, d, Some(projector))?;
        if nodes != descent.n {
            return Err(Error::DimensionMismatch {
                what: "projected nodes",
                expected: descent.n,
                got: nodes,
            });
        }
        Ok(descent)
    }

    fn build(x: Vec<Vec<f64>>, d: DMatrix<f64>, projector: Option<P>) -> Result<Self> {
        let k = x.len();
        let Some(n) = x.first().map(Vec::len) else {
            return Err(Error::EmptyPositions);
        };
        if let Some(row) = x.iter().find(|row| row.len() != n) {
            return Err(Error::DimensionMismatch {
                what: "coordinates per position row",
                expected: n,
                got: row.len(),
            });
        }
        check_square("ideal distance matrix", &d, n)?;

        let min_d = (0..n)
            .flat_map(|u| (0..n).filter(move |&v| v != u).map(move |v| (u, v)))
            .map(|(u, v)| d[(u, v)])
            .filter(|&dist| dist > 0.0 && dist.is_finite())
            .fold(f64::MAX, f64::min);
        let min_d = if min_d == f64::MAX { 1.0 } else { min_d };

        let rows = || vec![DVector::<f64>::zeros(n); k];
        let options = DescentOptions::default();
        Ok(Self {
            x: x.into_iter().map(DVector::from_vec).collect(),
            d,
            weights: None,
            g: rows(),
            h: vec![DMatrix::zeros(n, n); k],
            hd: rows(),
            e: rows(),
            rk: RkBuffers::new(k, n),
            k,
            n,
            min_d,
            locks: Locks::default(),
            random: PseudoRandom::new(options.random_seed),
            options,
            projector,
        })
    }

    /// Sets the pair weight matrix `G`; default is 1 everywhere.
    pub fn with_weights(mut self, g: DMatrix<f64>) -> Result<Self> {
        check_square("weight matrix", &g, self.n)?;
        self.weights = Some(g);
        Ok(self)
    }

    pub fn with_options(mut self, options: DescentOptions) -> Self {
        self.random = PseudoRandom::new(options.random_seed);
        self.options = options;
        self
    }

    pub fn options(&self) -> &DescentOptions {
        &self.options
    }

    pub fn dimensions(&self) -> usize {
        self.k
    }

    pub fn node_count(&self) -> usize {
        self.n
    }

    /// Current coordinate rows, one per dimension.
    pub fn positions(&self) -> &[DVector<f64>] {
        &self.x
    }

    pub fn positions_mut(&mut self) -> &mut [DVector<f64>] {
        &mut self.x
    }

    /// Gradient rows from the last derivative computation.
    pub fn gradient(&self) -> &[DVector<f64>] {
        &self.g
    }

    /// Hessian per dimension from the last derivative computation.
    pub fn hessian(&self) -> &[DMatrix<f64>] {
        &self.h
    }

    pub fn projector(&self) -> Option<&P> {
        self.projector.as_ref()
    }

    pub fn projector_mut(&mut self) -> Option<&mut P> {
        self.projector.as_mut()
    }

    pub fn compute_stress(&self) -> f64 {
        let mut stress = 0.0;
        for u in 0..self.n.saturating_sub(1) {
            for v in u + 1..self.n {
                let ideal = self.d[(u, v)];
                if !has_ideal_distance(ideal) {
                    continue;
                }
                let l = self
                    .x
                    .iter()
                    .map(|row| (row[u] - row[v]).powi(2))
                    .sum::<f64>()
                    .sqrt();
                let rl = ideal - l;
                stress += rl * rl / (ideal * ideal);
            }
        }
        stress
    }

    /// Gradient and Hessian of the stress at the current positions.
    pub fn compute_derivatives(&mut self) {
        let mut x = std::mem::take(&mut self.x);
        self.derivatives_at(&mut x);
        self.x = x;
    }

    /// Newton step along `d` for the last computed derivatives: `(g . d) / (d . H d)` summed over
    /// dimensions, or 0 when that is not a finite number.
    pub fn compute_step_size(&mut self, d: &[DVector<f64>]) -> f64 {
        step_size(&self.g, &self.h, &mut self.hd, d)
    }

    /// One plain gradient step without projection; returns the new stress.
    pub fn reduce_stress(&mut self) -> f64 {
        self.compute_derivatives();
        let alpha = step_size(&self.g, &self.h, &mut self.hd, &self.g);
        for (x, g) in self.x.iter_mut().zip(&self.g) {
            take_descent_step(x, g, alpha);
        }
        self.compute_stress()
    }

    /// One fourth-order Runge-Kutta step. Returns the squared displacement of all coordinates.
    pub fn runge_kutta(&mut self) -> f64 {
        let mut x = std::mem::take(&mut self.x);
        let mut rk = std::mem::take(&mut self.rk);

        self.compute_next_position(&mut x, &mut rk.a);
        mid(&x, &rk.a, &mut rk.ia);
        self.compute_next_position(&mut rk.ia, &mut rk.b);
        mid(&x, &rk.b, &mut rk.ib);
        self.compute_next_position(&mut rk.ib, &mut rk.c);
        self.compute_next_position(&mut rk.c, &mut rk.d);

        let mut disp = 0.0;
        for i in 0..self.k {
            for j in 0..self.n {
                let next = (rk.a[i][j] + 2.0 * rk.b[i][j] + 2.0 * rk.c[i][j] + rk.d[i][j]) / 6.0;
                let dx = x[i][j] - next;
                disp += dx * dx;
                x[i][j] = next;
            }
        }

        self.x = x;
        self.rk = rk;
        disp
    }

    /// Runs up to `iterations` Runge-Kutta steps, stopping early once the relative change in
    /// stress falls below the threshold. Returns the final stress.
    pub fn run(&mut self, iterations: usize) -> f64 {
        let mut stress = self.compute_stress();
        for iteration in 1..=iterations {
            self.runge_kutta();
            let s = self.compute_stress();
            let converged = s == 0.0 || (stress / s - 1.0).abs() < self.options.threshold;
            stress = s;
            if converged {
                tracing::debug!(iteration, stress, "descent converged");
                return stress;
            }
        }
        tracing::debug!(iterations, stress, "descent used its iteration budget");
        stress
    }

    /// Unconstrained step from `x0` into `r`, projected. With a projector, the gap between the
    /// stepped and projected positions is stepped and projected once more with a damped step so
    /// constraint repulsion and stress attraction do not oscillate.
    fn compute_next_position(&mut self, x0: &mut [DVector<f64>], r: &mut [DVector<f64>]) {
        self.derivatives_at(x0);
        let alpha = step_size(&self.g, &self.h, &mut self.hd, &self.g);
        step_and_project(self.projector.as_mut(), x0, r, &self.g, alpha);

        if self.projector.is_some() {
            for ((e, x0), r) in self.e.iter_mut().zip(x0.iter()).zip(r.iter()) {
                e.copy_from(x0);
                *e -= r;
            }
            let beta = step_size(&self.g, &self.h, &mut self.hd, &self.e).clamp(0.2, 1.0);
            step_and_project(self.projector.as_mut(), x0, r, &self.e, beta);
        }
    }

    fn derivatives_at(&mut self, x: &mut [DVector<f64>]) {
        let (k, n) = (self.k, self.n);
        if n < 1 {
            return;
        }
        let mut d = vec![0.0; k];
        let mut d2 = vec![0.0; k];
        let mut huu = vec![0.0; k];
        let mut max_h: f64 = 0.0;

        for u in 0..n {
            huu.fill(0.0);
            for g in &mut self.g {
                g[u] = 0.0;
            }
            for v in 0..n {
                if u == v {
                    continue;
                }

                // Coincident nodes have no direction; nudge v a bounded number of times.
                let mut distance_squared = 0.0;
                for _ in 0..n {
                    distance_squared = 0.0;
                    for i in 0..k {
                        let dx = x[i][u] - x[i][v];
                        d[i] = dx;
                        d2[i] = dx * dx;
                        distance_squared += d2[i];
                    }
                    if distance_squared > COINCIDENT_DISTANCE_SQUARED {
                        break;
                    }
                    let rd = self.offset_dir();
                    for (row, delta) in x.iter_mut().zip(rd) {
                        row[v] += delta;
                    }
                }

                let distance = distance_squared.sqrt();
                let ideal = self.d[(u, v)];
                let mut weight = self.weights.as_ref().map_or(1.0, |w| w[(u, v)]);
                if !has_ideal_distance(ideal) || (weight > 1.0 && distance > ideal) {
                    for h in &mut self.h {
                        h[(u, v)] = 0.0;
                    }
                    continue;
                }
                weight = weight.min(1.0);

                let ideal_squared = ideal * ideal;
                let gs = 2.0 * weight * (distance - ideal) / (ideal_squared * distance);
                let distance_cubed = distance_squared * distance;
                let hs = -2.0 * weight / (ideal_squared * distance_cubed);
                if !gs.is_finite() || !hs.is_finite() {
                    for h in &mut self.h {
                        h[(u, v)] = 0.0;
                    }
                    continue;
                }
                for i in 0..k {
                    self.g[i][u] += d[i] * gs;
                    let huv = hs * (2.0 * distance_cubed + ideal * (d2[i] - distance_squared));
                    self.h[i][(u, v)] = huv;
                    huu[i] -= huv;
                }
            }
            for (h, &diag) in self.h.iter_mut().zip(&huu) {
                h[(u, u)] = diag;
                max_h = max_h.max(diag);
            }
        }

        let GridSnap {
            nodes,
            grid_size,
            strength,
            scale_by_max_h,
        } = self.options.grid_snap;
        if nodes > 0 && grid_size > 0.0 {
            let r = grid_size / 2.0;
            let pull = strength / (r * r) * if scale_by_max_h { max_h } else { 1.0 };
            for u in 0..nodes.min(n) {
                for i in 0..k {
                    let dx = offset_from_grid(x[i][u], grid_size);
                    if -r < dx && dx <= r {
                        self.g[i][u] += pull * dx;
                        self.h[i][(u, u)] += pull;
                    }
                }
            }
        }

        for (u, p) in self.locks.iter() {
            if u >= n {
                continue;
            }
            for (i, &pi) in p.iter().enumerate().take(k) {
                self.h[i][(u, u)] += max_h;
                self.g[i][u] -= max_h * (pi - x[i][u]);
            }
        }
    }

    /// Random direction of length `min_d`.
    fn offset_dir(&mut self) -> Vec<f64> {
        let mut u: Vec<f64> = (0..self.k)
            .map(|_| self.random.next_between(0.01, 1.0) - 0.5)
            .collect();
        let l = u.iter().map(|x| x * x).sum::<f64>().sqrt();
        for x in &mut u {
            *x *= self.min_d / l;
        }
        u
    }
}

fn check_square(what: &'static str, m: &DMatrix<f64>, n: usize) -> Result<()> {
    for got in [m.nrows(), m.ncols()] {
        if got != n {
            return Err(Error::DimensionMismatch {
                what,
                expected: n,
                got,
            });
        }
    }
    Ok(())
}

fn has_ideal_distance(ideal: f64) -> bool {
    ideal.is_finite() && ideal > 0.0
}

/// Signed offset of `x` from the nearest grid line.
fn offset_from_grid(x: f64, grid_size: f64) -> f64 {
    let m = x / grid_size;
    let f = m % 1.0;
    let q = m - f;
    if f.abs() <= 0.5 {
        x - q * grid_size
    } else if x > 0.0 {
        x - (q + 1.0) * grid_size
    } else {
        x - (q - 1.0) * grid_size
    }
}

fn take_descent_step(x: &mut DVector<f64>, d: &DVector<f64>, step_size: f64) {
    x.axpy(-step_size, d, 1.0);
}

fn step_size(
    g: &[DVector<f64>],
    h: &[DMatrix<f64>],
    hd: &mut [DVector<f64>],
    d: &[DVector<f64>],
) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..g.len() {
        numerator += g[i].dot(&d[i]);
        h[i].mul_to(&d[i], &mut hd[i]);
        denominator += d[i].dot(&hd[i]);
    }
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let step = numerator / denominator;
    if step.is_finite() { step } else { 0.0 }
}

/// Copies `x0` into `r`, steps along `d`, and projects x then y. The y projection sees the
/// already projected x row.
fn step_and_project<P: Projector>(
    projector: Option<&mut P>,
    x0: &[DVector<f64>],
    r: &mut [DVector<f64>],
    d: &[DVector<f64>],
    step_size: f64,
) {
    for (r, x0) in r.iter_mut().zip(x0) {
        r.copy_from(x0);
    }
    let Some(projector) = projector else {
        for (r, d) in r.iter_mut().zip(d) {
            take_descent_step(r, d, step_size);
        }
        return;
    };

    take_descent_step(&mut r[0], &d[0], step_size);
    projector.project_x(x0[0].as_slice(), x0[1].as_slice(), r[0].as_mut_slice());
    take_descent_step(&mut r[1], &d[1], step_size);
    let (rx, ry) = r.split_at_mut(1);
    projector.project_y(rx[0].as_slice(), x0[1].as_slice(), ry[0].as_mut_slice());
    for (r, d) in r.iter_mut().zip(d).skip(2) {
        take_descent_step(r, d, step_size);
    }
}

/// `m = (a + b) / 2`, row by row.
fn mid(a: &[DVector<f64>], b: &[DVector<f64>], m: &mut [DVector<f64>]) {
    for ((m, a), b) in m.iter_mut().zip(a).zip(b) {
        *m = a.lerp(b, 0.5);
    }
}
