#![allow(dead_code)]

use termdiff::{Expr, Graph, Var};

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock(g: &mut Graph, x: &[Var]) -> Expr {
    g.scope(|| {
        x.windows(2)
            .map(|w| (1.0 - w[0]).square() + 100.0 * (w[1] - w[0].square()).square())
            .sum::<Expr>()
    })
}

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Neural Network Layer ──────────────────────────────────────────────────
// f(x) = Σ_j sigmoid(Σ_i w_ji·x_i + b_j), 4 hidden units
// Deterministic weights: w_ji = sin(j*N+i+1) / (N+1), b_j = 0.1*(j+1)

pub fn nn_layer(g: &mut Graph, x: &[Var]) -> Expr {
    let n = x.len();
    let scale = 1.0 / (n as f64 + 1.0);
    g.scope(|| {
        (0..4_usize)
            .map(|j| {
                let z: Expr = x
                    .iter()
                    .enumerate()
                    .map(|(i, &xi)| (((j * n + i + 1) as f64).sin() * scale) * xi)
                    .sum::<Expr>()
                    + 0.1 * (j as f64 + 1.0);
                1.0 / (1.0 + (-z).exp())
            })
            .sum::<Expr>()
    })
}

// ─── Shared subexpressions ─────────────────────────────────────────────────
// Each level references the previous node twice.

pub fn diamond_chain(g: &mut Graph, x: Var, depth: usize) -> Expr {
    let mut e = x.expr();
    for _ in 0..depth {
        e = g.scope(|| 0.5 * (e * e + e));
    }
    e
}

// ─── Finite Differences ────────────────────────────────────────────────────

pub fn finite_diff_gradient(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let n = x.len();
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * h);
    }
    grad
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}
