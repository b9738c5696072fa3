use rayon::prelude::*;

use crate::error::Result;

impl super::CompiledTerm {
    /// Parallel [`evaluate_batch`](Self::evaluate_batch): points are spread
    /// over rayon workers, each using its own thread-local scratch.
    ///
    /// Output order matches `points`. Fails if any point fails.
    pub fn evaluate_batch_par(&self, points: &[Vec<f64>]) -> Result<Vec<(Vec<f64>, f64)>> {
        points.par_iter().map(|p| self.evaluate(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn parallel_batch_matches_serial() {
        let mut g = crate::Graph::new();
        let xs = g.variables(3);
        let f = g.scope(|| {
            let s: crate::Expr = xs.iter().map(|&v| v.square()).sum();
            s.exp()
        });
        let term = crate::compile(&g, f, &xs).unwrap();
        let points: Vec<Vec<f64>> = (0..64)
            .map(|i| {
                let t = i as f64 / 64.0;
                vec![t, -t, 0.5 * t]
            })
            .collect();
        assert_eq!(
            term.evaluate_batch_par(&points).unwrap(),
            term.evaluate_batch(&points).unwrap()
        );
    }
}
