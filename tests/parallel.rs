#![cfg(feature = "parallel")]

use termdiff::{compile, Graph};

#[test]
fn batch_par_matches_serial() {
    let mut g = Graph::new();
    let vars = g.variables(3);
    let (x, y, z) = (vars[0], vars[1], vars[2]);
    let f = g.scope(|| (x * y).exp() + z.square() * x - y.ln());
    let term = compile(&g, f, &vars).unwrap();

    let points: Vec<Vec<f64>> = (1..200)
        .map(|i| {
            let t = i as f64 * 0.01;
            vec![t - 1.0, t, 2.0 - t]
        })
        .collect();

    let serial = term.evaluate_batch(&points).unwrap();
    let parallel = term.evaluate_batch_par(&points).unwrap();
    assert_eq!(serial, parallel);
}

#[test]
fn batch_par_reports_domain_error() {
    let mut g = Graph::new();
    let x = g.variable();
    let f = g.ln(x);
    let term = compile(&g, f, &[x]).unwrap();
    let points = vec![vec![1.0], vec![-1.0], vec![2.0]];
    assert!(term.evaluate_batch_par(&points).is_err());
}
