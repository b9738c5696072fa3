pub mod lbfgs;
