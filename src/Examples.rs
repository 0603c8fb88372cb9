//! examples of usage of derivata
/// derivatives, critical points and grids
pub mod calculus_examples;
