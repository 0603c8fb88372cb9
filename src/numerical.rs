///  Example#1
/// ```
/// use derivata::numerical::NR::NR;
/// use derivata::symbolic::symbolic_engine::Expr;
/// // gradient of (x - 1)**2 + (y + 2)**4 set to zero
/// let vec_of_expr = Expr::parse_vector_expression(&["2*(x - 1)", "4*(y + 2)**3"]).unwrap();
/// let mut NR_instanse = NR::new();
/// NR_instanse.set_equation_system(vec_of_expr, None, vec![0.0, 0.0], 1e-10, 100).unwrap();
/// NR_instanse.eq_generate().unwrap();
/// let starts = vec![vec![0.0, 0.0], vec![3.0, -5.0]];
/// let solutions = NR_instanse.solve_from_starts(&starts, 1e-6, 1e-3);
/// println!("result = {:?} \n", solutions);
///  ```
pub mod NR;
