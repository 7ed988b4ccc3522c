pub mod ant;
pub mod colony;
pub mod error;
pub mod pheromone;
pub mod structs;
pub mod utils;

use crate::colony::Solver;
use crate::error::AcoResult;
use crate::structs::{ProblemInput, SolutionOutput, SolverParams, SolverResult};
use std::fs;
use std::path::Path;

/// Runs a solver over randomly generated cities.
pub fn solve(params: SolverParams) -> AcoResult<SolverResult> {
    Solver::new(params)?.run()
}

/// Reads a problem from a JSON file and solves it.
pub fn solve_from_json(input_path: impl AsRef<Path>) -> AcoResult<SolverResult> {
    let data = fs::read_to_string(input_path)?;
    let problem: ProblemInput = serde_json::from_str(&data)?;

    let mut solver = match problem.cities {
        Some(cities) => Solver::with_cities(problem.params, cities)?,
        None => Solver::new(problem.params)?,
    };
    solver.run()
}

/// Solves a JSON problem and writes the best route for plotting.
pub fn solve_and_write(input_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> AcoResult<SolverResult> {
    let result = solve_from_json(input_path)?;
    let json = serde_json::to_string_pretty(&SolutionOutput::from(&result))?;
    fs::write(output_path, json)?;
    Ok(result)
}

#[cfg(feature = "python")]
mod python {
    use crate::error::AcoError;
    use crate::structs::{City, SolverParams};
    use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    fn to_py_err(err: AcoError) -> PyErr {
        match err {
            AcoError::InvalidParameter { .. } => PyValueError::new_err(err.to_string()),
            AcoError::Io(_) => PyIOError::new_err(err.to_string()),
            AcoError::Json(_) | AcoError::NotRun => PyRuntimeError::new_err(err.to_string()),
        }
    }

    /// Solve over the given `(x, y)` points, or over random cities when none
    /// are passed. Returns the best route and its length.
    #[pyfunction]
    #[pyo3(signature = (
        cities = None,
        number_of_cities = 25,
        population_size = 100,
        generations = 500,
        alpha = 1.0,
        beta = 5.0,
        evaporation_rate = 0.5,
        seed = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn solve(
        cities: Option<Vec<(f64, f64)>>,
        number_of_cities: usize,
        population_size: usize,
        generations: usize,
        alpha: f64,
        beta: f64,
        evaporation_rate: f64,
        seed: Option<u64>,
    ) -> PyResult<(Vec<(f64, f64)>, f64)> {
        let mut params =
            SolverParams::new(number_of_cities, population_size, generations, alpha, beta, evaporation_rate);
        params.seed = seed;

        let mut solver = match cities {
            Some(points) => {
                let cities = points.into_iter().map(|(x, y)| City::new(x, y)).collect();
                crate::colony::Solver::with_cities(params, cities)
            }
            None => crate::colony::Solver::new(params),
        }
        .map_err(to_py_err)?;

        let result = solver.run().map_err(to_py_err)?;
        let route = result.route.iter().map(|city| (city.x, city.y)).collect();
        Ok((route, result.distance))
    }

    /// Run ACO from a JSON file, return the full result as a JSON string.
    #[pyfunction]
    fn solve_from_json(input_path: &str) -> PyResult<String> {
        let result = crate::solve_from_json(input_path).map_err(to_py_err)?;
        serde_json::to_string_pretty(&result)
            .map_err(|e| PyRuntimeError::new_err(format!("Serialization error: {}", e)))
    }

    /// Run ACO from a JSON file, write the best route to an output JSON file for plotting.
    #[pyfunction]
    fn solve_and_write(input_path: &str, output_path: &str) -> PyResult<()> {
        crate::solve_and_write(input_path, output_path).map_err(to_py_err)?;
        Ok(())
    }

    /// Python module definition
    #[pymodule]
    fn acotsp(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(solve, m)?)?;
        m.add_function(wrap_pyfunction!(solve_from_json, m)?)?;
        m.add_function(wrap_pyfunction!(solve_and_write, m)?)?;
        Ok(())
    }
}
