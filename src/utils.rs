use crate::error::AcoResult;
use crate::structs::{City, SolverParams, SolverResult};
use chrono::{Local, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Receives human-readable progress lines.
pub type InfoLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Prints every message to stdout prefixed by wall clock time.
pub fn console_logger() -> InfoLogger {
    Arc::new(|msg: &str| println!("{}{}", log_prefix(), msg))
}

fn log_prefix() -> String {
    format!("[{}][TSP_ACO]| > ", Local::now().format("%H:%M:%S%.6f"))
}

/// Renders a route as `(x, y) -> (x, y) -> ...`.
pub fn format_route(route: &[City]) -> String {
    route
        .iter()
        .map(|city| format!("({}, {})", city.x, city.y))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Appends one record per finished run, writing the header into an empty file.
pub fn log_run_to_csv(path: &Path, params: &SolverParams, result: &SolverResult) -> AcoResult<()> {
    let timestamp = Utc::now().to_rfc3339();

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let header = "timestamp,cities,ants,generations,alpha,beta,evaporation_rate,update_mode,best_distance,best_generation,generations_run,total_time_sec\n";
    if file.metadata()?.len() == 0 {
        file.write_all(header.as_bytes())?;
    }

    let record = format!(
        "{},{},{},{},{},{},{},{:?},{:.4},{},{},{:.4}\n",
        timestamp,
        result.order.len(),
        params.population_size,
        params.generations,
        params.alpha,
        params.beta,
        params.evaporation_rate,
        params.update_mode,
        result.distance,
        result.best_generation,
        result.generations_run,
        result.total_time_sec
    );

    file.write_all(record.as_bytes())?;
    Ok(())
}
