use crate::error::{AcoError, AcoResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

///---------------------default run parameters -------------------
pub const DEFAULT_NUMBER_OF_CITIES: usize = 25;
pub const DEFAULT_POPULATION_SIZE: usize = 100;
pub const DEFAULT_GENERATIONS: usize = 500;
pub const DEFAULT_ALPHA: f64 = 1.0;
pub const DEFAULT_BETA: f64 = 5.0;
pub const DEFAULT_EVAPORATION_RATE: f64 = 0.5;
pub const DEFAULT_INITIAL_PHEROMONE: f64 = 1.0;
pub const DEFAULT_COORDINATE_BOUND: f64 = 200.0;

/// A point on the plane. Cities are never mutated after creation and are
/// identified by their index in the solver's city list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub x: f64,
    pub y: f64,
}

impl City {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another city.
    pub fn distance_to(&self, other: &City) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Dense distance lookup by city index, computed once per run.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(cities: &[City]) -> Self {
        let size = cities.len();
        let mut values = vec![0.0; size * size];
        for (i, a) in cities.iter().enumerate() {
            for (j, b) in cities.iter().enumerate().skip(i + 1) {
                let d = a.distance_to(b);
                values[i * size + j] = d;
                values[j * size + i] = d;
            }
        }
        Self { size, values }
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.values[from * self.size + to]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Upper bound on any tour length: every edge is at most the longest one.
    pub fn tour_length_bound(&self) -> f64 {
        let longest = self.values.iter().copied().fold(0.0, f64::max);
        longest * self.size as f64
    }
}

/// A closed tour: the last city connects back to the first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub order: Vec<usize>,
    pub distance: f64,
}

impl Tour {
    /// Sum of consecutive distances plus the closing edge.
    pub fn length_of(order: &[usize], distances: &DistanceMatrix) -> f64 {
        match (order.first(), order.last()) {
            (Some(&first), Some(&last)) => {
                order
                    .windows(2)
                    .map(|pair| distances.get(pair[0], pair[1]))
                    .sum::<f64>()
                    + distances.get(last, first)
            }
            _ => 0.0,
        }
    }

    /// Maps city indices back to coordinates.
    pub fn route(&self, cities: &[City]) -> Vec<City> {
        self.order.iter().map(|&idx| cities[idx]).collect()
    }
}

/// How ants of one generation see each other's pheromone deposits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Each ant deposits right after finishing its tour, so later ants of the
    /// same generation observe earlier deposits.
    #[default]
    Sequential,
    /// Ants read the pheromone state as of generation start; deposits are
    /// applied in ant order once every ant is done.
    Batched,
    /// Batched semantics with tour construction spread over the rayon pool.
    Parallel,
}

/// Run parameters, fixed for the lifetime of a solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub number_of_cities: usize,
    pub population_size: usize,
    pub generations: usize,
    /// Pheromone influence exponent.
    pub alpha: f64,
    /// Distance heuristic influence exponent.
    pub beta: f64,
    /// Share of pheromone removed after every generation, in `[0, 1)`.
    pub evaporation_rate: f64,
    pub initial_pheromone: f64,
    pub seed: Option<u64>,
    pub update_mode: UpdateMode,
    /// Stop after this many consecutive generations without improvement.
    pub max_stagnation: Option<usize>,
    /// Generated cities get integer coordinates in `[0, coordinate_bound)`.
    pub coordinate_bound: f64,
    /// Appends a CSV record per finished run when set.
    pub run_log: Option<PathBuf>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            number_of_cities: DEFAULT_NUMBER_OF_CITIES,
            population_size: DEFAULT_POPULATION_SIZE,
            generations: DEFAULT_GENERATIONS,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            evaporation_rate: DEFAULT_EVAPORATION_RATE,
            initial_pheromone: DEFAULT_INITIAL_PHEROMONE,
            seed: None,
            update_mode: UpdateMode::default(),
            max_stagnation: None,
            coordinate_bound: DEFAULT_COORDINATE_BOUND,
            run_log: None,
        }
    }
}

impl SolverParams {
    pub fn new(
        number_of_cities: usize,
        population_size: usize,
        generations: usize,
        alpha: f64,
        beta: f64,
        evaporation_rate: f64,
    ) -> Self {
        Self {
            number_of_cities,
            population_size,
            generations,
            alpha,
            beta,
            evaporation_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_update_mode(mut self, update_mode: UpdateMode) -> Self {
        self.update_mode = update_mode;
        self
    }

    pub fn with_initial_pheromone(mut self, initial_pheromone: f64) -> Self {
        self.initial_pheromone = initial_pheromone;
        self
    }

    pub fn with_max_stagnation(mut self, generations: usize) -> Self {
        self.max_stagnation = Some(generations);
        self
    }

    pub fn with_run_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_log = Some(path.into());
        self
    }

    /// Checks every parameter, returning the first violation found.
    pub fn validate(&self) -> AcoResult<()> {
        if self.number_of_cities == 0 {
            return Err(AcoError::invalid("number_of_cities", "must be positive"));
        }
        if self.population_size == 0 {
            return Err(AcoError::invalid("population_size", "must be positive"));
        }
        if self.generations == 0 {
            return Err(AcoError::invalid("generations", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.evaporation_rate) {
            return Err(AcoError::invalid(
                "evaporation_rate",
                format!("{} is outside [0, 1)", self.evaporation_rate),
            ));
        }
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AcoError::invalid(
                    name,
                    format!("{value} must be finite and non-negative"),
                ));
            }
        }
        if !self.initial_pheromone.is_finite() || self.initial_pheromone <= 0.0 {
            return Err(AcoError::invalid(
                "initial_pheromone",
                format!("{} must be finite and positive", self.initial_pheromone),
            ));
        }
        if !self.coordinate_bound.is_finite() || self.coordinate_bound <= 0.0 {
            return Err(AcoError::invalid(
                "coordinate_bound",
                format!("{} must be finite and positive", self.coordinate_bound),
            ));
        }
        if self.max_stagnation == Some(0) {
            return Err(AcoError::invalid("max_stagnation", "must be positive when set"));
        }
        Ok(())
    }
}

/// Problem description read from JSON. Cities are generated when absent.
#[derive(Debug, Default, Deserialize)]
pub struct ProblemInput {
    #[serde(default)]
    pub cities: Option<Vec<City>>,
    #[serde(default)]
    pub params: SolverParams,
}

/// Full outcome of a run.
#[derive(Clone, Debug, Serialize)]
pub struct SolverResult {
    pub route: Vec<City>,
    pub order: Vec<usize>,
    pub distance: f64,
    pub generations_run: usize,
    pub best_generation: usize,
    /// Best-so-far distance after each generation.
    pub history: Vec<f64>,
    pub total_time_sec: f64,
}

/// Compact output handed to an external plotting tool.
#[derive(Debug, Serialize)]
pub struct SolutionOutput {
    pub route: Vec<City>,
    pub distance: f64,
}

impl From<&SolverResult> for SolutionOutput {
    fn from(result: &SolverResult) -> Self {
        Self {
            route: result.route.clone(),
            distance: result.distance,
        }
    }
}
