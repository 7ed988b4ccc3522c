use crate::ant::{Ant, ConstructionContext};
use crate::error::{AcoError, AcoResult};
use crate::pheromone::PheromoneMatrix;
use crate::structs::{City, DistanceMatrix, SolverParams, SolverResult, Tour, UpdateMode};
use crate::utils::{format_route, log_run_to_csv, InfoLogger};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::time::Instant;

/// Lifecycle of a solver run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SolverState {
    Uninitialized,
    CitiesGenerated,
    PheromoneInitialized,
    Running,
    Done,
}

/// What happened during one generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationReport {
    pub generation: usize,
    /// Shortest tour built in this generation.
    pub generation_best: f64,
    /// Best tour length seen so far.
    pub best_distance: f64,
    pub improved: bool,
}

/// Ant colony optimizer for the symmetric euclidean TSP.
pub struct Solver {
    params: SolverParams,
    cities: Vec<City>,
    distances: DistanceMatrix,
    pheromones: PheromoneMatrix,
    rng: StdRng,
    state: SolverState,
    generation: usize,
    best: Option<Tour>,
    best_generation: usize,
    history: Vec<f64>,
    stagnation_counter: usize,
    elapsed_sec: f64,
    logger: Option<InfoLogger>,
}

impl Solver {
    /// Creates a solver which generates its own random cities.
    pub fn new(params: SolverParams) -> AcoResult<Self> {
        params.validate()?;
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            params,
            cities: Vec::new(),
            distances: DistanceMatrix::new(&[]),
            pheromones: PheromoneMatrix::initialize(0, 0.0),
            rng,
            state: SolverState::Uninitialized,
            generation: 0,
            best: None,
            best_generation: 0,
            history: Vec::new(),
            stagnation_counter: 0,
            elapsed_sec: 0.0,
            logger: None,
        })
    }

    /// Creates a solver over the given cities; the city count follows the list.
    pub fn with_cities(mut params: SolverParams, cities: Vec<City>) -> AcoResult<Self> {
        if cities.is_empty() {
            return Err(AcoError::invalid("number_of_cities", "city list is empty"));
        }
        if cities.iter().any(|city| !city.x.is_finite() || !city.y.is_finite()) {
            return Err(AcoError::invalid("cities", "coordinates must be finite"));
        }
        if !DistanceMatrix::new(&cities).tour_length_bound().is_finite() {
            return Err(AcoError::invalid("cities", "coordinates are too far apart to measure a tour"));
        }
        params.number_of_cities = cities.len();

        let mut solver = Self::new(params)?;
        solver.set_cities(cities);
        Ok(solver)
    }

    pub fn with_logger(mut self, logger: InfoLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn pheromones(&self) -> &PheromoneMatrix {
        &self.pheromones
    }

    /// Number of generations completed so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best tour length so far, infinite before the first generation.
    pub fn best_distance(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |tour| tour.distance)
    }

    pub fn best_tour(&self) -> Option<&Tour> {
        self.best.as_ref()
    }

    /// Best-so-far distance after each completed generation.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Places `number_of_cities` cities with integer coordinates drawn from
    /// `[0, coordinate_bound)`. Has no effect once cities exist.
    pub fn generate_cities(&mut self) {
        if self.state != SolverState::Uninitialized {
            return;
        }
        self.log("[1/5] Initializing cities");

        let bound = self.params.coordinate_bound;
        let cities = (0..self.params.number_of_cities)
            .map(|_| {
                let x = (self.rng.gen::<f64>() * bound).floor();
                let y = (self.rng.gen::<f64>() * bound).floor();
                City::new(x, y)
            })
            .collect();
        self.set_cities(cities);
    }

    /// Sets every pair to the initial intensity. Has no effect once the
    /// generation loop started.
    pub fn initialize_pheromones(&mut self) {
        if self.state >= SolverState::PheromoneInitialized {
            return;
        }
        self.generate_cities();
        self.log("[2/5] Initializing pheromone matrix");

        self.pheromones = PheromoneMatrix::initialize(self.cities.len(), self.params.initial_pheromone);
        self.state = SolverState::PheromoneInitialized;
    }

    /// Runs one generation: every ant builds and deposits, trails evaporate
    /// and the best tour is updated on strict improvement. Returns `None`
    /// once the run is done.
    pub fn step(&mut self) -> Option<GenerationReport> {
        if self.state == SolverState::Done {
            return None;
        }
        self.initialize_pheromones();
        self.state = SolverState::Running;

        let ants = self.run_ants();
        self.pheromones.evaporate(self.params.evaporation_rate);

        let mut generation_best = f64::INFINITY;
        let mut improved = false;
        for ant in ants {
            generation_best = generation_best.min(ant.distance);
            if self.best.is_none() || ant.distance < self.best_distance() {
                self.best = Some(ant.into_tour());
                self.best_generation = self.generation;
                improved = true;
            }
        }

        let report = GenerationReport {
            generation: self.generation,
            generation_best,
            best_distance: self.best_distance(),
            improved,
        };

        self.history.push(report.best_distance);
        self.stagnation_counter = if improved { 0 } else { self.stagnation_counter + 1 };
        self.generation += 1;

        self.log(&format!(
            "Generation {} best distance: {:.4} (overall {:.4})",
            report.generation, report.generation_best, report.best_distance
        ));

        let stagnated = self.params.max_stagnation.is_some_and(|limit| self.stagnation_counter >= limit);
        if self.generation >= self.params.generations || stagnated {
            if stagnated {
                self.log(&format!("Stopping after {} generations without improvement", self.stagnation_counter));
            }
            self.state = SolverState::Done;
        }

        Some(report)
    }

    /// Executes the full generation loop and returns the best tour found.
    pub fn run(&mut self) -> AcoResult<SolverResult> {
        let start = Instant::now();
        self.initialize_pheromones();

        if self.state != SolverState::Done {
            self.log("[3/5] Running generations");
        }
        while self.step().is_some() {}
        self.elapsed_sec += start.elapsed().as_secs_f64();

        let result = self.result()?;
        self.log(&format!(
            "[4/5] Best distance {:.4} found at generation {}: {}",
            result.distance,
            result.best_generation,
            format_route(&result.route)
        ));

        if let Some(path) = &self.params.run_log {
            log_run_to_csv(path, &self.params, &result)?;
        }
        self.log("[5/5] Done");

        Ok(result)
    }

    /// Snapshot of the best tour found so far.
    pub fn result(&self) -> AcoResult<SolverResult> {
        let best = self
            .best
            .as_ref()
            .ok_or(AcoError::NotRun)?;

        Ok(SolverResult {
            route: best.route(&self.cities),
            order: best.order.clone(),
            distance: best.distance,
            generations_run: self.generation,
            best_generation: self.best_generation,
            history: self.history.clone(),
            total_time_sec: self.elapsed_sec,
        })
    }

    fn set_cities(&mut self, cities: Vec<City>) {
        self.distances = DistanceMatrix::new(&cities);
        self.cities = cities;
        self.state = SolverState::CitiesGenerated;
    }

    fn context(&self) -> ConstructionContext<'_> {
        ConstructionContext {
            distances: &self.distances,
            pheromones: &self.pheromones,
            alpha: self.params.alpha,
            beta: self.params.beta,
        }
    }

    /// Builds one generation of ants according to the configured update mode.
    fn run_ants(&mut self) -> Vec<Ant> {
        let seeds: Vec<u64> = (0..self.params.population_size).map(|_| self.rng.gen()).collect();

        let ants = match self.params.update_mode {
            UpdateMode::Sequential => {
                let mut ants = Vec::with_capacity(seeds.len());
                for seed in seeds {
                    let ant = construct_ant(&self.context(), seed);
                    ant.deposit(&mut self.pheromones);
                    ants.push(ant);
                }
                return ants;
            }
            UpdateMode::Batched => {
                let ctx = self.context();
                seeds.into_iter().map(|seed| construct_ant(&ctx, seed)).collect::<Vec<_>>()
            }
            UpdateMode::Parallel => {
                let ctx = self.context();
                seeds.into_par_iter().map(|seed| construct_ant(&ctx, seed)).collect::<Vec<_>>()
            }
        };

        for ant in &ants {
            ant.deposit(&mut self.pheromones);
        }
        ants
    }

    fn log(&self, msg: &str) {
        if let Some(logger) = &self.logger {
            (logger)(msg);
        }
    }
}

/// Builds a single tour using an ant-local random source derived from `seed`.
fn construct_ant(ctx: &ConstructionContext, seed: u64) -> Ant {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ant = Ant::spawn(ctx.distances.size(), &mut rng);
    ant.construct(ctx, &mut rng);
    ant
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn square() -> Vec<City> {
        vec![
            City::new(0.0, 0.0),
            City::new(1.0, 0.0),
            City::new(1.0, 1.0),
            City::new(0.0, 1.0),
        ]
    }

    fn scattered(count: usize) -> Vec<City> {
        (0..count)
            .map(|i| City::new(((i * 37) % 101) as f64, ((i * 61) % 97) as f64))
            .collect()
    }

    #[test]
    fn unit_square_converges_to_perimeter() {
        let params = SolverParams::new(4, 20, 50, 1.0, 5.0, 0.5).with_seed(7);
        let mut solver = Solver::with_cities(params, square()).unwrap();

        let result = solver.run().unwrap();

        assert!((result.distance - 4.0).abs() < 1e-9, "distance: {}", result.distance);
        assert_eq!(result.route.len(), 4);
        for (idx, city) in result.route.iter().enumerate() {
            let next = &result.route[(idx + 1) % result.route.len()];
            assert!((city.distance_to(next) - 1.0).abs() < 1e-12);
        }
        assert_eq!(solver.state(), SolverState::Done);
    }

    #[test]
    fn single_ant_single_generation_returns_its_tour() {
        let cities = scattered(9);
        let params = SolverParams::new(9, 1, 1, 1.0, 5.0, 0.5).with_seed(21);
        let mut solver = Solver::with_cities(params, cities.clone()).unwrap();

        let result = solver.run().unwrap();

        let mut rng = StdRng::seed_from_u64(21);
        let distances = DistanceMatrix::new(&cities);
        let pheromones = PheromoneMatrix::initialize(cities.len(), 1.0);
        let ctx = ConstructionContext {
            distances: &distances,
            pheromones: &pheromones,
            alpha: 1.0,
            beta: 5.0,
        };
        let expected = construct_ant(&ctx, rng.gen());

        assert_eq!(result.order, expected.visited);
        assert_eq!(result.distance, expected.distance);
        assert_eq!(result.generations_run, 1);
        assert_eq!(result.best_generation, 0);
        assert_eq!(result.history, vec![expected.distance]);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let params = SolverParams::new(15, 10, 20, 1.0, 5.0, 0.5).with_seed(99);

        let first = Solver::new(params.clone()).unwrap().run().unwrap();
        let second = Solver::new(params).unwrap().run().unwrap();

        assert_eq!(first.route, second.route);
        assert_eq!(first.order, second.order);
        assert_eq!(first.distance, second.distance);
        assert_eq!(first.history, second.history);
    }

    #[test]
    fn parallel_mode_matches_batched_mode() {
        let params = SolverParams::new(12, 16, 15, 1.0, 3.0, 0.3).with_seed(5);
        let run = |mode| {
            let mut solver = Solver::with_cities(params.clone().with_update_mode(mode), scattered(12)).unwrap();
            let result = solver.run().unwrap();
            (result, solver.pheromones().clone())
        };

        let (batched, batched_trails) = run(UpdateMode::Batched);
        let (parallel, parallel_trails) = run(UpdateMode::Parallel);

        assert_eq!(batched.order, parallel.order);
        assert_eq!(batched.history, parallel.history);
        assert_eq!(batched_trails, parallel_trails);
    }

    #[test]
    fn best_distance_never_increases() {
        for mode in [UpdateMode::Sequential, UpdateMode::Batched] {
            let params = SolverParams::new(20, 8, 40, 1.0, 2.0, 0.5).with_seed(3).with_update_mode(mode);
            let mut solver = Solver::new(params).unwrap();

            let mut previous = f64::INFINITY;
            while let Some(report) = solver.step() {
                assert!(report.best_distance <= previous);
                assert!(report.best_distance <= report.generation_best);
                previous = report.best_distance;
            }

            let result = solver.result().unwrap();
            assert!(result.history.windows(2).all(|pair| pair[1] <= pair[0]));
            assert_eq!(result.history.last(), Some(&result.distance));
            let expected = Tour::length_of(&result.order, &DistanceMatrix::new(solver.cities()));
            assert!((result.distance - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_evaporation_never_decreases_trails() {
        let params = SolverParams::new(10, 5, 10, 1.0, 5.0, 0.0).with_seed(17);
        let mut solver = Solver::with_cities(params, scattered(10)).unwrap();
        solver.initialize_pheromones();

        let mut previous: Vec<f64> = solver.pheromones().values().collect();
        while solver.step().is_some() {
            let current: Vec<f64> = solver.pheromones().values().collect();
            assert!(previous.iter().zip(&current).all(|(old, new)| new >= old));
            previous = current;
        }
    }

    #[test]
    fn high_evaporation_decays_trails_toward_zero() {
        let trails_after = |rate: f64| {
            let params = SolverParams::new(4, 10, 5, 1.0, 5.0, rate).with_seed(8);
            let mut solver = Solver::with_cities(params, square()).unwrap();
            solver.run().unwrap();
            solver.pheromones().values().fold(0.0, f64::max)
        };

        // every square tour is at least 4 long, so one generation deposits
        // at most 10 * 0.25 per edge
        let short_memory = trails_after(0.99);
        assert!(short_memory <= 0.03, "max trail: {short_memory}");
        assert!(short_memory >= 0.0);

        let long_memory = trails_after(0.1);
        assert!(long_memory > short_memory);
    }

    #[test]
    fn walks_through_lifecycle_states() {
        let params = SolverParams::new(6, 3, 2, 1.0, 5.0, 0.5).with_seed(1);
        let mut solver = Solver::new(params).unwrap();
        assert_eq!(solver.state(), SolverState::Uninitialized);
        assert!(matches!(solver.result(), Err(AcoError::NotRun)));

        solver.generate_cities();
        assert_eq!(solver.state(), SolverState::CitiesGenerated);
        assert_eq!(solver.cities().len(), 6);
        assert!(solver
            .cities()
            .iter()
            .all(|c| c.x.fract() == 0.0 && (0.0..200.0).contains(&c.x) && (0.0..200.0).contains(&c.y)));

        solver.initialize_pheromones();
        assert_eq!(solver.state(), SolverState::PheromoneInitialized);
        assert!(solver.pheromones().values().all(|value| value == 1.0));

        assert!(solver.step().is_some());
        assert_eq!(solver.state(), SolverState::Running);
        assert_eq!(solver.generation(), 1);

        assert!(solver.step().is_some());
        assert_eq!(solver.state(), SolverState::Done);
        assert!(solver.step().is_none());
        assert_eq!(solver.generation(), 2);
    }

    #[test]
    fn rejects_invalid_configuration_before_running() {
        assert!(matches!(
            Solver::new(SolverParams::new(0, 10, 10, 1.0, 5.0, 0.5)),
            Err(AcoError::InvalidParameter { name: "number_of_cities", .. })
        ));
        assert!(matches!(
            Solver::new(SolverParams::new(5, 10, 10, 1.0, 5.0, 1.0)),
            Err(AcoError::InvalidParameter { name: "evaporation_rate", .. })
        ));
        assert!(matches!(
            Solver::with_cities(SolverParams::default(), Vec::new()),
            Err(AcoError::InvalidParameter { name: "number_of_cities", .. })
        ));
    }

    #[test]
    fn rejects_cities_without_measurable_tours() {
        let params = SolverParams::new(3, 2, 3, 1.0, 5.0, 0.5).with_seed(1);

        let overflowing = vec![City::new(-1e308, 0.0), City::new(1e308, 0.0), City::new(0.0, 1.0)];
        assert!(matches!(
            Solver::with_cities(params.clone(), overflowing),
            Err(AcoError::InvalidParameter { name: "cities", .. })
        ));

        let undefined = vec![City::new(f64::NAN, 0.0), City::new(1.0, 0.0), City::new(0.0, 1.0)];
        assert!(matches!(
            Solver::with_cities(params.clone(), undefined),
            Err(AcoError::InvalidParameter { name: "cities", .. })
        ));

        let wide = vec![City::new(-1e150, 0.0), City::new(1e150, 0.0), City::new(0.0, 1e150)];
        let result = Solver::with_cities(params, wide).unwrap().run().unwrap();
        assert!(result.distance.is_finite());
        assert_eq!(result.order.len(), 3);
    }

    fn construct_on(distances: &DistanceMatrix, pheromones: &PheromoneMatrix, seed: u64) -> Ant {
        let ctx = ConstructionContext {
            distances,
            pheromones,
            alpha: 1.0,
            beta: 0.0,
        };
        construct_ant(&ctx, seed)
    }

    #[test]
    fn sequential_ants_see_deposits_from_earlier_ants() {
        let cities = scattered(8);
        let distances = DistanceMatrix::new(&cities);
        let mut modes_differ = false;

        for seed in 0..8 {
            let params = SolverParams::new(8, 2, 1, 1.0, 0.0, 0.5)
                .with_seed(seed)
                .with_initial_pheromone(1e-6);

            let mut seeds = StdRng::seed_from_u64(seed);
            let first_seed: u64 = seeds.gen();
            let second_seed: u64 = seeds.gen();
            let initial = PheromoneMatrix::initialize(8, 1e-6);

            let first = construct_on(&distances, &initial, first_seed);
            let mut after_first = initial.clone();
            first.deposit(&mut after_first);
            assert_eq!(
                after_first.intensity(first.visited[0], first.visited[1]),
                1e-6 + 1.0 / first.distance
            );

            // sequential: the second ant builds on a matrix holding the first tour
            let mut sequential = after_first.clone();
            construct_on(&distances, &after_first, second_seed).deposit(&mut sequential);
            sequential.evaporate(0.5);

            // batched: the second ant builds on the generation start matrix
            let mut batched = after_first.clone();
            construct_on(&distances, &initial, second_seed).deposit(&mut batched);
            batched.evaporate(0.5);

            let trails_after_one_generation = |mode| {
                let mut solver =
                    Solver::with_cities(params.clone().with_update_mode(mode), cities.clone()).unwrap();
                assert!(solver.step().is_some());
                solver.pheromones().clone()
            };
            assert_eq!(trails_after_one_generation(UpdateMode::Sequential), sequential);
            assert_eq!(trails_after_one_generation(UpdateMode::Batched), batched);

            modes_differ |= sequential != batched;
        }

        assert!(modes_differ);
    }

    #[test]
    fn short_memory_spreads_results_across_runs() {
        let cities = scattered(20);
        let spread = |rate: f64| {
            let distances: Vec<f64> = (0..20)
                .map(|seed| {
                    let params = SolverParams::new(20, 10, 30, 2.0, 2.0, rate)
                        .with_seed(seed)
                        .with_initial_pheromone(100.0);
                    Solver::with_cities(params, cities.clone()).unwrap().run().unwrap().distance
                })
                .collect();
            let mean = distances.iter().sum::<f64>() / distances.len() as f64;
            distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / distances.len() as f64
        };

        let short_memory = spread(0.99);
        let long_memory = spread(0.1);

        assert!(short_memory > long_memory, "variance at 0.99: {short_memory}, at 0.1: {long_memory}");
    }

    #[test]
    fn stops_early_once_stagnated() {
        // both directions around two cities have the same length
        let cities = vec![City::new(0.0, 0.0), City::new(3.0, 4.0)];
        let params = SolverParams::new(2, 4, 100, 1.0, 5.0, 0.5).with_seed(2).with_max_stagnation(3);
        let mut solver = Solver::with_cities(params, cities).unwrap();

        let result = solver.run().unwrap();

        assert_eq!(result.distance, 10.0);
        assert_eq!(result.best_generation, 0);
        assert_eq!(result.generations_run, 4);
    }

    #[test]
    fn single_city_run_completes() {
        let params = SolverParams::new(1, 3, 3, 1.0, 5.0, 0.5).with_seed(4);
        let result = Solver::with_cities(params, vec![City::new(2.0, 2.0)]).unwrap().run().unwrap();
        assert_eq!(result.order, vec![0]);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn reports_progress_through_logger_and_run_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = lines.clone();

        let params = SolverParams::new(5, 2, 3, 1.0, 5.0, 0.5).with_seed(6).with_run_log(&path);
        let mut solver = Solver::new(params)
            .unwrap()
            .with_logger(Arc::new(move |msg: &str| sink.lock().unwrap().push(msg.to_string())));
        solver.run().unwrap();

        let lines = lines.lock().unwrap();
        assert!(lines.first().is_some_and(|line| line.starts_with("[1/5]")));
        assert_eq!(lines.iter().filter(|line| line.starts_with("Generation")).count(), 3);
        assert!(lines.last().is_some_and(|line| line.starts_with("[5/5]")));

        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
