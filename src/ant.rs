use crate::pheromone::PheromoneMatrix;
use crate::structs::{DistanceMatrix, Tour};
use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Floor applied to distances in the heuristic term, so coincident cities get
/// a very large but finite attractiveness.
pub const MIN_HEURISTIC_DISTANCE: f64 = 1e-9;

/// Read-only view of the colony state an ant needs while building a tour.
#[derive(Clone, Copy)]
pub struct ConstructionContext<'a> {
    pub distances: &'a DistanceMatrix,
    pub pheromones: &'a PheromoneMatrix,
    pub alpha: f64,
    pub beta: f64,
}

pub struct Ant {
    pub visited: Vec<usize>,
    pub distance: f64,
}

impl Ant {
    pub fn new(start: usize) -> Self {
        Self {
            visited: vec![start],
            distance: 0.0,
        }
    }

    /// Places a new ant on a uniformly chosen start city.
    pub fn spawn<R: Rng>(city_count: usize, rng: &mut R) -> Self {
        Self::new(rng.gen_range(0..city_count))
    }

    /// Extends the visited sequence into a full closed tour.
    pub fn construct<R: Rng>(&mut self, ctx: &ConstructionContext, rng: &mut R) {
        let city_count = ctx.distances.size();
        let mut is_visited = vec![false; city_count];
        for &city in &self.visited {
            is_visited[city] = true;
        }

        while self.visited.len() < city_count {
            let current = self.visited[self.visited.len() - 1];
            let next = self.select_next(ctx, current, &is_visited, rng);
            is_visited[next] = true;
            self.visited.push(next);
            self.distance += ctx.distances.get(current, next);
        }

        if let (Some(&first), Some(&last)) = (self.visited.first(), self.visited.last()) {
            self.distance += ctx.distances.get(last, first);
        }
    }

    /// Samples the next city with probability proportional to
    /// `pheromone^alpha * (1 / distance)^beta`.
    fn select_next<R: Rng>(
        &self,
        ctx: &ConstructionContext,
        current: usize,
        is_visited: &[bool],
        rng: &mut R,
    ) -> usize {
        let candidates: Vec<usize> = (0..is_visited.len()).filter(|&c| !is_visited[c]).collect();
        if candidates.len() == 1 {
            return candidates[0];
        }

        // weights live in log space and get shifted by their maximum before
        // exponentiation, so a large beta never overflows
        let log_weights: Vec<f64> = candidates
            .iter()
            .map(|&c| {
                let tau = ctx.pheromones.intensity(current, c);
                let eta = 1.0 / ctx.distances.get(current, c).max(MIN_HEURISTIC_DISTANCE);
                scaled_ln(tau, ctx.alpha) + scaled_ln(eta, ctx.beta)
            })
            .collect();
        let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if max == f64::NEG_INFINITY {
            // every trail evaporated to zero
            return candidates[rng.gen_range(0..candidates.len())];
        }

        let weights: Vec<f64> = log_weights.iter().map(|lw| (lw - max).exp()).collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => candidates[dist.sample(rng)],
            Err(_) => candidates[rng.gen_range(0..candidates.len())],
        }
    }

    /// Reinforces every edge of the tour with `1 / distance`.
    pub fn deposit(&self, pheromones: &mut PheromoneMatrix) {
        if self.distance > 0.0 && self.distance.is_finite() {
            pheromones.deposit_tour(&self.visited, 1.0 / self.distance);
        }
    }

    pub fn into_tour(self) -> Tour {
        Tour {
            order: self.visited,
            distance: self.distance,
        }
    }
}

/// `exponent * ln(value)`, treating `value^0` as 1 even for a zero value.
fn scaled_ln(value: f64, exponent: f64) -> f64 {
    if exponent == 0.0 {
        0.0
    } else {
        exponent * value.ln()
    }
}
