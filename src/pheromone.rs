/// Pheromone intensity over every unordered pair of distinct cities.
///
/// Pairs are packed into a strictly lower triangular array, so `{a, b}` and
/// `{b, a}` share one slot.
#[derive(Clone, Debug, PartialEq)]
pub struct PheromoneMatrix {
    city_count: usize,
    trails: Vec<f64>,
}

impl PheromoneMatrix {
    pub fn initialize(city_count: usize, initial_value: f64) -> Self {
        let pairs = city_count * city_count.saturating_sub(1) / 2;
        Self {
            city_count,
            trails: vec![initial_value.max(0.0); pairs],
        }
    }

    pub fn city_count(&self) -> usize {
        self.city_count
    }

    /// Multiplies every intensity by `1 - rate`.
    pub fn evaporate(&mut self, rate: f64) {
        let keep = (1.0 - rate).clamp(0.0, 1.0);
        for trail in self.trails.iter_mut() {
            *trail *= keep;
        }
    }

    /// Adds `amount` to the pair `{a, b}`; self pairs carry no pheromone.
    pub fn deposit(&mut self, a: usize, b: usize, amount: f64) {
        if let Some(idx) = self.slot(a, b) {
            self.trails[idx] = (self.trails[idx] + amount).max(0.0);
        }
    }

    /// Deposits `amount` on every edge of a closed tour.
    pub fn deposit_tour(&mut self, order: &[usize], amount: f64) {
        for pair in order.windows(2) {
            self.deposit(pair[0], pair[1], amount);
        }
        if let (Some(&first), Some(&last)) = (order.first(), order.last()) {
            self.deposit(last, first, amount);
        }
    }

    pub fn intensity(&self, a: usize, b: usize) -> f64 {
        self.slot(a, b).map_or(0.0, |idx| self.trails[idx])
    }

    /// Iterates over all stored intensities, one per unordered pair.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.trails.iter().copied()
    }

    fn slot(&self, a: usize, b: usize) -> Option<usize> {
        if a == b || a >= self.city_count || b >= self.city_count {
            return None;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Some(high * (high - 1) / 2 + low)
    }
}
