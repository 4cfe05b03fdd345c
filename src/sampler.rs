use crate::error::{Error, Result};
use fastrand::Rng;

// A collection of payloads that can be drawn from at random, each with probability
// proportional to its weight. Used for the instruction-operation and argument-generator
// tables in the configuration, and for picking evolutionary operators.
#[derive(Debug, Clone)]
pub struct WeightedSampler<T> {
    entries: Vec<(f64, T)>,
    weight_sum: f64,
}

impl<T> Default for WeightedSampler<T> {
    fn default() -> Self {
        WeightedSampler {
            entries: vec![],
            weight_sum: 0.0,
        }
    }
}

impl<T> WeightedSampler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // Zero weights are allowed; such entries are simply never selected.
    pub fn add(&mut self, item: T, weight: f64) -> Result<()> {
        if weight < 0.0 {
            return Err(Error::Configuration(format!(
                "negative weight {} not allowed in a weighted sampler",
                weight
            )));
        }

        self.entries.push((weight, item));
        self.weight_sum += weight;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    // Draws an entry in insertion order: the first entry whose cumulative weight strictly
    // exceeds a uniform draw scaled by the weight sum wins. If floating-point rounding
    // leaves no winner, the last entry is returned rather than failing.
    pub fn sample(&self, rng: &mut Rng) -> Result<&T> {
        if self.entries.is_empty() || self.weight_sum <= 0.0 {
            return Err(Error::Configuration(
                "sampled a weighted table with no selectable entries".to_string(),
            ));
        }

        let threshold = rng.f64() * self.weight_sum;
        let mut sum_so_far = 0.0;

        for (weight, item) in self.entries.iter() {
            sum_so_far += weight;
            if sum_so_far > threshold {
                return Ok(item);
            }
        }

        Ok(&self.entries[self.entries.len() - 1].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn negative_weight_is_rejected() {
        let mut sampler = WeightedSampler::new();
        let result = sampler.add("a", -1.0);
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(sampler.is_empty());
    }

    #[test]
    fn empty_table_cannot_be_sampled() {
        let sampler: WeightedSampler<usize> = WeightedSampler::new();
        let mut rng = Rng::with_seed(1);
        assert!(matches!(
            sampler.sample(&mut rng),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn zero_total_weight_cannot_be_sampled() {
        let mut sampler = WeightedSampler::new();
        sampler.add("a", 0.0).unwrap();
        sampler.add("b", 0.0).unwrap();
        let mut rng = Rng::with_seed(1);
        assert!(matches!(
            sampler.sample(&mut rng),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn zero_weight_entries_are_never_selected() {
        let mut sampler = WeightedSampler::new();
        sampler.add("never", 0.0).unwrap();
        sampler.add("always", 1.0).unwrap();

        let mut rng = Rng::with_seed(42);
        for _ in 0..1000 {
            assert_eq!(*sampler.sample(&mut rng).unwrap(), "always");
        }
    }

    #[test]
    fn sampling_respects_weights() {
        // Six entries, the last with five times the weight of the others. Over 100k draws
        // every entry must appear and the heavy entry must dominate each light one.
        let mut sampler = WeightedSampler::new();
        for i in 0..5 {
            sampler.add(i, 1.0).unwrap();
        }
        sampler.add(5usize, 5.0).unwrap();

        let mut rng = Rng::with_seed(7);
        let mut counts = [0usize; 6];
        for _ in 0..100_000 {
            counts[*sampler.sample(&mut rng).unwrap()] += 1;
        }

        for (i, count) in counts.iter().enumerate() {
            assert!(*count > 0, "entry {} was never selected", i);
        }
        for light in counts.iter().take(5) {
            assert!(counts[5] > *light);
        }
    }
}
