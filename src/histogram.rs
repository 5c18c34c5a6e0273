use rand::{rngs::StdRng, Rng};

/// Bucketed empirical distribution over one good's observed prices.
///
/// Fixed bucket width over [0, upper_bound). Buckets initialize to weight 1
/// so a freshly constructed histogram is never degenerate: sampling from it
/// is uniform over the full range rather than a failure. The running total
/// always equals the sum of bucket weights.
///
/// A histogram is exclusively owned by one learning agent; it is mutated by
/// add_record/smooth/blend_update and never shared across agents.
#[derive(Debug, Clone)]
pub struct PriceHistogram {
    bucket_size: f64,
    upper_bound: f64,
    buckets: Vec<f64>,
    total: f64,
}

impl PriceHistogram {
    /// Create a histogram with the given bucket width over [0, upper_bound)
    ///
    /// Panics if bucket_size or upper_bound is not positive; both are
    /// construction-time configuration, not runtime inputs.
    pub fn new(bucket_size: f64, upper_bound: f64) -> Self {
        assert!(
            bucket_size > 0.0 && upper_bound > 0.0,
            "histogram geometry must be positive (bucket_size={}, upper_bound={})",
            bucket_size,
            upper_bound
        );
        let num_buckets = (upper_bound / bucket_size).ceil() as usize;
        Self {
            bucket_size,
            upper_bound,
            buckets: vec![1.0; num_buckets],
            total: num_buckets as f64,
        }
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Index of the bucket containing the given price, clipped to the last
    /// valid bucket for price >= upper_bound (and to the first for negative
    /// input, which callers are documented not to send)
    fn bucket_index(&self, price: f64) -> usize {
        let index = (price / self.bucket_size).floor();
        if index < 0.0 {
            0
        } else {
            (index as usize).min(self.buckets.len() - 1)
        }
    }

    /// Record one observed price: the containing bucket's weight and the
    /// running total both increase by 1
    pub fn add_record(&mut self, price: f64) {
        let index = self.bucket_index(price);
        self.buckets[index] += 1.0;
        self.total += 1.0;
    }

    /// Exponential forgetting: multiply every bucket weight by (1 - alpha).
    /// The total is recomputed as the sum of buckets rather than decremented
    /// independently, so it cannot drift from the bucket weights.
    pub fn smooth(&mut self, alpha: f64) {
        for weight in &mut self.buckets {
            *weight *= 1.0 - alpha;
        }
        self.total = self.buckets.iter().sum();
    }

    /// Bucket-wise exponential moving-average update: smooth self, then add
    /// alpha times the corresponding weight from new_hist, then recompute the
    /// total. Self and new_hist are distinct objects by construction, so the
    /// smoothing never reads a partially updated bucket.
    ///
    /// Both histograms must share geometry (bucket size and upper bound).
    pub fn blend_update(&mut self, new_hist: &PriceHistogram, alpha: f64) {
        debug_assert_eq!(self.buckets.len(), new_hist.buckets.len());
        debug_assert_eq!(self.bucket_size, new_hist.bucket_size);
        self.smooth(alpha);
        for (weight, new_weight) in self.buckets.iter_mut().zip(new_hist.buckets.iter()) {
            *weight += alpha * new_weight;
        }
        self.total = self.buckets.iter().sum();
    }

    /// Draw one price from the empirical distribution.
    ///
    /// Walks the normalized cumulative distribution in ascending bucket order
    /// against z ~ Uniform[0,1), then draws uniformly inside the selected
    /// bucket, clipped to upper_bound. A degenerate histogram (total <= 0,
    /// reachable only through extreme smoothing) falls back to
    /// Uniform[0, upper_bound) instead of failing.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        if self.total <= 0.0 {
            return rng.gen_range(0.0..self.upper_bound);
        }

        let z: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (index, weight) in self.buckets.iter().enumerate() {
            cumulative += weight / self.total;
            if cumulative >= z {
                let bucket_start = index as f64 * self.bucket_size;
                let bucket_end = (bucket_start + self.bucket_size).min(self.upper_bound);
                return rng.gen_range(bucket_start..bucket_end);
            }
        }

        // Floating point round-off can leave the cumulative sum fractionally
        // below 1.0; the draw then belongs to the last bucket's tail
        rng.gen_range(0.0..self.upper_bound)
    }
}
