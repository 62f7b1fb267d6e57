/// Library-size operations over rows (cells) of a count-like matrix
pub trait CountNormOps {
    type Scalar;

    /// Sum of each row
    fn row_sums(&self) -> Vec<Self::Scalar>;

    /// Rescale every row so that its sum equals `target_sum`. If
    /// `target_sum` is `None`, the median of the positive row sums is
    /// used. Rows summing to zero are left untouched.
    ///
    /// Returns the target sum that was applied.
    fn normalize_total_inplace(&mut self, target_sum: Option<Self::Scalar>) -> Self::Scalar;

    /// `x <- ln(1 + x)` for every element
    fn log1p_inplace(&mut self);
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a normal distribution `N(0, sd^2)`. With
    /// `Some(seed)` the draw is reproducible.
    fn rnorm_seeded(dd: usize, nn: usize, sd: Self::Scalar, seed: Option<u64>) -> Self::Mat;
}
