//! Binomial distribution helpers.
//!
//! Both functions sum probability mass terms in log space so that large `n`
//! (hundreds of thousands of trials) does not underflow `(1 - p)^n`.

/// Convert a trial count to f64; counts stay far below 2^53
#[inline]
fn count_to_f64(count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// `P(X <= floor(k))` for `X ~ Binomial(n, p)`.
#[must_use]
pub fn binomial_cdf(k: f64, n: u64, p: f64) -> f64 {
    let k = k.floor();
    if k < 0.0 {
        return 0.0;
    }
    if k >= count_to_f64(n) {
        return 1.0;
    }
    if p <= 0.0 {
        return 1.0;
    }
    if p >= 1.0 {
        return 0.0;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let k = k as u64;
    let mut cumulative = 0.0;
    for (_, mass) in PmfTerms::new(n, p).take_while(|&(i, _)| i <= k) {
        cumulative += mass;
    }
    cumulative.clamp(0.0, 1.0)
}

/// Smallest `x` such that `P(X <= x) >= r` for `X ~ Binomial(n, p)`.
#[must_use]
pub fn binomial_quantile(r: f64, n: u64, p: f64) -> u64 {
    if r <= 0.0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }

    let mut cumulative = 0.0;
    for (i, mass) in PmfTerms::new(n, p) {
        cumulative += mass;
        if cumulative >= r {
            return i;
        }
    }
    n
}

/// Iterator over `(i, P(X = i))` for `i` in `0..=n`, with `0 < p < 1`.
struct PmfTerms {
    n: u64,
    next: u64,
    log_mass: f64,
    log_odds: f64,
}

impl PmfTerms {
    fn new(n: u64, p: f64) -> Self {
        let log_mass = count_to_f64(n) * (-p).ln_1p();
        Self {
            n,
            next: 0,
            log_mass,
            log_odds: p.ln() - (-p).ln_1p(),
        }
    }
}

impl Iterator for PmfTerms {
    type Item = (u64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.n {
            return None;
        }
        let i = self.next;
        let mass = self.log_mass.exp();
        self.log_mass +=
            count_to_f64(self.n - i).ln() - count_to_f64(i + 1).ln() + self.log_odds;
        self.next += 1;
        Some((i, mass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdf_edges() {
        assert!(binomial_cdf(-1.0, 10, 0.5).abs() < f64::EPSILON);
        assert!((binomial_cdf(10.0, 10, 0.5) - 1.0).abs() < f64::EPSILON);
        assert!((binomial_cdf(3.0, 10, 0.0) - 1.0).abs() < f64::EPSILON);
        assert!(binomial_cdf(3.0, 10, 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cdf_small_exact() {
        // n=4, p=0.5: P(X<=1) = (1 + 4) / 16
        assert!((binomial_cdf(1.0, 4, 0.5) - 5.0 / 16.0).abs() < 1e-12);
        // non-integer k is floored
        assert!((binomial_cdf(1.7, 4, 0.5) - 5.0 / 16.0).abs() < 1e-12);
        // n=3, p=0.2: P(X<=0) = 0.8^3
        assert!((binomial_cdf(0.0, 3, 0.2) - 0.512).abs() < 1e-12);
    }

    #[test]
    fn test_cdf_large_n_does_not_underflow() {
        let c = binomial_cdf(150_000.0, 300_000, 0.5);
        assert!(c > 0.49 && c < 0.51, "got {c}");
    }

    #[test]
    fn test_quantile() {
        // median of Binomial(4, 0.5): P(X<=1)=0.3125, P(X<=2)=0.6875
        assert_eq!(binomial_quantile(0.5, 4, 0.5), 2);
        assert_eq!(binomial_quantile(0.3125, 4, 0.5), 1);
        assert_eq!(binomial_quantile(0.0, 4, 0.5), 0);
        assert_eq!(binomial_quantile(0.5, 4, 1.0), 4);
        assert_eq!(binomial_quantile(0.5, 4, 0.0), 0);
    }

    #[test]
    fn test_quantile_tail_reference_values() {
        let r = (1.0 - 0.99995) / 2.0;
        assert_eq!(binomial_quantile(r, 100, 0.9), 76);
        assert_eq!(binomial_quantile(r, 200, 0.5), 72);
        assert_eq!(binomial_quantile(r, 1_000, 0.95), 920);
    }
}
