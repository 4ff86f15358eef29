//! Scalar search utilities used by the mesher.
//!
//! Both searches operate on closures returning a value that carries an
//! error ([`Scored`]). [`section_search`] minimises `|error|` over an integer
//! interval assuming a unimodal error curve. [`bisection_search`] finds the
//! root of an error that increases monotonically with a continuous value,
//! growing the upper bound by doubling until the root is bracketed.

use std::collections::HashMap;

/// A search sample with a signed error.
pub trait Scored {
    fn error(&self) -> f64;
}

impl Scored for f64 {
    #[inline]
    fn error(&self) -> f64 {
        *self
    }
}

/// Limits for [`bisection_search`].
#[derive(Copy, Clone, Debug)]
pub struct BisectionConfig {
    pub max_steps: usize,
    /// Stop once `|error|` falls below this.
    pub error_threshold: f64,
    /// Stop once the bracket is narrower than this.
    pub value_threshold: f64,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            max_steps: 64,
            error_threshold: 1e-12,
            value_threshold: 1e-14,
        }
    }
}

/// Finds the integer in `[lower, upper]` whose sample has the lowest `|error|`.
///
/// Each value is evaluated at most once.
pub fn section_search<T, F>(mut func: F, mut lower: usize, mut upper: usize) -> T
where
    T: Scored + Clone,
    F: FnMut(usize) -> T,
{
    if upper < lower {
        std::mem::swap(&mut lower, &mut upper);
    }
    let mut cache: HashMap<usize, T> = HashMap::new();
    let mut sample = |value: usize| -> T {
        cache.entry(value).or_insert_with(|| func(value)).clone()
    };

    let max_steps = upper-lower+1;
    for _ in 0..max_steps {
        if upper-lower <= 1 {
            break;
        }
        let range = (upper-lower) as f64;
        let left = ((lower as f64 + range/3.0).round() as usize).clamp(lower+1, upper);
        let right = ((lower as f64 + 2.0*range/3.0).round() as usize).clamp(lower+1, upper);
        let error_left = sample(left).error().abs();
        let error_right = sample(right).error().abs();
        if error_left < error_right {
            upper = right;
        } else {
            lower = left;
        }
    }

    let result_lower = sample(lower);
    let result_upper = sample(upper);
    if result_lower.error().abs() < result_upper.error().abs() {
        result_lower
    } else {
        result_upper
    }
}

/// Finds where a monotonically increasing error crosses zero.
///
/// Starts at `initial` and doubles the search value until the error turns
/// positive, then bisects between the last negative and first positive
/// values. The value is never searched below `min`. The sample with the
/// lowest `|error|` seen is returned, so a search that runs out of steps
/// still yields its best approximation.
pub fn bisection_search<T, F>(
    mut func: F,
    min: f64,
    initial: f64,
    config: &BisectionConfig,
) -> T
where
    T: Scored,
    F: FnMut(f64) -> T,
{
    let mut lower = min;
    let mut upper: Option<f64> = None;
    let mut unbounded = if initial > min { initial } else { min + 1.0 };

    let mut best = func(unbounded);
    let mut value = unbounded;
    let mut result_error = best.error();
    for _ in 0..config.max_steps {
        if result_error.abs() < config.error_threshold {
            break;
        }
        if result_error > 0.0 {
            upper = Some(value);
        } else {
            lower = value;
        }
        value = match upper {
            Some(upper) => {
                if (upper-lower).abs() < config.value_threshold {
                    break;
                }
                0.5*(lower+upper)
            },
            None => {
                unbounded *= 2.0;
                unbounded
            },
        };

        let result = func(value);
        result_error = result.error();
        if result_error.abs() < best.error().abs() {
            best = result;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[derive(Clone)]
    struct Sample {
        value: usize,
        error: f64,
    }
    impl Scored for Sample {
        fn error(&self) -> f64 {
            self.error
        }
    }

    #[test]
    fn section_search_finds_minimum_of_unimodal_error() {
        let mut calls = 0;
        let best = section_search(|v| {
            calls += 1;
            Sample { value: v, error: (v as f64 - 37.0).powi(2) }
        }, 1, 100);
        assert_eq!(best.value, 37);
        assert!(calls < 100);
    }

    #[test]
    fn section_search_handles_boundary_minimum() {
        let best = section_search(|v| Sample { value: v, error: 1.0 / v as f64 }, 2, 30);
        assert_eq!(best.value, 30);

        let best = section_search(|v| Sample { value: v, error: v as f64 }, 2, 30);
        assert_eq!(best.value, 2);
    }

    #[test]
    fn bisection_grows_bound_then_converges() {
        let root = bisection_search(|x: f64| x*x - 50.0, 0.0, 1.0, &BisectionConfig::default());
        assert_abs_diff_eq!(root, 0.0, epsilon = 1e-9);

        #[derive(Debug)]
        struct Root { x: f64, error: f64 }
        impl Scored for Root {
            fn error(&self) -> f64 { self.error }
        }
        let root = bisection_search(
            |x: f64| Root { x, error: x*x - 50.0 },
            0.0, 1.0, &BisectionConfig::default(),
        );
        assert_abs_diff_eq!(root.x, 50f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn bisection_returns_best_when_steps_run_out() {
        let config = BisectionConfig { max_steps: 3, ..BisectionConfig::default() };
        let mut values = Vec::new();
        let best = bisection_search(|x: f64| { values.push(x); x - 100.0 }, 0.0, 1.0, &config);
        // 1, 2, 4, 8 are all below the root, 8 is closest
        assert_eq!(values, vec![1.0, 2.0, 4.0, 8.0]);
        assert_eq!(best, -92.0);
    }
}
