//! Searches a single geometric parameter for a target impedance.
//!
//! Every evaluation rebuilds and solves the whole grid, so the driver tries
//! hard to spend few of them: the endpoints and the initial value are
//! measured first, an unknown upper bound is found by doubling, and the
//! bracket is then narrowed by weighted bisection.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::{Error, ImpedanceResult};
use crate::measurement::Measurement;

/// How the impedance moves when the parameter grows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImpedanceCorrelation {
    /// e.g. dielectric height
    Positive,
    /// e.g. trace width
    Negative,
}

/// Termination settings for [`perform_parameter_search`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParameterSearchConfig {
    /// Maximum number of evaluated parameter values.
    pub max_steps: usize,
    /// Relative impedance error that counts as a match.
    pub error_tolerance: f64,
    /// Smallest bracket width worth narrowing further.
    pub search_precision: f64,
    /// Relative improvement of the best error below which a step is not progress.
    pub early_stop_threshold: f64,
    /// Consecutive steps without progress before giving up.
    pub plateau_count: usize,
    /// Keeps failed or degenerate solves out of the best result.
    pub reject_failed_solves: bool,
}

impl Default for ParameterSearchConfig {
    fn default() -> Self {
        Self {
            max_steps: 16,
            error_tolerance: 1e-3,
            search_precision: 1e-4,
            early_stop_threshold: 1e-3,
            plateau_count: 3,
            reject_failed_solves: false,
        }
    }
}

/// Describes a parameter search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SearchDescriptor {
    pub target_impedance: f64,
    pub correlation: ImpedanceCorrelation,
    pub initial_value: Option<f64>,
    /// Defaults to 0.
    pub min_value: Option<f64>,
    /// Unbounded when `None`.
    pub max_value: Option<f64>,
    pub config: ParameterSearchConfig,
    /// Shows a progress bar.
    pub verbose: bool,
}

impl SearchDescriptor {
    #[inline]
    pub fn new(target_impedance: f64, correlation: ImpedanceCorrelation) -> Self {
        Self {
            target_impedance,
            correlation,
            initial_value: None,
            min_value: None,
            max_value: None,
            config: ParameterSearchConfig::default(),
            verbose: false,
        }
    }
}

/// Anything a search evaluation can produce.
pub trait SearchOutput {
    /// The impedance compared against the target.
    fn impedance(&self) -> f64;

    /// Whether the evaluation failed to produce a trustworthy impedance.
    fn is_failed(&self) -> bool {
        false
    }
}

impl SearchOutput for ImpedanceResult {
    #[inline]
    fn impedance(&self) -> f64 {
        self.z0
    }

    #[inline]
    fn is_failed(&self) -> bool {
        self.is_degenerate()
    }
}

impl SearchOutput for Measurement {
    #[inline]
    fn impedance(&self) -> f64 {
        Measurement::impedance(self).z0
    }

    #[inline]
    fn is_failed(&self) -> bool {
        Measurement::is_failed(self)
    }
}

/// Why a search stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    WithinTolerance,
    /// The bracket became narrower than the search precision.
    RangeResolved,
    /// A bisection step did not move either bound.
    RangeNotNarrowed,
    /// The best error stopped improving.
    Plateau,
    MaxSteps,
    /// The evaluation function returned an error.
    EvaluationFailed,
}

/// One evaluated parameter value.
#[derive(Clone, Debug)]
pub struct SearchSample<T> {
    pub value: f64,
    pub impedance: f64,
    /// Signed so that a positive error means the value is too large.
    pub error: f64,
    pub iteration: usize,
    pub is_failed: bool,
    pub output: T,
}

/// Every evaluated sample in evaluation order and the best among them.
#[derive(Clone, Debug)]
pub struct SearchResults<T> {
    pub target_impedance: f64,
    pub samples: Vec<SearchSample<T>>,
    pub best_index: usize,
    pub stop_reason: StopReason,
}

impl<T> SearchResults<T> {
    #[inline]
    pub fn best(&self) -> &SearchSample<T> {
        &self.samples[self.best_index]
    }

    /// Relative impedance error of the best sample.
    #[inline]
    pub fn best_relative_error(&self) -> f64 {
        (self.best().impedance-self.target_impedance).abs()/self.target_impedance.abs()
    }

    /// Drops every sample except the best.
    pub fn into_best(mut self) -> SearchSample<T> {
        self.samples.swap_remove(self.best_index)
    }
}

/// Resolved search range and starting point.
#[derive(Copy, Clone, Debug, PartialEq)]
struct SearchRange {
    min_value: f64,
    max_value: Option<f64>,
    initial_value: f64,
}

impl SearchRange {
    fn new(desc: &SearchDescriptor) -> Result<Self, Error> {
        let min_value = desc.min_value.unwrap_or(0.0);
        let max_value = desc.max_value;
        if let Some(max_value) = max_value {
            if max_value < min_value {
                return Err(Error::InvalidSearchRange { min_value, max_value });
            }
        }

        let mut initial_value = match (desc.initial_value, max_value) {
            (None, Some(max_value)) => (min_value+max_value)/2.0,
            (None, None) => min_value+1.0,
            (Some(initial_value), Some(max_value)) if initial_value > max_value => {
                warn!("Decreasing initial search value {} to maximum search value {}", initial_value, max_value);
                max_value
            },
            (Some(initial_value), _) if initial_value < min_value => {
                warn!("Increasing initial search value {} to minimum search value {}", initial_value, min_value);
                min_value
            },
            (Some(initial_value), _) => initial_value,
        };

        // zero cannot be doubled while looking for an upper bound
        if initial_value == 0.0 {
            initial_value = match max_value {
                Some(max_value) => (min_value+max_value)/2.0,
                None => 1.0,
            };
            warn!("Initial value was 0 and will be replaced with a non-zero finite value {}", initial_value);
        }

        Ok(Self { min_value, max_value, initial_value })
    }
}

/// Counts consecutive steps that do not improve the best error.
#[derive(Copy, Clone, Debug)]
struct PlateauDetector {
    threshold: f64,
    best_error: Option<f64>,
    count: usize,
}

impl PlateauDetector {
    fn new(threshold: f64) -> Self {
        Self { threshold, best_error: None, count: 0 }
    }

    /// Records an absolute error and returns the current plateau length.
    fn update(&mut self, error: f64) -> usize {
        match self.best_error.filter(|best_error| best_error.is_finite()) {
            None => self.best_error = Some(error),
            Some(best_error) => {
                let improvement = (best_error-error)/best_error;
                if improvement > self.threshold {
                    self.count = 0;
                } else {
                    self.count += 1;
                }
                if error < best_error {
                    self.best_error = Some(error);
                }
            },
        }
        self.count
    }
}

/// Finds the parameter value whose output impedance is closest to the target.
///
/// `func` evaluates one parameter value, typically by building, baking and
/// measuring a grid. If it fails, the search stops and returns what it has;
/// the error is only returned when nothing was evaluated successfully.
pub fn perform_parameter_search<T, F>(
    desc: &SearchDescriptor,
    mut func: F,
) -> Result<SearchResults<T>, Error>
where
    T: SearchOutput,
    F: FnMut(f64) -> Result<T, Error>,
{
    let config = desc.config;
    let range = SearchRange::new(desc)?;
    let target_impedance = desc.target_impedance;

    let mut v_lower = range.min_value;
    let mut e_lower: Option<f64> = None;
    let mut v_upper = range.max_value;
    let mut e_upper: Option<f64> = None;
    let mut v_unbounded_search = range.initial_value;

    // popped from the back: initial value, minimum, then maximum
    let mut v_required_search = Vec::with_capacity(3);
    if let Some(max_value) = range.max_value {
        v_required_search.push(max_value);
    }
    v_required_search.push(range.min_value);
    v_required_search.push(range.initial_value);

    let bar = if desc.verbose {
        Some(indicatif::ProgressBar::new(config.max_steps as u64))
    } else {
        None
    };

    let mut samples: Vec<SearchSample<T>> = Vec::new();
    let mut cache: HashMap<u64, usize> = HashMap::new();
    let mut best_index: Option<usize> = None;
    let mut plateau = PlateauDetector::new(config.early_stop_threshold);
    let mut failure: Option<Error> = None;
    let mut stop_reason = StopReason::MaxSteps;

    loop {
        let v_required = v_required_search.pop();
        let v_search = match (v_required, v_upper) {
            (Some(v_required), _) => v_required,
            (None, None) => v_unbounded_search,
            (None, Some(v_upper)) => {
                if (v_upper-v_lower).abs() < config.search_precision {
                    stop_reason = StopReason::RangeResolved;
                    break;
                }
                // weighted bisection, clamped so a badly curved response cannot stall it
                let ratio = match (e_lower, e_upper) {
                    (Some(e_lower), Some(e_upper)) => e_upper/(e_upper-e_lower),
                    _ => 0.5,
                };
                let ratio = ratio.clamp(0.2, 0.8);
                v_lower*ratio + v_upper*(1.0-ratio)
            },
        };

        let (index, is_new) = match cache.get(&v_search.to_bits()) {
            Some(&index) => (index, false),
            None => {
                if samples.len() >= config.max_steps {
                    stop_reason = StopReason::MaxSteps;
                    break;
                }
                let output = match func(v_search) {
                    Ok(output) => output,
                    Err(error) => {
                        warn!("Search function failed early at step {} with: {}", samples.len()+1, error);
                        failure = Some(error);
                        stop_reason = StopReason::EvaluationFailed;
                        break;
                    },
                };
                let impedance = output.impedance();
                let error_impedance = target_impedance-impedance;
                let error = match desc.correlation {
                    ImpedanceCorrelation::Positive => -error_impedance,
                    ImpedanceCorrelation::Negative => error_impedance,
                };
                let index = samples.len();
                let is_failed = output.is_failed();
                trace!(
                    "Search step {}: value={:.4e}, impedance={:.4e}, error={:.4e}, failed={}",
                    index, v_search, impedance, error, is_failed,
                );
                samples.push(SearchSample {
                    value: v_search,
                    impedance,
                    error,
                    iteration: index,
                    is_failed,
                    output,
                });
                cache.insert(v_search.to_bits(), index);
                if let Some(ref bar) = bar {
                    bar.inc(1);
                }
                (index, true)
            },
        };

        let sample = &samples[index];
        let error = sample.error;
        let is_candidate = !(config.reject_failed_solves && sample.is_failed);
        if is_candidate {
            let is_better = match best_index {
                None => true,
                Some(best) => {
                    let best_error = samples[best].error.abs();
                    !best_error.is_finite() || error.abs() < best_error
                },
            };
            if is_better {
                best_index = Some(index);
            }
        }
        if is_candidate && error.abs()/target_impedance.abs() < config.error_tolerance {
            stop_reason = StopReason::WithinTolerance;
            break;
        }

        let mut is_search_narrowed = false;
        if error > 0.0 && (v_upper.is_none() || e_upper.is_none() || v_upper.map_or(false, |v| v_search < v)) {
            v_upper = Some(v_search);
            e_upper = Some(error);
            is_search_narrowed = true;
        }
        if error < 0.0 && (e_lower.is_none() || v_search > v_lower) {
            v_lower = v_search;
            e_lower = Some(error);
            is_search_narrowed = true;
        }

        if is_new && is_candidate && plateau.update(error.abs()) >= config.plateau_count.max(1) {
            warn!("Exiting parameter search early after {} steps without improvement", plateau.count);
            stop_reason = StopReason::Plateau;
            break;
        }
        if v_required.is_some() {
            continue;
        }
        if v_upper.is_none() {
            v_unbounded_search = v_search*2.0;
            continue;
        }
        if !is_search_narrowed {
            warn!("Exiting parameter search early due to search range not being narrowed");
            stop_reason = StopReason::RangeNotNarrowed;
            break;
        }
    }

    if let Some(ref bar) = bar {
        bar.finish();
    }

    let best_index = match (best_index, failure) {
        (Some(best_index), _) => best_index,
        (None, Some(error)) => return Err(error),
        (None, None) => return Err(Error::NoSearchResults),
    };
    debug!(
        "Parameter search stopped ({:?}) after {} steps: value={:.4e}, impedance={:.4e}",
        stop_reason, samples.len(), samples[best_index].value, samples[best_index].impedance,
    );
    Ok(SearchResults {
        target_impedance,
        samples,
        best_index,
        stop_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Impedance of an idealised strip that falls with width.
    fn strip(width: f64) -> Result<ImpedanceResult, Error> {
        let energy = 1.0 + width;
        Ok(ImpedanceResult::from_energies(1.0, energy, 4.0*energy))
    }

    #[test]
    fn finds_width_for_target() {
        let target = strip(3.0).unwrap().z0;
        let mut desc = SearchDescriptor::new(target, ImpedanceCorrelation::Negative);
        desc.min_value = Some(0.1);
        desc.initial_value = Some(0.5);
        desc.config.max_steps = 32;
        let results = perform_parameter_search(&desc, strip).unwrap();
        assert_eq!(results.stop_reason, StopReason::WithinTolerance);
        assert!(results.best_relative_error() < desc.config.error_tolerance);
        assert!((results.best().value-3.0).abs() < 0.1);
    }

    #[test]
    fn required_values_come_first() {
        let target = strip(3.0).unwrap().z0;
        let mut desc = SearchDescriptor::new(target, ImpedanceCorrelation::Negative);
        desc.min_value = Some(1.0);
        desc.max_value = Some(8.0);
        desc.initial_value = Some(2.0);
        let results = perform_parameter_search(&desc, strip).unwrap();
        let values: Vec<f64> = results.samples.iter().take(3).map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 1.0, 8.0]);
        assert!(results.best_relative_error() < desc.config.error_tolerance);
    }

    #[test]
    fn positive_correlation_flips_error_sign() {
        // impedance grows with the parameter
        let func = |height: f64| -> Result<ImpedanceResult, Error> {
            Ok(ImpedanceResult::from_energies(1.0, 1.0/height, 1.0/height))
        };
        let target = func(2.5).unwrap().z0;
        let mut desc = SearchDescriptor::new(target, ImpedanceCorrelation::Positive);
        desc.min_value = Some(0.5);
        desc.config.max_steps = 32;
        let results = perform_parameter_search(&desc, func).unwrap();
        assert!(results.best_relative_error() < desc.config.error_tolerance);
        for sample in results.samples.iter().filter(|s| (s.value-2.5).abs() > 1e-6) {
            assert_eq!(sample.error > 0.0, sample.value > 2.5);
        }
    }

    #[test]
    fn flat_response_exits_on_plateau() {
        let mut calls = 0;
        let func = |value: f64| {
            calls += 1;
            let energy = 10.0 + 1e-9*value;
            Ok(ImpedanceResult::from_energies(1.0, energy, energy))
        };
        // unreachable target below the flat response, so no upper bound is ever found
        let target = ImpedanceResult::from_energies(1.0, 100.0, 100.0).z0;
        let mut desc = SearchDescriptor::new(target, ImpedanceCorrelation::Negative);
        desc.config.max_steps = 100;
        let results = perform_parameter_search(&desc, func).unwrap();
        assert_eq!(results.stop_reason, StopReason::Plateau);
        assert!(calls < 10);
    }

    #[test]
    fn invalid_range_is_rejected() {
        let mut desc = SearchDescriptor::new(50.0, ImpedanceCorrelation::Negative);
        desc.min_value = Some(2.0);
        desc.max_value = Some(1.0);
        assert!(matches!(
            perform_parameter_search(&desc, strip),
            Err(Error::InvalidSearchRange { .. }),
        ));
    }

    #[test]
    fn initial_value_is_clamped_and_never_zero() {
        let mut desc = SearchDescriptor::new(50.0, ImpedanceCorrelation::Negative);
        desc.min_value = Some(1.0);
        desc.max_value = Some(3.0);
        desc.initial_value = Some(5.0);
        assert_eq!(SearchRange::new(&desc).unwrap().initial_value, 3.0);
        desc.initial_value = Some(0.5);
        assert_eq!(SearchRange::new(&desc).unwrap().initial_value, 1.0);

        let desc = SearchDescriptor::new(50.0, ImpedanceCorrelation::Negative);
        let mut zero = desc;
        zero.initial_value = Some(0.0);
        assert_eq!(SearchRange::new(&zero).unwrap().initial_value, 1.0);
        assert_eq!(SearchRange::new(&desc).unwrap().initial_value, 1.0);
    }

    #[test]
    fn failed_solves_can_be_kept_out_of_best() {
        let target = strip(3.0).unwrap().z0;
        // a degenerate result that happens to report the target impedance
        let func = |width: f64| {
            if width == 0.5 {
                let mut result = ImpedanceResult::from_energies(1.0, 0.0, 0.0);
                result.z0 = target;
                Ok(result)
            } else {
                strip(width)
            }
        };
        let mut desc = SearchDescriptor::new(target, ImpedanceCorrelation::Negative);
        desc.min_value = Some(0.1);
        desc.initial_value = Some(0.5);
        desc.config.max_steps = 4;

        let results = perform_parameter_search(&desc, func).unwrap();
        assert_eq!(results.best().value, 0.5);

        desc.config.reject_failed_solves = true;
        let results = perform_parameter_search(&desc, func).unwrap();
        assert!(!results.best().is_failed);
        assert_ne!(results.best().value, 0.5);
    }

    #[test]
    fn nan_first_sample_does_not_stick_as_best() {
        let target = strip(3.0).unwrap().z0;
        let func = |width: f64| -> Result<ImpedanceResult, Error> {
            if width == 2.0 {
                let mut result = strip(width)?;
                result.z0 = f64::NAN;
                Ok(result)
            } else {
                strip(width)
            }
        };
        let mut desc = SearchDescriptor::new(target, ImpedanceCorrelation::Negative);
        desc.min_value = Some(1.0);
        desc.max_value = Some(8.0);
        desc.initial_value = Some(2.0);

        let results = perform_parameter_search(&desc, func).unwrap();
        assert!(results.samples[0].impedance.is_nan());
        assert_eq!(results.stop_reason, StopReason::WithinTolerance);
        assert!(results.best().impedance.is_finite());
        assert!(results.best_relative_error() < desc.config.error_tolerance);
    }

    #[test]
    fn evaluation_error_without_results_is_returned() {
        let desc = SearchDescriptor::new(50.0, ImpedanceCorrelation::Negative);
        let result = perform_parameter_search(&desc, |_| -> Result<ImpedanceResult, Error> {
            Err(Error::NotBaked)
        });
        assert!(matches!(result, Err(Error::NotBaked)));
    }

    #[test]
    fn plateau_detector_resets_on_progress() {
        let mut plateau = PlateauDetector::new(1e-3);
        assert_eq!(plateau.update(1.0), 0);
        assert_eq!(plateau.update(1.0), 1);
        assert_eq!(plateau.update(1.5), 2);
        assert_eq!(plateau.update(0.5), 0);

        let mut plateau = PlateauDetector::new(1e-3);
        assert_eq!(plateau.update(f64::NAN), 0);
        assert_eq!(plateau.update(1.0), 0);
        assert_eq!(plateau.update(0.5), 0);
    }
}
