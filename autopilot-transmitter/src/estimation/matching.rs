use crate::config::constants::{MATCH_RATIO, MAX_MATCH_DISTANCE};

/// 256-bit binary descriptor, as produced by ORB.
pub type Descriptor = [u8; 32];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

/// Keypoint position after removing the camera intrinsics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub query_index: usize,
    pub train_index: usize,
    pub distance: u32,
}

/// Nearest and second nearest train descriptor for one query descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidates {
    pub best: DescriptorMatch,
    pub second: Option<DescriptorMatch>,
}

/// A candidate match with both ends resolved to normalized coordinates.
/// `query` lies in the previous frame, `train` in the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub candidates: MatchCandidates,
    pub query: NormalizedPoint,
    pub train: NormalizedPoint,
}

impl Correspondence {
    pub fn horizontal_displacement(&self) -> f64 {
        self.train.x - self.query.x
    }
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

pub trait DescriptorMatcher: Send {
    fn knn_match(&self, query: &[Descriptor], train: &[Descriptor]) -> Vec<MatchCandidates>;
}

/// Exhaustive two nearest neighbour search under Hamming distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceHamming;

impl DescriptorMatcher for BruteForceHamming {
    fn knn_match(&self, query: &[Descriptor], train: &[Descriptor]) -> Vec<MatchCandidates> {
        query
            .iter()
            .enumerate()
            .filter_map(|(query_index, descriptor)| {
                let mut best: Option<DescriptorMatch> = None;
                let mut second: Option<DescriptorMatch> = None;

                for (train_index, candidate) in train.iter().enumerate() {
                    let found = DescriptorMatch {
                        query_index,
                        train_index,
                        distance: hamming_distance(descriptor, candidate),
                    };
                    match best {
                        Some(current) if found.distance >= current.distance => {
                            if second.map_or(true, |second| found.distance < second.distance) {
                                second = Some(found);
                            }
                        }
                        _ => {
                            second = best;
                            best = Some(found);
                        }
                    }
                }

                best.map(|best| MatchCandidates { best, second })
            })
            .collect()
    }
}

pub trait MatchFilter: Send {
    fn retain(&self, correspondences: Vec<Correspondence>) -> Vec<Correspondence>;
}

/// Lowe's ratio test plus an absolute distance ceiling. Each train
/// keypoint is used at most once, first come first served.
#[derive(Debug, Clone, Copy)]
pub struct RatioDistanceFilter {
    pub ratio: f32,
    pub max_distance: u32,
}

impl Default for RatioDistanceFilter {
    fn default() -> Self {
        RatioDistanceFilter {
            ratio: MATCH_RATIO,
            max_distance: MAX_MATCH_DISTANCE,
        }
    }
}

impl RatioDistanceFilter {
    fn accepts(&self, candidates: &MatchCandidates) -> bool {
        if candidates.best.distance >= self.max_distance {
            return false;
        }
        match candidates.second {
            Some(second) => (candidates.best.distance as f32) < self.ratio * second.distance as f32,
            // Only one train descriptor, nothing to be ambiguous with.
            None => true,
        }
    }
}

impl MatchFilter for RatioDistanceFilter {
    fn retain(&self, correspondences: Vec<Correspondence>) -> Vec<Correspondence> {
        let mut used_train = std::collections::HashSet::new();
        correspondences
            .into_iter()
            .filter(|correspondence| self.accepts(&correspondence.candidates))
            .filter(|correspondence| used_train.insert(correspondence.candidates.best.train_index))
            .collect()
    }
}

/// Drops correspondences whose horizontal displacement sits more than
/// `max_deviations` median absolute deviations from the median.
#[derive(Debug, Clone, Copy)]
pub struct DisplacementOutlierFilter {
    pub max_deviations: f64,
    /// Lower bound for the deviation scale, in normalized units.
    pub min_spread: f64,
}

impl Default for DisplacementOutlierFilter {
    fn default() -> Self {
        DisplacementOutlierFilter {
            max_deviations: 3.0,
            min_spread: 1e-3,
        }
    }
}

impl MatchFilter for DisplacementOutlierFilter {
    fn retain(&self, correspondences: Vec<Correspondence>) -> Vec<Correspondence> {
        let displacements: Vec<f64> = correspondences
            .iter()
            .map(Correspondence::horizontal_displacement)
            .collect();
        let Some(center) = median(displacements.clone()) else {
            return correspondences;
        };
        let deviations = displacements.iter().map(|value| (value - center).abs()).collect();
        let spread = median(deviations).unwrap_or(0.0).max(self.min_spread);
        let limit = self.max_deviations * spread;

        correspondences
            .into_iter()
            .filter(|correspondence| {
                (correspondence.horizontal_displacement() - center).abs() <= limit
            })
            .collect()
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[middle - 1] + values[middle]) / 2.0)
    } else {
        Some(values[middle])
    }
}

/// Filters applied in order, each one seeing what the previous kept.
pub struct FilterChain {
    filters: Vec<Box<dyn MatchFilter>>,
}

impl FilterChain {
    pub fn empty() -> Self {
        FilterChain { filters: Vec::new() }
    }

    pub fn with(mut self, filter: impl MatchFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        FilterChain::empty().with(RatioDistanceFilter::default())
    }
}

impl MatchFilter for FilterChain {
    fn retain(&self, correspondences: Vec<Correspondence>) -> Vec<Correspondence> {
        self.filters
            .iter()
            .fold(correspondences, |kept, filter| filter.retain(kept))
    }
}
