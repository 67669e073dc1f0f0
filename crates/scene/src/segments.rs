//! Splitting reconciled samples into gap-free segments.

use parker_core::time::{offset_seconds, seconds_between};
use parker_core::vector;
use parker_frames::ReconciledPoint;

use crate::ComposeError;

/// Steps longer than this multiple of the median cadence are gaps.
pub const DEFAULT_GAP_FACTOR: f64 = 1.5;

/// Longest gap [`GapPolicy::Interpolate`] fills, in missing samples. Longer gaps
/// break the segment as under [`GapPolicy::Break`].
pub const MAX_INTERPOLATED_STEPS: usize = 24;

/// What to do across a data gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapPolicy {
    /// Start a new segment after the gap.
    #[default]
    Break,
    /// Fill the gap linearly at the nominal cadence, up to
    /// [`MAX_INTERPOLATED_STEPS`] points.
    Interpolate,
}

/// A gap-free run of points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segment {
    pub points: Vec<ReconciledPoint>,
    /// Points synthesised by [`GapPolicy::Interpolate`].
    pub interpolated: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Split `points` using [`DEFAULT_GAP_FACTOR`].
pub fn split_segments(
    points: &[ReconciledPoint],
    policy: GapPolicy,
) -> Result<Vec<Segment>, ComposeError> {
    split_segments_with(points, policy, DEFAULT_GAP_FACTOR)
}

/// Split `points` into segments.
///
/// A gap is an epoch step longer than `gap_factor` times the median cadence, or a
/// point with a non-finite position. Epochs must be strictly increasing.
pub fn split_segments_with(
    points: &[ReconciledPoint],
    policy: GapPolicy,
    gap_factor: f64,
) -> Result<Vec<Segment>, ComposeError> {
    if !(gap_factor.is_finite() && gap_factor >= 1.0) {
        return Err(ComposeError::InvalidGapFactor(gap_factor));
    }
    if let Some(index) = points
        .windows(2)
        .position(|pair| pair[1].epoch <= pair[0].epoch)
    {
        return Err(ComposeError::UnorderedSamples {
            index: index + 1,
            epoch: points[index + 1].epoch,
        });
    }

    let threshold = median_cadence(points).map(|cadence| (cadence, cadence * gap_factor));
    let mut segments = Vec::new();
    let mut current = Segment::default();

    for point in points {
        if !vector::is_finite(&point.position_au) {
            if policy == GapPolicy::Break && !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let (Some(last), Some((cadence, limit))) = (current.points.last(), threshold) {
            let step = seconds_between(&last.epoch, &point.epoch);
            if step > limit {
                let fill = match policy {
                    GapPolicy::Break => None,
                    GapPolicy::Interpolate => fill_gap(last, point, cadence),
                };
                match fill {
                    Some(fill) => {
                        current.interpolated += fill.len();
                        current.points.extend(fill);
                    }
                    None => segments.push(std::mem::take(&mut current)),
                }
            }
        }
        current.points.push(point.clone());
    }
    if !current.is_empty() {
        segments.push(current);
    }
    Ok(segments)
}

/// Median step between consecutive epochs, in seconds.
pub fn median_cadence(points: &[ReconciledPoint]) -> Option<f64> {
    let mut steps: Vec<f64> = points
        .windows(2)
        .map(|pair| seconds_between(&pair[0].epoch, &pair[1].epoch))
        .collect();
    if steps.is_empty() {
        return None;
    }
    steps.sort_by(f64::total_cmp);
    let mid = steps.len() / 2;
    Some(if steps.len() % 2 == 0 {
        0.5 * (steps[mid - 1] + steps[mid])
    } else {
        steps[mid]
    })
}

/// Linear fill between `from` and `to`, or `None` when the gap is too long to fill.
fn fill_gap(
    from: &ReconciledPoint,
    to: &ReconciledPoint,
    cadence: f64,
) -> Option<Vec<ReconciledPoint>> {
    let span = seconds_between(&from.epoch, &to.epoch);
    let count = ((span / cadence).round() as usize).saturating_sub(1);
    if count > MAX_INTERPOLATED_STEPS {
        return None;
    }
    let fill = (1..=count)
        .map(|k| {
            let frac = k as f64 / (count + 1) as f64;
            ReconciledPoint {
                epoch: offset_seconds(&from.epoch, span * frac),
                position_au: vector::lerp(&from.position_au, &to.position_au, frac),
                velocity_km_s: None,
            }
        })
        .collect();
    Some(fill)
}
