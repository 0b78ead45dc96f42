//! Distance bucketing.

/// Maps a distance to its bucket's midpoint: `width * floor(d / width) +
/// width / 2`. The midpoint doubles as the bucket's representative distance,
/// so it must be exact.
pub fn bucket(distance: f64, width: f64) -> f64 {
    width * (distance / width).floor() + width / 2.0
}
