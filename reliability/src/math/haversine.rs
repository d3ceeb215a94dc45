//! Great-circle distance on a spherical earth.
//!
//! Unlike [geo]'s `HaversineDistance`, the earth radius here is fixed
//! at 6371.0 km and the intermediate term is clamped so points near
//! the antipode never feed `sqrt` a negative value.
//!
//! [geo](https://github.com/georust/geo/blob/eb0cd98f3ccfa226631af23d94d66d214ea66488/geo/src/algorithm/haversine_distance.rs)

use crate::constants::{MEAN_EARTH_RADIUS, METERS_PER_NAUTICAL_MILE};
use geo::{Coord, CoordFloat};
use num_traits::FromPrimitive;

/// Returns the great-circle distance, in meters, between `a` and `b`.
///
/// Coordinates are in degrees with `x` as longitude and `y` as
/// latitude. The result is exactly symmetric in its arguments.
#[allow(clippy::many_single_char_names)]
pub fn haversine<T>(a: Coord<T>, b: Coord<T>) -> T
where
    T: CoordFloat + FromPrimitive,
{
    let one = T::one();
    let two = one + one;

    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let dlat = (lat2 - lat1).abs();
    let dlon = (b.x - a.x).abs().to_radians();

    let h = (dlat / two).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / two).sin().powi(2);
    let h = h.max(T::zero()).min(one);
    let c = two * h.sqrt().atan2((one - h).sqrt());

    c * T::from_f64(MEAN_EARTH_RADIUS).unwrap()
}

/// Returns the great-circle distance, in nautical miles, between `a`
/// and `b`.
pub fn haversine_nmi<T>(a: Coord<T>, b: Coord<T>) -> T
where
    T: CoordFloat + FromPrimitive,
{
    haversine(a, b) / T::from_f64(METERS_PER_NAUTICAL_MILE).unwrap()
}
