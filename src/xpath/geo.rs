//! Geopoint parsing and spherical measurements
//!
//! A geopoint is `lat lon [alt [acc]]`; geotraces and geoshapes join points
//! with `;`.

/// Equatorial radius used for both area and distance, in metres
pub const EARTH_RADIUS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Parse and validate one geopoint
pub fn parse_point(s: &str) -> Option<GeoPoint> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() < 2 || parts.len() > 4 {
        return None;
    }
    let num = |i: usize| -> Option<f64> {
        parts.get(i).map_or(Some(0.0), |p| {
            let v = super::value::parse_number(p);
            (!v.is_nan()).then_some(v)
        })
    };
    let lat = num(0)?;
    let lon = num(1)?;
    let _alt = num(2)?;
    let acc = num(3)?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) || acc < 0.0 {
        return None;
    }
    Some(GeoPoint { lat, lon })
}

/// Parse a list of geopoint strings; any invalid point fails the whole list
pub fn parse_points<S: AsRef<str>>(items: &[S]) -> Option<Vec<GeoPoint>> {
    items
        .iter()
        .flat_map(|item| item.as_ref().split(';'))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_point)
        .collect()
}

/// Whether every `;`-separated point of a trace or shape is valid
pub fn is_valid_points(s: &str, min_points: usize) -> bool {
    parse_points(&[s]).is_some_and(|points| points.len() >= min_points)
}

/// Polygon area in square metres by spherical excess, rounded to 2 decimals.
/// `NaN` for fewer than 3 points.
pub fn area(points: &[GeoPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return f64::NAN;
    }
    let mut total = 0.0;
    for i in 0..n {
        let p1 = points[i];
        let p2 = points[(i + 1) % n];
        let p3 = points[(i + 2) % n];
        total += (p3.lon.to_radians() - p1.lon.to_radians()) * p2.lat.to_radians().sin();
    }
    round2((total * EARTH_RADIUS * EARTH_RADIUS / 2.0).abs())
}

/// Great-circle length of a path in metres, rounded to 2 decimals.
/// `NaN` for fewer than 2 points.
pub fn distance(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return f64::NAN;
    }
    let total: f64 = points.windows(2).map(|w| haversine(w[0], w[1])).sum();
    round2(total)
}

fn haversine(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * h.sqrt().atan2((1.0 - h).sqrt())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
