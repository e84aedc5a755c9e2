//! A coarse quantized `(lat, lon)` cell used to advertise coverage
//! presence, and its downstream shard.
//!
//! Uses a thousandth-of-a-degree grid (~111m at the equator) sharded
//! into 16 latitude bands.

const GRID_SCALE: f64 = 1000.0;
const SHARD_COUNT: i32 = 16;

/// Quantizes a position to its grid cell.
pub fn scale(lat: f64, lon: f64) -> (i64, i64) {
    (
        (lat * GRID_SCALE).floor() as i64,
        (lon * GRID_SCALE).floor() as i64,
    )
}

/// Deterministic two-digit shard label for a grid cell's latitude band.
pub fn shard_id(lat: f64, _lon: f64) -> String {
    let band = (((lat + 90.0) / 180.0) * SHARD_COUNT as f64)
        .floor()
        .clamp(0.0, (SHARD_COUNT - 1) as f64) as i32;
    format!("{band:02}")
}

/// Encodes a scaled grid cell as the value enqueued to `update_datamap_*`.
pub fn encode_datamap_grid(lat: f64, lon: f64) -> String {
    let (scaled_lat, scaled_lon) = scale(lat, lon);
    format!("{scaled_lat}:{scaled_lon}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_floors_to_grid() {
        assert_eq!(scale(1.2345, -3.4567), (1234, -3457));
    }

    #[test]
    fn same_grid_cell_encodes_identically() {
        assert_eq!(encode_datamap_grid(1.23451, -3.45671), encode_datamap_grid(1.23459, -3.45679));
    }

    #[test]
    fn shard_id_is_stable_within_band() {
        assert_eq!(shard_id(10.0, 0.0), shard_id(10.5, 0.0));
    }
}
