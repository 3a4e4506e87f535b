//! MGRS grid references.
//!
//! Converts between geodetic coordinates and Military Grid Reference System
//! strings (`<zone><band><column><row><easting digits><northing digits>`).
//! Satellite tiles are partitioned by the 5-character grid square prefix
//! (e.g. `16SGC`), which is the precision-zero form.

use crate::error::{Error, Result};

use super::utm::{geodetic_from_utm, utm_from_geodetic, UtmCoord};

/// Latitude band letters, 8 degree bands from 80S, skipping I and O.
const BAND_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWX";
/// 100 km column letter sets, cycling every three zones.
const COLUMN_SETS: [&[u8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];
/// 100 km row letters, skipping I and O; even zones start five letters in.
const ROW_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUV";
/// Row letter offset applied in even-numbered zones.
const EVEN_ZONE_ROW_OFFSET: usize = 5;
/// The row letter cycle repeats every 2,000 km of northing.
const ROW_CYCLE_METERS: f64 = 2_000_000.0;
const SQUARE_METERS: f64 = 100_000.0;

/// Minimum northing of each latitude band, in the band letter order of
/// [`BAND_LETTERS`]. Southern-hemisphere values include the false northing.
const BAND_MIN_NORTHING: [f64; 20] = [
    1_100_000.0, // C
    2_000_000.0, // D
    2_800_000.0, // E
    3_700_000.0, // F
    4_600_000.0, // G
    5_500_000.0, // H
    6_400_000.0, // J
    7_300_000.0, // K
    8_200_000.0, // L
    9_100_000.0, // M
    0.0,         // N
    800_000.0,   // P
    1_700_000.0, // Q
    2_600_000.0, // R
    3_500_000.0, // S
    4_400_000.0, // T
    5_300_000.0, // U
    6_200_000.0, // V
    7_000_000.0, // W
    7_900_000.0, // X
];

fn band_letter(lat: f64) -> Result<u8> {
    if !(-80.0..=84.0).contains(&lat) {
        return Err(Error::Geometry(format!("latitude {lat} outside MGRS domain")));
    }
    let index = (((lat + 80.0) / 8.0).floor() as usize).min(BAND_LETTERS.len() - 1);
    Ok(BAND_LETTERS[index])
}

fn band_index(letter: u8) -> Result<usize> {
    BAND_LETTERS
        .iter()
        .position(|&b| b == letter)
        .ok_or_else(|| Error::Geometry(format!("invalid MGRS band letter '{}'", letter as char)))
}

fn column_set(zone: u8) -> &'static [u8] {
    COLUMN_SETS[usize::from(zone - 1) % 3]
}

/// Converts a geodetic coordinate to an MGRS reference.
///
/// `precision` is the number of digits for each of easting and northing
/// (0 through 5); precision 5 resolves to one meter, precision 0 yields the
/// bare grid square.
///
/// # Errors
///
/// Returns [`Error::Geometry`] for coordinates outside the MGRS domain or a
/// precision above 5.
pub fn mgrs_from_geodetic(lat: f64, lon: f64, precision: usize) -> Result<String> {
    if precision > 5 {
        return Err(Error::Geometry(format!(
            "MGRS precision {precision} exceeds 5"
        )));
    }

    let utm = utm_from_geodetic(lat, lon, None)?;
    let band = band_letter(lat)?;

    let column_index = (utm.easting / SQUARE_METERS).floor() as usize;
    let set = column_set(utm.zone);
    // Easting inside a zone spans squares 1..=8 of the set.
    if column_index < 1 || column_index > set.len() {
        return Err(Error::Geometry(format!(
            "easting {} outside zone {}",
            utm.easting, utm.zone
        )));
    }
    let column = set[column_index - 1];

    let row_index = ((utm.northing % ROW_CYCLE_METERS) / SQUARE_METERS).floor() as usize;
    let row_offset = if utm.zone % 2 == 0 {
        EVEN_ZONE_ROW_OFFSET
    } else {
        0
    };
    let row = ROW_LETTERS[(row_index + row_offset) % ROW_LETTERS.len()];

    let mut reference = format!(
        "{:02}{}{}{}",
        utm.zone, band as char, column as char, row as char
    );
    if precision > 0 {
        let scale = 10_u32.pow(5 - precision as u32);
        let easting_digits = (utm.easting % SQUARE_METERS).floor() as u32 / scale;
        let northing_digits = (utm.northing % SQUARE_METERS).floor() as u32 / scale;
        reference.push_str(&format!(
            "{easting_digits:0width$}{northing_digits:0width$}",
            width = precision
        ));
    }
    Ok(reference)
}

/// Returns the 5-character grid square containing the coordinate.
///
/// # Errors
///
/// Returns [`Error::Geometry`] for coordinates outside the MGRS domain.
pub fn grid_square(lat: f64, lon: f64) -> Result<String> {
    mgrs_from_geodetic(lat, lon, 0)
}

/// Converts an MGRS reference back to geodetic degrees `(lat, lon)`.
///
/// The returned point is the southwest corner of the referenced cell.
///
/// # Errors
///
/// Returns [`Error::Geometry`] for malformed references.
pub fn mgrs_to_geodetic(reference: &str) -> Result<(f64, f64)> {
    let bytes = reference.trim().as_bytes();
    let zone_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=2).contains(&zone_len) || bytes.len() < zone_len + 3 {
        return Err(Error::Geometry(format!("malformed MGRS reference '{reference}'")));
    }
    let zone: u8 = reference[..zone_len]
        .parse()
        .map_err(|_| Error::Geometry(format!("malformed MGRS zone in '{reference}'")))?;
    if !(1..=60).contains(&zone) {
        return Err(Error::Geometry(format!("invalid MGRS zone {zone}")));
    }

    let band = bytes[zone_len].to_ascii_uppercase();
    let column = bytes[zone_len + 1].to_ascii_uppercase();
    let row = bytes[zone_len + 2].to_ascii_uppercase();
    let digits = &reference[zone_len + 3..];
    if digits.len() % 2 != 0 || digits.len() > 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Geometry(format!(
            "malformed MGRS digits in '{reference}'"
        )));
    }
    let precision = digits.len() / 2;

    let band_idx = band_index(band)?;
    let set = column_set(zone);
    let column_index = set.iter().position(|&b| b == column).ok_or_else(|| {
        Error::Geometry(format!("invalid MGRS column letter '{}'", column as char))
    })?;
    let easting_base = (column_index as f64 + 1.0) * SQUARE_METERS;

    let row_offset = if zone % 2 == 0 { EVEN_ZONE_ROW_OFFSET } else { 0 };
    let row_pos = ROW_LETTERS
        .iter()
        .position(|&b| b == row)
        .ok_or_else(|| Error::Geometry(format!("invalid MGRS row letter '{}'", row as char)))?;
    let row_index = (row_pos + ROW_LETTERS.len() - row_offset) % ROW_LETTERS.len();

    let min_northing = BAND_MIN_NORTHING[band_idx];
    let mut northing_base = row_index as f64 * SQUARE_METERS;
    while northing_base < min_northing {
        northing_base += ROW_CYCLE_METERS;
    }

    let (mut easting, mut northing) = (easting_base, northing_base);
    if precision > 0 {
        let scale = f64::from(10_u32.pow(5 - precision as u32));
        let east_digits: f64 = digits[..precision]
            .parse()
            .map_err(|_| Error::Geometry(format!("malformed MGRS digits in '{reference}'")))?;
        let north_digits: f64 = digits[precision..]
            .parse()
            .map_err(|_| Error::Geometry(format!("malformed MGRS digits in '{reference}'")))?;
        easting += east_digits * scale;
        northing += north_digits * scale;
    }

    let coord = UtmCoord {
        zone,
        northern: band >= b'N',
        easting,
        northing,
    };
    geodetic_from_utm(&coord)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_prime_meridian_reference() {
        let reference = mgrs_from_geodetic(0.0, 0.0, 5).expect("convert");
        assert_eq!(reference, "31NAA6602100000");
    }

    #[test]
    fn test_grid_square_is_five_characters() {
        let square = grid_square(33.636_662_4, -84.428_057_1).expect("convert");
        assert_eq!(square, "16SGC");
    }

    #[test]
    fn test_reference_to_geodetic() {
        let (lat, lon) = mgrs_to_geodetic("16SGC3855124838").expect("convert");
        assert!((lat - 33.636_662_4).abs() < 1e-4, "lat {lat}");
        assert!((lon - -84.428_057_1).abs() < 1e-4, "lon {lon}");
    }

    #[test]
    fn test_round_trip_through_reference() {
        for &(lat, lon) in &[
            (14.95, -101.4),
            (45.5, 9.2),
            (-23.55, -46.63),
            (63.8, 20.3),
        ] {
            let reference = mgrs_from_geodetic(lat, lon, 5).expect("encode");
            let (lat2, lon2) = mgrs_to_geodetic(&reference).expect("decode");
            // Precision 5 truncates to the meter, so allow one cell of slack.
            assert!((lat - lat2).abs() < 1e-4, "{reference}: lat {lat} vs {lat2}");
            assert!((lon - lon2).abs() < 1e-4, "{reference}: lon {lon} vs {lon2}");
        }
    }

    #[test]
    fn test_even_zone_row_offset() {
        // Zone 16 is even; the row letter for this northing differs from the
        // odd-zone lettering by five positions.
        let reference = mgrs_from_geodetic(33.636_662_4, -84.428_057_1, 0).expect("convert");
        assert_eq!(&reference[4..5], "C");
    }

    #[test]
    fn test_malformed_references_rejected() {
        assert!(mgrs_to_geodetic("").is_err());
        assert!(mgrs_to_geodetic("99XAB").is_err());
        assert!(mgrs_to_geodetic("16SG").is_err());
        assert!(mgrs_to_geodetic("16SGC123").is_err());
        assert!(mgrs_to_geodetic("16SIC0000000000").is_err());
    }
}
