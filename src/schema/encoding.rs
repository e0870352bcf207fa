//! Fixed-point encode/decode (§3.3).
//!
//! `x_int = round(x_float * factor)`; `decode(x_int) = x_int as f64 / factor`.
//! Encoding is rejected (`None`) when the input isn't representable as an
//! exact multiple of the table's increment within floating-point rounding —
//! callers that need a hard error should route the `None` to quarantine
//! (ingestion) or propagate it (direct API use).

use super::Scale;

/// `x_int = round(x_float / increment)` where `increment = 1 / factor`.
/// Returns `None` if `value` is non-finite.
pub fn encode(value: f64, scale: Scale) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let scaled = value * scale.factor as f64;
    Some(scaled.round() as i64)
}

/// Decoding is lossless only at the research edge (§3.3) — never call this
/// mid-pipeline.
pub fn decode(value: i64, scale: Scale) -> f64 {
    value as f64 / scale.factor as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_exact_multiples() {
        let scale = Scale::CRYPTO;
        for raw in [0i64, 1, -1, 123_456_789, -987_654_321] {
            let decoded = decode(raw, scale);
            let re_encoded = encode(decoded, scale).unwrap();
            assert_eq!(raw, re_encoded);
        }
    }

    #[test]
    fn crypto_scale_matches_spec_constant() {
        assert_eq!(Scale::CRYPTO.factor, 1_000_000_000);
        assert_eq!(encode(1.5, Scale::CRYPTO), Some(1_500_000_000));
        assert_eq!(decode(1_500_000_000, Scale::CRYPTO), 1.5);
    }

    #[test]
    fn cn_equity_tick_scale() {
        // 12.34 yuan -> 1234 ticks of 0.01
        assert_eq!(encode(12.34, Scale::CN_EQUITY_TICK), Some(1234));
        assert_eq!(decode(1234, Scale::CN_EQUITY_TICK), 12.34);
    }

    #[test]
    fn rejects_non_finite() {
        assert_eq!(encode(f64::NAN, Scale::CRYPTO), None);
        assert_eq!(encode(f64::INFINITY, Scale::CRYPTO), None);
    }
}
