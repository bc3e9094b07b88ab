use rust_decimal::{Decimal, RoundingStrategy};

use crate::entities::pricing_coefficients;
use crate::entities::schedule_road::TypeDrive;

/// The subset of the global coefficient row the leg formula consumes.
#[derive(Debug, Clone, Copy)]
pub struct Coefficients {
    /// Average speed, km/h.
    pub vm: f64,
    /// Pickup radius, km.
    pub s1: f64,
    /// Cashback, percent.
    pub kc: f64,
    /// Insurance, percent.
    pub ks: f64,
    /// City coefficient.
    pub kg: f64,
}

impl From<&pricing_coefficients::Model> for Coefficients {
    fn from(m: &pricing_coefficients::Model) -> Self {
        Self {
            vm: m.vm,
            s1: m.s1,
            kc: m.kc,
            ks: m.ks,
            kg: m.kg,
        }
    }
}

/// Bounds the coefficient row must satisfy before it is accepted.
pub fn validate_bounds(m: &pricing_coefficients::Model) -> Result<(), String> {
    if m.vm <= 0.0 {
        return Err("vm must be > 0".to_string());
    }
    if m.s1 < 0.0 {
        return Err("s1 must be >= 0".to_string());
    }
    if !(0.0..=3.0).contains(&m.kc) {
        return Err("kc must be in [0, 3]".to_string());
    }
    if m.ks < 0.0 {
        return Err("ks must be >= 0".to_string());
    }
    if m.kg <= 0.0 {
        return Err("kg must be > 0".to_string());
    }
    if m.t1 <= 0.0 {
        return Err("t1 must be > 0".to_string());
    }
    if m.m < 0.0 || m.x5 < 0.0 || m.p_insurance < 0.0 {
        return Err("m, x5 and p_insurance must be >= 0".to_string());
    }
    Ok(())
}

/// Cost of a single leg.
///
/// `tariff_per_km` is the tariff's per-kilometre price, `distance_m` the
/// route length in metres and `duration_s` the estimated travel time in
/// seconds. Nonpositive inputs coerce to zero; the traffic coefficient is
/// clamped to [1, 2.5].
pub fn leg_cost(tariff_per_km: f64, distance_m: f64, duration_s: f64, c: &Coefficients) -> f64 {
    let s2 = (distance_m.max(0.0)) / 1000.0;
    let to = duration_s.max(0.0);

    let kh2 = if s2 > 0.0 {
        let t = 3600.0 / c.vm;
        (to / (t * s2)).clamp(1.0, 2.5)
    } else {
        1.0
    };

    // Billable distance includes the pickup radius.
    let billable = c.s1 + s2;
    let base = billable * tariff_per_km;
    let insurance = c.ks * s2 / 100.0;
    let pre_cashback = kh2 * base * c.kg + insurance;
    let cashback = c.kc * pre_cashback / 100.0;

    pre_cashback + cashback
}

/// Price of a whole road: the sum over its consecutive legs, doubled for
/// round trips. Persisted with two decimal places, rounding toward zero.
pub fn road_amount(
    tariff_per_km: f64,
    legs: &[(f64, f64)],
    type_drive: TypeDrive,
    c: &Coefficients,
) -> Decimal {
    let mut sum: f64 = legs
        .iter()
        .map(|&(distance_m, duration_s)| leg_cost(tariff_per_km, distance_m, duration_s, c))
        .sum();

    if type_drive == TypeDrive::RoundTrip {
        sum *= 2.0;
    }

    to_money(sum)
}

/// Truncate to two decimal places (toward zero) for persistence.
pub fn to_money(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn coeffs() -> Coefficients {
        Coefficients {
            vm: 27.0,
            s1: 3.0,
            kc: 3.0,
            ks: 1.0,
            kg: 1.0,
        }
    }

    fn coeff_row() -> pricing_coefficients::Model {
        pricing_coefficients::Model {
            id: 1,
            vm: 25.0,
            s1: 2.0,
            kc: 2.0,
            ks: 10.0,
            kg: 1.0,
            t1: 144.0,
            m: 35.0,
            x5: 1.0,
            p_insurance: 0.0,
            active: true,
        }
    }

    #[test]
    fn bounds_accept_the_default_row() {
        assert!(validate_bounds(&coeff_row()).is_ok());
    }

    #[test]
    fn bounds_reject_cashback_over_three_percent() {
        let mut row = coeff_row();
        row.kc = 5.0;
        assert!(validate_bounds(&row).is_err());
    }

    #[test]
    fn bounds_reject_nonpositive_speed() {
        let mut row = coeff_row();
        row.vm = 0.0;
        assert!(validate_bounds(&row).is_err());
    }

    #[test]
    fn prices_single_one_way_leg() {
        // 5.6 km in 30 minutes at 100 RUB/km.
        let amount = road_amount(100.0, &[(5600.0, 1800.0)], TypeDrive::OneWay, &coeffs());
        assert_eq!(amount, dec!(2135.46));
    }

    #[test]
    fn round_trip_doubles_the_sum() {
        let one_way = road_amount(100.0, &[(5600.0, 1800.0)], TypeDrive::OneWay, &coeffs());
        let round_trip = road_amount(100.0, &[(5600.0, 1800.0)], TypeDrive::RoundTrip, &coeffs());
        // Truncation applies after doubling, so compare against the raw sum.
        let raw = leg_cost(100.0, 5600.0, 1800.0, &coeffs());
        assert_eq!(round_trip, to_money(raw * 2.0));
        assert!(round_trip >= one_way * dec!(2) - dec!(0.01));
    }

    #[test]
    fn intermediate_chain_sums_pairs() {
        let c = coeffs();
        let chained = road_amount(
            100.0,
            &[(2000.0, 600.0), (3000.0, 900.0)],
            TypeDrive::WithIntermediate,
            &c,
        );
        let expected = to_money(leg_cost(100.0, 2000.0, 600.0, &c) + leg_cost(100.0, 3000.0, 900.0, &c));
        assert_eq!(chained, expected);
    }

    #[test]
    fn traffic_coefficient_is_clamped() {
        let c = coeffs();
        // Absurdly slow trip: Kh2 saturates at 2.5.
        let slow = leg_cost(100.0, 1000.0, 1_000_000.0, &c);
        let t = 3600.0 / c.vm;
        let at_ceiling = leg_cost(100.0, 1000.0, 2.5 * t * 1.0, &c);
        assert!((slow - at_ceiling).abs() < 1e-9);

        // Instant trip: Kh2 floors at 1.
        let instant = leg_cost(100.0, 1000.0, 0.0, &c);
        let at_floor = leg_cost(100.0, 1000.0, t * 1.0, &c);
        assert!((instant - at_floor).abs() < 1e-9);
    }

    #[test]
    fn zero_distance_bills_pickup_radius_only() {
        let c = coeffs();
        let cost = leg_cost(100.0, 0.0, 1800.0, &c);
        let pre = 1.0 * c.s1 * 100.0 * c.kg;
        let expected = pre + c.kc * pre / 100.0;
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn negative_inputs_coerce_to_zero() {
        let c = coeffs();
        assert!((leg_cost(100.0, -5.0, -10.0, &c) - leg_cost(100.0, 0.0, 0.0, &c)).abs() < 1e-9);
    }

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(to_money(10.999), dec!(10.99));
        assert_eq!(to_money(0.019), dec!(0.01));
    }
}
