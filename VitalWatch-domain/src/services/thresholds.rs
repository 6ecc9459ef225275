//! Clinical threshold rules
//!
//! Pure decision functions: each looks at one value and reports the first
//! matching band, if any. Turning a breach into alert text lives in
//! [`super::messages`].

use vital_watch_data::models::{HealthData, Measurement, Severity, VitalReading};

use crate::entities::{Direction, ThresholdBreach, VitalSign};

/// Heart rate bands: >150 CRITICAL, >120 HIGH, <50 MEDIUM
pub fn classify_heart_rate(bpm: f64) -> Option<ThresholdBreach> {
    let band = if bpm > 150.0 {
        (Direction::High, Severity::Critical)
    } else if bpm > 120.0 {
        (Direction::High, Severity::High)
    } else if bpm < 50.0 {
        (Direction::Low, Severity::Medium)
    } else {
        return None;
    };
    Some(ThresholdBreach::new(VitalSign::HeartRate, bpm, band.0, band.1))
}

/// SpO2 bands: <90 CRITICAL, <94 HIGH
pub fn classify_spo2(percent: f64) -> Option<ThresholdBreach> {
    let severity = if percent < 90.0 {
        Severity::Critical
    } else if percent < 94.0 {
        Severity::High
    } else {
        return None;
    };
    Some(ThresholdBreach::new(VitalSign::Spo2, percent, Direction::Low, severity))
}

/// Systolic pressure bands: >180 CRITICAL, >140 HIGH
pub fn classify_systolic(mmhg: f64) -> Option<ThresholdBreach> {
    let severity = if mmhg > 180.0 {
        Severity::Critical
    } else if mmhg > 140.0 {
        Severity::High
    } else {
        return None;
    };
    Some(ThresholdBreach::new(VitalSign::Systolic, mmhg, Direction::High, severity))
}

/// Temperature bands: >40.0 CRITICAL, >39.0 HIGH, <35.0 HIGH
pub fn classify_temperature(celsius: f64) -> Option<ThresholdBreach> {
    let band = if celsius > 40.0 {
        (Direction::High, Severity::Critical)
    } else if celsius > 39.0 {
        (Direction::High, Severity::High)
    } else if celsius < 35.0 {
        (Direction::Low, Severity::High)
    } else {
        return None;
    };
    Some(ThresholdBreach::new(VitalSign::Temperature, celsius, band.0, band.1))
}

/// Evaluate every vital present on a multi-vital record.
///
/// Absent fields are skipped. Breaches come out in the order heart rate,
/// SpO2, systolic, temperature.
pub fn evaluate_health_data(data: &HealthData) -> Vec<ThresholdBreach> {
    [
        data.heart_rate.and_then(|v| classify_heart_rate(f64::from(v))),
        data.spo2.and_then(|v| classify_spo2(f64::from(v))),
        data.systolic.and_then(|v| classify_systolic(f64::from(v))),
        data.temperature.and_then(classify_temperature),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Reduced rule set for legacy single-value measurements.
///
/// Heart rate >100 is HIGH and <50 MEDIUM; SpO2 <90 is CRITICAL. Every other
/// type, known or not, produces nothing.
pub fn evaluate_measurement(measurement: &Measurement) -> Option<ThresholdBreach> {
    let value = measurement.value;
    match VitalSign::for_measurement_type(&measurement.measurement_type)? {
        VitalSign::HeartRate if value > 100.0 => Some(ThresholdBreach::new(
            VitalSign::HeartRate,
            value,
            Direction::High,
            Severity::High,
        )),
        VitalSign::HeartRate if value < 50.0 => Some(ThresholdBreach::new(
            VitalSign::HeartRate,
            value,
            Direction::Low,
            Severity::Medium,
        )),
        VitalSign::Spo2 if value < 90.0 => Some(ThresholdBreach::new(
            VitalSign::Spo2,
            value,
            Direction::Low,
            Severity::Critical,
        )),
        _ => None,
    }
}

/// Evaluate either record shape
pub fn evaluate_reading(reading: &VitalReading) -> Vec<ThresholdBreach> {
    match reading {
        VitalReading::HealthData(data) => evaluate_health_data(data),
        VitalReading::Measurement(measurement) => evaluate_measurement(measurement).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use vital_watch_data::models::MeasurementType;

    fn severity_of(breach: Option<ThresholdBreach>) -> Option<Severity> {
        breach.map(|b| b.severity)
    }

    #[test]
    fn test_heart_rate_band_edges() {
        assert_eq!(severity_of(classify_heart_rate(151.0)), Some(Severity::Critical));
        assert_eq!(severity_of(classify_heart_rate(150.0)), Some(Severity::High));
        assert_eq!(severity_of(classify_heart_rate(121.0)), Some(Severity::High));
        assert_eq!(severity_of(classify_heart_rate(120.0)), None);
        assert_eq!(severity_of(classify_heart_rate(50.0)), None);
        assert_eq!(severity_of(classify_heart_rate(49.0)), Some(Severity::Medium));
    }

    #[test]
    fn test_spo2_band_edges() {
        assert_eq!(severity_of(classify_spo2(89.0)), Some(Severity::Critical));
        assert_eq!(severity_of(classify_spo2(90.0)), Some(Severity::High));
        assert_eq!(severity_of(classify_spo2(93.0)), Some(Severity::High));
        assert_eq!(severity_of(classify_spo2(94.0)), None);
    }

    #[test]
    fn test_systolic_and_temperature_edges() {
        assert_eq!(severity_of(classify_systolic(181.0)), Some(Severity::Critical));
        assert_eq!(severity_of(classify_systolic(180.0)), Some(Severity::High));
        assert_eq!(severity_of(classify_systolic(140.0)), None);

        assert_eq!(severity_of(classify_temperature(40.1)), Some(Severity::Critical));
        assert_eq!(severity_of(classify_temperature(40.0)), Some(Severity::High));
        assert_eq!(severity_of(classify_temperature(39.0)), None);
        assert_eq!(severity_of(classify_temperature(35.0)), None);
        let cold = classify_temperature(34.9).unwrap();
        assert_eq!(cold.severity, Severity::High);
        assert_eq!(cold.direction, Direction::Low);
    }

    #[test]
    fn test_health_data_skips_missing_fields() {
        let mut data = HealthData::new("patient-1", Utc::now());
        assert!(evaluate_health_data(&data).is_empty());

        data.heart_rate = Some(160);
        data.spo2 = Some(92);
        data.steps = Some(12_000);
        let breaches = evaluate_health_data(&data);

        assert_eq!(breaches.len(), 2);
        assert_eq!(breaches[0].vital, VitalSign::HeartRate);
        assert_eq!(breaches[0].severity, Severity::Critical);
        assert_eq!(breaches[1].vital, VitalSign::Spo2);
        assert_eq!(breaches[1].severity, Severity::High);
    }

    #[test]
    fn test_legacy_measurement_rules() {
        let hr = |v| Measurement::new("patient-1", MeasurementType::HeartRate, v, Utc::now());
        assert_eq!(severity_of(evaluate_measurement(&hr(101.0))), Some(Severity::High));
        assert_eq!(severity_of(evaluate_measurement(&hr(100.0))), None);
        assert_eq!(severity_of(evaluate_measurement(&hr(45.0))), Some(Severity::Medium));

        let spo2 = Measurement::new("patient-1", MeasurementType::Spo2, 88.0, Utc::now());
        assert_eq!(severity_of(evaluate_measurement(&spo2)), Some(Severity::Critical));

        // Only the reduced set applies to the legacy path
        let temp = Measurement::new("patient-1", MeasurementType::Temperature, 41.0, Utc::now());
        assert!(evaluate_measurement(&temp).is_none());

        let unknown = Measurement::new(
            "patient-1",
            MeasurementType::Other("glucose".to_string()),
            400.0,
            Utc::now(),
        );
        assert!(evaluate_measurement(&unknown).is_none());
    }

    proptest! {
        #[test]
        fn prop_normal_heart_rate_never_alerts(bpm in 50i32..=120) {
            prop_assert!(classify_heart_rate(f64::from(bpm)).is_none());
        }

        #[test]
        fn prop_tachycardia_over_150_is_critical(bpm in 151i32..400) {
            prop_assert_eq!(severity_of(classify_heart_rate(f64::from(bpm))), Some(Severity::Critical));
        }

        #[test]
        fn prop_spo2_at_or_above_94_never_alerts(percent in 94i32..=100) {
            prop_assert!(classify_spo2(f64::from(percent)).is_none());
        }

        #[test]
        fn prop_at_most_one_breach_per_vital(
            hr in proptest::option::of(0i32..300),
            spo2 in proptest::option::of(50i32..=100),
            systolic in proptest::option::of(60i32..260),
            temperature in proptest::option::of(30.0f64..44.0),
        ) {
            let mut data = HealthData::new("patient-p", Utc::now());
            data.heart_rate = hr;
            data.spo2 = spo2;
            data.systolic = systolic;
            data.temperature = temperature;

            let breaches = evaluate_health_data(&data);
            prop_assert!(breaches.len() <= 4);
            for vital in [VitalSign::HeartRate, VitalSign::Spo2, VitalSign::Systolic, VitalSign::Temperature] {
                prop_assert!(breaches.iter().filter(|b| b.vital == vital).count() <= 1);
            }
        }
    }
}
