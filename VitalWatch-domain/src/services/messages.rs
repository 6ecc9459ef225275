//! Alert message text

use vital_watch_data::models::{MeasurementType, Severity};

use crate::entities::{AnomalyAssessment, Direction, ThresholdBreach, VitalSign};

/// Prefix marking a message rewritten by the escalation scheduler
pub const ESCALATED_PREFIX: &str = "[ESCALATED] ";

/// Human-readable text for a threshold breach, e.g. `Critical heart rate: 160 bpm`
pub fn breach_message(breach: &ThresholdBreach) -> String {
    let qualifier = match (breach.severity, breach.direction) {
        (Severity::Critical, _) => "Critical",
        (_, Direction::High) => "High",
        (_, Direction::Low) => "Low",
    };
    format!(
        "{} {}: {}",
        qualifier,
        breach.vital.label(),
        format_value(breach.vital, breach.value)
    )
}

/// Text for a reading that departs from the patient's baseline
pub fn anomaly_message(measurement_type: &MeasurementType, assessment: &AnomalyAssessment) -> String {
    let unit = measurement_type.unit();
    let value = with_unit(trim_number(assessment.value), unit);
    let mut message = format!(
        "Unusual {} reading: {}",
        measurement_type.as_str().replace('_', " "),
        value
    );
    if let Some(mean) = assessment.mean {
        message.push_str(&format!(" (baseline {}", with_unit(format!("{:.1}", mean), unit)));
        if let Some(z) = assessment.z_score {
            message.push_str(&format!(", z-score {:.1}", z));
        }
        message.push(')');
    }
    message
}

/// Prepend the escalation marker unless it is already there
pub fn escalated_message(message: &str) -> String {
    if message.starts_with(ESCALATED_PREFIX) {
        message.to_string()
    } else {
        format!("{}{}", ESCALATED_PREFIX, message)
    }
}

fn format_value(vital: VitalSign, value: f64) -> String {
    let number = match vital {
        VitalSign::Temperature => format!("{:.1}", value),
        _ => trim_number(value),
    };
    with_unit(number, vital.unit())
}

fn with_unit(number: String, unit: &str) -> String {
    match unit {
        "" => number,
        "%" | "°C" => format!("{}{}", number, unit),
        _ => format!("{} {}", number, unit),
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breach_messages_embed_value_and_unit() {
        let hr = ThresholdBreach::new(VitalSign::HeartRate, 160.0, Direction::High, Severity::Critical);
        assert_eq!(breach_message(&hr), "Critical heart rate: 160 bpm");

        let brady = ThresholdBreach::new(VitalSign::HeartRate, 45.0, Direction::Low, Severity::Medium);
        assert_eq!(breach_message(&brady), "Low heart rate: 45 bpm");

        let spo2 = ThresholdBreach::new(VitalSign::Spo2, 92.0, Direction::Low, Severity::High);
        assert_eq!(breach_message(&spo2), "Low SpO2 level: 92%");

        let bp = ThresholdBreach::new(VitalSign::Systolic, 150.0, Direction::High, Severity::High);
        assert_eq!(breach_message(&bp), "High blood pressure: 150 mmHg");

        let fever = ThresholdBreach::new(VitalSign::Temperature, 39.5, Direction::High, Severity::High);
        assert_eq!(breach_message(&fever), "High temperature: 39.5°C");
    }

    #[test]
    fn test_anomaly_message_mentions_baseline() {
        let assessment = AnomalyAssessment {
            value: 95.0,
            history_size: 10,
            mean: Some(70.0),
            std_dev: Some(2.0),
            z_score: Some(12.5),
            is_anomaly: true,
        };
        assert_eq!(
            anomaly_message(&MeasurementType::HeartRate, &assessment),
            "Unusual heart rate reading: 95 bpm (baseline 70.0 bpm, z-score 12.5)"
        );

        let flat = AnomalyAssessment { z_score: None, std_dev: Some(0.0), ..assessment };
        assert_eq!(
            anomaly_message(&MeasurementType::Other("glucose".to_string()), &flat),
            "Unusual glucose reading: 95 (baseline 70.0)"
        );
    }

    #[test]
    fn test_escalation_prefix_is_added_once() {
        let once = escalated_message("Low heart rate: 45 bpm");
        assert_eq!(once, "[ESCALATED] Low heart rate: 45 bpm");
        assert_eq!(escalated_message(&once), once);
    }
}
