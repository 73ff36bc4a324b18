//! Closed value sets used by the built-in hospital schema.

pub const SPECIALTIES: &[&str] = &[
    "Cardiology",
    "Neurology",
    "Oncology",
    "Pediatrics",
    "Emergency",
    "Intensive Care",
    "Orthopedics",
];

pub const FIRST_NAMES: &[&str] = &[
    "Luca", "Marco", "Giulia", "Sara", "Anna", "Paolo", "Elena", "Matteo", "Chiara", "Davide",
];

pub const LAST_NAMES: &[&str] = &[
    "Rossi", "Russo", "Ferrari", "Esposito", "Bianchi", "Romano", "Gallo", "Costa", "Fontana",
    "Greco",
];

pub const SEXES: &[&str] = &["F", "M"];

pub const CITIES: &[&str] = &[
    "Milano", "Roma", "Torino", "Napoli", "Bologna", "Firenze", "Venezia", "Genova",
];

pub const STREETS: &[&str] = &[
    "Via Roma",
    "Corso Italia",
    "Via Milano",
    "Via Garibaldi",
    "Via Dante",
    "Via Verdi",
];

pub const COUNTRIES: &[&str] = &["Italy"];

pub const MARITAL_STATUSES: &[&str] = &["single", "married", "divorced", "widowed"];

pub const LANGUAGES: &[&str] = &["it"];

pub const INSURANCE_PROVIDERS: &[&str] = &[
    "Generali",
    "Unisalute",
    "Reale Mutua",
    "Poste Vita",
    "Sara Assicurazioni",
];

pub const INSURANCE_PLANS: &[&str] = &["basic", "standard", "premium"];

pub const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

pub const STAFF_ROLES: &[&str] = &["Nurse", "Doctor", "Technician", "Therapist"];

pub const EMPLOYMENT_TYPES: &[&str] = &["Full-time", "Part-time", "Contract"];

pub const SHIFTS: &[&str] = &["Day", "Night", "Evening"];

pub const DEVICE_MANUFACTURERS: &[&str] =
    &["Medtronic", "Philips", "GE Healthcare", "Siemens", "Mindray"];

pub const DEVICE_MODELS: &[&str] = &["A1", "B2", "C3", "D4", "E5"];

pub const DEVICE_STATUSES: &[&str] = &["Active", "Maintenance", "Retired"];
pub const DEVICE_STATUS_WEIGHTS: &[f64] = &[0.80, 0.15, 0.05];

pub const ADMISSION_TYPES: &[&str] = &["Emergency", "Elective", "Urgent"];

pub const ADMISSION_SOURCES: &[&str] = &["ER", "Referral", "Transfer"];

pub const DISCHARGE_OUTCOMES: &[&str] = &["Home", "Transfer", "Rehabilitation", "Deceased"];
pub const DISCHARGE_OUTCOME_WEIGHTS: &[f64] = &[0.80, 0.10, 0.08, 0.02];

pub const ICD10_CODES: &[&str] = &["I10", "E11", "J18", "K21", "M54", "N39"];

pub const SEVERITIES: &[&str] = &["low", "medium", "high"];
pub const SEVERITY_WEIGHTS: &[f64] = &[0.50, 0.35, 0.15];

pub const DEVICE_ECG: &str = "ECG";
pub const DEVICE_PULSE_OXIMETER: &str = "PulseOx";
pub const DEVICE_BP_MONITOR: &str = "BP Monitor";
pub const DEVICE_THERMOMETER: &str = "Thermometer";
pub const DEVICE_GLUCOMETER: &str = "Glucometer";

pub const DEVICE_TYPES: &[&str] = &[
    DEVICE_ECG,
    DEVICE_PULSE_OXIMETER,
    DEVICE_BP_MONITOR,
    DEVICE_THERMOMETER,
    DEVICE_GLUCOMETER,
];

/// Which device types record each vital-sign measurement.
pub const MEASUREMENT_SUPPORT: &[(&str, &[&str])] = &[
    (
        "heart_rate",
        &[DEVICE_ECG, DEVICE_PULSE_OXIMETER, DEVICE_BP_MONITOR],
    ),
    ("spo2", &[DEVICE_PULSE_OXIMETER]),
    ("systolic_bp", &[DEVICE_BP_MONITOR]),
    ("diastolic_bp", &[DEVICE_BP_MONITOR]),
    ("temperature_c", &[DEVICE_THERMOMETER]),
    ("respiratory_rate", &[DEVICE_ECG]),
    ("glucose_mg_dl", &[DEVICE_GLUCOMETER]),
];

/// Device types recording `measurement`; empty for unknown measurements.
pub fn devices_recording(measurement: &str) -> &'static [&'static str] {
    MEASUREMENT_SUPPORT
        .iter()
        .find(|(name, _)| *name == measurement)
        .map(|(_, devices)| *devices)
        .unwrap_or(&[])
}

/// Alternation pattern matching any of `values` verbatim.
pub fn alternation(values: &[&str]) -> String {
    let escaped: Vec<String> = values
        .iter()
        .map(|value| {
            value
                .chars()
                .map(|ch| {
                    if "\\.+*?()|[]{}^$".contains(ch) {
                        format!("\\{ch}")
                    } else {
                        ch.to_string()
                    }
                })
                .collect()
        })
        .collect();
    format!("({})", escaped.join("|"))
}

pub fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermometer_records_only_temperature() {
        let recorded: Vec<&str> = MEASUREMENT_SUPPORT
            .iter()
            .filter(|(_, devices)| devices.contains(&DEVICE_THERMOMETER))
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(recorded, vec!["temperature_c"]);
    }

    #[test]
    fn weights_align_with_values() {
        assert_eq!(DEVICE_STATUSES.len(), DEVICE_STATUS_WEIGHTS.len());
        assert_eq!(DISCHARGE_OUTCOMES.len(), DISCHARGE_OUTCOME_WEIGHTS.len());
        assert_eq!(SEVERITIES.len(), SEVERITY_WEIGHTS.len());
    }

    #[test]
    fn alternation_escapes_symbols() {
        assert_eq!(alternation(&["A+", "Via Roma"]), "(A\\+|Via Roma)");
        assert!(devices_recording("unknown").is_empty());
    }
}
