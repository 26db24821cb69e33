//! Health records overview (sample data shown to signed-in users).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConsultationRecord {
    pub id: &'static str,
    pub date: &'static str,
    pub doctor: &'static str,
    pub specialty: &'static str,
    pub diagnosis: &'static str,
    pub prescription: &'static str,
    pub notes: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabResult {
    pub id: &'static str,
    pub date: &'static str,
    pub test_name: &'static str,
    /// (measure, value) pairs in report order.
    pub results: &'static [(&'static str, &'static str)],
    pub status: &'static str,
    pub doctor: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VitalSigns {
    pub date: &'static str,
    pub bp: &'static str,
    pub pulse: &'static str,
    pub temp: &'static str,
    pub weight: &'static str,
    pub height: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordMedication {
    pub name: &'static str,
    pub dosage: &'static str,
    pub frequency: &'static str,
    pub duration: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionRecord {
    pub id: &'static str,
    pub date: &'static str,
    pub doctor: &'static str,
    pub medications: &'static [RecordMedication],
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthRecords {
    pub consultations: Vec<ConsultationRecord>,
    pub lab_results: &'static [LabResult],
    pub vital_signs: &'static [VitalSigns],
    pub prescriptions: &'static [PrescriptionRecord],
}

const CONSULTATIONS: &[ConsultationRecord] = &[
    ConsultationRecord {
        id: "1",
        date: "2024-01-15",
        doctor: "Dr. Rajesh Kumar",
        specialty: "General Medicine",
        diagnosis: "Common Cold",
        prescription: "Paracetamol 500mg, Rest",
        notes: "Patient reported fever and cough. Advised rest and hydration.",
        status: "completed",
    },
    ConsultationRecord {
        id: "2",
        date: "2024-01-08",
        doctor: "Dr. Priya Sharma",
        specialty: "Pediatrics",
        diagnosis: "Routine Checkup",
        prescription: "Vitamin D supplements",
        notes: "Regular health checkup. All vitals normal.",
        status: "completed",
    },
    ConsultationRecord {
        id: "3",
        date: "2024-01-02",
        doctor: "Dr. Sunita Kaur",
        specialty: "Gynecology",
        diagnosis: "Hypertension Follow-up",
        prescription: "Amlodipine 5mg daily",
        notes: "Blood pressure monitoring required. Follow-up in 2 weeks.",
        status: "follow-up-required",
    },
];

const LAB_RESULTS: &[LabResult] = &[
    LabResult {
        id: "1",
        date: "2024-01-10",
        test_name: "Complete Blood Count (CBC)",
        results: &[
            ("hemoglobin", "12.5 g/dL"),
            ("wbc", "7,200/μL"),
            ("platelets", "250,000/μL"),
        ],
        status: "normal",
        doctor: "Dr. Rajesh Kumar",
    },
    LabResult {
        id: "2",
        date: "2024-01-05",
        test_name: "Blood Sugar (Fasting)",
        results: &[("glucose", "95 mg/dL")],
        status: "normal",
        doctor: "Dr. Sunita Kaur",
    },
    LabResult {
        id: "3",
        date: "2023-12-20",
        test_name: "Lipid Profile",
        results: &[
            ("cholesterol", "180 mg/dL"),
            ("hdl", "45 mg/dL"),
            ("ldl", "120 mg/dL"),
            ("triglycerides", "150 mg/dL"),
        ],
        status: "borderline",
        doctor: "Dr. Rajesh Kumar",
    },
];

const VITALS: &[VitalSigns] = &[
    VitalSigns { date: "2024-01-15", bp: "120/80", pulse: "72", temp: "98.6°F", weight: "65 kg", height: "165 cm" },
    VitalSigns { date: "2024-01-08", bp: "118/78", pulse: "70", temp: "98.4°F", weight: "64.5 kg", height: "165 cm" },
    VitalSigns { date: "2024-01-02", bp: "125/82", pulse: "75", temp: "98.7°F", weight: "65.2 kg", height: "165 cm" },
];

const PRESCRIPTIONS: &[PrescriptionRecord] = &[
    PrescriptionRecord {
        id: "1",
        date: "2024-01-15",
        doctor: "Dr. Rajesh Kumar",
        medications: &[
            RecordMedication { name: "Paracetamol", dosage: "500mg", frequency: "3 times daily", duration: "5 days" },
            RecordMedication { name: "Cough Syrup", dosage: "10ml", frequency: "2 times daily", duration: "7 days" },
        ],
        status: "active",
    },
    PrescriptionRecord {
        id: "2",
        date: "2024-01-02",
        doctor: "Dr. Sunita Kaur",
        medications: &[RecordMedication { name: "Amlodipine", dosage: "5mg", frequency: "Once daily", duration: "30 days" }],
        status: "active",
    },
    PrescriptionRecord {
        id: "3",
        date: "2023-12-15",
        doctor: "Dr. Priya Sharma",
        medications: &[RecordMedication { name: "Vitamin D3", dosage: "1000 IU", frequency: "Once daily", duration: "90 days" }],
        status: "completed",
    },
];

/// All record sections, with consultations filtered by `term` on doctor,
/// diagnosis or specialty (case-insensitive).
pub fn search(term: &str) -> HealthRecords {
    let term = term.trim().to_lowercase();
    let consultations = CONSULTATIONS
        .iter()
        .filter(|r| {
            term.is_empty()
                || [r.doctor, r.diagnosis, r.specialty]
                    .iter()
                    .any(|f| f.to_lowercase().contains(&term))
        })
        .cloned()
        .collect();
    HealthRecords {
        consultations,
        lab_results: LAB_RESULTS,
        vital_signs: VITALS,
        prescriptions: PRESCRIPTIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_term_returns_everything() {
        let records = search("  ");
        assert_eq!(records.consultations.len(), 3);
        assert_eq!(records.lab_results.len(), 3);
        assert_eq!(records.vital_signs.len(), 3);
        assert_eq!(records.prescriptions.len(), 3);
    }

    #[test]
    fn filters_consultations_only() {
        let by_specialty = search("pediatrics");
        assert_eq!(by_specialty.consultations.len(), 1);
        assert_eq!(by_specialty.consultations[0].doctor, "Dr. Priya Sharma");
        assert_eq!(by_specialty.lab_results.len(), 3);

        assert_eq!(search("kumar").consultations.len(), 1);
        assert_eq!(search("HYPERTENSION").consultations[0].id, "3");
        assert!(search("oncology").consultations.is_empty());
    }
}
