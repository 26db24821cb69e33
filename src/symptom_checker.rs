//! Symptom checker: a fixed questionnaire and a rule-based assessment.
//!
//! Rules are evaluated in order and the first match wins. The result is
//! informational and never replaces a consultation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

pub const DEFAULT_SEVERITY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    Checkbox,
    Text,
    Scale,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: &'static str,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    pub required: bool,
}

fn no_options(options: &&[&str]) -> bool {
    options.is_empty()
}

const PRIMARY_FEVER: &str = "Fever or chills";
const PRIMARY_RESPIRATORY: &str = "Cough or breathing problems";
const DIFFICULTY_BREATHING: &str = "Difficulty breathing";
const CHEST_PAIN: &str = "Chest pain";

pub const QUESTIONS: &[Question] = &[
    Question {
        id: "age",
        kind: QuestionKind::MultipleChoice,
        question: "What is your age group?",
        options: &["Under 18", "18-30", "31-50", "51-65", "Over 65"],
        required: true,
    },
    Question {
        id: "gender",
        kind: QuestionKind::MultipleChoice,
        question: "What is your gender?",
        options: &["Male", "Female", "Other", "Prefer not to say"],
        required: true,
    },
    Question {
        id: "primary_symptom",
        kind: QuestionKind::MultipleChoice,
        question: "What is your main concern today?",
        options: &[
            PRIMARY_FEVER,
            PRIMARY_RESPIRATORY,
            "Stomach pain or nausea",
            "Headache or dizziness",
            "Body aches or joint pain",
            "Skin rash or irritation",
            "Other",
        ],
        required: true,
    },
    Question {
        id: "symptom_duration",
        kind: QuestionKind::MultipleChoice,
        question: "How long have you been experiencing these symptoms?",
        options: &["Less than 1 day", "1-3 days", "4-7 days", "1-2 weeks", "More than 2 weeks"],
        required: true,
    },
    Question {
        id: "severity",
        kind: QuestionKind::Scale,
        question: "On a scale of 1-10, how would you rate your discomfort?",
        options: &[],
        required: true,
    },
    Question {
        id: "additional_symptoms",
        kind: QuestionKind::Checkbox,
        question: "Are you experiencing any of these additional symptoms?",
        options: &[
            "Fever (temperature above 100.4°F)",
            DIFFICULTY_BREATHING,
            CHEST_PAIN,
            "Severe headache",
            "Vomiting",
            "Diarrhea",
            "Fatigue",
            "Loss of appetite",
        ],
        required: false,
    },
    Question {
        id: "medical_history",
        kind: QuestionKind::Checkbox,
        question: "Do you have any of these medical conditions?",
        options: &[
            "Diabetes",
            "High blood pressure",
            "Heart disease",
            "Asthma",
            "Kidney disease",
            "Liver disease",
            "Cancer",
            "None of the above",
        ],
        required: false,
    },
    Question {
        id: "medications",
        kind: QuestionKind::Text,
        question: "Are you currently taking any medications? (Please list them or write 'None')",
        options: &[],
        required: true,
    },
    Question {
        id: "additional_info",
        kind: QuestionKind::Text,
        question: "Is there anything else you'd like to mention about your symptoms?",
        options: &[],
        required: false,
    },
];

/// Answers keyed by question id, as the client submits them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymptomAnswers {
    pub age: Option<String>,
    pub gender: Option<String>,
    pub primary_symptom: Option<String>,
    pub symptom_duration: Option<String>,
    /// Number or numeric string.
    pub severity: Option<Value>,
    #[serde(default)]
    pub additional_symptoms: Vec<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    pub medications: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Routine,
    Urgent,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub condition: &'static str,
    pub probability: u8,
    pub severity: Severity,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
    pub urgency: Urgency,
}

const RESPIRATORY_INFECTION: Assessment = Assessment {
    condition: "Possible Respiratory Infection",
    probability: 75,
    severity: Severity::Medium,
    description: "Based on your symptoms, you may have a respiratory infection. The combination of fever and breathing difficulties requires medical attention.",
    recommendations: &[
        "Schedule a consultation with a doctor within 24 hours",
        "Monitor your temperature regularly",
        "Stay hydrated and get plenty of rest",
        "Avoid contact with others to prevent spread",
    ],
    urgency: Urgency::Urgent,
};

const UPPER_RESPIRATORY: Assessment = Assessment {
    condition: "Upper Respiratory Symptoms",
    probability: 65,
    severity: Severity::Low,
    description: "Your symptoms suggest a common upper respiratory condition. Most cases resolve with proper care and rest.",
    recommendations: &[
        "Rest and stay hydrated",
        "Consider over-the-counter cough medicine",
        "Use a humidifier or breathe steam",
        "Consult a doctor if symptoms worsen or persist beyond 7 days",
    ],
    urgency: Urgency::Routine,
};

const HIGH_SEVERITY: Assessment = Assessment {
    condition: "High Severity Symptoms",
    probability: 85,
    severity: Severity::High,
    description: "Your symptoms indicate a condition that requires immediate medical attention. Please seek care promptly.",
    recommendations: &[
        "Seek immediate medical attention",
        "Contact emergency services if symptoms worsen",
        "Do not delay medical care",
        "Have someone accompany you to the hospital if possible",
    ],
    urgency: Urgency::Emergency,
};

const GENERAL: Assessment = Assessment {
    condition: "General Symptoms",
    probability: 50,
    severity: Severity::Low,
    description: "Your symptoms are common and may resolve with self-care. However, monitor your condition closely.",
    recommendations: &[
        "Rest and stay hydrated",
        "Monitor symptoms for changes",
        "Consider over-the-counter remedies as appropriate",
        "Consult a doctor if symptoms persist or worsen",
    ],
    urgency: Urgency::Routine,
};

fn question(id: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Leading integer of a severity answer. Fractions truncate toward zero
/// and trailing text is ignored, so `"8.5"` and `"8/10"` both read as 8.
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len() - sign_len);
    if digits == 0 {
        return None;
    }
    let end = (sign_len + digits).min(sign_len + 18);
    s[..end].parse().ok()
}

/// Severity score from the raw answer. Missing, zero and non-numeric
/// answers fall back to [`DEFAULT_SEVERITY`].
fn severity_score(raw: Option<&Value>) -> Result<u8, ServiceError> {
    let parsed = match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => leading_integer(s),
        _ => None,
    };
    match parsed {
        None | Some(0) => Ok(DEFAULT_SEVERITY),
        Some(n @ 1..=10) => Ok(n as u8),
        Some(n) => Err(ServiceError::InvalidInput(format!(
            "Severity must be between 1 and 10, got {n}"
        ))),
    }
}

fn check_choice(id: &str, answer: Option<&str>) -> Result<(), ServiceError> {
    let Some(q) = question(id) else {
        return Ok(());
    };
    match answer.map(str::trim).filter(|a| !a.is_empty()) {
        None if q.required => Err(ServiceError::InvalidInput(format!(
            "Please answer: {}",
            q.question
        ))),
        Some(a) if !q.options.is_empty() && !q.options.contains(&a) => Err(
            ServiceError::InvalidInput(format!("Unknown answer for {id}: {a}")),
        ),
        _ => Ok(()),
    }
}

fn validate(answers: &SymptomAnswers) -> Result<(), ServiceError> {
    check_choice("age", answers.age.as_deref())?;
    check_choice("gender", answers.gender.as_deref())?;
    check_choice("primary_symptom", answers.primary_symptom.as_deref())?;
    check_choice("symptom_duration", answers.symptom_duration.as_deref())?;
    check_choice("medications", answers.medications.as_deref())?;
    check_choice("additional_info", answers.additional_info.as_deref())?;
    for (id, picked) in [
        ("additional_symptoms", &answers.additional_symptoms),
        ("medical_history", &answers.medical_history),
    ] {
        for answer in picked {
            check_choice(id, Some(answer))?;
        }
    }
    Ok(())
}

/// Validate the answers and pick the first matching rule.
pub fn assess(answers: &SymptomAnswers) -> Result<Assessment, ServiceError> {
    validate(answers)?;
    let severity = severity_score(answers.severity.as_ref())?;
    let primary = answers.primary_symptom.as_deref().map(str::trim);
    let has = |symptom: &str| answers.additional_symptoms.iter().any(|s| s == symptom);

    let assessment = if primary == Some(PRIMARY_FEVER) && has(DIFFICULTY_BREATHING) {
        RESPIRATORY_INFECTION
    } else if primary == Some(PRIMARY_RESPIRATORY) {
        UPPER_RESPIRATORY
    } else if severity >= 8 || has(CHEST_PAIN) {
        HIGH_SEVERITY
    } else {
        GENERAL
    };
    tracing::debug!(condition = assessment.condition, severity, "Symptom assessment");
    Ok(assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answers(primary: &str, severity: Value, extra: &[&str]) -> SymptomAnswers {
        SymptomAnswers {
            age: Some("31-50".into()),
            gender: Some("Female".into()),
            primary_symptom: Some(primary.into()),
            symptom_duration: Some("1-3 days".into()),
            severity: Some(severity),
            additional_symptoms: extra.iter().map(|s| s.to_string()).collect(),
            medical_history: vec![],
            medications: Some("None".into()),
            additional_info: None,
        }
    }

    #[test]
    fn questionnaire_has_nine_questions() {
        assert_eq!(QUESTIONS.len(), 9);
        let required: Vec<_> = QUESTIONS.iter().filter(|q| q.required).map(|q| q.id).collect();
        assert_eq!(
            required,
            ["age", "gender", "primary_symptom", "symptom_duration", "severity", "medications"]
        );
    }

    #[test]
    fn fever_with_breathing_difficulty_is_urgent() {
        let a = assess(&answers(PRIMARY_FEVER, json!(3), &[DIFFICULTY_BREATHING])).unwrap();
        assert_eq!(a.condition, "Possible Respiratory Infection");
        assert_eq!(a.urgency, Urgency::Urgent);
        assert_eq!(a.probability, 75);
    }

    #[test]
    fn respiratory_rule_precedes_severity() {
        let a = assess(&answers(PRIMARY_RESPIRATORY, json!(9), &[CHEST_PAIN])).unwrap();
        assert_eq!(a.condition, "Upper Respiratory Symptoms");
        assert_eq!(a.urgency, Urgency::Routine);
    }

    #[test]
    fn high_severity_or_chest_pain_is_emergency() {
        let a = assess(&answers("Headache or dizziness", json!("8"), &[])).unwrap();
        assert_eq!(a.urgency, Urgency::Emergency);
        let b = assess(&answers("Other", json!(2), &[CHEST_PAIN])).unwrap();
        assert_eq!(b.severity, Severity::High);
    }

    #[test]
    fn missing_severity_defaults_to_five() {
        let mut input = answers("Other", json!(null), &[]);
        input.severity = None;
        assert_eq!(assess(&input).unwrap().condition, "General Symptoms");
        assert_eq!(severity_score(Some(&json!("abc"))).unwrap(), DEFAULT_SEVERITY);
        assert_eq!(severity_score(Some(&json!("0"))).unwrap(), DEFAULT_SEVERITY);
    }

    #[test]
    fn fractional_severity_truncates() {
        for raw in [json!("8.5"), json!(8.5), json!(" 8/10")] {
            assert_eq!(severity_score(Some(&raw)).unwrap(), 8);
            let a = assess(&answers("Headache or dizziness", raw, &[])).unwrap();
            assert_eq!(a.severity, Severity::High);
            assert_eq!(a.urgency, Urgency::Emergency);
        }
        assert_eq!(severity_score(Some(&json!(7.9))).unwrap(), 7);
        assert!(matches!(
            severity_score(Some(&json!("-3"))),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn invalid_answers_are_rejected() {
        let mut missing = answers("Other", json!(4), &[]);
        missing.medications = Some("  ".into());
        assert!(matches!(assess(&missing), Err(ServiceError::InvalidInput(_))));

        let unknown = answers("Broken leg", json!(4), &[]);
        assert!(matches!(assess(&unknown), Err(ServiceError::InvalidInput(_))));

        let out_of_range = answers("Other", json!(11), &[]);
        assert!(matches!(assess(&out_of_range), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn questions_serialize_with_kind_as_type() {
        let json = serde_json::to_value(&QUESTIONS[4]).unwrap();
        assert_eq!(json["type"], "scale");
        assert!(json.get("options").is_none());
    }
}
