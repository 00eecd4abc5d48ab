//! Keyword symptom triage.
//!
//! Symptoms are extracted by substring match against a small bilingual vocabulary. Any red
//! flag makes the assessment `urgent`; otherwise the first specialty rule that matches sets
//! the urgency; otherwise it is `routine`. `emergency` is never produced here.

use crate::models::assistant::{SymptomAssessment, Urgency};

/// `(phrase, canonical symptom)`. Longer phrases come first so "ألم في الصدر" wins over "ألم".
const VOCABULARY: &[(&str, &str)] = &[
    ("ألم في الصدر", "ألم في الصدر"),
    ("chest pain", "ألم في الصدر"),
    ("ضيق في التنفس", "ضيق في التنفس"),
    ("shortness of breath", "ضيق في التنفس"),
    ("إغماء", "إغماء"),
    ("faint", "إغماء"),
    ("نزيف", "نزيف"),
    ("bleeding", "نزيف"),
    ("ألم في البطن", "ألم في البطن"),
    ("stomach", "ألم في البطن"),
    ("صداع", "صداع"),
    ("headache", "صداع"),
    ("حرارة", "حمى"),
    ("حمى", "حمى"),
    ("fever", "حمى"),
    ("سعال", "سعال"),
    ("كحة", "سعال"),
    ("cough", "سعال"),
    ("دوخة", "دوخة"),
    ("dizz", "دوخة"),
    ("غثيان", "غثيان"),
    ("nausea", "غثيان"),
    ("طفح", "طفح جلدي"),
    ("rash", "طفح جلدي"),
    ("تعب", "إرهاق"),
    ("fatigue", "إرهاق"),
];

const RED_FLAGS: &[&str] = &["ألم في الصدر", "ضيق في التنفس", "إغماء", "نزيف"];

/// `(canonical symptom, specialty, urgency)`, first match wins.
const SPECIALTY_RULES: &[(&str, &str, Urgency)] = &[
    ("ألم في الصدر", "أمراض القلب", Urgency::Urgent),
    ("ضيق في التنفس", "الأمراض الصدرية", Urgency::Urgent),
    ("ألم في البطن", "الجهاز الهضمي", Urgency::Soon),
    ("حمى", "الطب العام", Urgency::Soon),
    ("دوخة", "الأعصاب", Urgency::Soon),
    ("سعال", "الأمراض الصدرية", Urgency::Routine),
    ("صداع", "الأعصاب", Urgency::Routine),
    ("طفح جلدي", "الجلدية", Urgency::Routine),
];

pub fn extract_symptoms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for (phrase, canonical) in VOCABULARY {
        if lowered.contains(phrase) && !found.iter().any(|s| s == canonical) {
            found.push((*canonical).to_owned());
        }
    }
    found
}

pub fn assess_symptoms(text: &str) -> SymptomAssessment {
    let symptoms = extract_symptoms(text);
    let red_flags: Vec<String> = symptoms
        .iter()
        .filter(|s| RED_FLAGS.contains(&s.as_str()))
        .cloned()
        .collect();

    let matched = SPECIALTY_RULES
        .iter()
        .find(|(symptom, _, _)| symptoms.iter().any(|s| s == symptom));

    let urgency = if !red_flags.is_empty() {
        Urgency::Urgent
    } else {
        matched.map_or(Urgency::Routine, |(_, _, urgency)| *urgency)
    };

    SymptomAssessment {
        symptoms,
        red_flags,
        urgency,
        suggested_specialty: matched.map(|(_, specialty, _)| (*specialty).to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_flag_is_urgent() {
        let assessment = assess_symptoms("عندي ألم في الصدر وصداع");
        assert_eq!(assessment.urgency, Urgency::Urgent);
        assert_eq!(assessment.red_flags, vec!["ألم في الصدر".to_owned()]);
        assert_eq!(assessment.suggested_specialty.as_deref(), Some("أمراض القلب"));
    }

    #[test]
    fn test_specialty_sets_urgency() {
        let assessment = assess_symptoms("I have a fever and a cough");
        assert_eq!(assessment.urgency, Urgency::Soon);
        assert_eq!(assessment.suggested_specialty.as_deref(), Some("الطب العام"));
    }

    #[test]
    fn test_unknown_text_is_routine() {
        let assessment = assess_symptoms("أشعر بشيء غريب");
        assert!(assessment.symptoms.is_empty());
        assert_eq!(assessment.urgency, Urgency::Routine);
        assert!(assessment.suggested_specialty.is_none());
    }

    #[test]
    fn test_synonyms_collapse() {
        assert_eq!(extract_symptoms("حرارة وحمى fever"), vec!["حمى".to_owned()]);
    }
}
