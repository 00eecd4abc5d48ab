//! Rule-based medical assistant.
//!
//! There is no language model behind the assistant. A reply is chosen by an ordered table of
//! rules over the lowercased user message; the first rule with a matching keyword builds the
//! reply, and a menu of topics is the fallback.
//!
//! Replies that interpret health data carry the medical disclaimer. Booking help, greetings
//! and the menu do not.

pub mod insights;
pub mod lab;
pub mod symptoms;

use crate::constants::MEDICAL_DISCLAIMER;
use crate::models::assistant::{
    ActionType, LabResult, MessageType, SuggestedAction, Urgency,
};
use crate::models::booking::{Appointment, AppointmentStatus};
use crate::models::medication::MedicationReminder;
use crate::models::records::ChronicCondition;
use chrono::NaiveDate;

/// Data from the other stores the assistant reads when answering.
#[derive(Clone, Copy, Debug)]
pub struct AssistantContext<'a> {
    pub appointments: &'a [Appointment],
    pub reminders: &'a [MedicationReminder],
    pub conditions: &'a [ChronicCondition],
    pub today: NaiveDate,
}

/// An assistant reply before it is stored as a message.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub content: String,
    pub message_type: MessageType,
    pub suggested_actions: Vec<SuggestedAction>,
    pub has_disclaimer: bool,
}

impl Reply {
    fn plain(content: String, message_type: MessageType, actions: Vec<SuggestedAction>) -> Self {
        Self {
            content,
            message_type,
            suggested_actions: actions,
            has_disclaimer: false,
        }
    }

    fn medical(content: String, message_type: MessageType, actions: Vec<SuggestedAction>) -> Self {
        Self {
            content: format!("{content}\n\n{MEDICAL_DISCLAIMER}"),
            message_type,
            suggested_actions: actions,
            has_disclaimer: true,
        }
    }
}

type Builder = fn(&str, &[LabResult], &AssistantContext<'_>) -> Reply;

struct Rule {
    name: &'static str,
    keywords: &'static [&'static str],
    build: Builder,
}

impl Rule {
    /// Arabic keywords match anywhere, since articles and suffixes attach to the word.
    /// Latin keywords must start a word, so "lab" does not fire on "available".
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| {
            if k.is_ascii() {
                lowered
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word.starts_with(k))
            } else {
                lowered.contains(k)
            }
        })
    }
}

const RULES: &[Rule] = &[
    Rule {
        name: "lab",
        keywords: &["نتائج", "تحاليل", "تحليل", "result", "lab"],
        build: lab_reply,
    },
    Rule {
        name: "symptoms",
        keywords: &[
            "أعراض", "ألم", "صداع", "حرارة", "symptom", "pain", "fever", "headache",
        ],
        build: symptoms_reply,
    },
    Rule {
        name: "medications",
        keywords: &["دواء", "أدوية", "علاج", "medication", "medicine"],
        build: medications_reply,
    },
    Rule {
        name: "risks",
        keywords: &["مخاطر", "خطر", "risk"],
        build: risks_reply,
    },
    Rule {
        name: "booking",
        keywords: &["حجز", "موعد", "appointment", "book"],
        build: booking_reply,
    },
    Rule {
        name: "lifestyle",
        keywords: &["غذائي", "رياضة", "نوم", "diet", "exercise", "lifestyle"],
        build: lifestyle_reply,
    },
    Rule {
        name: "greeting",
        keywords: &["مرحبا", "السلام", "أهلا", "hello"],
        build: greeting_reply,
    },
];

/// Name of the rule that would answer `text`, or `None` for the menu.
pub fn route(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    RULES.iter().find(|r| r.matches(&lowered)).map(|r| r.name)
}

pub fn respond(text: &str, labs: &[LabResult], ctx: &AssistantContext<'_>) -> Reply {
    let lowered = text.to_lowercase();
    match RULES.iter().find(|r| r.matches(&lowered)) {
        Some(rule) => {
            tracing::debug!("assistant rule '{}' matched", rule.name);
            (rule.build)(&lowered, labs, ctx)
        }
        None => menu_reply(),
    }
}

/// Opening message of a new conversation.
pub fn welcome() -> Reply {
    Reply::plain(
        "مرحباً بك في مساعد صحتي. يمكنني شرح نتائج تحاليلك، تقييم الأعراض، تذكيرك بأدويتك ومساعدتك في حجز موعد.".into(),
        MessageType::Greeting,
        topic_actions(),
    )
}

fn topic_actions() -> Vec<SuggestedAction> {
    vec![
        SuggestedAction::new("نتائج التحاليل", "ask-lab", ActionType::Info),
        SuggestedAction::new("تقييم الأعراض", "ask-symptoms", ActionType::Info),
        SuggestedAction::new("أدويتي", "ask-medications", ActionType::Info),
        SuggestedAction::new("حجز موعد", "book-doctor", ActionType::Book),
    ]
}

fn lab_reply(_: &str, labs: &[LabResult], _: &AssistantContext<'_>) -> Reply {
    let analysis = lab::analyze_lab_results(labs);
    Reply::medical(
        analysis.explanation,
        MessageType::LabAnalysis,
        vec![
            SuggestedAction::new("عرض كل النتائج", "lab-results", ActionType::Navigate),
            SuggestedAction::new("احجز تحليلاً جديداً", "book-lab", ActionType::Book),
        ],
    )
}

fn symptoms_reply(text: &str, _: &[LabResult], _: &AssistantContext<'_>) -> Reply {
    let assessment = symptoms::assess_symptoms(text);

    let mut content = if assessment.symptoms.is_empty() {
        "صف لي ما تشعر به بالتفصيل، مثل مكان الألم ومدته وشدته.".to_owned()
    } else {
        format!("الأعراض التي ذكرتها: {}.", assessment.symptoms.join("، "))
    };
    if !assessment.red_flags.is_empty() {
        content.push_str(&format!(
            "\nعلامات تستدعي الانتباه: {}.",
            assessment.red_flags.join("، ")
        ));
    }
    content.push_str(match assessment.urgency {
        Urgency::Emergency | Urgency::Urgent => "\nيُنصح بمراجعة الطوارئ أو طلب إسعاف الآن.",
        Urgency::Soon => "\nيُنصح بزيارة الطبيب خلال يوم أو يومين.",
        Urgency::Routine => "\nيمكنك حجز موعد عادي إذا استمرت الأعراض.",
    });
    if let Some(specialty) = &assessment.suggested_specialty {
        content.push_str(&format!("\nالتخصص المقترح: {specialty}."));
    }

    let mut actions = Vec::new();
    if assessment.urgency >= Urgency::Urgent {
        actions.push(SuggestedAction::new("اطلب إسعاف", "call-ambulance", ActionType::Call));
    }
    actions.push(SuggestedAction::new("احجز مع طبيب", "book-doctor", ActionType::Book));

    Reply::medical(content, MessageType::SymptomAssessment, actions)
}

fn medications_reply(_: &str, _: &[LabResult], ctx: &AssistantContext<'_>) -> Reply {
    let active: Vec<&MedicationReminder> = ctx.reminders.iter().filter(|r| r.is_active).collect();

    let content = if active.is_empty() {
        "لا توجد لديك تذكيرات أدوية نشطة. يمكنك إضافة دواء من قسم التذكيرات.".to_owned()
    } else {
        let mut lines = vec![format!("لديك {} أدوية نشطة:", active.len())];
        for r in &active {
            let mut line = format!("• {} {} (المتبقي {})", r.medication_name, r.dosage, r.remaining_quantity);
            if r.needs_refill() {
                line.push_str(" - يحتاج إعادة تعبئة");
            }
            lines.push(line);
        }
        lines.join("\n")
    };

    Reply::medical(
        content,
        MessageType::MedicationInfo,
        vec![SuggestedAction::new("تذكيرات الأدوية", "medication-reminders", ActionType::Navigate)],
    )
}

fn risks_reply(_: &str, labs: &[LabResult], ctx: &AssistantContext<'_>) -> Reply {
    let risks = insights::health_risks(labs, ctx);

    let content = if risks.is_empty() {
        "لا تظهر بياناتك الحالية مخاطر صحية بارزة.".to_owned()
    } else {
        let mut lines = vec!["بناءً على بياناتك:".to_owned()];
        for risk in &risks {
            lines.push(format!("• {}: {}", risk.condition, risk.recommendation));
        }
        lines.join("\n")
    };

    Reply::medical(
        content,
        MessageType::RiskAssessment,
        vec![SuggestedAction::new("رؤى صحية", "health-insights", ActionType::Navigate)],
    )
}

fn booking_reply(_: &str, _: &[LabResult], ctx: &AssistantContext<'_>) -> Reply {
    let upcoming = ctx
        .appointments
        .iter()
        .filter(|a| {
            a.date >= ctx.today
                && matches!(a.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
        })
        .min_by_key(|a| (a.date, a.time));

    let content = match upcoming {
        Some(a) => format!(
            "موعدك القادم مع {} يوم {} الساعة {}. هل تريد حجز موعد آخر؟",
            a.doctor_name,
            a.date,
            a.time.format("%H:%M")
        ),
        None => "ليس لديك مواعيد قادمة. اختر التخصص لأساعدك في الحجز.".to_owned(),
    };

    Reply::plain(
        content,
        MessageType::Booking,
        vec![
            SuggestedAction::new("احجز مع طبيب", "book-doctor", ActionType::Book),
            SuggestedAction::new("احجز تحليلاً", "book-lab", ActionType::Book),
        ],
    )
}

fn lifestyle_reply(_: &str, labs: &[LabResult], ctx: &AssistantContext<'_>) -> Reply {
    let risks = insights::health_risks(labs, ctx);
    let recommendations = insights::lifestyle_recommendations(&risks);

    let mut lines = vec!["نصائح تناسب حالتك:".to_owned()];
    for r in &recommendations {
        lines.push(format!("• {}: {}", r.title, r.description));
    }

    Reply::medical(lines.join("\n"), MessageType::Recommendation, Vec::new())
}

fn greeting_reply(_: &str, _: &[LabResult], _: &AssistantContext<'_>) -> Reply {
    Reply::plain(
        "أهلاً بك! كيف يمكنني مساعدتك اليوم؟".into(),
        MessageType::Greeting,
        topic_actions(),
    )
}

fn menu_reply() -> Reply {
    Reply::plain(
        "لم أفهم سؤالك تماماً. يمكنني مساعدتك في المواضيع التالية:".into(),
        MessageType::General,
        topic_actions(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::latest_lab_results;

    fn ctx() -> AssistantContext<'static> {
        AssistantContext {
            appointments: &[],
            reminders: &[],
            conditions: &[],
            today: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        }
    }

    #[test]
    fn test_lab_keyword_routes_to_lab_analysis() {
        let reply = respond("أريد أن أفهم نتائج تحاليلي", &latest_lab_results(), &ctx());
        assert_eq!(reply.message_type, MessageType::LabAnalysis);
        assert_eq!(reply.message_type.as_str(), "lab_analysis");
        assert!(reply.has_disclaimer);
        assert!(reply.content.ends_with(MEDICAL_DISCLAIMER));
    }

    #[test]
    fn test_rule_order_lab_before_symptoms() {
        // "ألم" is a symptom keyword but the lab rule is checked first.
        assert_eq!(route("نتائج تحليل الألم"), Some("lab"));
        assert_eq!(route("عندي صداع"), Some("symptoms"));
        assert_eq!(route("Hello"), Some("greeting"));
        assert_eq!(route("؟"), None);
    }

    #[test]
    fn test_latin_keywords_match_whole_word_starts() {
        assert_eq!(route("Is there an available appointment?"), Some("booking"));
        assert_eq!(route("I want to collaborate"), None);
        assert_eq!(route("show my lab results"), Some("lab"));
        assert_eq!(route("Labs from last week"), Some("lab"));
        assert_eq!(route("booking for tomorrow"), Some("booking"));
    }

    #[test]
    fn test_disclaimer_only_on_medical_replies() {
        let labs = latest_lab_results();
        for (text, expected) in [
            ("symptom check", true),
            ("my medication", true),
            ("risk", true),
            ("diet", true),
            ("book", false),
            ("مرحبا", false),
            ("xyz", false),
        ] {
            assert_eq!(respond(text, &labs, &ctx()).has_disclaimer, expected, "{text}");
        }
    }

    #[test]
    fn test_urgent_symptoms_offer_ambulance() {
        let reply = respond("chest pain", &[], &ctx());
        assert_eq!(reply.message_type, MessageType::SymptomAssessment);
        assert!(reply
            .suggested_actions
            .iter()
            .any(|a| a.action_type == ActionType::Call));
    }
}
