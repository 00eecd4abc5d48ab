//! Health risks, alerts and lifestyle recommendations derived from current data.
//!
//! Everything here is recomputed from scratch on each refresh. Alert keys are stable so a
//! dismissed alert stays dismissed across refreshes.

use super::AssistantContext;
use crate::constants::CHECKUP_ALERT_WINDOW_DAYS;
use crate::models::assistant::{
    ActionType, AlertKind, AlertSeverity, HealthAlert, HealthRisk, LabResult, LabStatus,
    LifestyleRecommendation, RecommendationCategory, RiskLevel, SuggestedAction, Trend,
};

fn lab<'a>(labs: &'a [LabResult], key: &str) -> Option<&'a LabResult> {
    labs.iter().find(|r| r.test_key == key)
}

fn is_elevated(labs: &[LabResult], key: &str) -> bool {
    lab(labs, key).is_some_and(|r| matches!(r.status, LabStatus::High | LabStatus::Critical))
}

fn has_condition(ctx: &AssistantContext<'_>, needles: &[&str]) -> bool {
    ctx.conditions.iter().any(|c| {
        let name = c.name.to_lowercase();
        needles.iter().any(|n| name.contains(n))
    })
}

pub fn health_risks(labs: &[LabResult], ctx: &AssistantContext<'_>) -> Vec<HealthRisk> {
    let mut risks = Vec::new();

    let mut diabetes = Vec::new();
    if is_elevated(labs, "glucose_fasting") {
        diabetes.push("ارتفاع سكر الدم الصائم".to_owned());
    }
    if is_elevated(labs, "hba1c") {
        diabetes.push("ارتفاع السكر التراكمي".to_owned());
    }
    if has_condition(ctx, &["سكري", "diabetes"]) {
        diabetes.push("تشخيص سابق بالسكري".to_owned());
    }
    if !diabetes.is_empty() {
        risks.push(HealthRisk {
            key: "diabetes".into(),
            condition: "السكري من النوع الثاني".into(),
            level: if diabetes.len() >= 2 {
                RiskLevel::High
            } else {
                RiskLevel::Moderate
            },
            factors: diabetes,
            recommendation: "تابع السكر بانتظام وراجع طبيب الغدد كل ثلاثة أشهر".into(),
        });
    }

    let mut cardio = Vec::new();
    if is_elevated(labs, "ldl") {
        cardio.push("ارتفاع الكوليسترول الضار".to_owned());
    }
    if lab(labs, "ldl").is_some_and(|r| r.trend == Trend::Worsening) {
        cardio.push("الكوليسترول في ازدياد".to_owned());
    }
    if has_condition(ctx, &["ضغط", "hypertension"]) {
        cardio.push("ارتفاع ضغط الدم".to_owned());
    }
    if !cardio.is_empty() {
        risks.push(HealthRisk {
            key: "cardiovascular".into(),
            condition: "أمراض القلب والأوعية الدموية".into(),
            level: if cardio.len() >= 2 {
                RiskLevel::High
            } else {
                RiskLevel::Moderate
            },
            factors: cardio,
            recommendation: "قلل الدهون المشبعة ومارس المشي يومياً وراجع طبيب القلب".into(),
        });
    }

    if lab(labs, "vitamin_d").is_some_and(|r| r.status == LabStatus::Low) {
        risks.push(HealthRisk {
            key: "vitamin_d_deficiency".into(),
            condition: "نقص فيتامين د".into(),
            level: RiskLevel::Low,
            factors: vec!["انخفاض مستوى فيتامين د".into()],
            recommendation: "تعرّض للشمس صباحاً واسأل طبيبك عن المكملات".into(),
        });
    }

    risks
}

pub fn health_alerts(labs: &[LabResult], ctx: &AssistantContext<'_>) -> Vec<HealthAlert> {
    let mut alerts = Vec::new();

    for result in labs.iter().filter(|r| r.status != LabStatus::Normal) {
        alerts.push(HealthAlert {
            key: format!("lab:{}", result.test_key),
            kind: AlertKind::LabResult,
            severity: if result.status == LabStatus::Critical {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            },
            title: format!("{} خارج المعدل الطبيعي", result.test_name),
            message: format!(
                "القيمة {} {} والمعدل الطبيعي {}",
                result.value, result.unit, result.reference_range
            ),
            action: Some(SuggestedAction::new(
                "عرض النتائج",
                "lab-results",
                ActionType::Navigate,
            )),
        });
    }

    for reminder in ctx.reminders.iter().filter(|r| r.is_active && r.needs_refill()) {
        alerts.push(HealthAlert {
            key: format!("refill:{}", reminder.id),
            kind: AlertKind::Medication,
            severity: AlertSeverity::Warning,
            title: format!("{} على وشك النفاد", reminder.medication_name),
            message: format!("تبقى {} جرعات فقط", reminder.remaining_quantity),
            action: Some(SuggestedAction::new(
                "اطلب من الصيدلية",
                "pharmacy-order",
                ActionType::Navigate,
            )),
        });
    }

    for condition in ctx.conditions {
        let Some(checkup) = condition.next_checkup else {
            continue;
        };
        let days = (checkup - ctx.today).num_days();
        if (0..=CHECKUP_ALERT_WINDOW_DAYS).contains(&days) {
            alerts.push(HealthAlert {
                key: format!("checkup:{}", condition.id),
                kind: AlertKind::Checkup,
                severity: AlertSeverity::Info,
                title: format!("موعد فحص {}", condition.name),
                message: format!("فحص المتابعة بعد {days} أيام"),
                action: Some(SuggestedAction::new(
                    "احجز موعداً",
                    "book-doctor",
                    ActionType::Book,
                )),
            });
        }
    }

    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    alerts
}

pub fn lifestyle_recommendations(risks: &[HealthRisk]) -> Vec<LifestyleRecommendation> {
    let mut recommendations = Vec::new();

    for risk in risks {
        let (category, title, description) = match risk.key.as_str() {
            "diabetes" => (
                RecommendationCategory::Diet,
                "قلل السكريات والنشويات",
                "استبدل الخبز الأبيض بالحبوب الكاملة وتجنب المشروبات المحلاة",
            ),
            "cardiovascular" => (
                RecommendationCategory::Exercise,
                "امشِ ثلاثين دقيقة يومياً",
                "النشاط المعتدل المنتظم يخفض الكوليسترول الضار ويقوي القلب",
            ),
            "vitamin_d_deficiency" => (
                RecommendationCategory::Monitoring,
                "أعد فحص فيتامين د بعد ثلاثة أشهر",
                "تابع المستوى بعد بدء المكملات للتأكد من الاستجابة",
            ),
            _ => continue,
        };
        recommendations.push(LifestyleRecommendation {
            category,
            title: title.into(),
            description: description.into(),
            priority: risk.level,
        });
    }

    recommendations.push(LifestyleRecommendation {
        category: RecommendationCategory::Sleep,
        title: "نم سبع ساعات على الأقل".into(),
        description: "النوم المنتظم يساعد على ضبط السكر والضغط".into(),
        priority: RiskLevel::Low,
    });

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::latest_lab_results;
    use crate::models::records::{ChronicCondition, ConditionStatus, Severity};
    use chrono::{NaiveDate, Utc};
    use sehati_ids::EntityId;

    fn condition(name: &str, next_checkup: Option<NaiveDate>) -> ChronicCondition {
        ChronicCondition {
            id: EntityId::parse("cond-1").unwrap(),
            patient_id: "user-1".into(),
            name: name.into(),
            diagnosed_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            status: ConditionStatus::Active,
            severity: Severity::Moderate,
            treatment_plan: String::new(),
            medications: vec![],
            next_checkup,
            notes: None,
            updated_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_risks_from_sample_panel() {
        let conditions = vec![condition("ارتفاع ضغط الدم", None)];
        let ctx = AssistantContext {
            appointments: &[],
            reminders: &[],
            conditions: &conditions,
            today: today(),
        };

        let risks = health_risks(&latest_lab_results(), &ctx);
        let keys: Vec<&str> = risks.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["diabetes", "cardiovascular", "vitamin_d_deficiency"]);
        assert!(risks.iter().all(|r| r.key == "vitamin_d_deficiency" || r.level == RiskLevel::High));
    }

    #[test]
    fn test_checkup_alert_inside_window_only() {
        let conditions = vec![
            condition("سكري", NaiveDate::from_ymd_opt(2026, 10, 20)),
            condition("ربو", NaiveDate::from_ymd_opt(2026, 11, 20)),
        ];
        let ctx = AssistantContext {
            appointments: &[],
            reminders: &[],
            conditions: &conditions,
            today: today(),
        };

        let alerts = health_alerts(&[], &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Checkup);
    }

    #[test]
    fn test_recommendations_always_include_sleep() {
        let recommendations = lifestyle_recommendations(&[]);
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].category, RecommendationCategory::Sleep);
    }
}
