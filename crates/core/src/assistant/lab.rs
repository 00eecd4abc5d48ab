//! Lab result explanation.

use crate::models::assistant::{LabAnalysis, LabResult, LabStatus, Trend};

/// Splits results into improving, normal and abnormal, in that order of precedence, and
/// writes a short explanation.
pub fn analyze_lab_results(results: &[LabResult]) -> LabAnalysis {
    let mut improving = Vec::new();
    let mut normal = Vec::new();
    let mut abnormal = Vec::new();

    for result in results {
        if result.trend == Trend::Improving {
            improving.push(result.clone());
        } else if result.status == LabStatus::Normal {
            normal.push(result.clone());
        } else {
            abnormal.push(result.clone());
        }
    }

    let mut explanation = format!(
        "راجعت {} من نتائج تحاليلك: {} طبيعية، {} في تحسن، و{} تحتاج إلى متابعة.",
        results.len(),
        normal.len(),
        improving.len(),
        abnormal.len()
    );
    for result in improving.iter().chain(abnormal.iter()) {
        if let Some(remark) = remark_for(result) {
            explanation.push_str("\n• ");
            explanation.push_str(&remark);
        }
    }

    LabAnalysis {
        improving,
        normal,
        abnormal,
        explanation,
    }
}

/// Plain-language note for the tests patients ask about most.
fn remark_for(result: &LabResult) -> Option<String> {
    let value = format!("{} {}", result.value, result.unit);
    let remark = match (result.test_key.as_str(), result.trend) {
        ("glucose_fasting", Trend::Improving) => format!(
            "سكر الدم الصائم ({value}) ما زال أعلى من الطبيعي لكنه يتحسن، استمر على نظامك الغذائي."
        ),
        ("glucose_fasting", _) => format!(
            "سكر الدم الصائم ({value}) أعلى من الطبيعي، يُنصح بمراجعة طبيب الغدد."
        ),
        ("ldl", Trend::Worsening) => format!(
            "الكوليسترول الضار ({value}) مرتفع ويزداد، قلل الدهون المشبعة وراجع طبيب القلب."
        ),
        ("ldl", _) => format!("الكوليسترول الضار ({value}) أعلى من المعدل المطلوب."),
        ("vitamin_d", _) => format!(
            "فيتامين د ({value}) منخفض، التعرض للشمس والمكملات قد يساعدان."
        ),
        _ => return None,
    };
    Some(remark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::latest_lab_results;

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let results = latest_lab_results();
        let analysis = analyze_lab_results(&results);

        assert_eq!(
            analysis.improving.len() + analysis.normal.len() + analysis.abnormal.len(),
            results.len()
        );
        assert!(analysis.improving.iter().any(|r| r.test_key == "glucose_fasting"));
        assert!(analysis.abnormal.iter().any(|r| r.test_key == "ldl"));
        assert!(analysis.normal.iter().all(|r| r.status == LabStatus::Normal));
    }

    #[test]
    fn test_remarks_only_for_known_keys() {
        let analysis = analyze_lab_results(&latest_lab_results());
        // glucose, ldl and vitamin D get a remark; hba1c does not.
        assert_eq!(analysis.explanation.matches('•').count(), 3);
    }

    #[test]
    fn test_empty_results() {
        let analysis = analyze_lab_results(&[]);
        assert!(analysis.abnormal.is_empty());
        assert!(analysis.explanation.contains('0'));
    }
}
