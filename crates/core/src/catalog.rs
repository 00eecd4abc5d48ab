//! Static reference data shipped with the app.
//!
//! There is no backend, so pharmacies, the medication list and the patient's latest lab panel
//! are fixed tables. They are never persisted: they are rebuilt on every start.

use crate::models::assistant::{LabResult, LabStatus, Trend};
use crate::models::pharmacy::Pharmacy;
use chrono::NaiveDate;

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogMedication {
    pub id: &'static str,
    pub name: &'static str,
    pub dosage: &'static str,
    pub price: f64,
    pub requires_prescription: bool,
}

const MEDICATIONS: &[CatalogMedication] = &[
    CatalogMedication {
        id: "med-001",
        name: "Paracetamol",
        dosage: "500mg",
        price: 4.5,
        requires_prescription: false,
    },
    CatalogMedication {
        id: "med-002",
        name: "Amoxicillin",
        dosage: "500mg",
        price: 12.0,
        requires_prescription: true,
    },
    CatalogMedication {
        id: "med-003",
        name: "Metformin",
        dosage: "850mg",
        price: 9.75,
        requires_prescription: true,
    },
    CatalogMedication {
        id: "med-004",
        name: "Atorvastatin",
        dosage: "20mg",
        price: 18.0,
        requires_prescription: true,
    },
    CatalogMedication {
        id: "med-005",
        name: "Amlodipine",
        dosage: "5mg",
        price: 8.25,
        requires_prescription: true,
    },
    CatalogMedication {
        id: "med-006",
        name: "Vitamin D3",
        dosage: "50000 IU",
        price: 15.0,
        requires_prescription: false,
    },
    CatalogMedication {
        id: "med-007",
        name: "Omeprazole",
        dosage: "20mg",
        price: 7.5,
        requires_prescription: false,
    },
];

pub fn medications() -> &'static [CatalogMedication] {
    MEDICATIONS
}

pub fn find_medication(id: &str) -> Option<&'static CatalogMedication> {
    MEDICATIONS.iter().find(|m| m.id == id)
}

#[allow(clippy::too_many_arguments)]
fn pharmacy(
    id: &str,
    name: &str,
    address: &str,
    city: &str,
    distance_km: f64,
    delivery_fee: f64,
    delivery_minutes: u32,
    rating: f64,
    stock: &[&str],
) -> Pharmacy {
    Pharmacy {
        id: id.to_owned(),
        name: name.to_owned(),
        address: address.to_owned(),
        city: city.to_owned(),
        phone: format!("+218 91 {}", &id[id.len() - 3..]),
        distance_km,
        delivery_fee,
        delivery_minutes,
        rating,
        is_open: true,
        available_medications: stock.iter().map(|s| (*s).to_owned()).collect(),
    }
}

/// Partner pharmacies and the medication ids each one stocks.
pub fn pharmacies() -> Vec<Pharmacy> {
    vec![
        pharmacy(
            "pharm-001",
            "صيدلية الشفاء",
            "شارع عمر المختار",
            "طرابلس",
            1.2,
            10.0,
            35,
            4.7,
            &["med-001", "med-002", "med-003", "med-004", "med-005", "med-007"],
        ),
        pharmacy(
            "pharm-002",
            "صيدلية النور",
            "حي الأندلس",
            "طرابلس",
            3.4,
            8.0,
            50,
            4.5,
            &["med-001", "med-003", "med-006"],
        ),
        pharmacy(
            "pharm-003",
            "صيدلية الحياة",
            "طريق المطار",
            "طرابلس",
            0.8,
            12.0,
            25,
            4.2,
            &["med-001", "med-002", "med-003", "med-004", "med-005", "med-006", "med-007"],
        ),
        pharmacy(
            "pharm-004",
            "صيدلية بنغازي المركزية",
            "شارع جمال عبد الناصر",
            "بنغازي",
            6.1,
            15.0,
            90,
            4.8,
            &["med-006", "med-007"],
        ),
    ]
}

pub fn find_pharmacy(id: &str) -> Option<Pharmacy> {
    pharmacies().into_iter().find(|p| p.id == id)
}

#[allow(clippy::too_many_arguments)]
fn lab(
    id: &str,
    test_key: &str,
    test_name: &str,
    value: f64,
    unit: &str,
    reference_range: &str,
    status: LabStatus,
    trend: Trend,
    date: NaiveDate,
) -> LabResult {
    LabResult {
        id: id.to_owned(),
        test_key: test_key.to_owned(),
        test_name: test_name.to_owned(),
        value,
        unit: unit.to_owned(),
        reference_range: reference_range.to_owned(),
        status,
        trend,
        date,
    }
}

/// The patient's most recent lab panel.
pub fn latest_lab_results() -> Vec<LabResult> {
    let date = NaiveDate::from_ymd_opt(2026, 9, 28).unwrap_or_default();
    vec![
        lab(
            "lr-001",
            "glucose_fasting",
            "سكر الدم الصائم",
            118.0,
            "mg/dL",
            "70-100",
            LabStatus::High,
            Trend::Improving,
            date,
        ),
        lab(
            "lr-002",
            "hba1c",
            "السكر التراكمي",
            6.1,
            "%",
            "4.0-5.6",
            LabStatus::High,
            Trend::Stable,
            date,
        ),
        lab(
            "lr-003",
            "ldl",
            "الكوليسترول الضار",
            162.0,
            "mg/dL",
            "<130",
            LabStatus::High,
            Trend::Worsening,
            date,
        ),
        lab(
            "lr-004",
            "hdl",
            "الكوليسترول النافع",
            52.0,
            "mg/dL",
            ">40",
            LabStatus::Normal,
            Trend::Stable,
            date,
        ),
        lab(
            "lr-005",
            "vitamin_d",
            "فيتامين د",
            14.0,
            "ng/mL",
            "30-100",
            LabStatus::Low,
            Trend::Stable,
            date,
        ),
        lab(
            "lr-006",
            "hemoglobin",
            "الهيموغلوبين",
            13.8,
            "g/dL",
            "13.5-17.5",
            LabStatus::Normal,
            Trend::Stable,
            date,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pharmacy_stock_references_known_medications() {
        for p in pharmacies() {
            for med in &p.available_medications {
                assert!(find_medication(med).is_some(), "{} stocks unknown {}", p.id, med);
            }
        }
    }

    #[test]
    fn test_find_pharmacy() {
        assert_eq!(find_pharmacy("pharm-002").unwrap().name, "صيدلية النور");
        assert!(find_pharmacy("pharm-999").is_none());
    }
}
