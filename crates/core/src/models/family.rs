//! Family accounts.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sehati_ids::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Spouse,
    Child,
    Parent,
    Sibling,
    Grandparent,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

/// A dependant managed from the head-of-family account.
///
/// `is_adult` is a snapshot taken when the member is added or updated; it is not recomputed
/// as time passes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: EntityId,
    pub head_user_id: String,
    pub name: String,
    pub relationship: Relationship,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_adult: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewFamilyMember {
    pub head_user_id: String,
    pub name: String,
    pub relationship: Relationship,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_type: Option<BloodType>,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FamilyMemberUpdate {
    pub name: Option<String>,
    pub relationship: Option<Relationship>,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<Option<BloodType>>,
    pub allergies: Option<Vec<String>>,
    pub chronic_conditions: Option<Vec<String>>,
    pub phone: Option<Option<String>>,
}

/// Age in whole years on `today`. Zero for dates of birth in the future.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    if today < date_of_birth {
        return 0;
    }
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        assert_eq!(age_on(d(2008, 6, 15), d(2026, 6, 14)), 17);
        assert_eq!(age_on(d(2008, 6, 15), d(2026, 6, 15)), 18);
    }

    #[test]
    fn test_age_future_birth_is_zero() {
        assert_eq!(age_on(d(2030, 1, 1), d(2026, 1, 1)), 0);
    }

    #[test]
    fn test_blood_type_serialises_with_sign() {
        let json = serde_json::to_string(&BloodType::AbNegative).unwrap();
        assert_eq!(json, "\"AB-\"");
    }
}
