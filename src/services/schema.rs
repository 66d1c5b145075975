//! Activity schemas: which attribute columns each regulatory activity requires.
//!
//! Labels double as storage bucket names, so they must stay byte-identical to
//! what existing callers send.

use crate::models::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column holding the planted/treated area in hectares.
pub const AREA_FIELD: &str = "LUAS_HA";

const VEGETATIVE_FIELDS: &[&str] = &[
    "BPDAS",
    "PROVINSI",
    "KABUPATEN",
    "KECAMATAN",
    "DESA",
    "FUNGSI_KWS",
    "JNS_TNMN",
    "BTG_HA",
    "LUAS_HA",
    "THN_TNM",
    "NO_KNTRK",
    "TGL_KNTRK",
];

const CONSERVATION_FIELDS: &[&str] = &[
    "BPDAS",
    "PROVINSI",
    "KABUPATEN",
    "KECAMATAN",
    "DESA",
    "JNS_BANGUN",
    "JML_UNIT",
    "LUAS_HA",
    "THN_BANGUN",
    "NO_KNTRK",
    "TGL_KNTRK",
];

const LAND_USE_FIELDS: &[&str] = &[
    "BPDAS",
    "PROVINSI",
    "KABUPATEN",
    "KECAMATAN",
    "DESA",
    "FUNGSI_KWS",
    "TUTUPAN_LH",
    "LUAS_HA",
    "THN_KEG",
    "PELAKSANA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    #[serde(rename = "rhlvegetatif")]
    Vegetative,
    #[serde(rename = "rhlupsa")]
    Conservation,
    #[serde(rename = "rhlfolu")]
    LandUse,
}

impl Activity {
    pub const ALL: [Activity; 3] = [
        Activity::Vegetative,
        Activity::Conservation,
        Activity::LandUse,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Activity::Vegetative => "rhlvegetatif",
            Activity::Conservation => "rhlupsa",
            Activity::LandUse => "rhlfolu",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Activity::Vegetative => "Vegetative forest and land rehabilitation",
            Activity::Conservation => "Soil and water conservation structures",
            Activity::LandUse => "Forestry and other land use",
        }
    }

    /// Required columns in declaration order. Names are case-sensitive.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Activity::Vegetative => VEGETATIVE_FIELDS,
            Activity::Conservation => CONSERVATION_FIELDS,
            Activity::LandUse => LAND_USE_FIELDS,
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|a| a.label()).collect()
    }
}

impl FromStr for Activity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|activity| activity.label() == s)
            .ok_or_else(|| AppError::UnknownActivity(s.to_string()))
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Serializable view of one activity for the `/activities` listing.
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySchema {
    pub activity: Activity,
    pub description: &'static str,
    pub required_fields: &'static [&'static str],
    pub area_field: &'static str,
}

impl From<Activity> for ActivitySchema {
    fn from(activity: Activity) -> Self {
        Self {
            activity,
            description: activity.description(),
            required_fields: activity.required_fields(),
            area_field: AREA_FIELD,
        }
    }
}

pub fn all_schemas() -> Vec<ActivitySchema> {
    Activity::ALL.into_iter().map(ActivitySchema::from).collect()
}
