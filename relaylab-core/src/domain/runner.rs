use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::de::{opt_string_or_number, present};
use super::ids::RunnerId;

/// Base runner record as delivered by the entity files. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    #[serde(alias = "id")]
    pub runner_id: RunnerId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub default_pace_sec: Option<f64>,
    #[serde(default)]
    pub preferred_distance: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub favorite_stage: Option<String>,
    #[serde(default)]
    pub tshirt_size: Option<String>,
    #[serde(default)]
    pub food_preference: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Links to third-party profiles (e.g. `strava`). Not overridable.
    #[serde(default)]
    pub external_ids: BTreeMap<String, serde_json::Value>,
}

impl Runner {
    /// A runner with only an id; every other field unset.
    pub fn bare(runner_id: RunnerId) -> Self {
        Self {
            runner_id,
            first_name: None,
            last_name: None,
            company: None,
            email: None,
            mobile: None,
            street: None,
            zip_code: None,
            city: None,
            country: None,
            gender: None,
            birth_year: None,
            default_pace_sec: None,
            preferred_distance: None,
            favorite_stage: None,
            tshirt_size: None,
            food_preference: None,
            active: None,
            notes: None,
            external_ids: BTreeMap::new(),
        }
    }

    /// "First Last", skipping whichever part is missing.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => self.runner_id.to_string(),
        }
    }
}

macro_rules! overridable_fields {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Partial runner record stored in the override document.
        ///
        /// Each field is `None` when the key is absent (fall through to the
        /// base value) and `Some(None)` when the key is present with `null`
        /// (explicitly no value). Keys outside [`RunnerPatch::FIELDS`] land
        /// in `extra`; resolution ignores them but a save writes them back.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct RunnerPatch {
            $(
                #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
                pub $field: Option<Option<$ty>>,
            )*
            #[serde(flatten)]
            pub extra: BTreeMap<String, serde_json::Value>,
        }

        impl RunnerPatch {
            /// Names of all fields an override may carry.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Replace every present field on `runner`, null included.
            pub fn apply(&self, runner: &mut Runner) {
                $(
                    if let Some(value) = &self.$field {
                        runner.$field = value.clone();
                    }
                )*
            }

            /// Replace only fields that carry a non-null value.
            pub(crate) fn apply_non_null(&self, runner: &mut Runner) {
                $(
                    if let Some(Some(value)) = &self.$field {
                        runner.$field = Some(value.clone());
                    }
                )*
            }

            /// Fold a newer patch into this one; fields present in `newer` win.
            pub fn merge(&mut self, newer: RunnerPatch) {
                $(
                    if newer.$field.is_some() {
                        self.$field = newer.$field;
                    }
                )*
                self.extra.extend(newer.extra);
            }

            pub fn is_empty(&self) -> bool {
                self.extra.is_empty() $(&& self.$field.is_none())*
            }

            /// Names of the fields present in this patch, in declaration order.
            pub fn present_fields(&self) -> Vec<&'static str> {
                let mut fields = Vec::new();
                $(
                    if self.$field.is_some() {
                        fields.push(stringify!($field));
                    }
                )*
                fields
            }
        }
    };
}

overridable_fields! {
    first_name: String,
    last_name: String,
    company: String,
    email: String,
    mobile: String,
    street: String,
    zip_code: String,
    city: String,
    country: String,
    gender: String,
    birth_year: i32,
    default_pace_sec: f64,
    preferred_distance: String,
    favorite_stage: String,
    tshirt_size: String,
    food_preference: String,
    active: bool,
    notes: String,
}

/// A runner with its override applied. Only the resolver builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EffectiveRunner(Runner);

impl EffectiveRunner {
    pub(crate) fn new(runner: Runner) -> Self {
        Self(runner)
    }

    pub fn into_inner(self) -> Runner {
        self.0
    }
}

impl Deref for EffectiveRunner {
    type Target = Runner;

    fn deref(&self) -> &Runner {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> Runner {
        let mut r = Runner::bare(RunnerId::new("R1"));
        r.first_name = Some("Anna".into());
        r.last_name = Some("Muster".into());
        r.company = Some("Acme".into());
        r.active = Some(true);
        r
    }

    #[test]
    fn apply_replaces_present_fields_only() {
        let patch: RunnerPatch =
            serde_json::from_str(r#"{"company": "Globex", "active": false}"#).unwrap();
        let mut r = runner();
        patch.apply(&mut r);
        assert_eq!(r.company.as_deref(), Some("Globex"));
        assert_eq!(r.active, Some(false));
        assert_eq!(r.first_name.as_deref(), Some("Anna"));
    }

    #[test]
    fn apply_null_clears_the_base_value() {
        let patch: RunnerPatch = serde_json::from_str(r#"{"company": null}"#).unwrap();
        let mut r = runner();
        patch.apply(&mut r);
        assert_eq!(r.company, None);
    }

    #[test]
    fn serialization_keeps_null_and_skips_absent() {
        let patch: RunnerPatch =
            serde_json::from_str(r#"{"company": null, "birth_year": 1988}"#).unwrap();
        let json = serde_json::to_value(&patch).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj["company"].is_null());
        assert_eq!(obj["birth_year"], 1988);
    }

    #[test]
    fn merge_prefers_newer_fields() {
        let mut base: RunnerPatch =
            serde_json::from_str(r#"{"company": "Globex", "notes": "x"}"#).unwrap();
        let newer: RunnerPatch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        base.merge(newer);
        assert_eq!(base.company, Some(Some("Globex".to_string())));
        assert_eq!(base.notes, Some(None));
        assert_eq!(base.present_fields(), vec!["company", "notes"]);
    }

    #[test]
    fn text_fields_accept_numbers() {
        let patch: RunnerPatch =
            serde_json::from_str(r#"{"zip_code": 8000, "mobile": 791234567, "favorite_stage": 7}"#)
                .unwrap();
        assert_eq!(patch.zip_code, Some(Some("8000".to_string())));
        assert_eq!(patch.mobile, Some(Some("791234567".to_string())));
        assert_eq!(patch.favorite_stage, Some(Some("7".to_string())));
    }

    #[test]
    fn unknown_keys_survive_a_roundtrip() {
        let mut patch: RunnerPatch =
            serde_json::from_str(r#"{"active": false, "nickname": "Speedy"}"#).unwrap();
        assert_eq!(patch.present_fields(), vec!["active"]);
        assert_eq!(patch.extra["nickname"], "Speedy");

        let mut r = runner();
        patch.apply(&mut r);
        assert_eq!(r.active, Some(false));

        patch.merge(serde_json::from_str(r#"{"notes": "knee"}"#).unwrap());
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"active": false, "notes": "knee", "nickname": "Speedy"}));
        assert!(!RunnerPatch { extra: patch.extra.clone(), ..Default::default() }.is_empty());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(runner().display_name(), "Anna Muster");
        assert_eq!(Runner::bare(RunnerId::new("R9")).display_name(), "R9");
    }
}
