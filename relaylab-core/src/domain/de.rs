//! Lenient serde helpers for entity files produced by external tooling.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Accept a string or a JSON number and normalize it to a string.
///
/// Bib numbers show up as `"42"` in some exports and `42` in others.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(raw.map(|value| match value {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Int(n) => n.to_string(),
        TextOrNumber::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
        TextOrNumber::Float(f) => f.to_string(),
    }))
}

/// Value types an override field may hold, decoded as leniently as the
/// matching base entity field.
pub trait PatchValue: Sized {
    fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Self>, D::Error>
    where
        D: Deserializer<'de>;
}

impl PatchValue for String {
    fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Self>, D::Error>
    where
        D: Deserializer<'de>,
    {
        opt_string_or_number(deserializer)
    }
}

macro_rules! strict_patch_value {
    ($($ty:ty),*) => {
        $(
            impl PatchValue for $ty {
                fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Self>, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    Option::<$ty>::deserialize(deserializer)
                }
            }
        )*
    };
}

strict_patch_value!(i32, f64, bool);

/// Distinguish "field absent" from "field present with null".
///
/// Used with `#[serde(default, deserialize_with = "present")]`: an absent
/// key stays `None` through `default`, while any present key (null
/// included) becomes `Some(..)`. Text fields also accept numbers.
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: PatchValue,
{
    T::deserialize_opt(deserializer).map(Some)
}
