use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    dtype::Scalar,
    errors::{Error, Result},
    utils::Attrs,
};

/// A closed set of keyword options, parsed from and displayed as their lowercase keywords.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $invalid:expr, { $($variant:ident => $keyword:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $keyword),+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $($keyword => Ok($name::$variant),)+
                    _ => Err(($invalid)(value.to_string())),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

keyword_enum!(
    /// How strictly same-named variables that are not concatenated must agree.
    ///
    Compat,
    Error::InvalidCompatOption,
    {
        BroadcastEquals => "broadcast_equals",
        Equals => "equals",
        Identical => "identical",
        NoConflicts => "no_conflicts",
        Override => "override",
    }
);

keyword_enum!(
    /// How the labels of shared, non-concatenated dimensions are reconciled before
    /// concatenating.
    ///
    Join,
    |value| Error::InvalidOption { option: "join", value },
    {
        Outer => "outer",
        Inner => "inner",
        Left => "left",
        Right => "right",
        Exact => "exact",
        Override => "override",
    }
);

keyword_enum!(
    /// Which variables of a kind are concatenated.
    ///
    Policy,
    |value| Error::InvalidOption { option: "data_vars/coords", value },
    {
        All => "all",
        Minimal => "minimal",
        Different => "different",
    }
);

/// A selection policy for data variables or coordinates: a keyword or explicit names.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Policy(Policy),
    Names(Vec<String>),
}

impl From<Policy> for Selection {
    fn from(policy: Policy) -> Self {
        Selection::Policy(policy)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(names: Vec<&str>) -> Self {
        Selection::Names(names.into_iter().map(String::from).collect())
    }
}

impl FromStr for Selection {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Ok(Selection::Policy(value.parse()?))
    }
}

/// A user supplied reduction of a sequence of attribute mappings.
pub type CombineAttrsFn = Arc<dyn Fn(&[&Attrs]) -> Result<Attrs> + Send + Sync>;

/// How attributes of combined objects are reconciled.
///
#[derive(Clone)]
pub enum CombineAttrs {
    /// Empty attributes.
    Drop,

    /// All attributes must be the same.
    Identical,

    /// Union of attributes, failing on a key with conflicting values.
    NoConflicts,

    /// Union of attributes, dropping keys with conflicting values.
    DropConflicts,

    /// Attributes of the first object.
    Override,

    Custom(CombineAttrsFn),
}

impl CombineAttrs {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[&Attrs]) -> Result<Attrs> + Send + Sync + 'static,
    {
        CombineAttrs::Custom(Arc::new(f))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CombineAttrs::Drop => "drop",
            CombineAttrs::Identical => "identical",
            CombineAttrs::NoConflicts => "no_conflicts",
            CombineAttrs::DropConflicts => "drop_conflicts",
            CombineAttrs::Override => "override",
            CombineAttrs::Custom(_) => "custom",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, CombineAttrs::Custom(_))
    }
}

impl fmt::Debug for CombineAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineAttrs::Custom(_) => write!(f, "Custom(<fn>)"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl fmt::Display for CombineAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CombineAttrs {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "drop" => Ok(CombineAttrs::Drop),
            "identical" => Ok(CombineAttrs::Identical),
            "no_conflicts" => Ok(CombineAttrs::NoConflicts),
            "drop_conflicts" => Ok(CombineAttrs::DropConflicts),
            "override" => Ok(CombineAttrs::Override),
            _ => Err(Error::InvalidOption {
                option: "combine_attrs",
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for CombineAttrs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_custom() {
            return Err(ser::Error::custom("a custom combine_attrs function cannot be serialized"));
        }

        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CombineAttrs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;

        value.parse().map_err(de::Error::custom)
    }
}

/// Value used for cells introduced by alignment.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    /// The dtype's own missing value (NaN, or `None` for strings). Integers are promoted.
    #[default]
    Missing,

    Value(Scalar),

    /// Per variable fill values. Variables not named use `Missing`.
    ByName(BTreeMap<String, Scalar>),
}

impl FillValue {
    pub fn for_variable(&self, name: &str) -> Option<&Scalar> {
        match self {
            FillValue::Missing => None,
            FillValue::Value(scalar) => Some(scalar),
            FillValue::ByName(map) => map.get(name),
        }
    }

    /// Names a `ByName` fill value refers to.
    pub fn names(&self) -> Vec<&str> {
        match self {
            FillValue::ByName(map) => map.keys().map(String::as_str).collect(),
            _ => vec![],
        }
    }
}

impl From<Scalar> for FillValue {
    fn from(scalar: Scalar) -> Self {
        FillValue::Value(scalar)
    }
}

/// Keyword options for `concat`.
///
/// Defaults: `data_vars = "all"`, `coords = "different"`, `compat = "equals"`, no positions,
/// missing fill value, `join = "outer"`, `combine_attrs = "override"`.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatOptions {
    pub data_vars: Selection,
    pub coords: Selection,
    pub compat: Compat,
    pub positions: Option<Vec<Vec<usize>>>,
    pub fill_value: FillValue,
    pub join: Join,

    #[serde(skip_serializing_if = "CombineAttrs::is_custom")]
    pub combine_attrs: CombineAttrs,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            data_vars: Selection::Policy(Policy::All),
            coords: Selection::Policy(Policy::Different),
            compat: Compat::Equals,
            positions: None,
            fill_value: FillValue::Missing,
            join: Join::Outer,
            combine_attrs: CombineAttrs::Override,
        }
    }
}

impl ConcatOptions {
    /// Load options from JSON. Missing keys take their default.
    ///
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
