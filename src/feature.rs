use serde::{Deserialize, Deserializer, Serialize};

/// A feature flag as delivered by the Molasses API.
///
/// Features are replaced wholesale on every update and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Stable identifier issued by the server.
    pub id: String,
    /// Lookup name, unique among the features of an environment.
    pub key: String,
    /// Free-form text shown in the dashboard.
    #[serde(default)]
    pub description: String,
    /// Server-side revision of the feature. Informational only.
    #[serde(default, deserialize_with = "string_from_scalar")]
    pub version: String,
    /// Master switch. An inactive feature is off for everybody.
    pub active: bool,
    /// Targeting rules. When several segments share a type, the last one is used.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// A rule group deciding which users fall into a behavioral bucket of a feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Bucket the matching users are assigned to.
    pub segment_type: SegmentType,
    /// Conditions on user attributes.
    #[serde(default)]
    pub user_constraints: Vec<Constraint>,
    /// Rollout percentage in `0..=100`. Only used by [`SegmentType::EveryoneElse`].
    #[serde(default)]
    pub percentage: i64,
    /// Whether all or any of `user_constraints` have to be met.
    #[serde(default, rename = "constraint")]
    pub constraint_mode: ConstraintMode,
}

/// Role of a [`Segment`] within a feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentType {
    /// Users in this segment never see the feature.
    AlwaysControl,
    /// Users in this segment always see the feature.
    AlwaysExperiment,
    /// Everybody else, admitted by rollout percentage.
    #[default]
    EveryoneElse,
    /// A segment type this SDK does not know about. Ignored.
    #[serde(other)]
    Unknown,
}

/// How many constraints of a segment a user has to meet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintMode {
    /// Every constraint has to be met.
    #[default]
    All,
    /// At least one constraint has to be met.
    Any,
    /// Treated as [`ConstraintMode::All`].
    #[serde(other)]
    Unknown,
}

/// One comparison between a user attribute and a server-defined value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// How the user attribute is compared with `values`.
    pub operator: Operator,
    /// Right-hand side of the comparison. A comma-separated list for [`Operator::In`] and
    /// [`Operator::NotIn`].
    #[serde(default, deserialize_with = "string_from_scalar")]
    pub values: String,
    /// Name of the user attribute to compare. `"id"` refers to the user identifier.
    #[serde(default)]
    pub user_param: String,
    /// How the attribute and `values` are interpreted.
    #[serde(default)]
    pub user_param_type: UserParamType,
}

/// Comparison applied by a [`Constraint`].
///
/// Numeric comparisons only apply to [`UserParamType::Number`]. Booleans support equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Attribute is one of the comma-separated values.
    In,
    /// Attribute is none of the comma-separated values.
    #[serde(rename = "nin")]
    NotIn,
    /// Attribute equals the value.
    Equals,
    /// Attribute differs from the value.
    #[serde(rename = "doesNotEqual")]
    NotEquals,
    /// Attribute contains the value as a substring.
    Contains,
    /// Attribute does not contain the value as a substring.
    #[serde(rename = "doesNotContain")]
    NotContains,
    /// `attribute > value`
    #[serde(rename = "gt")]
    GreaterThan,
    /// `attribute >= value`
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
    /// `attribute < value`
    #[serde(rename = "lt")]
    LessThan,
    /// `attribute <= value`
    #[serde(rename = "lte")]
    LessThanOrEqual,
    /// An operator this SDK does not know about. Never met.
    #[serde(other)]
    Unknown,
}

/// Declared type of a constraint's user attribute. Governs how both sides are coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserParamType {
    /// Compared as text.
    #[default]
    String,
    /// Compared as floating point numbers.
    Number,
    /// Compared as booleans.
    #[serde(rename = "bool")]
    Boolean,
    /// Compared as [`UserParamType::String`].
    #[serde(other)]
    Unknown,
}

/// Accept a JSON string, number or boolean and keep its textual form. Servers are not strict
/// about quoting constraint values.
fn string_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Body of the `/features` endpoint and of every streamed update.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FeaturesResponse {
    pub data: FeaturesData,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FeaturesData {
    #[serde(default)]
    pub features: Vec<TryParse<Feature>>,
}

impl FeaturesResponse {
    /// Consume the response, dropping features that failed to parse.
    pub(crate) fn into_features(self) -> Vec<Feature> {
        self.data
            .features
            .into_iter()
            .filter_map(|feature| match feature {
                TryParse::Parsed(feature) => Some(feature),
                TryParse::ParseFailed(value) => {
                    log::warn!(target: "molasses",
                               feature:serde = value;
                               "skipping feature that failed to parse");
                    None
                }
            })
            .collect()
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}
