use std::{borrow::Cow, collections::HashMap};

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Type alias for a HashMap representing key-value pairs of user attributes.
///
/// # Examples
/// ```
/// # use molasses::{Attributes, AttributeValue};
/// let attributes = [
///     ("age".to_owned(), 30.0.into()),
///     ("isPaying".to_owned(), true.into()),
///     ("teamId".to_owned(), "12356".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, AttributeValue>;

/// Enum representing possible values of a user attribute.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, and `bool` types.
#[derive(Debug, Serialize, Deserialize, PartialEq, PartialOrd, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A null value or absence of value.
    Null,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl AttributeValue {
    /// Numeric view of the value. Numbers and numeric strings convert; booleans and null do not.
    pub(crate) fn to_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::String(s) => s.parse().ok(),
            AttributeValue::Boolean(_) | AttributeValue::Null => None,
        }
    }

    /// Boolean view of the value. A number is `true` when it is non-zero.
    pub(crate) fn to_boolean(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            AttributeValue::String(s) => parse_bool(s),
            AttributeValue::Number(n) => Some(*n != 0.0),
            AttributeValue::Null => None,
        }
    }

    pub(crate) fn to_string_value(&self) -> Option<Cow<'_, str>> {
        match self {
            AttributeValue::String(s) => Some(Cow::Borrowed(s)),
            AttributeValue::Boolean(b) => Some(Cow::Owned(b.to_string())),
            AttributeValue::Number(n) => Some(Cow::Owned(format_number(*n))),
            AttributeValue::Null => None,
        }
    }
}

/// Shortest decimal form of `n`, switching to exponent notation (`1e+06`, `1e-05`) when the
/// exponent is below -4 or at least 6. Feature definitions are written against this form.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "+Inf" } else { "-Inf" }.to_owned();
    }

    let scientific = format!("{n:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        n.to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

/// Parse the boolean literals accepted by feature definitions.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// The subject of a feature evaluation.
///
/// `id` is used for percentage bucketing and is what a constraint on the `"id"` parameter
/// compares against. `params` hold any other attributes constraints may refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier of the user.
    pub id: String,
    /// User attributes.
    #[serde(default)]
    pub params: Attributes,
}

impl User {
    /// Name of the constraint parameter that always refers to [`User::id`].
    pub const ID_PARAM: &'static str = "id";

    /// Create a user without attributes.
    ///
    /// ```
    /// # use molasses::User;
    /// let user = User::new("user-1").with_param("teamId", "12356");
    /// assert_eq!(user.param("teamId"), Some(&"12356".into()));
    /// ```
    pub fn new(id: impl Into<String>) -> User {
        User {
            id: id.into(),
            params: Attributes::new(),
        }
    }

    /// Add or replace an attribute.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> User {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute by name.
    pub fn param(&self, name: &str) -> Option<&AttributeValue> {
        self.params.get(name)
    }

    /// Resolve the value a constraint on `user_param` compares against.
    ///
    /// `"id"` always resolves to the user's identifier, even when `params` has no such entry.
    pub(crate) fn resolve(&self, user_param: &str) -> Option<Cow<'_, AttributeValue>> {
        if user_param == User::ID_PARAM {
            return Some(Cow::Owned(AttributeValue::String(self.id.clone())));
        }
        self.params.get(user_param).map(Cow::Borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeValue, User};

    #[test]
    fn id_param_resolves_to_identifier() {
        let user = User::new("baz");
        assert_eq!(
            user.resolve("id").as_deref(),
            Some(&AttributeValue::String("baz".to_owned()))
        );
    }

    #[test]
    fn id_param_ignores_params_entry() {
        let user = User::new("baz").with_param("id", "other");
        assert_eq!(user.resolve("id").as_deref(), Some(&"baz".into()));
    }

    #[test]
    fn missing_param_resolves_to_none() {
        assert!(User::new("baz").resolve("teamId").is_none());
    }

    #[test]
    fn number_coercion() {
        assert_eq!(AttributeValue::from(42.0).to_number(), Some(42.0));
        assert_eq!(AttributeValue::from("14588.007").to_number(), Some(14588.007));
        assert_eq!(AttributeValue::from("abc").to_number(), None);
        assert_eq!(AttributeValue::from(true).to_number(), None);
        assert_eq!(AttributeValue::Null.to_number(), None);
    }

    #[test]
    fn boolean_coercion() {
        assert_eq!(AttributeValue::from(true).to_boolean(), Some(true));
        assert_eq!(AttributeValue::from("false").to_boolean(), Some(false));
        assert_eq!(AttributeValue::from("T").to_boolean(), Some(true));
        assert_eq!(AttributeValue::from(1.0).to_boolean(), Some(true));
        assert_eq!(AttributeValue::from(0.0).to_boolean(), Some(false));
        assert_eq!(AttributeValue::from("yes").to_boolean(), None);
        assert_eq!(AttributeValue::Null.to_boolean(), None);
    }

    #[test]
    fn string_coercion() {
        assert_eq!(AttributeValue::from("yes").to_string_value().as_deref(), Some("yes"));
        assert_eq!(AttributeValue::from(true).to_string_value().as_deref(), Some("true"));
        assert_eq!(AttributeValue::from(42.0).to_string_value().as_deref(), Some("42"));
        assert_eq!(AttributeValue::from(1.5).to_string_value().as_deref(), Some("1.5"));
        assert_eq!(AttributeValue::Null.to_string_value(), None);
    }

    #[test]
    fn string_coercion_of_large_and_small_numbers() {
        let string = |n: f64| AttributeValue::from(n).to_string_value().unwrap().into_owned();
        assert_eq!(string(123456.0), "123456");
        assert_eq!(string(1234567.0), "1.234567e+06");
        assert_eq!(string(1e21), "1e+21");
        assert_eq!(string(-1.5e300), "-1.5e+300");
        assert_eq!(string(0.0001), "0.0001");
        assert_eq!(string(1e-7), "1e-07");
        assert_eq!(string(1.25e-5), "1.25e-05");
        assert_eq!(string(0.0), "0");
        assert_eq!(string(f64::INFINITY), "+Inf");
    }

    #[test]
    fn deserializes_heterogeneous_params() {
        let user: User = serde_json::from_str(
            r#"{"id": "1234", "params": {"controlUser": true, "age": 30, "team": "a"}}"#,
        )
        .unwrap();
        assert_eq!(user.param("controlUser"), Some(&true.into()));
        assert_eq!(user.param("age"), Some(&30.0.into()));
        assert_eq!(user.param("team"), Some(&"a".into()));
    }
}
