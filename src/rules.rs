use crate::{
    feature::{Constraint, Operator, UserParamType},
    user::parse_bool,
    AttributeValue,
};

impl Constraint {
    /// Return `true` if `user_value` satisfies the constraint. `None` means the user does not
    /// have the attribute, which never satisfies a constraint.
    ///
    /// Returns `false` if the operator cannot be applied or there's a misconfiguration.
    pub fn meets(&self, user_value: Option<&AttributeValue>) -> bool {
        self.try_meets(user_value).unwrap_or(false)
    }

    /// Try applying the constraint, returning `None` if either side cannot be coerced to the
    /// declared type or the operator is not defined for it.
    fn try_meets(&self, user_value: Option<&AttributeValue>) -> Option<bool> {
        let user_value = user_value?;
        match self.user_param_type {
            UserParamType::Number => {
                let value = user_value.to_number()?;
                let expected: f64 = self.values.parse().ok()?;
                self.operator.compare_numbers(value, expected)
            }
            UserParamType::Boolean => {
                let value = user_value.to_boolean()?;
                let expected = parse_bool(&self.values)?;
                self.operator.compare_booleans(value, expected)
            }
            UserParamType::String | UserParamType::Unknown => {
                let value = user_value.to_string_value()?;
                self.operator.compare_strings(&value, &self.values)
            }
        }
    }
}

impl Operator {
    fn compare_strings(&self, value: &str, expected: &str) -> Option<bool> {
        Some(match self {
            Operator::In => list_contains(expected, value),
            Operator::NotIn => !list_contains(expected, value),
            Operator::Equals => value == expected,
            Operator::NotEquals => value != expected,
            Operator::Contains => value.contains(expected),
            Operator::NotContains => !value.contains(expected),
            _ => return None,
        })
    }

    fn compare_numbers(&self, value: f64, expected: f64) -> Option<bool> {
        Some(match self {
            Operator::Equals => value == expected,
            Operator::NotEquals => value != expected,
            Operator::GreaterThan => value > expected,
            Operator::GreaterThanOrEqual => value >= expected,
            Operator::LessThan => value < expected,
            Operator::LessThanOrEqual => value <= expected,
            _ => return None,
        })
    }

    fn compare_booleans(&self, value: bool, expected: bool) -> Option<bool> {
        Some(match self {
            Operator::Equals => value == expected,
            Operator::NotEquals => value != expected,
            _ => return None,
        })
    }
}

/// Membership test against a comma-separated list. Items are compared verbatim.
fn list_contains(list: &str, value: &str) -> bool {
    list.split(',').any(|item| item == value)
}

#[cfg(test)]
mod tests {
    use crate::{
        feature::{Constraint, Operator, UserParamType},
        AttributeValue,
    };

    fn constraint(operator: Operator, values: &str, user_param_type: UserParamType) -> Constraint {
        Constraint {
            operator,
            values: values.to_owned(),
            user_param: "param".to_owned(),
            user_param_type,
        }
    }

    fn string(operator: Operator, values: &str) -> Constraint {
        constraint(operator, values, UserParamType::String)
    }

    fn number(operator: Operator, values: &str) -> Constraint {
        constraint(operator, values, UserParamType::Number)
    }

    fn boolean(operator: Operator, values: &str) -> Constraint {
        constraint(operator, values, UserParamType::Boolean)
    }

    #[test]
    fn missing_attribute_never_meets() {
        for operator in [
            Operator::In,
            Operator::NotIn,
            Operator::Equals,
            Operator::NotEquals,
            Operator::Contains,
            Operator::NotContains,
        ] {
            assert!(!string(operator, "yes").meets(None));
        }
        assert!(!number(Operator::NotEquals, "42").meets(None));
        assert!(!boolean(Operator::NotEquals, "true").meets(None));
    }

    #[test]
    fn in_list() {
        let c = string(Operator::In, "yes,maybe,definitely");
        assert!(c.meets(Some(&"yes".into())));
        assert!(c.meets(Some(&"definitely".into())));
        assert!(!c.meets(Some(&"no".into())));
        assert!(!c.meets(Some(&"ye".into())));
    }

    #[test]
    fn not_in_list() {
        let c = string(Operator::NotIn, "yes,maybe,definitely");
        assert!(!c.meets(Some(&"yes".into())));
        assert!(c.meets(Some(&"nope".into())));
    }

    #[test]
    fn in_list_of_ids_coerces_numbers() {
        let c = string(Operator::In, "1235,123,1");
        assert!(c.meets(Some(&1235.0.into())));
        assert!(!c.meets(Some(&1234.0.into())));
    }

    #[test]
    fn string_equality() {
        assert!(string(Operator::Equals, "true").meets(Some(&"true".into())));
        assert!(string(Operator::Equals, "true").meets(Some(&true.into())));
        assert!(!string(Operator::Equals, "true").meets(Some(&"True".into())));
        assert!(string(Operator::NotEquals, "false").meets(Some(&"true".into())));
        assert!(!string(Operator::NotEquals, "false").meets(Some(&"false".into())));
    }

    #[test]
    fn substring() {
        assert!(string(Operator::Contains, "fals").meets(Some(&"false".into())));
        assert!(!string(Operator::Contains, "fals").meets(Some(&"true".into())));
        assert!(string(Operator::NotContains, "yes").meets(Some(&"nope".into())));
        assert!(!string(Operator::NotContains, "yes").meets(Some(&"yes please".into())));
    }

    #[test]
    fn null_attribute_is_skipped() {
        assert!(!string(Operator::NotEquals, "x").meets(Some(&AttributeValue::Null)));
        assert!(!number(Operator::NotEquals, "1").meets(Some(&AttributeValue::Null)));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(number(Operator::Equals, "500").meets(Some(&500.0.into())));
        assert!(number(Operator::NotEquals, "42").meets(Some(&43.0.into())));
        assert!(number(Operator::GreaterThan, "1235").meets(Some(&5235.0.into())));
        assert!(!number(Operator::GreaterThan, "1235").meets(Some(&1235.0.into())));
        assert!(number(Operator::GreaterThanOrEqual, "1235").meets(Some(&1235.0.into())));
        assert!(number(Operator::LessThan, "14588.007").meets(Some(&(-14580.0).into())));
        assert!(!number(Operator::LessThan, "14588.007").meets(Some(&14588.007.into())));
        assert!(number(Operator::LessThanOrEqual, "14588.007").meets(Some(&"14588.007".into())));
    }

    #[test]
    fn numeric_user_value_from_string() {
        assert!(number(Operator::GreaterThanOrEqual, "14588.007").meets(Some(&"500000".into())));
        assert!(!number(Operator::GreaterThanOrEqual, "14588.007").meets(Some(&"abc".into())));
    }

    #[test]
    fn numeric_rejects_booleans() {
        assert!(!number(Operator::NotEquals, "0").meets(Some(&true.into())));
    }

    #[test]
    fn malformed_numeric_rule_is_not_met() {
        assert!(!number(Operator::NotEquals, "forty-two").meets(Some(&1.0.into())));
        assert!(!number(Operator::LessThan, "").meets(Some(&1.0.into())));
    }

    #[test]
    fn string_operators_are_undefined_for_numbers() {
        assert!(!number(Operator::In, "1,2,3").meets(Some(&1.0.into())));
        assert!(!number(Operator::Contains, "1").meets(Some(&1.0.into())));
    }

    #[test]
    fn boolean_comparisons() {
        assert!(boolean(Operator::Equals, "true").meets(Some(&true.into())));
        assert!(!boolean(Operator::Equals, "true").meets(Some(&false.into())));
        assert!(boolean(Operator::Equals, "true").meets(Some(&"true".into())));
        assert!(boolean(Operator::NotEquals, "true").meets(Some(&false.into())));
        assert!(boolean(Operator::Equals, "true").meets(Some(&1.0.into())));
        assert!(boolean(Operator::Equals, "false").meets(Some(&0.0.into())));
    }

    #[test]
    fn boolean_rejects_unparseable_values() {
        assert!(!boolean(Operator::Equals, "yes").meets(Some(&true.into())));
        assert!(!boolean(Operator::Equals, "true").meets(Some(&"bar".into())));
    }

    #[test]
    fn ordering_is_undefined_for_booleans() {
        assert!(!boolean(Operator::GreaterThan, "false").meets(Some(&true.into())));
        assert!(!boolean(Operator::In, "true").meets(Some(&true.into())));
    }

    #[test]
    fn unknown_operator_is_never_met() {
        assert!(!string(Operator::Unknown, "").meets(Some(&"".into())));
        assert!(!number(Operator::Unknown, "1").meets(Some(&1.0.into())));
        assert!(!boolean(Operator::Unknown, "true").meets(Some(&true.into())));
    }

    #[test]
    fn unknown_param_type_compares_as_string() {
        let c = constraint(Operator::Equals, "true", UserParamType::Unknown);
        assert!(c.meets(Some(&"true".into())));
    }
}
