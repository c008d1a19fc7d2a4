use std::cmp::Ordering;

use log::warn;

use crate::target::{MatchOperator, TargetMatch};
use crate::value::{Value, ValueType};

/// Match one subject value against a condition's match values.
///
/// An array subject matches when any of its elements does, and an element matches when any match
/// value satisfies the operator. Polarity is applied once, to the final outcome.
pub(super) fn matches(subject: &Value, target_match: &TargetMatch) -> bool {
    let is_matched = subject
        .find(|element| matches_single(element, target_match))
        .is_some();
    target_match.match_type.matches(is_matched)
}

fn matches_single(subject: &Value, target_match: &TargetMatch) -> bool {
    if target_match.operator == MatchOperator::Exists {
        return true;
    }
    target_match
        .values
        .iter()
        .any(|match_value| matches_typed(target_match, subject, match_value))
}

fn matches_typed(target_match: &TargetMatch, subject: &Value, match_value: &Value) -> bool {
    let operator = target_match.operator;
    match target_match.value_type {
        ValueType::String | ValueType::Json => {
            match (subject.to_string_value(), match_value.to_string_value()) {
                (Some(s), Some(m)) => string_op(operator, &s, &m),
                _ => false,
            }
        }
        ValueType::Number => match (subject.to_number(), match_value.to_number()) {
            (Some(s), Some(m)) => ordered_op(operator, s.partial_cmp(&m)),
            _ => false,
        },
        ValueType::Boolean => match (subject.to_boolean(), match_value.to_boolean()) {
            (Some(s), Some(m)) => operator == MatchOperator::In && s == m,
            _ => false,
        },
        ValueType::Version => match (subject.to_version(), match_value.to_version()) {
            (Some(s), Some(m)) => ordered_op(operator, Some(s.cmp(&m))),
            _ => false,
        },
        ValueType::Null | ValueType::Unknown => {
            warn!(
                "unsupported value type {:?} for operator {:?}",
                target_match.value_type, operator
            );
            false
        }
    }
}

fn string_op(operator: MatchOperator, subject: &str, match_value: &str) -> bool {
    match operator {
        MatchOperator::Contains => subject.contains(match_value),
        MatchOperator::StartsWith => subject.starts_with(match_value),
        MatchOperator::EndsWith => subject.ends_with(match_value),
        _ => ordered_op(operator, Some(subject.cmp(match_value))),
    }
}

/// IN and the comparison operators. Substring operators never apply to ordered kinds.
fn ordered_op(operator: MatchOperator, ordering: Option<Ordering>) -> bool {
    let ordering = match ordering {
        Some(ordering) => ordering,
        None => return false,
    };
    match operator {
        MatchOperator::In => ordering == Ordering::Equal,
        MatchOperator::Gt => ordering == Ordering::Greater,
        MatchOperator::Gte => ordering != Ordering::Less,
        MatchOperator::Lt => ordering == Ordering::Less,
        MatchOperator::Lte => ordering != Ordering::Greater,
        MatchOperator::Contains
        | MatchOperator::StartsWith
        | MatchOperator::EndsWith
        | MatchOperator::Exists => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MatchType;
    use test_case::test_case;

    fn target_match(operator: MatchOperator, value_type: ValueType, values: Vec<Value>) -> TargetMatch {
        TargetMatch::new(MatchType::Match, operator, value_type, values)
    }

    #[test_case("abc", MatchOperator::In, "abc", true)]
    #[test_case("abc", MatchOperator::In, "ABC", false)]
    #[test_case("abcdef", MatchOperator::Contains, "cd", true)]
    #[test_case("abcdef", MatchOperator::StartsWith, "abc", true)]
    #[test_case("abcdef", MatchOperator::StartsWith, "bc", false)]
    #[test_case("abcdef", MatchOperator::EndsWith, "def", true)]
    #[test_case("b", MatchOperator::Gt, "a", true)]
    #[test_case("b", MatchOperator::Gte, "b", true)]
    #[test_case("a", MatchOperator::Lt, "b", true)]
    #[test_case("10", MatchOperator::Lt, "9", true; "strings compare lexicographically")]
    fn string_operators(subject: &str, operator: MatchOperator, value: &str, expected: bool) {
        let target_match = target_match(operator, ValueType::String, vec![value.into()]);
        assert_eq!(matches(&subject.into(), &target_match), expected);
    }

    #[test_case(Value::Number(42.0), MatchOperator::In, Value::Number(42.0), true)]
    #[test_case(Value::Number(42.0), MatchOperator::In, Value::from("42"), true; "number subject, string value")]
    #[test_case(Value::from("42"), MatchOperator::In, Value::Number(42.0), true; "string subject, number value")]
    #[test_case(Value::from("42.0"), MatchOperator::In, Value::Number(42.0), true; "decimal string")]
    #[test_case(Value::Number(10.0), MatchOperator::Gt, Value::from("9"), true; "numeric not lexicographic")]
    #[test_case(Value::Number(10.0), MatchOperator::Gte, Value::Number(10.0), true)]
    #[test_case(Value::Number(10.0), MatchOperator::Lte, Value::Number(9.5), false)]
    #[test_case(Value::Number(12.0), MatchOperator::Contains, Value::Number(1.0), false; "no substring on numbers")]
    #[test_case(Value::Bool(true), MatchOperator::In, Value::Number(1.0), false; "booleans are not numbers")]
    #[test_case(Value::from("abc"), MatchOperator::In, Value::Number(1.0), false)]
    fn number_operators(subject: Value, operator: MatchOperator, value: Value, expected: bool) {
        let target_match = target_match(operator, ValueType::Number, vec![value]);
        assert_eq!(matches(&subject, &target_match), expected);
    }

    #[test_case(Value::Number(42.0), Value::from("42"), true)]
    #[test_case(Value::Number(42.5), Value::from("42.5"), true)]
    #[test_case(Value::from("42"), Value::Number(42.0), true)]
    #[test_case(Value::Bool(true), Value::from("true"), false; "booleans are not strings")]
    fn string_coercion(subject: Value, value: Value, expected: bool) {
        let target_match = target_match(MatchOperator::In, ValueType::String, vec![value]);
        assert_eq!(matches(&subject, &target_match), expected);
    }

    #[test_case(Value::Bool(true), Value::Bool(true), true)]
    #[test_case(Value::from("true"), Value::Bool(true), true)]
    #[test_case(Value::Bool(false), Value::from("false"), true)]
    #[test_case(Value::from("TRUE"), Value::Bool(true), false)]
    #[test_case(Value::Number(1.0), Value::Bool(true), false; "numbers are not booleans")]
    #[test_case(Value::Bool(true), Value::Number(1.0), false; "booleans are not numbers")]
    fn boolean_coercion(subject: Value, value: Value, expected: bool) {
        let target_match = target_match(MatchOperator::In, ValueType::Boolean, vec![value]);
        assert_eq!(matches(&subject, &target_match), expected);
    }

    #[test]
    fn boolean_supports_only_in() {
        let target_match = target_match(MatchOperator::Gt, ValueType::Boolean, vec![false.into()]);
        assert!(!matches(&true.into(), &target_match));
    }

    #[test_case("1.0.0", MatchOperator::In, "1.0.0", true)]
    #[test_case("1.0.0+build", MatchOperator::In, "1.0.0", true; "build metadata ignored")]
    #[test_case("1.0", MatchOperator::In, "1.0.0", true; "missing patch")]
    #[test_case("1.10.0", MatchOperator::Gt, "1.9.0", true)]
    #[test_case("1.0.0-alpha", MatchOperator::Lt, "1.0.0", true)]
    #[test_case("2.0.0", MatchOperator::Lte, "1.9.9", false)]
    #[test_case("1.0.0", MatchOperator::StartsWith, "1", false; "no substring on versions")]
    #[test_case("not a version", MatchOperator::In, "1.0.0", false)]
    fn version_operators(subject: &str, operator: MatchOperator, value: &str, expected: bool) {
        let target_match = target_match(operator, ValueType::Version, vec![value.into()]);
        assert_eq!(matches(&subject.into(), &target_match), expected);
    }

    #[test]
    fn json_compares_as_string() {
        let target_match = target_match(MatchOperator::Contains, ValueType::Json, vec![r#""a":1"#.into()]);
        assert!(matches(&r#"{"a":1}"#.into(), &target_match));
    }

    #[test]
    fn any_match_value_is_enough() {
        let target_match = target_match(
            MatchOperator::In,
            ValueType::String,
            vec!["SILVER".into(), "GOLD".into()],
        );
        assert!(matches(&"GOLD".into(), &target_match));
        assert!(!matches(&"BRONZE".into(), &target_match));
    }

    #[test]
    fn array_subject_matches_any_element() {
        let target_match = target_match(MatchOperator::In, ValueType::String, vec!["b".into()]);
        assert!(matches(&vec!["a", "b"].into(), &target_match));
        assert!(!matches(&vec!["a", "c"].into(), &target_match));
        assert!(!matches(&Value::Array(vec![]), &target_match));
    }

    #[test]
    fn not_match_inverts_final_outcome_not_each_element() {
        let target_match = TargetMatch::new(
            MatchType::NotMatch,
            MatchOperator::In,
            ValueType::String,
            vec!["b".into()],
        );
        // "a" alone would satisfy NOT IN, but "b" is present so the array matches IN.
        assert!(!matches(&vec!["a", "b"].into(), &target_match));
        assert!(matches(&vec!["a", "c"].into(), &target_match));
    }

    #[test]
    fn exists_ignores_match_values() {
        let exists = target_match(MatchOperator::Exists, ValueType::String, vec![]);
        assert!(matches(&"anything".into(), &exists));
        assert!(matches(&Value::Number(0.0), &exists));
    }

    #[test]
    fn unknown_value_type_never_matches() {
        let target_match = target_match(MatchOperator::In, ValueType::Unknown, vec!["a".into()]);
        assert!(!matches(&"a".into(), &target_match));
    }
}
