//! Selectors: given a value, yield the sub-values a rule applies to.
//!
//! Each target carries the path segment that locates it, which the
//! surrounding rule appends to the instance path of the child context.
//! Selecting from an inapplicable value (e.g. `ArrayItems` on a string)
//! yields no targets, which is how type-inapplicable rules pass trivially.

use std::borrow::Cow;

use regex::Regex;
use tracing::warn;
use veld_value::DynValue;

/// One selected sub-value plus the path segment that locates it.
pub(crate) struct SelectionTarget<'a> {
    pub value: Cow<'a, DynValue>,
    pub segment: String,
}

impl<'a> SelectionTarget<'a> {
    fn borrowed(value: &'a DynValue, segment: impl Into<String>) -> Self {
        SelectionTarget {
            value: Cow::Borrowed(value),
            segment: segment.into(),
        }
    }

    fn owned(value: DynValue, segment: impl Into<String>) -> Self {
        SelectionTarget {
            value: Cow::Owned(value),
            segment: segment.into(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Selector {
    /// The value itself; the common case for whole-value constraints.
    Value,
    /// One named object property. When `required` is set an absent key still
    /// yields an explicit null target so downstream rules can see the hole.
    Property { name: String, required: bool },
    /// A fixed tuple position.
    ArrayItem(usize),
    /// Every array element.
    ArrayItems,
    /// Array elements at indices >= the tuple length.
    AdditionalItems(usize),
    /// Every object key, as a string value with a `propertyName:<key>`
    /// segment.
    ObjectKeys,
    /// Object properties whose key matches a regex.
    PatternProperties {
        pattern: String,
        regex: Option<Regex>,
    },
    /// Object properties covered neither by `properties` nor by any
    /// `patternProperties` pattern.
    AdditionalProperties {
        known: Vec<String>,
        patterns: Vec<Regex>,
    },
}

impl Selector {
    pub fn property(name: impl Into<String>) -> Self {
        Selector::Property {
            name: name.into(),
            required: false,
        }
    }

    /// Compile the pattern once; an invalid pattern warns and matches
    /// nothing.
    pub fn pattern_properties(pattern: &str) -> Self {
        let regex = match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(pattern, %err, "invalid patternProperties regex");
                None
            }
        };
        Selector::PatternProperties {
            pattern: pattern.to_string(),
            regex,
        }
    }

    pub fn additional_properties(known: Vec<String>, patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(pattern, %err, "invalid patternProperties regex");
                    None
                }
            })
            .collect();
        Selector::AdditionalProperties { known, patterns }
    }

    pub fn select_targets<'a>(&self, instance: &'a DynValue) -> Vec<SelectionTarget<'a>> {
        match self {
            Selector::Value => vec![SelectionTarget::borrowed(instance, "")],

            Selector::Property { name, required } => {
                let Some(map) = instance.as_object() else {
                    return Vec::new();
                };
                match map.get(name) {
                    Some(value) => vec![SelectionTarget::borrowed(value, name.clone())],
                    None if *required => {
                        vec![SelectionTarget::owned(DynValue::Null, name.clone())]
                    }
                    None => Vec::new(),
                }
            }

            Selector::ArrayItem(index) => match instance.array_get(*index) {
                Some(value) => vec![SelectionTarget::borrowed(value, index.to_string())],
                None => Vec::new(),
            },

            Selector::ArrayItems => {
                let Some(items) = instance.as_array() else {
                    return Vec::new();
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, value)| SelectionTarget::borrowed(value, i.to_string()))
                    .collect()
            }

            Selector::AdditionalItems(tuple_len) => {
                let Some(items) = instance.as_array() else {
                    return Vec::new();
                };
                items
                    .iter()
                    .enumerate()
                    .skip(*tuple_len)
                    .map(|(i, value)| SelectionTarget::borrowed(value, i.to_string()))
                    .collect()
            }

            Selector::ObjectKeys => {
                let Some(map) = instance.as_object() else {
                    return Vec::new();
                };
                map.keys()
                    .map(|key| {
                        SelectionTarget::owned(
                            DynValue::Str(key.clone()),
                            format!("propertyName:{key}"),
                        )
                    })
                    .collect()
            }

            Selector::PatternProperties { regex, .. } => {
                let Some(map) = instance.as_object() else {
                    return Vec::new();
                };
                let Some(regex) = regex else {
                    return Vec::new();
                };
                map.iter()
                    .filter(|(key, _)| regex.is_match(key.as_str()))
                    .map(|(key, value)| SelectionTarget::borrowed(value, key.clone()))
                    .collect()
            }

            Selector::AdditionalProperties { known, patterns } => {
                let Some(map) = instance.as_object() else {
                    return Vec::new();
                };
                map.iter()
                    .filter(|(key, _)| {
                        !known.iter().any(|k| k == *key)
                            && !patterns.iter().any(|regex| regex.is_match(key.as_str()))
                    })
                    .map(|(key, value)| SelectionTarget::borrowed(value, key.clone()))
                    .collect()
            }
        }
    }
}
