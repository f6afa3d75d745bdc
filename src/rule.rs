use std::fmt;
use std::str::FromStr;

use log::trace;
use serde::de::{self, Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::listable::{null_as_default, ListValue};
use crate::types::{Result, RouteError};

pub const RULE_TYPE_DEFAULT: &str = "default";
pub const RULE_TYPE_LOGICAL: &str = "logical";

pub const LOGICAL_MODE_AND: &str = "and";
pub const LOGICAL_MODE_OR: &str = "or";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalMode {
    And,
    Or,
}

impl fmt::Display for LogicalMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let printable = match self {
            LogicalMode::And => LOGICAL_MODE_AND,
            LogicalMode::Or => LOGICAL_MODE_OR,
        };
        write!(f, "{}", printable)
    }
}

impl FromStr for LogicalMode {
    type Err = RouteError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            LOGICAL_MODE_AND => Ok(LogicalMode::And),
            LOGICAL_MODE_OR => Ok(LogicalMode::Or),
            _ => Err(RouteError::UnknownLogicalMode(mode.to_string())),
        }
    }
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Flat set of conditions routed to `outbound`.
///
/// Every field other than `outbound` is a condition; a zero value leaves it
/// unconstrained.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultRule {
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub inbound: ListValue<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub ip_version: i32,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub network: String,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub protocol: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub domain: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub domain_suffix: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub domain_keyword: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub source_geoip: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub geoip: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub source_ip_cidr: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub ip_cidr: ListValue<String>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub source_port: ListValue<u16>,
    #[serde(default, skip_serializing_if = "ListValue::is_empty")]
    pub port: ListValue<u16>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub outbound: String,
}

impl DefaultRule {
    /// A rule is valid once at least one condition is set.
    pub fn is_valid(&self) -> bool {
        let unconstrained = DefaultRule {
            outbound: self.outbound.clone(),
            ..Default::default()
        };
        *self != unconstrained
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<DefaultRule>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub outbound: String,
}

impl LogicalRule {
    pub fn is_valid(&self) -> bool {
        !self.rules.is_empty() && self.invalid_rule_index().is_none()
    }

    /// Position of the first sub rule without conditions.
    pub fn invalid_rule_index(&self) -> Option<usize> {
        self.rules.iter().position(|rule| !rule.is_valid())
    }

    pub fn logical_mode(&self) -> Result<LogicalMode> {
        self.mode.parse()
    }
}

/// A routing rule. On the wire the `type` key sits next to the fields of the
/// selected variant in one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Default(DefaultRule),
    Logical(LogicalRule),
}

impl Rule {
    /// Rebuild a rule from a type tag and per-variant option slots. Only the
    /// slot named by the tag is used; an empty tag means `default`.
    pub fn from_parts(
        rule_type: &str,
        default_options: Option<DefaultRule>,
        logical_options: Option<LogicalRule>,
    ) -> Result<Self> {
        match rule_type {
            "" | RULE_TYPE_DEFAULT => default_options
                .map(Rule::Default)
                .ok_or_else(|| RouteError::MissingRuleOptions(RULE_TYPE_DEFAULT.to_string())),
            RULE_TYPE_LOGICAL => logical_options
                .map(Rule::Logical)
                .ok_or_else(|| RouteError::MissingRuleOptions(RULE_TYPE_LOGICAL.to_string())),
            _ => Err(RouteError::UnknownRuleType(rule_type.to_string())),
        }
    }

    pub fn rule_type(&self) -> &'static str {
        match self {
            Rule::Default(_) => RULE_TYPE_DEFAULT,
            Rule::Logical(_) => RULE_TYPE_LOGICAL,
        }
    }

    pub fn default_options(&self) -> Option<&DefaultRule> {
        match self {
            Rule::Default(options) => Some(options),
            Rule::Logical(_) => None,
        }
    }

    pub fn logical_options(&self) -> Option<&LogicalRule> {
        match self {
            Rule::Default(_) => None,
            Rule::Logical(options) => Some(options),
        }
    }

    pub fn outbound(&self) -> &str {
        match self {
            Rule::Default(options) => &options.outbound,
            Rule::Logical(options) => &options.outbound,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Rule::Default(options) => options.is_valid(),
            Rule::Logical(options) => options.is_valid(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl From<DefaultRule> for Rule {
    fn from(options: DefaultRule) -> Self {
        Rule::Default(options)
    }
}

impl From<LogicalRule> for Rule {
    fn from(options: LogicalRule) -> Self {
        Rule::Logical(options)
    }
}

#[derive(Serialize)]
struct TaggedRule<'a, T> {
    #[serde(rename = "type")]
    rule_type: &'a str,
    #[serde(flatten)]
    options: &'a T,
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rule_type = self.rule_type();
        match self {
            Rule::Default(options) => TaggedRule { rule_type, options }.serialize(serializer),
            Rule::Logical(options) => TaggedRule { rule_type, options }.serialize(serializer),
        }
    }
}

/// Only the tag; every other key is ignored.
#[derive(Deserialize)]
struct RuleEnvelope {
    #[serde(rename = "type", default)]
    rule_type: Option<String>,
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The object is read twice: once for the tag, then in full as the
        // tagged variant.
        let value = Value::deserialize(deserializer)?;
        let envelope = RuleEnvelope::deserialize(&value).map_err(D::Error::custom)?;
        let rule_type = match envelope.rule_type.as_deref() {
            None | Some("") => RULE_TYPE_DEFAULT,
            Some(rule_type) => rule_type,
        };
        trace!("decoding {} rule", rule_type);
        let rule = match rule_type {
            RULE_TYPE_DEFAULT => {
                Rule::Default(DefaultRule::deserialize(value).map_err(D::Error::custom)?)
            }
            RULE_TYPE_LOGICAL => {
                Rule::Logical(LogicalRule::deserialize(value).map_err(D::Error::custom)?)
            }
            _ => {
                return Err(de::Error::custom(RouteError::UnknownRuleType(
                    rule_type.to_string(),
                )))
            }
        };
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;

    fn domain_rule() -> DefaultRule {
        DefaultRule {
            domain: vec!["a.com".to_string()].into(),
            outbound: "x".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_rule_round_trip() -> Result<()> {
        let rule = Rule::Default(DefaultRule {
            inbound: "mixed-in".into(),
            ip_version: 4,
            network: "tcp".into(),
            protocol: vec!["tls".to_string(), "http".to_string()].into(),
            domain: "example.com".into(),
            domain_suffix: "google.com".into(),
            domain_keyword: vec!["ads".to_string()].into(),
            source_geoip: "private".into(),
            geoip: "cn".into(),
            source_ip_cidr: "192.168.0.0/16".into(),
            ip_cidr: vec!["10.0.0.0/8".to_string()].into(),
            source_port: 5353u16.into(),
            port: vec![80, 443].into(),
            outbound: "proxy".into(),
        });
        let encoded = serde_json::to_value(&rule)?;
        assert_eq!(
            encoded,
            json!({
                "type": "default",
                "inbound": "mixed-in",
                "ip_version": 4,
                "network": "tcp",
                "protocol": ["tls", "http"],
                "domain": "example.com",
                "domain_suffix": "google.com",
                "domain_keyword": ["ads"],
                "source_geoip": "private",
                "geoip": "cn",
                "source_ip_cidr": "192.168.0.0/16",
                "ip_cidr": ["10.0.0.0/8"],
                "source_port": 5353,
                "port": [80, 443],
                "outbound": "proxy"
            })
        );
        let decoded = Rule::from_slice(&rule.to_vec()?)?;
        assert_eq!(decoded, rule);
        Ok(())
    }

    #[test]
    fn logical_rule_round_trip() -> Result<()> {
        let rule = Rule::Logical(LogicalRule {
            mode: LOGICAL_MODE_OR.into(),
            rules: vec![
                domain_rule(),
                DefaultRule {
                    port: 443u16.into(),
                    ..Default::default()
                },
            ],
            outbound: "block".into(),
        });
        let decoded = Rule::from_slice(&rule.to_vec()?)?;
        assert_eq!(decoded, rule);
        Ok(())
    }

    #[test]
    fn encode_flattens_type_and_fields() -> Result<()> {
        let encoded = serde_json::to_value(Rule::Default(DefaultRule {
            domain_suffix: "google.com".into(),
            outbound: "direct".into(),
            ..Default::default()
        }))?;
        assert_eq!(
            encoded,
            json!({"type": "default", "domain_suffix": "google.com", "outbound": "direct"})
        );

        let encoded = serde_json::to_value(Rule::Logical(LogicalRule::default()))?;
        assert_eq!(encoded, json!({"type": "logical", "mode": ""}));
        Ok(())
    }

    #[test]
    fn missing_type_means_default() -> Result<()> {
        let rule: Rule = serde_json::from_value(json!({"domain": "a.com", "outbound": "x"}))?;
        assert_eq!(rule.rule_type(), RULE_TYPE_DEFAULT);
        assert_eq!(rule, Rule::Default(domain_rule()));

        let rule: Rule = serde_json::from_value(json!({"type": "", "port": 53}))?;
        assert_eq!(rule.rule_type(), RULE_TYPE_DEFAULT);

        let rule: Rule = serde_json::from_value(json!({"type": null, "port": 53}))?;
        assert_eq!(rule.rule_type(), RULE_TYPE_DEFAULT);
        Ok(())
    }

    #[test]
    fn scalar_and_list_forms_decode_alike() -> Result<()> {
        let scalar: Rule = serde_json::from_value(json!({"domain": "a.com", "port": 443}))?;
        let list: Rule = serde_json::from_value(json!({"domain": ["a.com"], "port": [443]}))?;
        assert_eq!(scalar, list);
        Ok(())
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = serde_json::from_value::<Rule>(json!({"type": "bogus"})).unwrap_err();
        assert!(err.to_string().contains("unknown rule type: bogus"));

        let err = Rule::from_slice(br#"{"type":"bogus","domain":"a.com"}"#).unwrap_err();
        assert!(err.is_format());
        assert!(err.to_string().contains("unknown rule type: bogus"));
    }

    #[test]
    fn from_parts_checks_the_tag() -> Result<()> {
        for (default_options, logical_options) in [
            (Some(domain_rule()), None),
            (None, Some(LogicalRule::default())),
            (None, None),
        ] {
            let err = Rule::from_parts("bogus", default_options, logical_options).unwrap_err();
            assert_eq!(err.to_string(), "unknown rule type: bogus");
        }

        let rule = Rule::from_parts("", Some(domain_rule()), Some(LogicalRule::default()))?;
        assert_eq!(rule, Rule::Default(domain_rule()));

        let rule = Rule::from_parts(
            RULE_TYPE_LOGICAL,
            Some(domain_rule()),
            Some(LogicalRule::default()),
        )?;
        assert_eq!(rule.logical_options(), Some(&LogicalRule::default()));
        assert_eq!(rule.default_options(), None);

        assert!(matches!(
            Rule::from_parts(RULE_TYPE_LOGICAL, Some(domain_rule()), None),
            Err(RouteError::MissingRuleOptions(_))
        ));
        Ok(())
    }

    #[test]
    fn absent_options_differ_from_zero_options() {
        let absent: Option<Rule> = None;
        let zero = Some(Rule::Default(DefaultRule::default()));
        assert_ne!(absent, zero);
        assert!(Rule::from_parts(RULE_TYPE_DEFAULT, None, None).is_err());
        assert_ne!(
            Rule::Default(DefaultRule::default()),
            Rule::Logical(LogicalRule::default())
        );
    }

    #[test]
    fn tag_and_unknown_keys_are_ignored_by_the_payload() -> Result<()> {
        let rule: Rule = serde_json::from_value(json!({
            "type": "default",
            "domain": "a.com",
            "process_name": "curl",
            "outbound": "x"
        }))?;
        assert_eq!(rule, Rule::Default(domain_rule()));
        Ok(())
    }

    #[test]
    fn null_fields_are_zero_values() -> Result<()> {
        let rule: Rule = serde_json::from_value(json!({
            "domain": null,
            "ip_version": null,
            "network": null,
            "port": 443,
            "outbound": null
        }))?;
        assert_eq!(
            rule,
            Rule::Default(DefaultRule {
                port: 443u16.into(),
                ..Default::default()
            })
        );

        let rule: Rule = serde_json::from_slice(
            br#"{"type":"logical","mode":null,"rules":null,"outbound":null}"#,
        )?;
        assert_eq!(rule, Rule::Logical(LogicalRule::default()));
        Ok(())
    }

    #[test]
    fn malformed_fields_abort_decode() {
        assert!(serde_json::from_value::<Rule>(json!({"port": "443"})).is_err());
        assert!(serde_json::from_value::<Rule>(json!({"type": 1})).is_err());
        assert!(serde_json::from_value::<Rule>(json!("default")).is_err());
        assert!(serde_json::from_value::<Rule>(json!({"type": "logical", "rules": {}})).is_err());
    }

    #[test]
    fn default_rule_validity() {
        let empty = DefaultRule {
            outbound: "x".into(),
            ..Default::default()
        };
        assert!(!empty.is_valid());
        assert!(domain_rule().is_valid());
        assert!(DefaultRule {
            ip_version: 6,
            ..Default::default()
        }
        .is_valid());
    }

    #[test]
    fn logical_rule_validity() {
        let mut rule = LogicalRule {
            mode: LOGICAL_MODE_AND.into(),
            rules: vec![],
            outbound: "x".into(),
        };
        assert!(!rule.is_valid());
        rule.rules.push(DefaultRule::default());
        assert!(!rule.is_valid());
        rule.rules[0] = domain_rule();
        assert!(rule.is_valid());
        assert_eq!(rule.invalid_rule_index(), None);
        rule.rules.push(DefaultRule::default());
        assert_eq!(rule.invalid_rule_index(), Some(1));
        assert!(!Rule::Logical(rule).is_valid());
    }

    #[test]
    fn logical_modes() {
        let mut rule = LogicalRule::default();
        assert!(matches!(
            rule.logical_mode(),
            Err(RouteError::UnknownLogicalMode(_))
        ));
        rule.mode = "or".into();
        assert_eq!(rule.logical_mode().ok(), Some(LogicalMode::Or));
        assert_eq!(LogicalMode::And.to_string(), "and");
        assert!("xor".parse::<LogicalMode>().is_err());
    }

    #[test]
    fn equality_is_structural() {
        let a = Rule::Default(domain_rule());
        let mut other = domain_rule();
        assert_eq!(a, Rule::Default(other.clone()));
        other.outbound = "y".into();
        assert_ne!(a, Rule::Default(other));
        assert_eq!(a.outbound(), "x");
    }
}
