use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::listable::null_as_default;
use crate::rule::Rule;
use crate::types::{
    EmptyDefaultRuleSnafu, EmptyLogicalRuleSnafu, InvalidSubRuleSnafu, Result, RouteError,
    ValidityError,
};

/// Where the evaluator finds the GeoIP database.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoIPOptions {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub path: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub download_url: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub download_detour: String,
}

/// The `route` section of a configuration document. Rules are kept in
/// priority order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoip: Option<GeoIPOptions>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

impl RouteOptions {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        decode_route_options(bytes)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        encode_route_options(self)
    }

    pub fn to_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reports the first rule an evaluator would have to reject. Decoding
    /// never calls this.
    pub fn validate(&self) -> std::result::Result<(), ValidityError> {
        for (index, rule) in self.rules.iter().enumerate() {
            let result = check_rule(index, rule);
            debug_assert_eq!(result.is_ok(), rule.is_valid());
            if let Err(err) = result {
                warn!("invalid route rule: {}", err);
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl FromStr for RouteOptions {
    type Err = RouteError;

    fn from_str(document: &str) -> Result<Self> {
        decode_route_options(document.as_bytes())
    }
}

fn check_rule(index: usize, rule: &Rule) -> std::result::Result<(), ValidityError> {
    match rule {
        Rule::Default(options) => {
            ensure!(options.is_valid(), EmptyDefaultRuleSnafu { index });
        }
        Rule::Logical(options) => {
            ensure!(!options.rules.is_empty(), EmptyLogicalRuleSnafu { index });
            if let Some(sub_index) = options.invalid_rule_index() {
                return InvalidSubRuleSnafu { index, sub_index }.fail();
            }
        }
    }
    Ok(())
}

pub fn decode_route_options(bytes: &[u8]) -> Result<RouteOptions> {
    let options: RouteOptions = serde_json::from_slice(bytes)?;
    debug!(
        "decoded route options: {} rules, geoip {}",
        options.rules.len(),
        if options.geoip.is_some() { "set" } else { "unset" }
    );
    Ok(options)
}

pub fn encode_route_options(options: &RouteOptions) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(options)?;
    debug!(
        "encoded route options: {} rules, {} bytes",
        options.rules.len(),
        bytes.len()
    );
    Ok(bytes)
}
