mod listable;
mod route;
mod rule;
mod types;

pub use listable::ListValue;
pub use route::{decode_route_options, encode_route_options, GeoIPOptions, RouteOptions};
pub use rule::{
    DefaultRule, LogicalMode, LogicalRule, Rule, LOGICAL_MODE_AND, LOGICAL_MODE_OR,
    RULE_TYPE_DEFAULT, RULE_TYPE_LOGICAL,
};
pub use types::{Result, RouteError, ValidityError};
