use std::env;
use std::fs;

use anyhow::{anyhow, Result};
use log::{error, info};

use kitty_route::RouteOptions;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: route_check <route.json>"))?;
    let content = fs::read(&path)?;
    let options = RouteOptions::from_slice(&content)?;
    info!("{}: {} rules", path, options.rules.len());

    for (index, rule) in options.rules.iter().enumerate() {
        info!(
            "rule[{}]: type={} outbound={} valid={}",
            index,
            rule.rule_type(),
            rule.outbound(),
            rule.is_valid()
        );
    }
    if let Err(err) = options.validate() {
        error!("{}", err);
    }

    println!("{}", options.to_string_pretty()?);
    Ok(())
}
