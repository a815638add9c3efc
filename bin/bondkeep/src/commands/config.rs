//! Config command - print the effective configuration

use eyre::Result;

use crate::config::BondkeepConfig;

pub(crate) fn run(config: &BondkeepConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
