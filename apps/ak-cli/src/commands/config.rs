// config.rs: `ak config` prints the configuration the client would use.

use anyhow::Result;

use ak_client::ClientConfig;

pub fn execute(config: &ClientConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
