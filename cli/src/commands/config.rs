use anyhow::anyhow;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tollgate_api::config::default_config_path;
use tollgate_api::{ClientConfig, ClientConfigOverrides};

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

impl ConfigCommands {
    pub fn run(
        self,
        config_path: Option<&Path>,
        overrides: &ClientConfigOverrides,
    ) -> anyhow::Result<()> {
        match self {
            ConfigCommands::Show => {
                let config = ClientConfig::load(config_path, overrides)?;
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigCommands::Init { force } => {
                let path = init(config_path, overrides, force)?;
                println!("Config written to {}", path.display());
                Ok(())
            }
        }
    }
}

fn init(
    config_path: Option<&Path>,
    overrides: &ClientConfigOverrides,
    force: bool,
) -> anyhow::Result<PathBuf> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        ));
    }

    let config = ClientConfig::default().with_overrides(overrides);
    config.validate()?;
    config.save(Some(&path))?;
    Ok(path)
}
