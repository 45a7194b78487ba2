//! Resolve command-line targets to storage clients

use async_trait::async_trait;
use stow_core::{
    Alias, Client, ClientFactory, ConfigManager, Error, ParsedPath, Result, parse_path,
};
use stow_fs::FsClient;
use stow_s3::S3Client;

/// Opens `alias/bucket/key` targets on S3 and everything else locally
#[derive(Debug, Clone, Default)]
pub struct Backends {
    aliases: Vec<Alias>,
}

impl Backends {
    pub fn new(aliases: Vec<Alias>) -> Self {
        Self { aliases }
    }

    /// Backends for the aliases in the configuration file
    pub fn load(config: &ConfigManager) -> Result<Self> {
        Ok(Self::new(config.load_or_default()?.aliases))
    }

    fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name == name)
    }

    pub fn parse(&self, target: &str) -> Result<ParsedPath> {
        parse_path(target, |name| self.alias(name).is_some())
    }
}

#[async_trait]
impl ClientFactory for Backends {
    async fn open(&self, target: &str) -> Result<Box<dyn Client>> {
        match self.parse(target)? {
            ParsedPath::Local(path) => Ok(Box::new(FsClient::new(path)?)),
            ParsedPath::Remote(remote) => {
                let alias = self
                    .alias(&remote.alias)
                    .cloned()
                    .ok_or_else(|| Error::AliasNotFound(remote.alias.clone()))?;
                tracing::debug!(alias = %alias.name, path = %remote, "Opening S3 client");
                Ok(Box::new(S3Client::new(alias, remote).await?))
            }
        }
    }
}
