//! alias command - Manage storage service aliases
//!
//! An alias names an S3-compatible endpoint with its credentials. Targets
//! written as `alias/bucket/key` are resolved against them.

use clap::Subcommand;
use serde::Serialize;
use stow_core::{Alias, AliasManager, Error, RetryConfig};

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

const BUCKET_LOOKUPS: [&str; 3] = ["auto", "path", "dns"];

/// Alias subcommands
#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Add or replace an alias
    Set(SetArgs),

    /// List configured aliases
    List(ListArgs),

    /// Remove an alias
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Alias name (e.g. "local", "backup")
    pub name: String,

    /// Endpoint URL (e.g. `http://localhost:9000`)
    pub endpoint: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket addressing style: auto, path or dns
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = RetryConfig::default().max_attempts)]
    pub max_attempts: u32,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region and bucket lookup too
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

/// Alias as printed by `alias list --json`; credentials are left out
#[derive(Debug, Serialize, PartialEq, Eq)]
struct AliasInfo {
    name: String,
    endpoint: String,
    region: String,
    bucket_lookup: String,
}

impl From<&Alias> for AliasInfo {
    fn from(alias: &Alias) -> Self {
        Self {
            name: alias.name.clone(),
            endpoint: alias.endpoint.clone(),
            region: alias.region.clone(),
            bucket_lookup: alias.bucket_lookup.clone(),
        }
    }
}

/// Execute an alias subcommand
pub async fn execute(cmd: AliasCommands, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let manager = AliasManager::new(ctx.config.clone());

    match cmd {
        AliasCommands::Set(args) => execute_set(args, &manager, &formatter),
        AliasCommands::List(args) => execute_list(args, &manager, &formatter),
        AliasCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

/// Build the alias described by `args`, or explain what is wrong with it
fn build_alias(args: SetArgs) -> Result<Alias, String> {
    if args.name.is_empty() {
        return Err("Alias name cannot be empty".into());
    }
    if args.name.contains('/') {
        return Err("Alias name cannot contain '/'".into());
    }
    if !args.endpoint.starts_with("http://") && !args.endpoint.starts_with("https://") {
        return Err(format!(
            "Endpoint must be an http:// or https:// URL, got '{}'",
            args.endpoint
        ));
    }
    if !BUCKET_LOOKUPS.contains(&args.bucket_lookup.as_str()) {
        return Err("Bucket lookup must be 'auto', 'path' or 'dns'".into());
    }
    if args.max_attempts == 0 {
        return Err("--max-attempts must be at least 1".into());
    }

    let mut alias = Alias::new(args.name, args.endpoint, args.access_key, args.secret_key);
    alias.region = args.region;
    alias.bucket_lookup = args.bucket_lookup;
    alias.retry.max_attempts = args.max_attempts;
    Ok(alias)
}

fn execute_set(args: SetArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let alias = match build_alias(args) {
        Ok(a) => a,
        Err(message) => {
            formatter.error(&message);
            return ExitCode::UsageError;
        }
    };

    if alias.endpoint.starts_with("http://") {
        formatter.warning(&format!(
            "Endpoint {} is not using TLS; credentials are sent in clear text.",
            alias.endpoint
        ));
    }

    let name = alias.name.clone();
    match manager.set(alias) {
        Ok(()) => {
            let name = formatter.style_name(&name);
            formatter.success(&format!("Alias '{name}' configured successfully."));
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

fn execute_list(args: ListArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let aliases = match manager.list() {
        Ok(a) => a,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    if formatter.is_json() {
        for alias in &aliases {
            formatter.json_line(&AliasInfo::from(alias));
        }
        return ExitCode::Success;
    }

    if aliases.is_empty() {
        formatter.println("No aliases configured.");
        return ExitCode::Success;
    }

    for alias in &aliases {
        let name = formatter.style_name(&format!("{:<12}", alias.name));
        let url = formatter.style_url(&alias.endpoint);
        if args.long {
            let region = formatter.style_date(&alias.region);
            let lookup = formatter.style_date(&alias.bucket_lookup);
            formatter.println(&format!("{name} {url} (region: {region}, lookup: {lookup})"));
        } else {
            formatter.println(&format!("{name} {url}"));
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            let name = formatter.style_name(&args.name);
            formatter.success(&format!("Alias '{name}' removed successfully."));
            ExitCode::Success
        }
        // Without a config file there are no aliases to remove.
        Err(Error::AliasNotFound(_) | Error::ConfigNotFound(_)) => {
            formatter.error(&format!("Alias '{}' not found", args.name));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}
