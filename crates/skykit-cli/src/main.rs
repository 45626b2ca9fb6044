//! skykit: seed phrases, verified uploads, and registry links
//!
//! Commands:
//!   generate-seed                    - print a fresh 15-word phrase
//!   registry-link <salt> [phrase]    - print the registry address for a salt
//!   upload-file <path>               - upload and verify the returned address
//!   upload-file-dry <path>           - compute the address without uploading
//!   publish <address> <salt> [phrase] - point the salt's registry entry at an address
//!   registry-read <salt> [phrase]    - read and verify the salt's registry entry
//!   pin / metadata <address>         - portal content management
//!   health                           - check the portal answers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use skykit_chunks::Address;
use skykit_core::config::{load_config, SkykitConfig};
use skykit_crypto::{derive_keys, generate_phrase, phrase_to_seed, LookupKey, SigningKeys};
use skykit_portal::{
    check_health, file_address, HttpTransport, PortalClient, RegistryClient, RegistryLookup,
    SecureUploader,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "skykit",
    version,
    about = "Seed-phrase keys, verified uploads, and registry links for storage portals"
)]
struct Cli {
    /// Path to skykit.toml configuration file
    #[arg(long, short = 'c', env = "SKYKIT_CONFIG", default_value = "skykit.toml")]
    config: PathBuf,

    /// Portal URL (overrides config)
    #[arg(long, env = "SKYKIT_PORTAL")]
    portal: Option<String>,

    /// Portal API key (overrides config)
    #[arg(long, env = "SKYKIT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log format (overrides config)
    #[arg(long, env = "SKYKIT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new random seed phrase
    #[command(name = "generate-seed", visible_aliases = ["g", "s", "gs"])]
    GenerateSeed,

    /// Print the registry address derived from a phrase and salt
    #[command(name = "registry-link", visible_aliases = ["p", "v2"])]
    RegistryLink {
        /// Salt naming the registry slot
        salt: String,
        /// Seed phrase words (prompted for when omitted)
        phrase: Vec<String>,
    },

    /// Upload a file and verify the portal stored it under the local address
    #[command(name = "upload-file", visible_aliases = ["u", "uf"])]
    UploadFile { path: PathBuf },

    /// Compute the address a file would be uploaded under, without uploading
    #[command(name = "upload-file-dry", visible_aliases = ["ud", "ufd"])]
    UploadFileDry { path: PathBuf },

    /// Point a salt's registry entry at a content address
    #[command(visible_aliases = ["u2", "utv"])]
    Publish {
        /// Content address to publish
        address: String,
        /// Salt naming the registry slot
        salt: String,
        /// Seed phrase words (prompted for when omitted)
        phrase: Vec<String>,
    },

    /// Read and verify a salt's registry entry
    #[command(name = "registry-read")]
    RegistryRead {
        salt: String,
        /// Seed phrase words (prompted for when omitted)
        phrase: Vec<String>,
    },

    /// Ask the portal to keep content pinned
    Pin { address: String },

    /// Show the portal's metadata for content
    Metadata { address: String },

    /// Check the portal is reachable
    Health,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.log.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    });
    init_logging(&config.log.level, &format);

    match cli.command {
        Commands::GenerateSeed => cmd_generate_seed(),
        Commands::RegistryLink { salt, phrase } => cmd_registry_link(&salt, phrase),
        Commands::UploadFile { path } => cmd_upload(&config, &path).await,
        Commands::UploadFileDry { path } => cmd_upload_dry(&path).await,
        Commands::Publish {
            address,
            salt,
            phrase,
        } => cmd_publish(&config, &address, &salt, phrase).await,
        Commands::RegistryRead { salt, phrase } => cmd_registry_read(&config, &salt, phrase).await,
        Commands::Pin { address } => cmd_pin(&config, &address).await,
        Commands::Metadata { address } => cmd_metadata(&config, &address).await,
        Commands::Health => cmd_health(&config).await,
    }
}

/// Config file merged with command-line and environment overrides.
fn resolve_config(cli: &Cli) -> Result<SkykitConfig> {
    let mut config = load_config(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;
    if let Some(url) = &cli.portal {
        config.portal.url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        config.portal.api_key = Some(key.clone());
    }
    Ok(config)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_env("SKYKIT_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Phrase from the command line, or prompted for without echo.
fn read_phrase(words: Vec<String>) -> Result<SecretString> {
    if !words.is_empty() {
        return Ok(SecretString::from(words.join(" ")));
    }
    let entered = rpassword::prompt_password("Seed phrase: ").context("reading seed phrase")?;
    Ok(SecretString::from(entered))
}

fn keys_for(salt: &str, words: Vec<String>) -> Result<(SigningKeys, LookupKey)> {
    let phrase = read_phrase(words)?;
    let seed = phrase_to_seed(phrase.expose_secret()).context("decoding seed phrase")?;
    Ok(derive_keys(&seed, salt))
}

fn parse_address(text: &str) -> Result<Address> {
    text.parse()
        .with_context(|| format!("invalid address: {text}"))
}

fn portal_client(config: &SkykitConfig) -> Result<PortalClient<HttpTransport>> {
    debug!(url = %config.portal.url, "using portal");
    PortalClient::from_config(&config.portal).context("configuring portal client")
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_generate_seed() -> Result<()> {
    let (phrase, _seed) = generate_phrase();
    println!("{phrase}");
    Ok(())
}

fn cmd_registry_link(salt: &str, words: Vec<String>) -> Result<()> {
    let (signing, lookup) = keys_for(salt, words)?;
    println!("sia://{}", Address::registry(&signing.public_key(), &lookup));
    Ok(())
}

async fn cmd_upload(config: &SkykitConfig, path: &Path) -> Result<()> {
    let uploader = SecureUploader::new(portal_client(config)?);

    let pb = make_spinner("upload");
    pb.set_message(path.display().to_string());
    let result = uploader.upload_secure(path).await;
    pb.finish_and_clear();

    let address = result.with_context(|| format!("uploading {}", path.display()))?;
    println!("sia://{address}");
    Ok(())
}

async fn cmd_upload_dry(path: &Path) -> Result<()> {
    let address = file_address(path)
        .await
        .with_context(|| format!("computing address of {}", path.display()))?;
    println!("sia://{address}");
    Ok(())
}

async fn cmd_publish(
    config: &SkykitConfig,
    address: &str,
    salt: &str,
    words: Vec<String>,
) -> Result<()> {
    let address = parse_address(address)?;
    let (signing, lookup) = keys_for(salt, words)?;
    let registry = RegistryClient::new(portal_client(config)?);

    let link = registry
        .publish(&signing, &lookup, &address)
        .await
        .context("publishing to registry")?;
    info!(salt, %address, "registry entry updated");
    println!("sia://{link}");
    Ok(())
}

async fn cmd_registry_read(config: &SkykitConfig, salt: &str, words: Vec<String>) -> Result<()> {
    let (signing, lookup) = keys_for(salt, words)?;
    let registry = RegistryClient::new(portal_client(config)?);

    match registry
        .read(&signing.public_key(), &lookup)
        .await
        .context("reading registry entry")?
    {
        RegistryLookup::NotFound => println!("no registry entry for salt '{salt}'"),
        RegistryLookup::Found(entry) => {
            println!("  revision: {}", entry.revision);
            println!("  data:     {}", hex::encode(&entry.data));
            if let Ok(target) = Address::from_bytes(&entry.data) {
                println!("  address:  sia://{target}");
            }
        }
    }
    Ok(())
}

async fn cmd_pin(config: &SkykitConfig, address: &str) -> Result<()> {
    let address = parse_address(address)?;
    let pinned = portal_client(config)?
        .pin(&address)
        .await
        .with_context(|| format!("pinning {address}"))?;
    println!("sia://{pinned}");
    Ok(())
}

async fn cmd_metadata(config: &SkykitConfig, address: &str) -> Result<()> {
    let address = parse_address(address)?;
    let meta = portal_client(config)?
        .metadata(&address)
        .await
        .with_context(|| format!("fetching metadata for {address}"))?;

    println!("  length:   {}", meta.content_length);
    if let Some(content_type) = meta.content_type {
        println!("  type:     {content_type}");
    }
    if let Some(etag) = meta.etag {
        println!("  etag:     {etag}");
    }
    if let Some(skylink) = meta.skylink {
        println!("  address:  sia://{skylink}");
    }
    Ok(())
}

async fn cmd_health(config: &SkykitConfig) -> Result<()> {
    let client = portal_client(config)?;
    check_health(&client)
        .await
        .with_context(|| format!("portal {} is unhealthy", config.portal.url))?;
    println!("portal {} is healthy", config.portal.url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases_resolve() {
        for alias in ["g", "s", "gs", "generate-seed"] {
            let cli = Cli::try_parse_from(["skykit", alias]).unwrap();
            assert!(matches!(cli.command, Commands::GenerateSeed));
        }
        let cli = Cli::try_parse_from(["skykit", "v2", "salt", "a", "b"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::RegistryLink { ref salt, ref phrase } if salt == "salt" && phrase.len() == 2
        ));
        let cli = Cli::try_parse_from(["skykit", "utv", "addr", "salt"]).unwrap();
        assert!(matches!(cli.command, Commands::Publish { ref phrase, .. } if phrase.is_empty()));
        let cli = Cli::try_parse_from(["skykit", "ufd", "file.txt"]).unwrap();
        assert!(matches!(cli.command, Commands::UploadFileDry { .. }));
    }

    #[test]
    fn test_phrase_words_are_joined() {
        let phrase = read_phrase(vec!["abbey".into(), "afar".into()]).unwrap();
        assert_eq!(phrase.expose_secret(), "abbey afar");
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "skykit",
            "--config",
            "/nonexistent/skykit.toml",
            "--portal",
            "https://portal.example.com",
            "--api-key",
            "k",
            "health",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.portal.url, "https://portal.example.com");
        assert_eq!(config.portal.api_key.as_deref(), Some("k"));
    }
}
