//! Configuration, credentials and data directory management.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_NODE: &str = "https://api.hive.blog";

/// Origin markers whose posts are never offered to opportunistic queues.
pub const DEFAULT_EXCLUDED_APPS: &[&str] = &["exhaust", "3speak", "VIMM", "aureal", "actifit"];

/// Paths to all SilentBot data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Checkpoint document (`data/sb-backup.json`).
    pub checkpoint_file: PathBuf,
    /// Bot configuration (`data/silentbot.json`).
    pub config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            checkpoint_file: root.join("sb-backup.json"),
            config_file: root.join("silentbot.json"),
            root,
        })
    }

    /// Resolve from `SILENTBOT_DATA_DIR` and `SILENTBOT_CONFIG`, defaulting to `data/`.
    pub fn from_env() -> std::io::Result<Self> {
        let root = std::env::var("SILENTBOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let mut paths = Self::new(root)?;
        if let Ok(config) = std::env::var("SILENTBOT_CONFIG") {
            paths.config_file = PathBuf::from(config);
        }
        Ok(paths)
    }
}

/// Link and icon posted as the bot's answer, plus the vote weight it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub link: String,
    pub icon: String,
    /// Vote weight in hundredths of a percent. Unused for abuse responses.
    #[serde(default)]
    pub percentage: i32,
}

impl ResponseEntry {
    /// Markup of the answer comment.
    pub fn body(&self) -> String {
        format!("<A HREF=\"{}\"><IMG SRC=\"{}\"></A>", self.link, self.icon)
    }
}

/// Star rating answers, indexed by star count minus one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarResponses {
    /// Posts that pay out part of their rewards liquid.
    pub standard: Vec<ResponseEntry>,
    /// Posts that pay out fully powered up.
    pub power_up: Vec<ResponseEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseResponses {
    pub spam: ResponseEntry,
    pub tag: ResponseEntry,
}

/// Top-level bot configuration (persisted as `silentbot.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Account curators mention; also posts all answers and votes itself.
    pub bot: String,
    /// Additional voting accounts, serviced in this order before the bot.
    #[serde(default)]
    pub voters: Vec<String>,
    #[serde(default)]
    pub curators: Vec<String>,
    /// Community tag a post must carry to be star-rated.
    pub tribe: String,
    /// At least one of these must be present on a star-rated post.
    pub tags: Vec<String>,
    pub responses: StarResponses,
    pub abuse: AbuseResponses,
    #[serde(default = "default_excluded_apps")]
    pub excluded_apps: Vec<String>,
    #[serde(default = "default_node")]
    pub node: String,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_excluded_apps() -> Vec<String> {
    DEFAULT_EXCLUDED_APPS.iter().map(|s| s.to_string()).collect()
}
fn default_node() -> String {
    DEFAULT_NODE.into()
}
fn default_retry_delay() -> u64 {
    5
}

impl BotConfig {
    /// Load and validate the configuration file. `SILENTBOT_NODE` overrides the node URL.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: BotConfig = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;

        if let Ok(node) = std::env::var("SILENTBOT_NODE") {
            config.node = node;
        }

        config.validate()?;
        info!(
            "Loaded configuration for @{}: {} voting accounts, {} curators",
            config.bot,
            config.voting_accounts().len(),
            config.curators.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot.is_empty() {
            return Err(Error::Config("bot account name is empty".into()));
        }
        if self.tribe.is_empty() {
            return Err(Error::Config("tribe is empty".into()));
        }
        if self.tags.is_empty() {
            return Err(Error::Config("no curation tags configured".into()));
        }
        for (name, table) in [
            ("standard", &self.responses.standard),
            ("power_up", &self.responses.power_up),
        ] {
            if table.len() != 5 {
                return Err(Error::Config(format!(
                    "responses.{} must have 5 entries, found {}",
                    name,
                    table.len()
                )));
            }
            if let Some(entry) = table.iter().find(|e| !(0..=10_000).contains(&e.percentage)) {
                return Err(Error::Config(format!(
                    "responses.{} percentage {} outside 0..=10000",
                    name, entry.percentage
                )));
            }
        }
        Ok(())
    }

    /// Voting accounts in service order: configured voters, then the bot.
    pub fn voting_accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = Vec::with_capacity(self.voters.len() + 1);
        for account in self.voters.iter().chain(std::iter::once(&self.bot)) {
            if !accounts.contains(account) {
                accounts.push(account.clone());
            }
        }
        accounts
    }

    /// Answer for a star rating. `stars` is clamped into 1..=5.
    pub fn star_response(&self, power_up: bool, stars: u8) -> &ResponseEntry {
        let table = if power_up {
            &self.responses.power_up
        } else {
            &self.responses.standard
        };
        &table[usize::from(stars.clamp(1, 5)) - 1]
    }
}

/// Private posting keys (WIF) per account.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    /// Environment variable holding an account's key: `ALICE_WIF` for `alice`.
    pub fn env_var_name(account: &str) -> String {
        let sanitized: String = account
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_WIF", sanitized)
    }

    /// Read every account's key from the environment. Any missing key is fatal.
    pub fn from_env(accounts: &[String]) -> Result<Self> {
        Self::from_lookup(accounts, |var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(accounts: &[String], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = HashMap::new();
        for account in accounts {
            let var = Self::env_var_name(account);
            match lookup(&var) {
                Some(key) if !key.trim().is_empty() => {
                    keys.insert(account.clone(), key.trim().to_string());
                }
                _ => {
                    return Err(Error::Config(format!(
                        "{} environment variable not set",
                        var
                    )))
                }
            }
        }
        Ok(Self { keys })
    }

    pub fn get(&self, account: &str) -> Option<&str> {
        self.keys.get(account).map(String::as_str)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accounts: Vec<&String> = self.keys.keys().collect();
        accounts.sort();
        f.debug_struct("Credentials")
            .field("accounts", &accounts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(percentage: i32) -> serde_json::Value {
        serde_json::json!({"link": "https://example.com", "icon": "https://example.com/i.png", "percentage": percentage})
    }

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "bot": "silentbot",
            "voters": ["alice", "silentbot", "bob"],
            "curators": ["carol"],
            "tribe": "creativecoin",
            "tags": ["art", "music"],
            "responses": {
                "standard": [entry(2000), entry(4000), entry(6000), entry(8000), entry(9950)],
                "power_up": [entry(2500), entry(5000), entry(7500), entry(9000), entry(10000)],
            },
            "abuse": {"spam": entry(0), "tag": entry(0)},
        })
    }

    #[test]
    fn test_defaults_applied() {
        let config: BotConfig = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(config.node, DEFAULT_NODE);
        assert_eq!(config.retry_delay_secs, 5);
        assert!(config.excluded_apps.iter().any(|a| a == "3speak"));
        config.validate().unwrap();
    }

    #[test]
    fn test_voting_accounts_order_and_dedup() {
        let config: BotConfig = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(config.voting_accounts(), vec!["alice", "silentbot", "bob"]);

        let mut config = config;
        config.voters = vec!["bob".into()];
        assert_eq!(config.voting_accounts(), vec!["bob", "silentbot"]);
    }

    #[test]
    fn test_star_response_lookup_clamps() {
        let config: BotConfig = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(config.star_response(false, 1).percentage, 2000);
        assert_eq!(config.star_response(false, 5).percentage, 9950);
        assert_eq!(config.star_response(true, 5).percentage, 10000);
        assert_eq!(config.star_response(true, 0).percentage, 2500);
        assert_eq!(config.star_response(true, 9).percentage, 10000);
    }

    #[test]
    fn test_validate_rejects_short_table() {
        let mut json = sample_json();
        json["responses"]["standard"] = serde_json::json!([entry(100)]);
        let config: BotConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silentbot.json");
        std::fs::write(&path, sample_json().to_string()).unwrap();
        let config = BotConfig::load(&path).unwrap();
        assert_eq!(config.bot, "silentbot");

        let missing = BotConfig::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_env_var_name() {
        assert_eq!(Credentials::env_var_name("silentbot"), "SILENTBOT_WIF");
        assert_eq!(Credentials::env_var_name("foo.bar-baz"), "FOO_BAR_BAZ_WIF");
    }

    #[test]
    fn test_credentials_missing_key_is_fatal() {
        let accounts = vec!["alice".to_string(), "bob".to_string()];
        let result = Credentials::from_lookup(&accounts, |var| {
            (var == "ALICE_WIF").then(|| "5Kkey".to_string())
        });
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("BOB_WIF")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_credentials_debug_hides_keys() {
        let accounts = vec!["alice".to_string()];
        let creds = Credentials::from_lookup(&accounts, |_| Some("5Ksecret".into())).unwrap();
        assert_eq!(creds.get("alice"), Some("5Ksecret"));
        assert!(!format!("{:?}", creds).contains("5Ksecret"));
    }

    #[test]
    fn test_data_paths() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data")).unwrap();
        assert!(paths.root.exists());
        assert!(paths.checkpoint_file.ends_with("sb-backup.json"));
    }
}
