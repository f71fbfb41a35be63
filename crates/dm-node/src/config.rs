//! Node configuration from environment variables.

use dm_registry::config::{ConfigError, MarketConfig, DEFAULT_MARKET_ADDRESS};
use dm_registry::domain::value_objects::Address;
use std::env;
use std::path::PathBuf;

/// Configuration of a dataset market node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Marketplace settings.
    pub market: MarketConfig,
    /// Log filter directive (trace, debug, info, warn, error, or a full filter).
    pub log_level: String,
    /// Emit logs as JSON.
    pub json_logs: bool,
    /// Where the ledger snapshot is kept. No persistence when unset.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            log_level: "info".to_string(),
            json_logs: false,
            snapshot_path: None,
        }
    }
}

impl NodeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DM_ADMIN`: Platform admin identity, `0x`-prefixed hex (required)
    /// - `DM_MARKET_ADDRESS`: Spender identity buyers approve (default: `0xd5d5...d5`)
    /// - `DM_TOKENS`: Seeded payment tokens, `0xaddr:SYMBOL,0xaddr:SYMBOL`
    /// - `DM_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `DM_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `DM_SNAPSHOT_PATH`: Snapshot file (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin = match lookup("DM_ADMIN") {
            Some(value) => parse_address("DM_ADMIN", &value)?,
            None => Address::ZERO,
        };
        let market_address = match lookup("DM_MARKET_ADDRESS") {
            Some(value) => parse_address("DM_MARKET_ADDRESS", &value)?,
            None => DEFAULT_MARKET_ADDRESS,
        };
        let initial_tokens = match lookup("DM_TOKENS") {
            Some(value) => parse_tokens(&value)?,
            None => Vec::new(),
        };

        let market = MarketConfig {
            admin,
            market_address,
            initial_tokens,
        };
        market.validate()?;

        Ok(Self {
            market,
            log_level: lookup("DM_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),
            json_logs: lookup("DM_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            snapshot_path: lookup("DM_SNAPSHOT_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("{e}"),
    })
}

/// Parse `0xaddr:SYMBOL` pairs separated by commas. Blank entries are skipped.
fn parse_tokens(value: &str) -> Result<Vec<(Address, String)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (address, symbol) =
                entry
                    .split_once(':')
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: "DM_TOKENS".to_string(),
                        reason: format!("expected 0xaddr:SYMBOL, got {entry:?}"),
                    })?;
            Ok((parse_address("DM_TOKENS", address)?, symbol.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ADMIN_HEX: &str = "0xadadadadadadadadadadadadadadadadadadadad";
    const USDC_HEX: &str = "0x7070707070707070707070707070707070707070";
    const DAI_HEX: &str = "0x7171717171717171717171717171717171717171";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_full_config() {
        let tokens = format!("{USDC_HEX}:USDC, {DAI_HEX}:DAI");
        let config = NodeConfig::from_lookup(lookup(&[
            ("DM_ADMIN", ADMIN_HEX),
            ("DM_TOKENS", &tokens),
            ("DM_LOG_LEVEL", "debug"),
            ("DM_JSON_LOGS", "1"),
            ("DM_SNAPSHOT_PATH", "/tmp/ledger.json"),
        ]))
        .unwrap();

        assert_eq!(config.market.admin, Address::repeat_byte(0xad));
        assert_eq!(config.market.market_address, DEFAULT_MARKET_ADDRESS);
        assert_eq!(
            config.market.initial_tokens,
            vec![
                (Address::repeat_byte(0x70), "USDC".to_string()),
                (Address::repeat_byte(0x71), "DAI".to_string()),
            ]
        );
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/ledger.json")));
    }

    #[test]
    fn test_rust_log_fallback() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("DM_ADMIN", ADMIN_HEX),
            ("RUST_LOG", "warn"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "warn");
        assert!(!config.json_logs);
        assert!(config.snapshot_path.is_none());
    }

    #[test]
    fn test_missing_admin_rejected() {
        assert_eq!(
            NodeConfig::from_lookup(lookup(&[])),
            Err(ConfigError::ZeroAdmin)
        );
    }

    #[test]
    fn test_malformed_values() {
        let bad_admin = NodeConfig::from_lookup(lookup(&[("DM_ADMIN", "0x1234")]));
        assert!(matches!(
            bad_admin,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "DM_ADMIN"
        ));

        let bad_tokens = NodeConfig::from_lookup(lookup(&[
            ("DM_ADMIN", ADMIN_HEX),
            ("DM_TOKENS", USDC_HEX),
        ]));
        assert!(matches!(
            bad_tokens,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "DM_TOKENS"
        ));
    }
}
