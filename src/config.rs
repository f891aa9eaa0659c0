use crate::datasource::horizon::DEFAULT_HORIZON_URL;
use crate::domain::{normalize_asset_key, Address, Decimal, FundAccount, TokenFilter};
use crate::engine::classifier::{
    DEFAULT_DIVIDEND_PATTERNS, DEFAULT_OPEX_PATTERNS, DEFAULT_REPAY_PATTERNS,
};
use crate::engine::{
    ClassificationRules, CounterpartyScope, MappingRules, RoleFilter, DEFAULT_PROJECT_ID_PATTERN,
};
use crate::orchestration::{MemoOptions, SyncOptions};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub horizon_url: String,
    pub fund_accounts: Vec<FundAccount>,
    pub projects_file: PathBuf,
    pub residents_file: PathBuf,
    pub accounts_file: Option<PathBuf>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub token_filter: TokenFilter,
    pub relax_role_filter: bool,
    pub counterparty_scope: CounterpartyScope,
    pub include_native_xlm: bool,
    /// Normalized `CODE:ISSUER` keys.
    pub asset_allowlist: Vec<String>,
    pub asset_blocklist: Vec<String>,
    pub min_amount: Decimal,
    pub classify_enable: bool,
    pub memo_patterns_repay: String,
    pub memo_patterns_dividend: String,
    pub memo_patterns_opex: String,
    pub project_id_regex: String,
    pub memo_cache_ttl_secs: i64,
    pub max_memo_fetch_per_run: usize,
    pub page_limit: u32,
    /// Row tag per fund key.
    pub fund_tags: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue(name.to_string(), reason.into())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            env_map
                .get(name)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        };
        let required = |name: &str| {
            get(name)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
        };

        let database_path = required("DATABASE_PATH")?;
        let horizon_url = get("HORIZON_URL")
            .unwrap_or(DEFAULT_HORIZON_URL)
            .to_string();
        let fund_accounts = parse_fund_accounts(&required("FUND_ACCOUNTS")?)?;
        let projects_file = PathBuf::from(required("PROJECTS_FILE")?);
        let residents_file = PathBuf::from(required("RESIDENTS_FILE")?);
        let accounts_file = get("ACCOUNTS_FILE").map(PathBuf::from);

        let start_date = get("START_DATE")
            .map(|s| parse_date("START_DATE", s))
            .transpose()?;
        let end_date = get("END_DATE")
            .map(|s| parse_date("END_DATE", s))
            .transpose()?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(invalid("END_DATE", "must not be before START_DATE"));
            }
        }

        let token_filter = TokenFilter::parse(get("TOKEN_FILTER").unwrap_or(""));
        let relax_role_filter = parse_bool("RELAX_ROLE_FILTER", get("RELAX_ROLE_FILTER"), false)?;
        let counterparty_scope =
            CounterpartyScope::parse(get("COUNTERPARTY_SCOPE").unwrap_or_default());
        let include_native_xlm =
            parse_bool("INCLUDE_NATIVE_XLM", get("INCLUDE_NATIVE_XLM"), false)?;
        let asset_allowlist = parse_asset_list(get("ASSET_ALLOWLIST"));
        let asset_blocklist = parse_asset_list(get("ASSET_BLOCKLIST"));

        let min_amount = Decimal::from_str_canonical(get("MIN_AMOUNT").unwrap_or("0.01"))
            .map_err(|_| invalid("MIN_AMOUNT", "must be a decimal number"))?;

        let classify_enable = parse_bool("CLASSIFY_ENABLE", get("CLASSIFY_ENABLE"), true)?;
        let memo_patterns_repay = get("MEMO_PATTERNS_REPAY")
            .unwrap_or(DEFAULT_REPAY_PATTERNS)
            .to_string();
        let memo_patterns_dividend = get("MEMO_PATTERNS_DIVIDEND")
            .unwrap_or(DEFAULT_DIVIDEND_PATTERNS)
            .to_string();
        let memo_patterns_opex = get("MEMO_PATTERNS_OPEX")
            .unwrap_or(DEFAULT_OPEX_PATTERNS)
            .to_string();

        let project_id_regex = get("PROJECT_ID_REGEX")
            .unwrap_or(DEFAULT_PROJECT_ID_PATTERN)
            .to_string();
        MappingRules::new(&project_id_regex)
            .map_err(|e| invalid("PROJECT_ID_REGEX", e.to_string()))?;

        let memo_cache_ttl_secs = parse_number::<i64>("MEMO_CACHE_TTL_SECS", get("MEMO_CACHE_TTL_SECS"), 21_600)?;
        let max_memo_fetch_per_run =
            parse_number::<usize>("MAX_MEMO_FETCH_PER_RUN", get("MAX_MEMO_FETCH_PER_RUN"), 300)?;
        let page_limit = parse_number::<u32>("PAGE_LIMIT", get("PAGE_LIMIT"), 200)?;
        if page_limit == 0 || page_limit > 200 {
            return Err(invalid("PAGE_LIMIT", "must be between 1 and 200"));
        }

        let fund_tags = parse_key_values("FUND_TAGS", get("FUND_TAGS").unwrap_or(""))?
            .into_iter()
            .collect();

        Ok(Config {
            database_path,
            horizon_url,
            fund_accounts,
            projects_file,
            residents_file,
            accounts_file,
            start_date,
            end_date,
            token_filter,
            relax_role_filter,
            counterparty_scope,
            include_native_xlm,
            asset_allowlist,
            asset_blocklist,
            min_amount,
            classify_enable,
            memo_patterns_repay,
            memo_patterns_dividend,
            memo_patterns_opex,
            project_id_regex,
            memo_cache_ttl_secs,
            max_memo_fetch_per_run,
            page_limit,
            fund_tags,
        })
    }

    pub fn classification_rules(&self) -> ClassificationRules {
        ClassificationRules::from_pipe_lists(
            self.classify_enable,
            &self.memo_patterns_repay,
            &self.memo_patterns_dividend,
            &self.memo_patterns_opex,
        )
    }

    /// # Errors
    /// Only if the pattern changed after validation in `from_env_map`.
    pub fn mapping_rules(&self) -> Result<MappingRules, ConfigError> {
        MappingRules::new(&self.project_id_regex)
            .map_err(|e| invalid("PROJECT_ID_REGEX", e.to_string()))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            start: self
                .start_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt)),
            end_exclusive: self
                .end_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt) + Duration::days(1)),
            token_filter: self.token_filter.clone(),
            role_filter: RoleFilter::new(self.counterparty_scope, self.relax_role_filter),
            include_native: self.include_native_xlm,
            asset_allowlist: self.asset_allowlist.clone(),
            asset_blocklist: self.asset_blocklist.clone(),
            min_amount: self.min_amount,
            page_limit: self.page_limit,
            fund_tags: self.fund_tags.clone(),
        }
    }

    pub fn memo_options(&self) -> MemoOptions {
        MemoOptions {
            max_per_run: self.max_memo_fetch_per_run,
            cache_ttl_secs: self.memo_cache_ttl_secs,
            ..MemoOptions::default()
        }
    }
}

fn parse_key_values(name: &str, raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| invalid(name, format!("expected KEY=VALUE, got {}", entry)))?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(invalid(name, format!("expected KEY=VALUE, got {}", entry)));
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_fund_accounts(raw: &str) -> Result<Vec<FundAccount>, ConfigError> {
    let mut funds: Vec<FundAccount> = Vec::new();
    for (key, address) in parse_key_values("FUND_ACCOUNTS", raw)? {
        let address = Address::new(address);
        if !address.is_account_key() {
            return Err(invalid(
                "FUND_ACCOUNTS",
                format!("{} is not an account address", address),
            ));
        }
        if funds.iter().any(|f| f.key == key) {
            return Err(invalid("FUND_ACCOUNTS", format!("duplicate key {}", key)));
        }
        funds.push(FundAccount { key, address });
    }
    if funds.is_empty() {
        return Err(invalid("FUND_ACCOUNTS", "at least one fund account is required"));
    }
    Ok(funds)
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid(name, "must be YYYY-MM-DD"))
}

fn parse_bool(name: &str, raw: Option<&str>, default: bool) -> Result<bool, ConfigError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(invalid(name, format!("must be TRUE or FALSE, got {}", other))),
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &str,
    raw: Option<&str>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .parse::<T>()
            .map_err(|_| invalid(name, format!("must be a non-negative integer, got {}", s))),
    }
}

fn parse_asset_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_asset_key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "FUND_ACCOUNTS".to_string(),
            "MAIN=GFUNDMAIN, RESERVE=GFUNDRESERVE".to_string(),
        );
        map.insert("PROJECTS_FILE".to_string(), "projects.csv".to_string());
        map.insert("RESIDENTS_FILE".to_string(), "residents.csv".to_string());
        map
    }

    fn expect_invalid(env_map: HashMap<String, String>, name: &str) {
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, name),
            other => panic!("Expected InvalidValue for {}, got {:?}", name, other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.horizon_url, "https://horizon.stellar.org");
        assert_eq!(config.fund_accounts.len(), 2);
        assert_eq!(config.fund_accounts[1].key, "RESERVE");
        assert_eq!(config.counterparty_scope, CounterpartyScope::FundResidentOnly);
        assert!(config.classify_enable);
        assert!(!config.include_native_xlm);
        assert_eq!(config.min_amount.to_canonical_string(), "0.01");
        assert_eq!(config.memo_cache_ttl_secs, 21_600);
        assert_eq!(config.max_memo_fetch_per_run, 300);
        assert_eq!(config.page_limit, 200);
        assert!(config.token_filter.is_empty());
        assert_eq!(config.classification_rules().repay_patterns.len(), 5);
    }

    #[test]
    fn test_missing_required() {
        for name in ["DATABASE_PATH", "FUND_ACCOUNTS", "PROJECTS_FILE", "RESIDENTS_FILE"] {
            let mut env_map = setup_required_env();
            env_map.remove(name);
            match Config::from_env_map(env_map) {
                Err(ConfigError::MissingEnv(s)) => assert_eq!(s, name),
                other => panic!("Expected MissingEnv for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_invalid_fund_accounts() {
        let mut env_map = setup_required_env();
        env_map.insert("FUND_ACCOUNTS".to_string(), "MAIN".to_string());
        expect_invalid(env_map, "FUND_ACCOUNTS");

        let mut env_map = setup_required_env();
        env_map.insert("FUND_ACCOUNTS".to_string(), "MAIN=XNOTANACCOUNT".to_string());
        expect_invalid(env_map, "FUND_ACCOUNTS");

        let mut env_map = setup_required_env();
        env_map.insert("FUND_ACCOUNTS".to_string(), "A=GONE,A=GTWO".to_string());
        expect_invalid(env_map, "FUND_ACCOUNTS");
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("START_DATE", "01.03.2024"),
            ("MIN_AMOUNT", "lots"),
            ("RELAX_ROLE_FILTER", "maybe"),
            ("PROJECT_ID_REGEX", "("),
            ("PAGE_LIMIT", "500"),
            ("MAX_MEMO_FETCH_PER_RUN", "-1"),
            ("FUND_TAGS", "MAIN"),
        ];
        for (name, value) in cases {
            let mut env_map = setup_required_env();
            env_map.insert(name.to_string(), value.to_string());
            expect_invalid(env_map, name);
        }
    }

    #[test]
    fn test_end_before_start_is_invalid() {
        let mut env_map = setup_required_env();
        env_map.insert("START_DATE".to_string(), "2024-03-10".to_string());
        env_map.insert("END_DATE".to_string(), "2024-03-01".to_string());
        expect_invalid(env_map, "END_DATE");
    }

    #[test]
    fn test_sync_options_date_window() {
        let mut env_map = setup_required_env();
        env_map.insert("START_DATE".to_string(), "2024-03-01".to_string());
        env_map.insert("END_DATE".to_string(), "2024-03-31".to_string());
        env_map.insert("RELAX_ROLE_FILTER".to_string(), "TRUE".to_string());
        env_map.insert("COUNTERPARTY_SCOPE".to_string(), "ALL_RELEVANT".to_string());
        env_map.insert(
            "ASSET_ALLOWLIST".to_string(),
            "eurmtl/GISSUER, usdc gi2".to_string(),
        );
        env_map.insert("FUND_TAGS".to_string(), "MAIN=D".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        let options = config.sync_options();

        assert_eq!(
            options.start.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(
            options.end_exclusive.unwrap().to_rfc3339(),
            "2024-04-01T00:00:00+00:00"
        );
        assert!(options.role_filter.relax_role_filter);
        assert_eq!(options.role_filter.scope, CounterpartyScope::AllRelevant);
        assert_eq!(options.asset_allowlist, vec!["EURMTL:GISSUER", "USDC:GI2"]);
        assert_eq!(options.fund_tags.get("MAIN").map(String::as_str), Some("D"));
    }
}
