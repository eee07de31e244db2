use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::CategoryId;
use crate::error::NichesError;

pub const DEFAULT_ENDPOINT: &str =
    "https://analitika.woysa.club/images/panel/json/download/niches.php";
pub const CONFIG_FILE_NAME: &str = "niche-harvest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: u64,
    pub max: u64,
}

impl Range {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NicheFilters {
    pub price: Range,
    pub up_vy: Range,
    pub up_vy_pr: Range,
    pub sum: Range,
    pub feedbacks: Range,
    pub trend: bool,
    pub sort: String,
    pub sort_dir: i8,
}

impl Default for NicheFilters {
    fn default() -> Self {
        Self {
            price: Range::new(0, 1_060_225),
            up_vy: Range::new(0, 108_682_515),
            up_vy_pr: Range::new(0, 2_900),
            sum: Range::new(1_000, 82_432_725),
            feedbacks: Range::new(0, 32_767),
            trend: false,
            sort: "sum_sale".to_string(),
            sort_dir: -1,
        }
    }
}

impl NicheFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let ranges = [
            ("price_min", "price_max", self.price),
            ("up_vy_min", "up_vy_max", self.up_vy),
            ("up_vy_pr_min", "up_vy_pr_max", self.up_vy_pr),
            ("sum_min", "sum_max", self.sum),
            ("feedbacks_min", "feedbacks_max", self.feedbacks),
        ];
        let mut pairs = Vec::with_capacity(ranges.len() * 2 + 3);
        for (min_key, max_key, range) in ranges {
            pairs.push((min_key, range.min.to_string()));
            pairs.push((max_key, range.max.to_string()));
        }
        pairs.push(("trend", self.trend.to_string()));
        pairs.push(("sort", self.sort.clone()));
        pairs.push(("sort_dir", self.sort_dir.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestConfig {
    pub endpoint: String,
    pub filters: NicheFilters,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub page_size: u64,
    pub start_offset: u64,
    pub backoff_delay: Duration,
    pub max_backoff: Duration,
    pub max_pages: Option<u32>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            filters: NicheFilters::default(),
            max_concurrency: 10,
            max_retries: 5,
            request_timeout: Duration::from_secs(5),
            page_size: 100,
            start_offset: 0,
            backoff_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            max_pages: None,
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<(), NichesError> {
        if self.max_concurrency == 0 {
            return Err(NichesError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(NichesError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(NichesError::InvalidConfig(
                "request_timeout must be positive".to_string(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(NichesError::InvalidConfig(
                "max_pages must be at least 1 when set".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(NichesError::InvalidConfig("endpoint is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub filters: Option<NicheFilters>,
    #[serde(default)]
    pub categories: Option<CategoriesEntry>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub start_offset: Option<u64>,
    #[serde(default)]
    pub backoff_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CategoriesEntry {
    Spec(String),
    List(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub harvest: HarvestConfig,
    pub categories: Vec<CategoryId>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Path>) -> Result<ResolvedConfig, NichesError> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(NichesError::MissingConfig(path.to_path_buf()));
                }
                Some(path.to_path_buf())
            }
            None => default_config_paths().into_iter().find(|p| p.exists()),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Self::resolve_config(ConfigFile::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| NichesError::ConfigRead(config_path.clone()))?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|err| NichesError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path.display(), "loaded config file");

        Self::resolve_config(file)
    }

    pub fn resolve_config(file: ConfigFile) -> Result<ResolvedConfig, NichesError> {
        let defaults = HarvestConfig::default();
        let harvest = HarvestConfig {
            endpoint: file.endpoint.unwrap_or(defaults.endpoint),
            filters: file.filters.unwrap_or(defaults.filters),
            max_concurrency: file.max_concurrency.unwrap_or(defaults.max_concurrency),
            max_retries: file.max_retries.unwrap_or(defaults.max_retries),
            request_timeout: file
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            page_size: file.page_size.unwrap_or(defaults.page_size),
            start_offset: file.start_offset.unwrap_or(defaults.start_offset),
            backoff_delay: file
                .backoff_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_delay),
            max_backoff: file
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            max_pages: file.max_pages.or(defaults.max_pages),
        };
        harvest.validate()?;

        let categories = match file.categories {
            Some(CategoriesEntry::Spec(spec)) => parse_categories(&spec)?,
            Some(CategoriesEntry::List(ids)) => ids.into_iter().map(CategoryId::new).collect(),
            None => Vec::new(),
        };

        Ok(ResolvedConfig {
            harvest,
            categories,
        })
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dirs) = ProjectDirs::from("", "", "niche-harvest") {
        paths.push(dirs.config_dir().join(CONFIG_FILE_NAME));
    }
    paths
}

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*(?:-|\.\.)\s*(\d+)\s*$").expect("category range regex")
});

const MAX_RANGE_LEN: u32 = 100_000;

/// Parses `1,2,5-9` (or `5..9`) into category ids, keeping first-seen order
/// and dropping duplicates.
pub fn parse_categories(spec: &str) -> Result<Vec<CategoryId>, NichesError> {
    let mut ids = Vec::new();
    for part in spec.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        if let Some(caps) = RANGE_RE.captures(part) {
            let start: u32 = caps[1]
                .parse()
                .map_err(|_| NichesError::InvalidCategory(part.trim().to_string()))?;
            let end: u32 = caps[2]
                .parse()
                .map_err(|_| NichesError::InvalidCategory(part.trim().to_string()))?;
            if start > end || end - start >= MAX_RANGE_LEN {
                return Err(NichesError::InvalidCategory(part.trim().to_string()));
            }
            ids.extend((start..=end).map(CategoryId::new));
        } else {
            ids.push(part.parse()?);
        }
    }

    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    Ok(ids)
}
