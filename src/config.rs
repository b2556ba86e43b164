use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ak_report_core::ranking::{UndefinedNdcg, DEFAULT_EMAIL_RESULTS, DEFAULT_THREAD_RESULTS};
use ak_report_core::relevance::DEFAULT_MAX_AK_SAMPLE;
use ak_report_core::tags::{DEFAULT_NEGATIVE_TAGS, DEFAULT_POSITIVE_TAGS};
use ak_report_core::walk::DEFAULT_PAGE_SIZE;
use ak_report_core::{TagClassifier, TagSet};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub relevance: RelevanceConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub walk: WalkConfig,
    /// Named full-text queries, `name = "query"`.
    #[serde(default)]
    pub queries: BTreeMap<String, String>,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TagsConfig {
    #[serde(default = "default_positive")]
    pub positive: Vec<String>,
    #[serde(default = "default_negative")]
    pub negative: Vec<String>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            positive: default_positive(),
            negative: default_negative(),
        }
    }
}

fn default_positive() -> Vec<String> {
    DEFAULT_POSITIVE_TAGS.iter().map(|s| s.to_string()).collect()
}
fn default_negative() -> Vec<String> {
    DEFAULT_NEGATIVE_TAGS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RelevanceModeName {
    #[default]
    Ratio,
    NormalizedCount,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelevanceConfig {
    #[serde(default)]
    pub mode: RelevanceModeName,
    #[serde(default = "default_max_ak_sample")]
    pub max_ak_sample: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            mode: RelevanceModeName::default(),
            max_ak_sample: DEFAULT_MAX_AK_SAMPLE,
        }
    }
}

fn default_max_ak_sample() -> usize {
    DEFAULT_MAX_AK_SAMPLE
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_thread_results")]
    pub thread_results: usize,
    #[serde(default = "default_email_results")]
    pub email_results: usize,
    #[serde(default)]
    pub undefined_ndcg: UndefinedNdcg,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            thread_results: DEFAULT_THREAD_RESULTS,
            email_results: DEFAULT_EMAIL_RESULTS,
            undefined_ndcg: UndefinedNdcg::default(),
        }
    }
}

fn default_thread_results() -> usize {
    DEFAULT_THREAD_RESULTS
}
fn default_email_results() -> usize {
    DEFAULT_EMAIL_RESULTS
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatternsConfig {
    #[serde(default = "default_pattern_sizes")]
    pub sizes: Vec<usize>,
    #[serde(default = "default_skip_modes")]
    pub skip_modes: Vec<bool>,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            sizes: default_pattern_sizes(),
            skip_modes: default_skip_modes(),
        }
    }
}

fn default_pattern_sizes() -> Vec<usize> {
    vec![2, 3]
}
fn default_skip_modes() -> Vec<bool> {
    vec![false, true]
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalkConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub zip: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            zip: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

impl Config {
    /// Defaults for everything but the dataset location.
    pub fn minimal(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: DatasetConfig {
                path: dataset.into(),
            },
            tags: TagsConfig::default(),
            relevance: RelevanceConfig::default(),
            ranking: RankingConfig::default(),
            patterns: PatternsConfig::default(),
            walk: WalkConfig::default(),
            queries: BTreeMap::new(),
            report: ReportConfig::default(),
        }
    }

    pub fn positive_tags(&self) -> TagSet {
        TagSet::new(&self.tags.positive)
    }

    pub fn negative_tags(&self) -> TagSet {
        TagSet::new(&self.tags.negative)
    }

    pub fn classifier(&self) -> TagClassifier {
        TagClassifier::new(self.positive_tags(), self.negative_tags())
    }

    /// Positive tags in configured order, normalized and deduplicated.
    pub fn positive_tag_list(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for tag in &self.tags.positive {
            let tag = ak_report_core::tags::normalize_tag(tag);
            if !tag.is_empty() && !out.contains(&tag) {
                out.push(tag);
            }
        }
        out
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let positive = config.positive_tags();
    let negative = config.negative_tags();

    if positive.is_empty() {
        bail!("tags.positive must contain at least one tag");
    }
    if !positive.is_disjoint(&negative) {
        let shared: Vec<&str> = positive.iter().filter(|t| negative.contains(t)).collect();
        bail!(
            "tags.positive and tags.negative must not overlap (shared: {})",
            shared.join(", ")
        );
    }

    if config.relevance.max_ak_sample == 0 {
        bail!("relevance.max_ak_sample must be >= 1");
    }

    if config.ranking.thread_results == 0 || config.ranking.email_results == 0 {
        bail!("ranking.thread_results and ranking.email_results must be >= 1");
    }

    if config.walk.page_size == 0 {
        bail!("walk.page_size must be >= 1");
    }

    if config.patterns.sizes.iter().any(|s| *s == 0) {
        bail!("patterns.sizes must only contain sizes >= 1");
    }

    for (name, query) in &config.queries {
        if query.trim().is_empty() {
            bail!("queries.{} must not be empty", name);
        }
    }

    Ok(())
}
