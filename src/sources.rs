//! The source table: which outlets are fetched and how their entries are labelled.
//!
//! Every outlet is described by one [`SourceConfig`] row. The same generic
//! fetcher is instantiated once per row, so adding an outlet is a data change,
//! not a code change. The table is built once at startup, either from the
//! built-in list below or from a YAML file, and never mutated afterwards.
//!
//! # YAML format
//!
//! ```yaml
//! - name: InfoMoney
//!   url: https://www.infomoney.com.br/feed/
//!   category: Mercado de Ações
//!   default_image: https://example.com/infomoney.jpg
//!   category_rules:
//!     - category: Criptomoedas
//!       keywords: [bitcoin, cripto]
//! ```

use itertools::Itertools;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing::{info, instrument};

/// The outlet that is always removed from the aggregated feed, whatever the
/// caller asks for.
pub const ALWAYS_EXCLUDED_SOURCE: &str = "Investing.com Brasil";

/// Stock photo used when neither the entry nor the source provides an image.
pub const FALLBACK_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1611974789855-9c2a0a7236a3?w=800&q=80";

/// A keyword rule that overrides the source's default category.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryRule {
    /// Category assigned when any keyword matches.
    pub category: String,
    /// Case-insensitive substrings searched in the title and content.
    pub keywords: Vec<String>,
}

/// One news outlet.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Fixed label written to every item's `source` field.
    pub name: String,
    /// RSS or Atom feed URL.
    pub url: String,
    /// Category used when no rule matches.
    pub category: String,
    /// Image used for entries that carry none.
    #[serde(default)]
    pub default_image: Option<String>,
    /// Evaluated in order; the first matching rule wins.
    #[serde(default)]
    pub category_rules: Vec<CategoryRule>,
}

impl SourceConfig {
    pub fn new(name: &str, url: &str, category: &str, default_image: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            default_image: Some(default_image.to_string()),
            category_rules: Vec::new(),
        }
    }

    fn with_rule(mut self, category: &str, keywords: &[&str]) -> Self {
        self.category_rules.push(CategoryRule {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        });
        self
    }

    /// Pick the category for an entry of this source.
    pub fn categorize(&self, title: &str, content: &str) -> String {
        let haystack = format!("{} {}", title, content).to_lowercase();
        self.category_rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
            })
            .map(|rule| rule.category.clone())
            .unwrap_or_else(|| self.category.clone())
    }
}

static BUILTIN_SOURCES: Lazy<Vec<SourceConfig>> = Lazy::new(|| {
    vec![
        SourceConfig::new(
            "InfoMoney",
            "https://www.infomoney.com.br/feed/",
            "Mercado de Ações",
            "https://images.unsplash.com/photo-1590283603385-17ffb3a7f29f?w=800&q=80",
        )
        .with_rule("Criptomoedas", &["bitcoin", "cripto", "ethereum"])
        .with_rule("Economia", &["inflação", "ipca", "selic", "copom", "pib"]),
        SourceConfig::new(
            "Money Times",
            "https://www.moneytimes.com.br/feed/",
            "Mercado de Ações",
            "https://images.unsplash.com/photo-1642790106117-e829e14a795f?w=800&q=80",
        )
        .with_rule("Criptomoedas", &["bitcoin", "cripto"]),
        SourceConfig::new(
            "Exame",
            "https://exame.com/feed/",
            "Economia",
            "https://images.unsplash.com/photo-1526304640581-d334cdbbf45e?w=800&q=80",
        )
        .with_rule("Mercado de Ações", &["ibovespa", "ações", "bolsa"]),
        SourceConfig::new(
            "Valor Econômico",
            "https://pox.globo.com/rss/valor",
            "Economia",
            "https://images.unsplash.com/photo-1535320903710-d993d3d77d29?w=800&q=80",
        )
        .with_rule("Mercado de Ações", &["ibovespa", "ações", "b3"]),
        SourceConfig::new(
            "G1 Economia",
            "https://g1.globo.com/rss/g1/economia/",
            "Economia",
            "https://images.unsplash.com/photo-1554224155-6726b3ff858f?w=800&q=80",
        ),
        SourceConfig::new(
            "CNN Brasil Economia",
            "https://www.cnnbrasil.com.br/economia/feed/",
            "Economia",
            "https://images.unsplash.com/photo-1604594849809-dfedbc827105?w=800&q=80",
        )
        .with_rule("Mercado de Ações", &["ibovespa", "ações", "bolsa"]),
        SourceConfig::new(
            "Investing.com Brasil",
            "https://br.investing.com/rss/news.rss",
            "Mercado de Ações",
            "https://images.unsplash.com/photo-1611974789855-9c2a0a7236a3?w=800&q=80",
        ),
        SourceConfig::new(
            "Bloomberg Markets",
            "https://feeds.bloomberg.com/markets/news.rss",
            "Mercado Internacional",
            "https://images.unsplash.com/photo-1460925895917-afdab827c52f?w=800&q=80",
        ),
        SourceConfig::new(
            "Folha Mercado",
            "https://feeds.folha.uol.com.br/mercado/rss091.xml",
            "Economia",
            "https://images.unsplash.com/photo-1579532537598-459ecdaf39cc?w=800&q=80",
        ),
        SourceConfig::new(
            "E-Investidor",
            "https://einvestidor.estadao.com.br/feed/",
            "Investimentos",
            "https://images.unsplash.com/photo-1559526324-4b87b5e36e44?w=800&q=80",
        )
        .with_rule("Criptomoedas", &["bitcoin", "cripto"]),
    ]
});

/// Immutable list of configured outlets.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    sources: Vec<SourceConfig>,
}

impl SourceTable {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }

    /// The ten outlets compiled into the binary.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_SOURCES.clone())
    }

    /// Parse a YAML list of [`SourceConfig`] rows.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        let table = Self::new(serde_yaml::from_str(yaml)?);
        if table.is_empty() {
            return Err("source table is empty".into());
        }
        let duplicated: Vec<&str> = table.iter().map(|s| s.name.as_str()).duplicates().collect();
        if !duplicated.is_empty() {
            return Err(format!("duplicate source labels: {}", duplicated.join(", ")).into());
        }
        Ok(table)
    }

    /// Load the table from `path`, or fall back to the built-in list.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let table = match path {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path).await?;
                Self::from_yaml(&yaml)?
            }
            None => Self::builtin(),
        };
        info!(count = table.len(), "Loaded source table");
        Ok(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Default image configured for the outlet labelled `name`.
    pub fn default_image(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|s| s.default_image.as_deref())
    }
}
