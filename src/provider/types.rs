use serde::Deserialize;

/// Raw search result batch as returned by the content provider. These
/// shapes never cross the normalizer boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleBatch {
    #[serde(default)]
    pub data: Vec<ArticleHit>,
    /// Total result count reported by the provider, when present.
    #[serde(default)]
    pub hits: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleHit {
    #[serde(default)]
    pub entity: RawArticle,
}

/// One provider-native article record. Every field is optional here; the
/// normalizer decides what is required and what gets defaulted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawArticle {
    pub id: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub date: Option<RawDate>,
    pub sentiment: Option<f64>,
    pub site_name: Option<String>,
    pub publisher_region: Option<String>,
    pub categories: Vec<RawCategory>,
    pub tags: Vec<RawTag>,
    pub author: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDate {
    /// Millisecond epoch.
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCategory {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTag {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sentiment: f64,
    /// Type-taxonomy URIs, e.g. `"https://schema.org/Organization"`.
    #[serde(default)]
    pub types: Vec<String>,
}
