use crate::{
    api::{
        WireId,
        client::{authorize, build_client},
    },
    catalog::{CategoryNode, CategorySource, CategorySourceError, CategoryTree},
    config,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RemoteCategory {
    id: WireId,
    slug: String,
    name: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "parent")]
    parent_id: Option<WireId>,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryPage {
    List(Vec<RemoteCategory>),
    Paged { results: Vec<RemoteCategory> },
}

impl From<RemoteCategory> for CategoryNode {
    fn from(remote: RemoteCategory) -> Self {
        Self {
            id: remote.id.into_string(),
            slug: remote.slug,
            name: remote.name,
            icon: remote.icon,
            description: remote.description,
            parent_id: remote.parent_id.map(WireId::into_string),
        }
    }
}

/// Reads the active category tree from `{base}/listings/categories`.
#[derive(Debug, Clone)]
pub struct HttpCategorySource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCategorySource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_env() -> Self {
        Self::new(config::LISTING_API_URL.as_str(), config::LISTING_API_TOKEN.clone())
    }
}

impl CategorySource for HttpCategorySource {
    async fn fetch_tree(&self) -> Result<CategoryTree, CategorySourceError> {
        let url = format!("{}/listings/categories", self.base_url);
        let response = authorize(self.client.get(url), self.token.as_deref())
            .send()
            .await
            .map_err(|err| CategorySourceError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(CategorySourceError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let page: CategoryPage = response
            .json()
            .await
            .map_err(|err| CategorySourceError::Request(err.to_string()))?;
        let remote = match page {
            CategoryPage::List(items) | CategoryPage::Paged { results: items } => items,
        };
        let nodes: Vec<CategoryNode> = remote
            .into_iter()
            .filter(|category| category.is_active)
            .map(CategoryNode::from)
            .collect();
        if nodes.is_empty() {
            return Err(CategorySourceError::Empty);
        }
        info!(target = "wizard.api", categories = nodes.len(), "category_tree_loaded");
        Ok(CategoryTree::new(nodes))
    }
}
