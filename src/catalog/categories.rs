use crate::catalog::schema::SLUG_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CategorySourceError {
    #[error("category request failed: {0}")]
    Request(String),
    #[error("category tree is empty")]
    Empty,
}

/// One node of the category tree as delivered by the category source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl CategoryNode {
    pub fn new(id: &str, slug: &str, name: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            slug: slug.to_string(),
            name: name.to_string(),
            icon: None,
            description: None,
            parent_id: parent_id.map(str::to_string),
        }
    }

    fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }
}

/// Contract of the external category source; fetched once per process.
pub trait CategorySource {
    fn fetch_tree(&self) -> impl Future<Output = Result<CategoryTree, CategorySourceError>> + Send;
}

/// Flat, parent-linked category set with lookups the Category step needs.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    index: HashMap<String, usize>,
}

impl CategoryTree {
    pub fn new(nodes: Vec<CategoryNode>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(pos, node)| (node.id.clone(), pos))
            .collect();
        Self { nodes, index }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[CategoryNode] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&CategoryNode> {
        self.index.get(id).map(|pos| &self.nodes[*pos])
    }

    pub fn roots(&self) -> Vec<&CategoryNode> {
        self.children_of(None)
    }

    pub fn children_of(&self, parent_id: Option<&str>) -> Vec<&CategoryNode> {
        self.nodes
            .iter()
            .filter(|node| node.parent_id.as_deref() == parent_id)
            .collect()
    }

    pub fn is_leaf(&self, id: &str) -> bool {
        !self
            .nodes
            .iter()
            .any(|node| node.parent_id.as_deref() == Some(id))
    }

    /// Root-to-node chain, or `None` when the id (or one of its ancestors) is unknown.
    pub fn path_to(&self, id: &str) -> Option<Vec<CategoryNode>> {
        let mut path = Vec::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            let node = self.get(&current)?;
            if path.iter().any(|seen: &CategoryNode| seen.id == node.id) {
                return None;
            }
            path.push(node.clone());
            cursor = node.parent_id.clone();
        }
        path.reverse();
        Some(path)
    }
}

/// Joins the slugs of a category path into the key the schema resolver expects.
pub fn path_slug(path: &[CategoryNode]) -> String {
    path.iter()
        .map(|node| node.slug.trim_matches(SLUG_SEPARATOR))
        .collect::<Vec<_>>()
        .join(&SLUG_SEPARATOR.to_string())
}

/// Built-in tree used when no remote category service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCategorySource;

impl CategorySource for StaticCategorySource {
    async fn fetch_tree(&self) -> Result<CategoryTree, CategorySourceError> {
        Ok(demo_tree())
    }
}

pub fn demo_tree() -> CategoryTree {
    let roots = [
        ("1", "immobilier", "Immobilier", "Home"),
        ("2", "vehicules", "Véhicules", "Car"),
        ("3", "electronique", "Électronique", "Smartphone"),
        ("4", "electromenager", "Électroménager", "Refrigerator"),
        ("5", "emploi-services", "Emploi & Services", "Briefcase"),
        ("6", "mode-beaute", "Mode & Beauté", "Shirt"),
        ("7", "maison-jardin", "Maison & Jardin", "Sofa"),
        ("8", "animaux", "Animaux", "Dog"),
        ("9", "agriculture", "Agriculture", "Tractor"),
        ("10", "construction-materiaux", "Construction & Matériaux", "HardHat"),
        ("11", "energie-environnement", "Énergie & Environnement", "Zap"),
        ("12", "education-formation", "Éducation & Formation", "GraduationCap"),
        ("13", "divers", "Divers", "Package"),
    ];
    let children = [
        ("101", "appartements", "Appartements", "1"),
        ("102", "maisons", "Maisons & Villas", "1"),
        ("103", "terrains", "Terrains", "1"),
        ("201", "voitures", "Voitures", "2"),
        ("202", "motos", "Motos", "2"),
        ("301", "telephones", "Téléphones", "3"),
        ("302", "ordinateurs", "Ordinateurs", "3"),
    ];

    let mut nodes: Vec<CategoryNode> = roots
        .iter()
        .map(|&(id, slug, name, icon)| CategoryNode::new(id, slug, name, None).with_icon(icon))
        .collect();
    nodes.extend(
        children
            .iter()
            .map(|&(id, slug, name, parent)| CategoryNode::new(id, slug, name, Some(parent))),
    );
    CategoryTree::new(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_to_walks_from_root_to_leaf() {
        let tree = demo_tree();
        let path = tree.path_to("201").expect("path");
        let slugs: Vec<_> = path.iter().map(|n| n.slug.as_str()).collect();
        assert_eq!(slugs, vec!["vehicules", "voitures"]);
        assert_eq!(path_slug(&path), "vehicules/voitures");
    }

    #[test]
    fn leaves_and_parents_are_distinguished() {
        let tree = demo_tree();
        assert!(!tree.is_leaf("2"));
        assert!(tree.is_leaf("201"));
        assert!(tree.is_leaf("13"));
        assert_eq!(tree.children_of(Some("1")).len(), 3);
        assert_eq!(tree.roots().len(), 13);
    }

    #[test]
    fn unknown_or_cyclic_ids_have_no_path() {
        assert!(demo_tree().path_to("999").is_none());
        let cyclic = CategoryTree::new(vec![
            CategoryNode::new("a", "a", "A", Some("b")),
            CategoryNode::new("b", "b", "B", Some("a")),
        ]);
        assert!(cyclic.path_to("a").is_none());
    }

    #[tokio::test]
    async fn static_source_serves_demo_tree() {
        let tree = StaticCategorySource.fetch_tree().await.expect("tree");
        assert!(!tree.is_empty());
        assert_eq!(tree.get("2").map(|n| n.slug.as_str()), Some("vehicules"));
    }
}
