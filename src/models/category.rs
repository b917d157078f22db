//! Category model
//!
//! Categories group published content by medical area (e.g. Cardiologia >
//! Arritmias) and form a tree through `parent_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    /// Position among siblings
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Category with its children for tree representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            children: Vec::new(),
        }
    }

    /// Build the forest from a flat list, ordering siblings by
    /// `sort_order` then name. Categories whose parent is missing become
    /// roots.
    pub fn build(categories: Vec<Category>) -> Vec<CategoryTree> {
        let ids: std::collections::HashSet<i64> = categories.iter().map(|c| c.id).collect();
        let mut by_parent: std::collections::HashMap<Option<i64>, Vec<Category>> =
            std::collections::HashMap::new();

        for category in categories {
            let parent = category.parent_id.filter(|p| ids.contains(p));
            by_parent.entry(parent).or_default().push(category);
        }

        fn attach(
            parent: Option<i64>,
            by_parent: &mut std::collections::HashMap<Option<i64>, Vec<Category>>,
        ) -> Vec<CategoryTree> {
            let mut level = by_parent.remove(&parent).unwrap_or_default();
            level.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
            level
                .into_iter()
                .map(|category| {
                    let children = attach(Some(category.id), by_parent);
                    CategoryTree { category, children }
                })
                .collect()
        }

        attach(None, &mut by_parent)
    }

    /// Ids of every descendant, depth-first, excluding self
    pub fn descendant_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.category.id);
            ids.extend(child.descendant_ids());
        }
        ids
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    /// Generated from the name when absent
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, parent_id: Option<i64>, sort_order: i32) -> Category {
        Category {
            id,
            slug: name.to_lowercase(),
            name: name.to_string(),
            description: None,
            parent_id,
            sort_order,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree() {
        let trees = CategoryTree::build(vec![
            category(1, "Cardiologia", None, 0),
            category(2, "Arritmias", Some(1), 1),
            category(3, "Insuficiencia", Some(1), 0),
            category(4, "Pediatria", None, 1),
            category(5, "Fibrilacao", Some(2), 0),
        ]);

        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].category.name, "Cardiologia");
        assert_eq!(trees[0].children[0].category.name, "Insuficiencia");
        assert_eq!(trees[0].children[1].children[0].category.id, 5);
        assert_eq!(trees[0].descendant_ids(), vec![3, 2, 5]);
    }

    #[test]
    fn test_orphan_becomes_root() {
        let trees = CategoryTree::build(vec![category(2, "Orfa", Some(99), 0)]);
        assert_eq!(trees.len(), 1);
        assert!(trees[0].children.is_empty());
    }
}
