//! Category service
//!
//! Manages the category tree used to organize content:
//! - Create, read, update, delete categories
//! - Slug generation from the name, unique across categories
//! - Cached flat list and tree
//!
//! A category with children cannot be deleted. Contents of a deleted
//! category are left without a category.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};
use crate::services::content::forget_all_contents;
use crate::services::deck::non_empty;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Default cache TTL for categories (1 hour)
const CATEGORY_CACHE_TTL_SECS: u64 = 3600;

const MAX_NAME_LENGTH: usize = 100;

const CACHE_KEY_CATEGORY_TREE: &str = "category:tree";
const CACHE_KEY_CATEGORY_LIST: &str = "category:list";

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(i64),

    #[error("Parent category not found: {0}")]
    ParentNotFound(i64),

    #[error("Category {0} still has subcategories")]
    HasChildren(i64),

    #[error("Circular reference detected: category cannot be its own ancestor")]
    CircularReference,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self {
            repo,
            cache,
            cache_ttl: Duration::from_secs(CATEGORY_CACHE_TTL_SECS),
        }
    }

    /// Create a new category service with custom cache TTL
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Create a category.
    ///
    /// # Errors
    /// - `DuplicateSlug` if another category already uses the slug
    /// - `ParentNotFound` if the parent doesn't exist
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let slug = match input.slug {
            Some(slug) => validate_slug(&slug)?,
            None => generate_slug(&name),
        };
        if slug.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category name must contain letters or digits".to_string(),
            ));
        }
        if self.repo.get_by_slug(&slug).await?.is_some() {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }
        if let Some(parent_id) = input.parent_id {
            if self.repo.get_by_id(parent_id).await?.is_none() {
                return Err(CategoryServiceError::ParentNotFound(parent_id));
            }
        }

        let category = Category {
            id: 0,
            slug,
            name,
            description: non_empty(input.description),
            parent_id: input.parent_id,
            sort_order: input.sort_order.unwrap_or(0),
            created_at: Utc::now(),
        };
        let created = self.repo.create(&category).await?;
        self.invalidate_cache().await;

        tracing::info!("Created category {} ({})", created.slug, created.id);
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self.repo.get_by_slug(slug).await?)
    }

    /// All categories, flat
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(list) = self.cache.get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST).await.ok().flatten() {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        let _ = self.cache.set(CACHE_KEY_CATEGORY_LIST, &list, self.cache_ttl).await;
        Ok(list)
    }

    /// All categories as a forest, siblings by sort order then name
    pub async fn list_tree(&self) -> Result<Vec<CategoryTree>, CategoryServiceError> {
        if let Some(tree) = self
            .cache
            .get::<Vec<CategoryTree>>(CACHE_KEY_CATEGORY_TREE)
            .await
            .ok()
            .flatten()
        {
            return Ok(tree);
        }

        let tree = CategoryTree::build(self.list().await?);
        let _ = self.cache.set(CACHE_KEY_CATEGORY_TREE, &tree, self.cache_ttl).await;
        Ok(tree)
    }

    /// Id of a category and of all categories below it
    pub async fn subtree_ids(&self, id: i64) -> Result<Vec<i64>, CategoryServiceError> {
        let tree = self.list_tree().await?;
        let node = find_node(&tree, id).ok_or(CategoryServiceError::NotFound(id))?;
        let mut ids = vec![id];
        ids.extend(node.descendant_ids());
        Ok(ids)
    }

    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;

        if let Some(name) = input.name {
            category.name = validate_name(&name)?;
        }
        if let Some(slug) = input.slug {
            let slug = validate_slug(&slug)?;
            if slug != category.slug {
                if self.repo.get_by_slug(&slug).await?.is_some() {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
                category.slug = slug;
            }
        }
        if let Some(description) = input.description {
            category.description = non_empty(description);
        }
        if let Some(parent_id) = input.parent_id {
            if let Some(parent) = parent_id {
                if self.repo.get_by_id(parent).await?.is_none() {
                    return Err(CategoryServiceError::ParentNotFound(parent));
                }
                if self.would_create_cycle(id, parent).await? {
                    return Err(CategoryServiceError::CircularReference);
                }
            }
            category.parent_id = parent_id;
        }
        if let Some(sort_order) = input.sort_order {
            category.sort_order = sort_order;
        }

        let updated = self.repo.update(&category).await?;
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a leaf category; its contents lose their category
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let category = self.get_by_id(id).await?;
        let has_children = self
            .repo
            .list()
            .await?
            .iter()
            .any(|c| c.parent_id == Some(category.id));
        if has_children {
            return Err(CategoryServiceError::HasChildren(category.id));
        }

        let orphaned = self.repo.count_contents(category.id).await?;
        self.repo.delete(category.id).await?;
        self.invalidate_cache().await;
        forget_all_contents(&self.cache).await;

        tracing::info!(
            "Deleted category {} ({} contents left uncategorized)",
            category.slug,
            orphaned
        );
        Ok(())
    }

    async fn would_create_cycle(&self, category_id: i64, new_parent_id: i64) -> Result<bool, CategoryServiceError> {
        if category_id == new_parent_id {
            return Ok(true);
        }
        Ok(self.subtree_ids(category_id).await?.contains(&new_parent_id))
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete(CACHE_KEY_CATEGORY_TREE).await;
        let _ = self.cache.delete(CACHE_KEY_CATEGORY_LIST).await;
    }
}

fn find_node(forest: &[CategoryTree], id: i64) -> Option<&CategoryTree> {
    forest.iter().find_map(|node| {
        if node.category.id == id {
            Some(node)
        } else {
            find_node(&node.children, id)
        }
    })
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn validate_slug(slug: &str) -> Result<String, CategoryServiceError> {
    let normalized = generate_slug(slug);
    if normalized.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category slug cannot be empty".to_string(),
        ));
    }
    Ok(normalized)
}

/// Fold the Latin accents common in Portuguese to ASCII
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Generate a URL-friendly slug.
///
/// Lowercases, folds accents, turns every other non-alphanumeric run into
/// a single hyphen and trims hyphens from both ends.
pub fn generate_slug(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_hyphen = false;

    for c in name.to_lowercase().chars().map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::db::repositories::SqlxCategoryRepository;

    async fn setup_test_service() -> CategoryService {
        let pool = migrated_pool().await;
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        CategoryService::new(SqlxCategoryRepository::boxed(pool), cache)
    }

    fn input(name: &str, parent_id: Option<i64>) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            slug: None,
            description: None,
            parent_id,
            sort_order: None,
        }
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Clínica Médica"), "clinica-medica");
        assert_eq!(generate_slug("  Ginecologia & Obstetrícia  "), "ginecologia-obstetricia");
        assert_eq!(generate_slug("Coração---ECG"), "coracao-ecg");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let service = setup_test_service().await;
        service.create(input("Cardiologia", None)).await.unwrap();

        let err = service.create(input("cardiologia", None)).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::DuplicateSlug(_)));

        let err = service.create(input("   ", None)).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_tree_and_cache_invalidation() {
        let service = setup_test_service().await;
        let cardio = service.create(input("Cardiologia", None)).await.unwrap();
        assert_eq!(service.list_tree().await.unwrap().len(), 1);

        let arritmias = service.create(input("Arritmias", Some(cardio.id))).await.unwrap();
        let tree = service.list_tree().await.unwrap();
        assert_eq!(tree[0].children[0].category.id, arritmias.id);
        assert_eq!(service.subtree_ids(cardio.id).await.unwrap(), vec![cardio.id, arritmias.id]);

        let err = service.create(input("Solta", Some(999))).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::ParentNotFound(999)));
    }

    #[tokio::test]
    async fn test_update_rejects_cycles() {
        let service = setup_test_service().await;
        let root = service.create(input("Pediatria", None)).await.unwrap();
        let child = service.create(input("Neonatologia", Some(root.id))).await.unwrap();

        let err = service
            .update(
                root.id,
                UpdateCategoryInput {
                    parent_id: Some(Some(child.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CategoryServiceError::CircularReference));

        let renamed = service
            .update(
                child.id,
                UpdateCategoryInput {
                    name: Some("Neonato".into()),
                    slug: Some("Neonato".into()),
                    description: Some(Some("Recém-nascidos".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.slug, "neonato");
        assert_eq!(renamed.description.as_deref(), Some("Recém-nascidos"));
    }

    #[tokio::test]
    async fn test_delete_refuses_parent() {
        let service = setup_test_service().await;
        let root = service.create(input("Cirurgia", None)).await.unwrap();
        let child = service.create(input("Trauma", Some(root.id))).await.unwrap();

        let err = service.delete(root.id).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::HasChildren(_)));

        service.delete(child.id).await.unwrap();
        service.delete(root.id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
        assert!(matches!(
            service.get_by_id(root.id).await.unwrap_err(),
            CategoryServiceError::NotFound(_)
        ));
    }
}
