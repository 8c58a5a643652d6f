use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    Category, CategoryChanges, CategoryPatch, CategoryWithProducts, NewCategory, NewProduct,
    Product, ProductPatch, ProductSortField, Purchase, PurchaseFilter, PurchaseLine,
    PurchaseLineRequest, PurchaseSortField, SortDirection,
};

/// Repository trait for catalog persistence.
///
/// Every multi-step mutation is one method so implementations can make
/// it atomic: a purchase whose third line fails stock validation must
/// not have decremented stock for the first two.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // Categories --------------------------------------------------------

    /// All categories ordered by name, each with its product names.
    async fn list_categories(&self) -> CatalogResult<Vec<CategoryWithProducts>>;

    async fn find_category_by_id(&self, id: i64) -> CatalogResult<Option<Category>>;

    async fn find_category_by_slug(&self, slug: &str) -> CatalogResult<Option<Category>>;

    /// Case-insensitive exact name match; may return several records.
    async fn find_categories_by_name(&self, name: &str) -> CatalogResult<Vec<Category>>;

    async fn category_slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> CatalogResult<bool>;

    async fn insert_category(&self, input: NewCategory) -> CatalogResult<Category>;

    async fn update_category(&self, id: i64, patch: CategoryPatch) -> CatalogResult<Category>;

    async fn delete_category(&self, id: i64) -> CatalogResult<()>;

    // Product-category edges --------------------------------------------

    /// Idempotent: adding an existing edge is a no-op.
    async fn assign_category(&self, product_id: i64, category_id: i64) -> CatalogResult<()>;

    /// Idempotent: removing a missing edge is a no-op.
    async fn unassign_category(&self, product_id: i64, category_id: i64) -> CatalogResult<()>;

    /// Adds the category to every product; returns the product count.
    async fn assign_category_to_all(&self, category_id: i64) -> CatalogResult<usize>;

    // Products ----------------------------------------------------------

    async fn list_products(
        &self,
        order: &[(ProductSortField, SortDirection)],
    ) -> CatalogResult<Vec<Product>>;

    async fn find_product_by_id(&self, id: i64) -> CatalogResult<Option<Product>>;

    async fn find_product_by_slug(&self, slug: &str) -> CatalogResult<Option<Product>>;

    /// Case-insensitive exact name match; may return several records.
    async fn find_products_by_name(&self, name: &str) -> CatalogResult<Vec<Product>>;

    async fn product_slug_exists(&self, slug: &str, exclude_id: Option<i64>)
        -> CatalogResult<bool>;

    /// Creates the product and its initial category edges atomically.
    async fn insert_product(&self, input: NewProduct) -> CatalogResult<Product>;

    /// Applies scalar patches and category changes (replace, then add,
    /// then remove) in one transaction.
    async fn update_product(
        &self,
        id: i64,
        patch: ProductPatch,
        categories: CategoryChanges,
    ) -> CatalogResult<Product>;

    /// Fails with `Conflict` while purchase lines still reference the
    /// product.
    async fn delete_product(&self, id: i64) -> CatalogResult<()>;

    async fn product_has_purchases(&self, product_id: i64) -> CatalogResult<bool>;

    // Purchases ---------------------------------------------------------

    async fn list_purchases(
        &self,
        filter: &PurchaseFilter,
        order: &[(PurchaseSortField, SortDirection)],
    ) -> CatalogResult<Vec<Purchase>>;

    async fn find_purchase(&self, id: i64) -> CatalogResult<Option<Purchase>>;

    async fn purchases_for_product(&self, product_id: i64) -> CatalogResult<Vec<Purchase>>;

    /// Atomically: validates stock per line, freezes each product's
    /// current price as the line unit price, decrements stock, and sets
    /// the aggregate total. Any failing line aborts the whole purchase.
    async fn create_purchase(&self, lines: Vec<PurchaseLineRequest>) -> CatalogResult<Purchase>;

    /// Atomically restores stock for every line and deletes the record.
    /// Returns the deleted purchase.
    async fn delete_purchase(&self, id: i64) -> CatalogResult<Purchase>;

    /// Deletes every purchase containing the product, restoring stock,
    /// inside one transaction. Returns the number deleted.
    async fn delete_purchases_by_product(&self, product_id: i64) -> CatalogResult<usize>;
}

/// In-memory implementation of CatalogRepository (for development and
/// tests). A single RwLock over the whole store makes every mutation
/// trivially atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalogRepository {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    edges: BTreeSet<(i64, i64)>, // (product_id, category_id)
    purchases: BTreeMap<i64, Purchase>,
    next_category_id: i64,
    next_product_id: i64,
    next_purchase_id: i64,
    next_line_id: i64,
}

impl Inner {
    fn categories_of(&self, product_id: i64) -> Vec<Category> {
        let mut cats: Vec<Category> = self
            .edges
            .iter()
            .filter(|(p, _)| *p == product_id)
            .filter_map(|(_, c)| self.categories.get(c).cloned())
            .collect();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        cats
    }

    fn materialize_product(&self, product: &Product) -> Product {
        let mut full = product.clone();
        full.categories = self.categories_of(product.id);
        full
    }

    fn restock_and_remove(&mut self, purchase_id: i64) -> Option<Purchase> {
        let purchase = self.purchases.remove(&purchase_id)?;
        for line in &purchase.lines {
            if let Some(product) = self.products.get_mut(&line.product_id) {
                product.stock += line.quantity;
                product.updated_at = Utc::now();
            }
        }
        Some(purchase)
    }
}

fn sort_products(products: &mut [Product], order: &[(ProductSortField, SortDirection)]) {
    products.sort_by(|a, b| {
        for (field, direction) in order {
            let ordering = match field {
                ProductSortField::Name => a.name.cmp(&b.name),
                ProductSortField::Price => a.price.cmp(&b.price),
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if !ordering.is_eq() {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    });
}

fn sort_purchases(purchases: &mut [Purchase], order: &[(PurchaseSortField, SortDirection)]) {
    purchases.sort_by(|a, b| {
        for (field, direction) in order {
            let ordering = match field {
                PurchaseSortField::Id => a.id.cmp(&b.id),
                PurchaseSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                PurchaseSortField::TotalPrice => a.total_price.cmp(&b.total_price),
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if !ordering.is_eq() {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    });
}

fn matches_filter(purchase: &Purchase, filter: &PurchaseFilter) -> bool {
    if let Some(from) = filter.created_from {
        if purchase.created_at < from {
            return false;
        }
    }
    if let Some(to) = filter.created_to {
        if purchase.created_at > to {
            return false;
        }
    }
    if let Some(min) = filter.min_total {
        if purchase.total_price < min {
            return false;
        }
    }
    if let Some(max) = filter.max_total {
        if purchase.total_price > max {
            return false;
        }
    }
    if let Some(product_id) = filter.product_id {
        if !purchase.lines.iter().any(|l| l.product_id == product_id) {
            return false;
        }
    }
    true
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_categories(&self) -> CatalogResult<Vec<CategoryWithProducts>> {
        let inner = self.inner.read().await;
        let mut result: Vec<CategoryWithProducts> = inner
            .categories
            .values()
            .map(|category| {
                let mut product_names: Vec<String> = inner
                    .edges
                    .iter()
                    .filter(|(_, c)| *c == category.id)
                    .filter_map(|(p, _)| inner.products.get(p).map(|prod| prod.name.clone()))
                    .collect();
                product_names.sort();
                CategoryWithProducts {
                    category: category.clone(),
                    product_names,
                }
            })
            .collect();
        result.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(result)
    }

    async fn find_category_by_id(&self, id: i64) -> CatalogResult<Option<Category>> {
        let inner = self.inner.read().await;
        Ok(inner.categories.get(&id).cloned())
    }

    async fn find_category_by_slug(&self, slug: &str) -> CatalogResult<Option<Category>> {
        let inner = self.inner.read().await;
        Ok(inner.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn find_categories_by_name(&self, name: &str) -> CatalogResult<Vec<Category>> {
        let inner = self.inner.read().await;
        Ok(inner
            .categories
            .values()
            .filter(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }

    async fn category_slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> CatalogResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .categories
            .values()
            .any(|c| c.slug == slug && Some(c.id) != exclude_id))
    }

    async fn insert_category(&self, input: NewCategory) -> CatalogResult<Category> {
        let mut inner = self.inner.write().await;
        if inner.categories.values().any(|c| c.slug == input.slug) {
            return Err(CatalogError::Conflict(format!(
                "Category slug '{}' is already taken",
                input.slug
            )));
        }
        inner.next_category_id += 1;
        let now = Utc::now();
        let category = Category {
            id: inner.next_category_id,
            name: input.name,
            slug: input.slug,
            description: input.description,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        inner.categories.insert(category.id, category.clone());
        tracing::info!(category_id = category.id, "Created category");
        Ok(category)
    }

    async fn update_category(&self, id: i64, patch: CategoryPatch) -> CatalogResult<Category> {
        let mut inner = self.inner.write().await;
        let category = inner
            .categories
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("Category with id={} not found", id)))?;
        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(slug) = patch.slug {
            category.slug = slug;
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        if let Some(is_active) = patch.is_active {
            category.is_active = is_active;
        }
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: i64) -> CatalogResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .categories
            .remove(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("Category with id={} not found", id)))?;
        inner.edges.retain(|(_, c)| *c != id);
        tracing::info!(category_id = id, "Deleted category");
        Ok(())
    }

    async fn assign_category(&self, product_id: i64, category_id: i64) -> CatalogResult<()> {
        let mut inner = self.inner.write().await;
        inner.edges.insert((product_id, category_id));
        Ok(())
    }

    async fn unassign_category(&self, product_id: i64, category_id: i64) -> CatalogResult<()> {
        let mut inner = self.inner.write().await;
        inner.edges.remove(&(product_id, category_id));
        Ok(())
    }

    async fn assign_category_to_all(&self, category_id: i64) -> CatalogResult<usize> {
        let mut inner = self.inner.write().await;
        let product_ids: Vec<i64> = inner.products.keys().copied().collect();
        for product_id in &product_ids {
            inner.edges.insert((*product_id, category_id));
        }
        Ok(product_ids.len())
    }

    async fn list_products(
        &self,
        order: &[(ProductSortField, SortDirection)],
    ) -> CatalogResult<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner
            .products
            .values()
            .map(|p| inner.materialize_product(p))
            .collect();
        sort_products(&mut products, order);
        Ok(products)
    }

    async fn find_product_by_id(&self, id: i64) -> CatalogResult<Option<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .get(&id)
            .map(|p| inner.materialize_product(p)))
    }

    async fn find_product_by_slug(&self, slug: &str) -> CatalogResult<Option<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .find(|p| p.slug == slug)
            .map(|p| inner.materialize_product(p)))
    }

    async fn find_products_by_name(&self, name: &str) -> CatalogResult<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| inner.materialize_product(p))
            .collect())
    }

    async fn product_slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> CatalogResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .any(|p| p.slug == slug && Some(p.id) != exclude_id))
    }

    async fn insert_product(&self, input: NewProduct) -> CatalogResult<Product> {
        let mut inner = self.inner.write().await;
        if inner.products.values().any(|p| p.slug == input.slug) {
            return Err(CatalogError::Conflict(format!(
                "Product slug '{}' is already taken",
                input.slug
            )));
        }
        inner.next_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: inner.next_product_id,
            name: input.name,
            slug: input.slug,
            description: input.description,
            price: input.price,
            stock: input.stock,
            is_active: input.is_active,
            categories: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let id = product.id;
        inner.products.insert(id, product.clone());
        for category_id in input.category_ids {
            inner.edges.insert((id, category_id));
        }
        tracing::info!(product_id = id, "Created product");
        Ok(inner.materialize_product(&product))
    }

    async fn update_product(
        &self,
        id: i64,
        patch: ProductPatch,
        categories: CategoryChanges,
    ) -> CatalogResult<Product> {
        let mut inner = self.inner.write().await;
        let product = inner
            .products
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("Product with id={} not found", id)))?;
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(slug) = patch.slug {
            product.slug = slug;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        if let Some(is_active) = patch.is_active {
            product.is_active = is_active;
        }
        product.updated_at = Utc::now();
        let updated = product.clone();

        if let Some(replacement) = categories.replace {
            inner.edges.retain(|(p, _)| *p != id);
            for category_id in replacement {
                inner.edges.insert((id, category_id));
            }
        }
        for category_id in categories.add {
            inner.edges.insert((id, category_id));
        }
        for category_id in categories.remove {
            inner.edges.remove(&(id, category_id));
        }

        Ok(inner.materialize_product(&updated))
    }

    async fn delete_product(&self, id: i64) -> CatalogResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.products.contains_key(&id) {
            return Err(CatalogError::NotFound(format!(
                "Product with id={} not found",
                id
            )));
        }
        let referenced = inner
            .purchases
            .values()
            .any(|purchase| purchase.lines.iter().any(|l| l.product_id == id));
        if referenced {
            return Err(CatalogError::Conflict(
                "Product is referenced by existing purchases".to_string(),
            ));
        }
        inner.products.remove(&id);
        inner.edges.retain(|(p, _)| *p != id);
        tracing::info!(product_id = id, "Deleted product");
        Ok(())
    }

    async fn product_has_purchases(&self, product_id: i64) -> CatalogResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .purchases
            .values()
            .any(|purchase| purchase.lines.iter().any(|l| l.product_id == product_id)))
    }

    async fn list_purchases(
        &self,
        filter: &PurchaseFilter,
        order: &[(PurchaseSortField, SortDirection)],
    ) -> CatalogResult<Vec<Purchase>> {
        let inner = self.inner.read().await;
        let mut purchases: Vec<Purchase> = inner
            .purchases
            .values()
            .filter(|p| matches_filter(p, filter))
            .cloned()
            .collect();
        sort_purchases(&mut purchases, order);
        Ok(purchases)
    }

    async fn find_purchase(&self, id: i64) -> CatalogResult<Option<Purchase>> {
        let inner = self.inner.read().await;
        Ok(inner.purchases.get(&id).cloned())
    }

    async fn purchases_for_product(&self, product_id: i64) -> CatalogResult<Vec<Purchase>> {
        let inner = self.inner.read().await;
        let mut purchases: Vec<Purchase> = inner
            .purchases
            .values()
            .filter(|purchase| purchase.lines.iter().any(|l| l.product_id == product_id))
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.id);
        Ok(purchases)
    }

    async fn create_purchase(&self, lines: Vec<PurchaseLineRequest>) -> CatalogResult<Purchase> {
        let mut inner = self.inner.write().await;

        // Validate every line before touching any stock.
        for line in &lines {
            let product = inner.products.get(&line.product_id).ok_or_else(|| {
                CatalogError::NotFound(format!(
                    "Product with id={} not found",
                    line.product_id
                ))
            })?;
            if line.quantity <= 0 {
                return Err(CatalogError::Validation(format!(
                    "Quantity for product {} must be greater than zero",
                    product.name
                )));
            }
            if product.stock < line.quantity {
                return Err(CatalogError::InsufficientStock {
                    product: product.name.clone(),
                    requested: line.quantity as i64,
                });
            }
        }

        inner.next_purchase_id += 1;
        let purchase_id = inner.next_purchase_id;
        let now = Utc::now();
        let mut total_price = Decimal::ZERO;
        let mut purchase_lines = Vec::with_capacity(lines.len());
        for request in &lines {
            inner.next_line_id += 1;
            let line_id = inner.next_line_id;
            let product = inner
                .products
                .get_mut(&request.product_id)
                .ok_or_else(|| {
                    CatalogError::Internal(format!(
                        "Product with id={} vanished mid-purchase",
                        request.product_id
                    ))
                })?;
            let line = PurchaseLine {
                id: line_id,
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: request.quantity,
                unit_price: product.price,
            };
            total_price += line.line_total();
            product.stock -= request.quantity;
            product.updated_at = now;
            purchase_lines.push(line);
        }

        let purchase = Purchase {
            id: purchase_id,
            total_price,
            lines: purchase_lines,
            created_at: now,
            updated_at: now,
        };
        inner.purchases.insert(purchase_id, purchase.clone());
        tracing::info!(purchase_id, "Created purchase");
        Ok(purchase)
    }

    async fn delete_purchase(&self, id: i64) -> CatalogResult<Purchase> {
        let mut inner = self.inner.write().await;
        let purchase = inner
            .restock_and_remove(id)
            .ok_or_else(|| CatalogError::NotFound(format!("Purchase with id={} not found", id)))?;
        tracing::info!(purchase_id = id, "Deleted purchase, stock restored");
        Ok(purchase)
    }

    async fn delete_purchases_by_product(&self, product_id: i64) -> CatalogResult<usize> {
        let mut inner = self.inner.write().await;
        let ids: Vec<i64> = inner
            .purchases
            .values()
            .filter(|purchase| purchase.lines.iter().any(|l| l.product_id == product_id))
            .map(|p| p.id)
            .collect();
        for id in &ids {
            inner.restock_and_remove(*id);
        }
        tracing::info!(product_id, count = ids.len(), "Deleted purchases by product");
        Ok(ids.len())
    }
}
