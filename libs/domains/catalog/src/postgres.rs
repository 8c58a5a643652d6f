use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, ExprTrait, Func, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, LoaderTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionError, TransactionTrait,
};
use std::collections::HashMap;

use crate::entity::{category, product, product_category, purchase, purchase_item};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    Category, CategoryChanges, CategoryPatch, CategoryWithProducts, NewCategory, NewProduct,
    Product, ProductPatch, ProductSortField, Purchase, PurchaseFilter, PurchaseLine,
    PurchaseLineRequest, PurchaseSortField, SortDirection,
};
use crate::repository::CatalogRepository;

/// Postgres-backed implementation of [`CatalogRepository`]. Multi-step
/// mutations run inside a single database transaction.
#[derive(Clone)]
pub struct PgCatalogRepository {
    db: DatabaseConnection,
}

impl PgCatalogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn txn_err(err: TransactionError<CatalogError>) -> CatalogError {
    match err {
        TransactionError::Connection(db) => db.into(),
        TransactionError::Transaction(err) => err,
    }
}

fn product_order(
    mut query: sea_orm::Select<product::Entity>,
    order: &[(ProductSortField, SortDirection)],
) -> sea_orm::Select<product::Entity> {
    for (field, direction) in order {
        let column = match field {
            ProductSortField::Name => product::Column::Name,
            ProductSortField::Price => product::Column::Price,
        };
        query = match direction {
            SortDirection::Asc => query.order_by_asc(column),
            SortDirection::Desc => query.order_by_desc(column),
        };
    }
    query.order_by_asc(product::Column::Id)
}

fn purchase_order(
    mut query: sea_orm::Select<purchase::Entity>,
    order: &[(PurchaseSortField, SortDirection)],
) -> sea_orm::Select<purchase::Entity> {
    for (field, direction) in order {
        let column = match field {
            PurchaseSortField::Id => purchase::Column::Id,
            PurchaseSortField::CreatedAt => purchase::Column::CreatedAt,
            PurchaseSortField::TotalPrice => purchase::Column::TotalPrice,
        };
        query = match direction {
            SortDirection::Asc => query.order_by_asc(column),
            SortDirection::Desc => query.order_by_desc(column),
        };
    }
    query.order_by_asc(purchase::Column::Id)
}

impl PgCatalogRepository {
    async fn hydrate_products(&self, models: Vec<product::Model>) -> CatalogResult<Vec<Product>> {
        let categories = models
            .load_many_to_many(category::Entity, product_category::Entity, &self.db)
            .await?;
        Ok(models
            .into_iter()
            .zip(categories)
            .map(|(model, cats)| model.into_product(cats))
            .collect())
    }

    async fn hydrate_purchases(
        &self,
        models: Vec<purchase::Model>,
    ) -> CatalogResult<Vec<Purchase>> {
        let items = models
            .load_many(purchase_item::Entity, &self.db)
            .await?;
        let product_ids: Vec<i64> = items
            .iter()
            .flatten()
            .map(|item| item.product_id)
            .collect();
        let names: HashMap<i64, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();
        models
            .into_iter()
            .zip(items)
            .map(|(model, items)| {
                let lines = items
                    .into_iter()
                    .map(|item| {
                        let name = names.get(&item.product_id).cloned().ok_or_else(|| {
                            CatalogError::Internal(format!(
                                "Purchase item references missing product id={}",
                                item.product_id
                            ))
                        })?;
                        Ok(item.into_line(name))
                    })
                    .collect::<CatalogResult<Vec<PurchaseLine>>>()?;
                Ok(model.into_purchase(lines))
            })
            .collect()
    }
}

async fn restock_and_delete(
    txn: &DatabaseTransaction,
    purchase_id: i64,
) -> CatalogResult<Option<Purchase>> {
    let Some(model) = purchase::Entity::find_by_id(purchase_id).one(txn).await? else {
        return Ok(None);
    };
    let items = purchase_item::Entity::find()
        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
        .all(txn)
        .await?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = product::Entity::find_by_id(item.product_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| {
                CatalogError::Internal(format!(
                    "Purchase item references missing product id={}",
                    item.product_id
                ))
            })?;
        let mut active = product.clone().into_active_model();
        active.stock = Set(product.stock + item.quantity);
        active.updated_at = Set(Utc::now().into());
        active.update(txn).await?;
        lines.push(item.into_line(product.name));
    }

    // Cascade removes the line rows.
    purchase::Entity::delete_by_id(purchase_id).exec(txn).await?;
    Ok(Some(model.into_purchase(lines)))
}

async fn apply_category_changes(
    txn: &DatabaseTransaction,
    product_id: i64,
    changes: CategoryChanges,
) -> CatalogResult<()> {
    if let Some(replacement) = changes.replace {
        product_category::Entity::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .exec(txn)
            .await?;
        link_categories(txn, product_id, &replacement).await?;
    }
    link_categories(txn, product_id, &changes.add).await?;
    if !changes.remove.is_empty() {
        product_category::Entity::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .filter(product_category::Column::CategoryId.is_in(changes.remove))
            .exec(txn)
            .await?;
    }
    Ok(())
}

async fn link_categories(
    txn: &DatabaseTransaction,
    product_id: i64,
    category_ids: &[i64],
) -> CatalogResult<()> {
    if category_ids.is_empty() {
        return Ok(());
    }
    let rows = category_ids.iter().map(|category_id| {
        product_category::ActiveModel {
            product_id: Set(product_id),
            category_id: Set(*category_id),
        }
    });
    product_category::Entity::insert_many(rows)
        .on_conflict(
            OnConflict::columns([
                product_category::Column::ProductId,
                product_category::Column::CategoryId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .do_nothing()
        .exec(txn)
        .await?;
    Ok(())
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn list_categories(&self) -> CatalogResult<Vec<CategoryWithProducts>> {
        let categories = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&self.db)
            .await?;
        let products = categories
            .load_many_to_many(product::Entity, product_category::Entity, &self.db)
            .await?;
        Ok(categories
            .into_iter()
            .zip(products)
            .map(|(model, members)| {
                let mut product_names: Vec<String> =
                    members.into_iter().map(|p| p.name).collect();
                product_names.sort();
                CategoryWithProducts {
                    category: model.into(),
                    product_names,
                }
            })
            .collect())
    }

    async fn find_category_by_id(&self, id: i64) -> CatalogResult<Option<Category>> {
        let model = category::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_category_by_slug(&self, slug: &str) -> CatalogResult<Option<Category>> {
        let model = category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_categories_by_name(&self, name: &str) -> CatalogResult<Vec<Category>> {
        let models = category::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(category::Column::Name)))
                    .eq(name.to_lowercase()),
            )
            .order_by_asc(category::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn category_slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> CatalogResult<bool> {
        let mut query = category::Entity::find().filter(category::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            query = query.filter(category::Column::Id.ne(id));
        }
        Ok(query.count(&self.db).await? > 0)
    }

    async fn insert_category(&self, input: NewCategory) -> CatalogResult<Category> {
        let active: category::ActiveModel = input.into();
        let model = active.insert(&self.db).await?;
        tracing::info!(category_id = model.id, "Created category");
        Ok(model.into())
    }

    async fn update_category(&self, id: i64, patch: CategoryPatch) -> CatalogResult<Category> {
        let model = category::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Category with id={} not found", id)))?;
        let mut active = model.into_active_model();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(slug) = patch.slug {
            active.slug = Set(slug);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now().into());
        let model = active.update(&self.db).await?;
        Ok(model.into())
    }

    async fn delete_category(&self, id: i64) -> CatalogResult<()> {
        // Join rows cascade.
        let result = category::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(CatalogError::NotFound(format!(
                "Category with id={} not found",
                id
            )));
        }
        tracing::info!(category_id = id, "Deleted category");
        Ok(())
    }

    async fn assign_category(&self, product_id: i64, category_id: i64) -> CatalogResult<()> {
        let txn = self.db.begin().await?;
        link_categories(&txn, product_id, &[category_id]).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn unassign_category(&self, product_id: i64, category_id: i64) -> CatalogResult<()> {
        product_category::Entity::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .filter(product_category::Column::CategoryId.eq(category_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn assign_category_to_all(&self, category_id: i64) -> CatalogResult<usize> {
        let product_ids: Vec<i64> = product::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let count = product_ids.len();
        let txn = self.db.begin().await?;
        for product_id in product_ids {
            link_categories(&txn, product_id, &[category_id]).await?;
        }
        txn.commit().await?;
        Ok(count)
    }

    async fn list_products(
        &self,
        order: &[(ProductSortField, SortDirection)],
    ) -> CatalogResult<Vec<Product>> {
        let models = product_order(product::Entity::find(), order)
            .all(&self.db)
            .await?;
        self.hydrate_products(models).await
    }

    async fn find_product_by_id(&self, id: i64) -> CatalogResult<Option<Product>> {
        let models = product::Entity::find_by_id(id).all(&self.db).await?;
        Ok(self.hydrate_products(models).await?.pop())
    }

    async fn find_product_by_slug(&self, slug: &str) -> CatalogResult<Option<Product>> {
        let models = product::Entity::find()
            .filter(product::Column::Slug.eq(slug))
            .all(&self.db)
            .await?;
        Ok(self.hydrate_products(models).await?.pop())
    }

    async fn find_products_by_name(&self, name: &str) -> CatalogResult<Vec<Product>> {
        let models = product::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                    .eq(name.to_lowercase()),
            )
            .order_by_asc(product::Column::Id)
            .all(&self.db)
            .await?;
        self.hydrate_products(models).await
    }

    async fn product_slug_exists(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> CatalogResult<bool> {
        let mut query = product::Entity::find().filter(product::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            query = query.filter(product::Column::Id.ne(id));
        }
        Ok(query.count(&self.db).await? > 0)
    }

    async fn insert_product(&self, input: NewProduct) -> CatalogResult<Product> {
        let category_ids = input.category_ids.clone();
        let id = self
            .db
            .transaction::<_, i64, CatalogError>(|txn| {
                Box::pin(async move {
                    let active: product::ActiveModel = input.into();
                    let model = active.insert(txn).await?;
                    link_categories(txn, model.id, &category_ids).await?;
                    Ok(model.id)
                })
            })
            .await
            .map_err(txn_err)?;
        tracing::info!(product_id = id, "Created product");
        self.find_product_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::Internal(format!("Product with id={} vanished", id)))
    }

    async fn update_product(
        &self,
        id: i64,
        patch: ProductPatch,
        categories: CategoryChanges,
    ) -> CatalogResult<Product> {
        self.db
            .transaction::<_, (), CatalogError>(|txn| {
                Box::pin(async move {
                    let model = product::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            CatalogError::NotFound(format!("Product with id={} not found", id))
                        })?;
                    let mut active = model.into_active_model();
                    if let Some(name) = patch.name {
                        active.name = Set(name);
                    }
                    if let Some(slug) = patch.slug {
                        active.slug = Set(slug);
                    }
                    if let Some(description) = patch.description {
                        active.description = Set(description);
                    }
                    if let Some(price) = patch.price {
                        active.price = Set(price);
                    }
                    if let Some(stock) = patch.stock {
                        active.stock = Set(stock);
                    }
                    if let Some(is_active) = patch.is_active {
                        active.is_active = Set(is_active);
                    }
                    active.updated_at = Set(Utc::now().into());
                    active.update(txn).await?;
                    apply_category_changes(txn, id, categories).await?;
                    Ok(())
                })
            })
            .await
            .map_err(txn_err)?;
        self.find_product_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::Internal(format!("Product with id={} vanished", id)))
    }

    async fn delete_product(&self, id: i64) -> CatalogResult<()> {
        let referenced = purchase_item::Entity::find()
            .filter(purchase_item::Column::ProductId.eq(id))
            .count(&self.db)
            .await?
            > 0;
        if referenced {
            return Err(CatalogError::Conflict(
                "Product is referenced by existing purchases".to_string(),
            ));
        }
        let result = product::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(CatalogError::NotFound(format!(
                "Product with id={} not found",
                id
            )));
        }
        tracing::info!(product_id = id, "Deleted product");
        Ok(())
    }

    async fn product_has_purchases(&self, product_id: i64) -> CatalogResult<bool> {
        Ok(purchase_item::Entity::find()
            .filter(purchase_item::Column::ProductId.eq(product_id))
            .count(&self.db)
            .await?
            > 0)
    }

    async fn list_purchases(
        &self,
        filter: &PurchaseFilter,
        order: &[(PurchaseSortField, SortDirection)],
    ) -> CatalogResult<Vec<Purchase>> {
        let mut query = purchase::Entity::find();
        if let Some(from) = filter.created_from {
            query = query.filter(purchase::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(purchase::Column::CreatedAt.lte(to));
        }
        if let Some(min) = filter.min_total {
            query = query.filter(purchase::Column::TotalPrice.gte(min));
        }
        if let Some(max) = filter.max_total {
            query = query.filter(purchase::Column::TotalPrice.lte(max));
        }
        if let Some(product_id) = filter.product_id {
            let ids: Vec<i64> = purchase_item::Entity::find()
                .filter(purchase_item::Column::ProductId.eq(product_id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|item| item.purchase_id)
                .collect();
            query = query.filter(purchase::Column::Id.is_in(ids));
        }
        let models = purchase_order(query, order).all(&self.db).await?;
        self.hydrate_purchases(models).await
    }

    async fn find_purchase(&self, id: i64) -> CatalogResult<Option<Purchase>> {
        let models = purchase::Entity::find_by_id(id).all(&self.db).await?;
        Ok(self.hydrate_purchases(models).await?.pop())
    }

    async fn purchases_for_product(&self, product_id: i64) -> CatalogResult<Vec<Purchase>> {
        let ids: Vec<i64> = purchase_item::Entity::find()
            .filter(purchase_item::Column::ProductId.eq(product_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|item| item.purchase_id)
            .collect();
        let models = purchase::Entity::find()
            .filter(purchase::Column::Id.is_in(ids))
            .order_by_asc(purchase::Column::Id)
            .all(&self.db)
            .await?;
        self.hydrate_purchases(models).await
    }

    async fn create_purchase(&self, lines: Vec<PurchaseLineRequest>) -> CatalogResult<Purchase> {
        let id = self
            .db
            .transaction::<_, i64, CatalogError>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let mut total_price = Decimal::ZERO;
                    let mut validated = Vec::with_capacity(lines.len());
                    for request in &lines {
                        let product = product::Entity::find_by_id(request.product_id)
                            .lock_exclusive()
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                CatalogError::NotFound(format!(
                                    "Product with id={} not found",
                                    request.product_id
                                ))
                            })?;
                        if request.quantity <= 0 {
                            return Err(CatalogError::Validation(format!(
                                "Quantity for product {} must be greater than zero",
                                product.name
                            )));
                        }
                        if product.stock < request.quantity {
                            return Err(CatalogError::InsufficientStock {
                                product: product.name.clone(),
                                requested: request.quantity as i64,
                            });
                        }
                        total_price +=
                            product.price * Decimal::from(request.quantity);
                        validated.push((product, request.quantity));
                    }

                    let purchase = purchase::ActiveModel {
                        id: Default::default(),
                        total_price: Set(total_price),
                        created_at: Set(now.into()),
                        updated_at: Set(now.into()),
                    }
                    .insert(txn)
                    .await?;

                    for (product, quantity) in validated {
                        purchase_item::ActiveModel {
                            id: Default::default(),
                            purchase_id: Set(purchase.id),
                            product_id: Set(product.id),
                            quantity: Set(quantity),
                            unit_price: Set(product.price),
                        }
                        .insert(txn)
                        .await?;
                        let mut active = product.clone().into_active_model();
                        active.stock = Set(product.stock - quantity);
                        active.updated_at = Set(now.into());
                        active.update(txn).await?;
                    }
                    Ok(purchase.id)
                })
            })
            .await
            .map_err(txn_err)?;
        tracing::info!(purchase_id = id, "Created purchase");
        self.find_purchase(id)
            .await?
            .ok_or_else(|| CatalogError::Internal(format!("Purchase with id={} vanished", id)))
    }

    async fn delete_purchase(&self, id: i64) -> CatalogResult<Purchase> {
        let purchase = self
            .db
            .transaction::<_, Option<Purchase>, CatalogError>(|txn| {
                Box::pin(async move { restock_and_delete(txn, id).await })
            })
            .await
            .map_err(txn_err)?
            .ok_or_else(|| CatalogError::NotFound(format!("Purchase with id={} not found", id)))?;
        tracing::info!(purchase_id = id, "Deleted purchase, stock restored");
        Ok(purchase)
    }

    async fn delete_purchases_by_product(&self, product_id: i64) -> CatalogResult<usize> {
        let count = self
            .db
            .transaction::<_, usize, CatalogError>(move |txn| {
                Box::pin(async move {
                    let ids: Vec<i64> = purchase_item::Entity::find()
                        .filter(purchase_item::Column::ProductId.eq(product_id))
                        .all(txn)
                        .await?
                        .into_iter()
                        .map(|item| item.purchase_id)
                        .collect();
                    let mut deleted = 0;
                    for id in ids {
                        if restock_and_delete(txn, id).await?.is_some() {
                            deleted += 1;
                        }
                    }
                    Ok(deleted)
                })
            })
            .await
            .map_err(txn_err)?;
        tracing::info!(product_id, count, "Deleted purchases by product");
        Ok(count)
    }
}
