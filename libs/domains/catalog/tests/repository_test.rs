//! Repository tests for the catalog domain, run against the in-memory
//! implementation. The Postgres implementation exposes the same trait
//! with identical semantics.

use std::str::FromStr;

use rust_decimal::Decimal;

use domain_catalog::{
    CatalogError, CatalogRepository, CategoryChanges, InMemoryCatalogRepository, NewCategory,
    NewProduct, ProductPatch, ProductSortField, PurchaseFilter, PurchaseLineRequest,
    SortDirection,
};

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

fn new_category(name: &str, slug: &str) -> NewCategory {
    NewCategory {
        name: name.to_string(),
        slug: slug.to_string(),
        description: String::new(),
        is_active: true,
    }
}

fn new_product(name: &str, slug: &str, price: &str, stock: i32) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        slug: slug.to_string(),
        description: String::new(),
        price: dec(price),
        stock,
        is_active: true,
        category_ids: Vec::new(),
    }
}

#[tokio::test]
async fn test_category_slug_conflict() {
    let repo = InMemoryCatalogRepository::new();
    repo.insert_category(new_category("Drinks", "drinks"))
        .await
        .unwrap();

    let err = repo
        .insert_category(new_category("Other Drinks", "drinks"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)));

    assert!(repo.category_slug_exists("drinks", None).await.unwrap());
    let existing = repo.find_category_by_slug("drinks").await.unwrap().unwrap();
    assert!(!repo
        .category_slug_exists("drinks", Some(existing.id))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_find_categories_by_name_is_case_insensitive() {
    let repo = InMemoryCatalogRepository::new();
    repo.insert_category(new_category("Drinks", "drinks"))
        .await
        .unwrap();

    let found = repo.find_categories_by_name("dRiNkS").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Drinks");
}

#[tokio::test]
async fn test_insert_product_with_categories() {
    let repo = InMemoryCatalogRepository::new();
    let drinks = repo
        .insert_category(new_category("Drinks", "drinks"))
        .await
        .unwrap();
    let snacks = repo
        .insert_category(new_category("Snacks", "snacks"))
        .await
        .unwrap();

    let mut input = new_product("Cola", "cola", "1.50", 10);
    input.category_ids = vec![snacks.id, drinks.id];
    let product = repo.insert_product(input).await.unwrap();

    // Categories come back sorted by name.
    assert_eq!(product.category_names(), vec!["Drinks", "Snacks"]);

    let listing = repo.list_categories().await.unwrap();
    assert_eq!(listing[0].category.name, "Drinks");
    assert_eq!(listing[0].product_names, vec!["Cola"]);
}

#[tokio::test]
async fn test_product_listing_order() {
    let repo = InMemoryCatalogRepository::new();
    repo.insert_product(new_product("Banana", "banana", "2.00", 5))
        .await
        .unwrap();
    repo.insert_product(new_product("Apple", "apple", "3.00", 5))
        .await
        .unwrap();
    repo.insert_product(new_product("Cherry", "cherry", "2.00", 5))
        .await
        .unwrap();

    let by_name = repo
        .list_products(&[(ProductSortField::Name, SortDirection::Asc)])
        .await
        .unwrap();
    let names: Vec<&str> = by_name.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Apple", "Banana", "Cherry"]);

    // Price descending, name ascending as tie-break.
    let by_price = repo
        .list_products(&[
            (ProductSortField::Price, SortDirection::Desc),
            (ProductSortField::Name, SortDirection::Asc),
        ])
        .await
        .unwrap();
    let names: Vec<&str> = by_price.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Apple", "Banana", "Cherry"]);
}

#[tokio::test]
async fn test_update_product_categories_replace_add_remove() {
    let repo = InMemoryCatalogRepository::new();
    let a = repo
        .insert_category(new_category("A", "a"))
        .await
        .unwrap();
    let b = repo
        .insert_category(new_category("B", "b"))
        .await
        .unwrap();
    let c = repo
        .insert_category(new_category("C", "c"))
        .await
        .unwrap();

    let mut input = new_product("Widget", "widget", "9.99", 3);
    input.category_ids = vec![a.id];
    let product = repo.insert_product(input).await.unwrap();

    let changes = CategoryChanges {
        replace: Some(vec![b.id]),
        add: vec![c.id],
        remove: vec![b.id],
    };
    let updated = repo
        .update_product(product.id, ProductPatch::default(), changes)
        .await
        .unwrap();
    assert_eq!(updated.category_names(), vec!["C"]);
}

#[tokio::test]
async fn test_create_purchase_freezes_price_and_decrements_stock() {
    let repo = InMemoryCatalogRepository::new();
    let product = repo
        .insert_product(new_product("Cola", "cola", "1.50", 10))
        .await
        .unwrap();

    let purchase = repo
        .create_purchase(vec![PurchaseLineRequest {
            product_id: product.id,
            quantity: 4,
        }])
        .await
        .unwrap();

    assert_eq!(purchase.total_price, dec("6.00"));
    assert_eq!(purchase.lines.len(), 1);
    assert_eq!(purchase.lines[0].unit_price, dec("1.50"));
    assert_eq!(purchase.total_items(), 4);

    let product = repo.find_product_by_id(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 6);

    // Later price changes do not rewrite the recorded line.
    repo.update_product(
        product.id,
        ProductPatch {
            price: Some(dec("9.00")),
            ..Default::default()
        },
        CategoryChanges::default(),
    )
    .await
    .unwrap();
    let purchase = repo.find_purchase(purchase.id).await.unwrap().unwrap();
    assert_eq!(purchase.lines[0].unit_price, dec("1.50"));
}

#[tokio::test]
async fn test_create_purchase_is_atomic_on_stock_failure() {
    let repo = InMemoryCatalogRepository::new();
    let cola = repo
        .insert_product(new_product("Cola", "cola", "1.50", 10))
        .await
        .unwrap();
    let chips = repo
        .insert_product(new_product("Chips", "chips", "2.00", 1))
        .await
        .unwrap();

    let err = repo
        .create_purchase(vec![
            PurchaseLineRequest {
                product_id: cola.id,
                quantity: 2,
            },
            PurchaseLineRequest {
                product_id: chips.id,
                quantity: 5,
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::InsufficientStock { .. }));

    // The first line must not have been applied.
    let cola = repo.find_product_by_id(cola.id).await.unwrap().unwrap();
    assert_eq!(cola.stock, 10);
    assert!(repo
        .list_purchases(&PurchaseFilter::default(), &[])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_delete_purchase_restores_stock() {
    let repo = InMemoryCatalogRepository::new();
    let product = repo
        .insert_product(new_product("Cola", "cola", "1.50", 10))
        .await
        .unwrap();
    let purchase = repo
        .create_purchase(vec![PurchaseLineRequest {
            product_id: product.id,
            quantity: 3,
        }])
        .await
        .unwrap();

    let deleted = repo.delete_purchase(purchase.id).await.unwrap();
    assert_eq!(deleted.id, purchase.id);

    let product = repo.find_product_by_id(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);
    assert!(repo.find_purchase(purchase.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_product_conflicts_while_referenced() {
    let repo = InMemoryCatalogRepository::new();
    let product = repo
        .insert_product(new_product("Cola", "cola", "1.50", 10))
        .await
        .unwrap();
    repo.create_purchase(vec![PurchaseLineRequest {
        product_id: product.id,
        quantity: 1,
    }])
    .await
    .unwrap();

    let err = repo.delete_product(product.id).await.unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)));
    assert!(repo.product_has_purchases(product.id).await.unwrap());

    // Removing the purchases unblocks the delete.
    let removed = repo.delete_purchases_by_product(product.id).await.unwrap();
    assert_eq!(removed, 1);
    repo.delete_product(product.id).await.unwrap();
    assert!(repo.find_product_by_id(product.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purchase_filter_by_total_and_product() {
    let repo = InMemoryCatalogRepository::new();
    let cola = repo
        .insert_product(new_product("Cola", "cola", "1.00", 100))
        .await
        .unwrap();
    let chips = repo
        .insert_product(new_product("Chips", "chips", "5.00", 100))
        .await
        .unwrap();

    repo.create_purchase(vec![PurchaseLineRequest {
        product_id: cola.id,
        quantity: 2,
    }])
    .await
    .unwrap();
    repo.create_purchase(vec![PurchaseLineRequest {
        product_id: chips.id,
        quantity: 2,
    }])
    .await
    .unwrap();

    let filter = PurchaseFilter {
        min_total: Some(dec("5.00")),
        ..Default::default()
    };
    let expensive = repo.list_purchases(&filter, &[]).await.unwrap();
    assert_eq!(expensive.len(), 1);
    assert_eq!(expensive[0].total_price, dec("10.00"));

    let filter = PurchaseFilter {
        product_id: Some(cola.id),
        ..Default::default()
    };
    let with_cola = repo.list_purchases(&filter, &[]).await.unwrap();
    assert_eq!(with_cola.len(), 1);
    assert_eq!(with_cola[0].lines[0].product_name, "Cola");
}

#[tokio::test]
async fn test_assign_category_is_idempotent() {
    let repo = InMemoryCatalogRepository::new();
    let category = repo
        .insert_category(new_category("Drinks", "drinks"))
        .await
        .unwrap();
    let product = repo
        .insert_product(new_product("Cola", "cola", "1.50", 10))
        .await
        .unwrap();

    repo.assign_category(product.id, category.id).await.unwrap();
    repo.assign_category(product.id, category.id).await.unwrap();
    let product = repo.find_product_by_id(product.id).await.unwrap().unwrap();
    assert_eq!(product.category_names(), vec!["Drinks"]);

    repo.unassign_category(product.id, category.id)
        .await
        .unwrap();
    repo.unassign_category(product.id, category.id)
        .await
        .unwrap();
    let product = repo.find_product_by_id(product.id).await.unwrap().unwrap();
    assert!(product.categories.is_empty());
}

#[tokio::test]
async fn test_assign_category_to_all() {
    let repo = InMemoryCatalogRepository::new();
    let category = repo
        .insert_category(new_category("Everything", "everything"))
        .await
        .unwrap();
    repo.insert_product(new_product("Cola", "cola", "1.50", 10))
        .await
        .unwrap();
    repo.insert_product(new_product("Chips", "chips", "2.00", 5))
        .await
        .unwrap();

    let count = repo.assign_category_to_all(category.id).await.unwrap();
    assert_eq!(count, 2);
    let listing = repo.list_categories().await.unwrap();
    assert_eq!(listing[0].product_names, vec!["Chips", "Cola"]);
}
