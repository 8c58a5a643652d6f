//! Command processing through the JSON envelope: single commands,
//! sequences, the confirmation gate, and error reporting.

use std::str::FromStr;
use std::sync::Arc;

use domain_assistant::{AssistantError, CommandOutcome, CommandProcessor};
use domain_catalog::{
    CatalogRepository, InMemoryCatalogRepository, NewCategory, NewProduct, PurchaseLineRequest,
};
use rust_decimal::Decimal;

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn setup() -> (Arc<InMemoryCatalogRepository>, CommandProcessor) {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    let processor = CommandProcessor::new(repo.clone(), None);
    (repo, processor)
}

async fn seed_product(repo: &InMemoryCatalogRepository, name: &str, slug: &str, price: &str, stock: i32) -> i64 {
    repo.insert_product(NewProduct {
        name: name.to_string(),
        slug: slug.to_string(),
        description: String::new(),
        price: dec(price),
        stock,
        is_active: true,
        category_ids: Vec::new(),
    })
    .await
    .unwrap()
    .id
}

fn completed(outcome: Option<CommandOutcome>) -> (String, String) {
    match outcome {
        Some(CommandOutcome::Completed(reply)) => (reply.detail, reply.answer),
        other => panic!("expected a completed outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_help_keyword_lists_commands() {
    let (_, processor) = setup();
    for keyword in ["help", "AYUDA"] {
        let (detail, answer) = completed(processor.process_if_command(keyword).await.unwrap());
        assert_eq!(detail, "Available commands.");
        assert!(answer.contains("create_product"));
        assert!(answer.contains("delete_purchases_by_product"));
    }
}

#[tokio::test]
async fn test_create_category_and_slug_suffixing() {
    let (_, processor) = setup();
    let (_, answer) = completed(
        processor
            .process_if_command(r#"{"action": "create_category", "data": {"name": "Drinks", "confirm": true}}"#)
            .await
            .unwrap(),
    );
    assert_eq!(answer, "Category Drinks (id=1, slug=drinks) created successfully.");

    let (_, answer) = completed(
        processor
            .process_if_command(r#"{"action": "create_category", "data": {"name": "Drinks", "confirm": true}}"#)
            .await
            .unwrap(),
    );
    assert_eq!(answer, "Category Drinks (id=2, slug=drinks-2) created successfully.");
}

#[tokio::test]
async fn test_create_category_without_name_suspends() {
    let (_, processor) = setup();
    let outcome = processor
        .process_if_command(r#"{"action": "create_category"}"#)
        .await
        .unwrap();
    let Some(CommandOutcome::Pending(signal)) = outcome else {
        panic!("expected a pending outcome");
    };
    assert_eq!(signal.detail, "The category name is missing.");
    assert_eq!(signal.requirements.len(), 1);
    assert_eq!(signal.requirements[0].field, "name");
    assert!(signal.confirmation_message.is_none());
}

#[tokio::test]
async fn test_delete_category_confirmation_gate() {
    let (repo, processor) = setup();
    repo.insert_category(NewCategory {
        name: "Snacks".to_string(),
        slug: "snacks".to_string(),
        description: String::new(),
        is_active: true,
    })
    .await
    .unwrap();

    let outcome = processor
        .process_if_command(r#"{"action": "delete_category", "data": {"category_slug": "snacks"}}"#)
        .await
        .unwrap();
    let Some(CommandOutcome::Pending(signal)) = outcome else {
        panic!("expected a pending outcome");
    };
    assert_eq!(
        signal.confirmation_message.as_deref(),
        Some("Do you want to delete the category 'Snacks'?")
    );
    // The suspended command must not carry stale confirmation fields.
    assert!(!signal.command.data.contains_key("confirm"));

    let outcome = processor
        .process_if_command(
            r#"{"action": "delete_category", "data": {"category_slug": "snacks", "confirm": false}}"#,
        )
        .await
        .unwrap();
    let Some(CommandOutcome::Cancelled { message }) = outcome else {
        panic!("expected a cancelled outcome");
    };
    assert_eq!(message, "The operation was cancelled by the user.");
    assert!(repo.find_category_by_slug("snacks").await.unwrap().is_some());

    let (_, answer) = completed(
        processor
            .process_if_command(
                r#"{"action": "delete_category", "data": {"category_slug": "snacks", "confirm": "si"}}"#,
            )
            .await
            .unwrap(),
    );
    assert_eq!(answer, "Category Snacks (id=1) deleted successfully.");
    assert!(repo.find_category_by_slug("snacks").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_product_with_stock_is_rejected_before_confirmation() {
    let (repo, processor) = setup();
    seed_product(&repo, "Coffee", "coffee", "9.99", 3).await;

    let err = processor
        .process_if_command(r#"{"action": "delete_product", "data": {"product_slug": "coffee"}}"#)
        .await
        .unwrap_err();
    match err {
        AssistantError::Conflict(message) => assert_eq!(
            message,
            "The product cannot be deleted because its stock is greater than 0."
        ),
        other => panic!("expected a conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_product_referenced_by_purchases_is_rejected_before_confirmation() {
    let (repo, processor) = setup();
    let product_id = seed_product(&repo, "Coffee", "coffee", "9.99", 1).await;
    repo.create_purchase(vec![PurchaseLineRequest {
        product_id,
        quantity: 1,
    }])
    .await
    .unwrap();

    // No confirm field: the reference check must reject the command
    // without ever asking for confirmation.
    let err = processor
        .process_if_command(
            r#"{"action": "delete_product", "data": {"product_slug": "coffee"}}"#,
        )
        .await
        .unwrap_err();
    match err {
        AssistantError::Conflict(message) => assert_eq!(
            message,
            "The product cannot be deleted because it is associated with existing purchases."
        ),
        other => panic!("expected a conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_purchase_and_listing() {
    let (repo, processor) = setup();
    let product_id = seed_product(&repo, "Coffee", "coffee", "3.50", 10).await;

    let (detail, answer) = completed(
        processor
            .process_if_command(
                r#"{"action": "create_purchase", "data": {"items": [{"product_id": 1, "quantity": 2}]}}"#,
            )
            .await
            .unwrap(),
    );
    assert_eq!(detail, "Purchase recorded.");
    assert!(answer.starts_with("The purchase was registered successfully."));
    assert!(answer.contains("7.00 EUR"));
    assert!(answer.contains("Coffee x2"));

    let product = repo.find_product_by_id(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 8);

    let (_, listing) = completed(
        processor
            .process_if_command(r#"{"action": "list_purchases"}"#)
            .await
            .unwrap(),
    );
    assert!(listing.contains("Purchase #1"));
}

#[tokio::test]
async fn test_sequence_aggregates_and_empty_list_is_a_noop() {
    let (_, processor) = setup();
    let payload = r#"{"commands": [
        {"action": "create_category", "data": {"name": "Drinks", "confirm": true}},
        {"action": "create_category", "data": {"name": "Snacks", "confirm": true}},
        {"action": "list_categories"}
    ]}"#;
    let (detail, answer) = completed(processor.process_if_command(payload).await.unwrap());
    assert_eq!(
        detail,
        "Category created.; Category created.; Categories listed."
    );
    let sections: Vec<&str> = answer.split("\n\n").collect();
    assert_eq!(sections.len(), 3);
    assert!(sections[2].contains("slug=drinks"));
    assert!(sections[2].contains("slug=snacks"));

    let (detail, answer) = completed(
        processor
            .process_if_command(r#"{"commands": []}"#)
            .await
            .unwrap(),
    );
    assert_eq!(detail, "No commands to execute.");
    assert_eq!(answer, "No commands were provided in the list.");
}

#[tokio::test]
async fn test_sequence_stops_at_first_suspension() {
    let (repo, processor) = setup();
    seed_product(&repo, "Coffee", "coffee", "3.50", 0).await;

    let payload = r#"{"commands": [
        {"action": "delete_product", "data": {"product_slug": "coffee"}},
        {"action": "create_category", "data": {"name": "Drinks", "confirm": true}}
    ]}"#;
    let outcome = processor.process_if_command(payload).await.unwrap();
    assert!(matches!(outcome, Some(CommandOutcome::Pending(_))));
    // The rest of the sequence must not have run.
    assert!(repo.list_categories().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_envelope_validation_errors() {
    let (_, processor) = setup();
    let cases = [
        ("{oops", "The JSON command is invalid."),
        (r#"{"data": {}}"#, "The command must include the 'action' field."),
        (
            r#"{"action": "fly_to_moon"}"#,
            "Unknown action: fly_to_moon. Type 'help' to see the options.",
        ),
        (
            r#"{"action": "list_products", "data": []}"#,
            "The 'data' field must be a JSON object.",
        ),
        (
            r#"{"commands": {}}"#,
            "The 'commands' field must be a list of objects.",
        ),
        (
            r#"{"commands": [{"data": {}}]}"#,
            "Each command must specify the 'action' field.",
        ),
        (
            r#"{"commands": [{"action": "fly_to_moon"}]}"#,
            "Unknown action in the sequence: fly_to_moon.",
        ),
    ];
    for (payload, expected) in cases {
        let err = processor.process_if_command(payload).await.unwrap_err();
        match err {
            AssistantError::Validation(message) => assert_eq!(message, expected, "{payload}"),
            other => panic!("expected a validation error for {payload}, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_free_text_without_interpreter_is_not_a_command() {
    let (_, processor) = setup();
    let outcome = processor
        .process_if_command("which products are cheap?")
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_product_metrics_with_name_tie_break() {
    let (repo, processor) = setup();
    seed_product(&repo, "Beans", "beans", "9.99", 5).await;
    seed_product(&repo, "Arabica", "arabica", "9.99", 5).await;
    seed_product(&repo, "Filter", "filter", "1.00", 5).await;

    let (_, answer) = completed(
        processor
            .process_if_command(r#"{"action": "product_metrics"}"#)
            .await
            .unwrap(),
    );
    let lines: Vec<&str> = answer.lines().collect();
    assert_eq!(lines[0], "Product with the highest price: Arabica (price 9.99 EUR, stock 5)");
    assert_eq!(lines[1], "Product with the lowest price: Filter (price 1.00 EUR, stock 5)");
}
