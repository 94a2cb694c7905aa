use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use schemaforge_core::TypeId;
use schemaforge_crawl::{CrawlError, CrawlOptions, Crawler, LoadError, MemoryLoader};
use schemaforge_plan::{Plan, PlanError, PlanKind, PlanOptions, StrategyChain, Typer};
use serde_json::{json, Value};

fn crawler(
    documents: Vec<(&str, Value)>,
    options: CrawlOptions,
) -> Result<(Crawler, Arc<MemoryLoader>)> {
    let loader = Arc::new(MemoryLoader::memory(documents));
    let plan_options = PlanOptions::default();
    let typer = Typer::new(loader.clone(), &plan_options)?;
    let chain = StrategyChain::standard(plan_options);
    let crawler = Crawler::new(Arc::new(chain), loader.clone(), Arc::new(typer), options);
    Ok((crawler, loader))
}

fn type_names(plans: &[Plan]) -> Vec<String> {
    let mut names: Vec<String> = plans.iter().map(|plan| plan.type_id.to_string()).collect();
    names.sort();
    names
}

fn order_graph() -> Vec<(&'static str, Value)> {
    vec![
        (
            "file:///schemas/order.json",
            json!({
                "type": "object",
                "properties": {
                    "customer": { "$ref": "customer.json" },
                    "lines": { "type": "array", "items": { "$ref": "line.json" } }
                }
            }),
        ),
        (
            "file:///schemas/customer.json",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "last_order": { "$ref": "order.json" }
                }
            }),
        ),
        (
            "file:///schemas/line.json",
            json!({
                "type": "object",
                "properties": {
                    "product": { "$ref": "product.json" },
                    "quantity": { "type": "integer", "minimum": 1 }
                }
            }),
        ),
        (
            "file:///schemas/product.json",
            json!({
                "type": "object",
                "properties": {
                    "sku": { "type": "string" },
                    "customer": { "$ref": "customer.json" }
                }
            }),
        ),
    ]
}

#[tokio::test]
async fn crawls_each_named_type_once_through_cycles() -> Result<()> {
    let (crawler, _) = crawler(order_graph(), CrawlOptions::default())?;

    let plans = crawler.collect(["file:///schemas/order.json"]).await?;

    assert_eq!(
        type_names(&plans),
        vec![
            "customer.Customer",
            "line.Line",
            "order.Order",
            "order.OrderLines",
            "product.Product",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn single_permit_crawl_matches_parallel_crawl() -> Result<()> {
    let (parallel, _) = crawler(order_graph(), CrawlOptions::default())?;
    let (serial, _) = crawler(
        order_graph(),
        CrawlOptions {
            max_concurrency: 1,
            output_buffer: 1,
            ..CrawlOptions::default()
        },
    )?;

    let parallel = parallel.collect(["file:///schemas/order.json"]).await?;
    let serial = serial.collect(["file:///schemas/order.json"]).await?;

    assert_eq!(type_names(&parallel), type_names(&serial));
    Ok(())
}

#[tokio::test]
async fn shared_dependency_of_two_roots_is_planned_once() -> Result<()> {
    let (crawler, loader) = crawler(
        vec![
            (
                "file:///schemas/invoice.json",
                json!({ "type": "object", "properties": { "address": { "$ref": "address.json" } } }),
            ),
            (
                "file:///schemas/shipment.json",
                json!({ "type": "object", "properties": { "to": { "$ref": "address.json" } } }),
            ),
            (
                "file:///schemas/address.json",
                json!({ "type": "object", "properties": { "street": { "type": "string" } } }),
            ),
        ],
        CrawlOptions::default(),
    )?;

    let plans = crawler
        .collect([
            "file:///schemas/invoice.json",
            "file:///schemas/shipment.json",
        ])
        .await?;

    let addresses = plans
        .iter()
        .filter(|plan| plan.type_id == TypeId::named("address", "Address"))
        .count();
    assert_eq!(addresses, 1);
    assert_eq!(plans.len(), 3);
    assert_eq!(loader.source().fetch_count(), 3);
    Ok(())
}

#[tokio::test]
async fn unplannable_schema_fails_the_whole_crawl() -> Result<()> {
    let documents = vec![
        (
            "file:///schemas/form.json",
            json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "answer": { "$ref": "either.json" }
                }
            }),
        ),
        (
            "file:///schemas/either.json",
            json!({ "oneOf": [{ "type": "string" }, { "type": "string", "minLength": 2 }] }),
        ),
    ];

    let (collecting, _) = crawler(documents.clone(), CrawlOptions::default())?;
    let err = collecting
        .collect(["file:///schemas/form.json"])
        .await
        .expect_err("unplannable dependency");
    assert!(matches!(
        err,
        CrawlError::Plan { ref schema, source: PlanError::Unplannable(_) }
            if schema == "file:///schemas/either.json"
    ));

    let (streaming, _) = crawler(documents, CrawlOptions::default())?;
    let mut stream = streaming.crawl(["file:///schemas/form.json"]);
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    let errors = items.iter().filter(|item| item.is_err()).count();
    assert_eq!(errors, 1);
    assert!(items.last().is_some_and(|item| item.is_err()));
    Ok(())
}

#[tokio::test]
async fn root_load_failure_names_the_uri() -> Result<()> {
    let (crawler, _) = crawler(
        vec![("file:///schemas/present.json", json!({ "type": "object" }))],
        CrawlOptions::default(),
    )?;

    let err = crawler
        .collect([
            "file:///schemas/present.json",
            "file:///schemas/missing.json",
        ])
        .await
        .expect_err("missing root");

    match err {
        CrawlError::Load { uri, source } => {
            assert_eq!(uri, "file:///schemas/missing.json");
            assert!(matches!(source, LoadError::NotFound(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn excluded_and_explicit_types_are_not_planned() -> Result<()> {
    let (crawler, _) = crawler(
        vec![
            (
                "file:///schemas/account.json",
                json!({
                    "type": "object",
                    "properties": { "legacy": { "$ref": "legacy.json" } }
                }),
            ),
            (
                "file:///schemas/legacy.json",
                json!({
                    "oneOf": [{ "type": "string" }, { "type": "string" }],
                    "x-schemaforge": { "exclude": true }
                }),
            ),
            (
                "file:///schemas/stamp.json",
                json!({ "type": "object", "x-schemaforge": { "type": "time.Time" } }),
            ),
        ],
        CrawlOptions::default(),
    )?;

    let plans = crawler
        .collect([
            "file:///schemas/account.json",
            "file:///schemas/stamp.json",
        ])
        .await?;

    assert_eq!(type_names(&plans), vec!["account.Account"]);
    Ok(())
}

#[tokio::test]
async fn definitions_are_crawled_on_request() -> Result<()> {
    let documents = vec![(
        "file:///schemas/catalog.json",
        json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "definitions": {
                "Unused": { "type": "object", "properties": { "id": { "type": "integer" } } }
            }
        }),
    )];

    let (without, _) = crawler(documents.clone(), CrawlOptions::default())?;
    let plans = without.collect(["file:///schemas/catalog.json"]).await?;
    assert_eq!(type_names(&plans), vec!["catalog.Catalog"]);

    let (with, _) = crawler(
        documents,
        CrawlOptions {
            include_definitions: true,
            ..CrawlOptions::default()
        },
    )?;
    let plans = with.collect(["file:///schemas/catalog.json"]).await?;
    assert_eq!(type_names(&plans), vec!["catalog.Catalog", "catalog.Unused"]);
    Ok(())
}

#[tokio::test]
async fn no_roots_yield_no_plans() -> Result<()> {
    let (crawler, _) = crawler(Vec::new(), CrawlOptions::default())?;
    let plans = crawler.collect(Vec::<String>::new()).await?;
    assert!(plans.is_empty());
    Ok(())
}

fn chain_graph(length: usize) -> Vec<(String, Value)> {
    (0..length)
        .map(|idx| {
            let mut properties = serde_json::Map::new();
            properties.insert("label".to_string(), json!({ "type": "string" }));
            if idx + 1 < length {
                properties.insert(
                    "next".to_string(),
                    json!({ "$ref": format!("step{}.json", idx + 1) }),
                );
            }
            (
                format!("file:///schemas/step{idx}.json"),
                json!({ "type": "object", "properties": properties }),
            )
        })
        .collect()
}

#[tokio::test]
async fn cancelled_crawl_stops_forwarding_and_ends() -> Result<()> {
    const STEPS: usize = 200;
    let loader = Arc::new(MemoryLoader::memory(chain_graph(STEPS)));
    let plan_options = PlanOptions::default();
    let typer = Typer::new(loader.clone(), &plan_options)?;
    let crawler = Crawler::new(
        Arc::new(StrategyChain::standard(plan_options)),
        loader,
        Arc::new(typer),
        CrawlOptions {
            max_concurrency: 1,
            output_buffer: 1,
            ..CrawlOptions::default()
        },
    );

    let mut stream = crawler.crawl(["file:///schemas/step0.json"]);
    let first = stream.next().await.expect("first item")?;
    assert_eq!(first.type_id, TypeId::named("step0", "Step0"));
    stream.cancel();

    let mut after_cancel = 0;
    while let Some(item) = stream.next().await {
        item?;
        after_cancel += 1;
    }
    // Only what already sat in the one-slot buffer can still arrive.
    assert!(after_cancel <= 1, "{after_cancel} plans arrived after cancel");
    assert!(1 + after_cancel < STEPS);
    Ok(())
}

#[tokio::test]
async fn cancelling_before_the_first_plan_yields_no_error() -> Result<()> {
    let (crawler, _) = crawler(order_graph(), CrawlOptions::default())?;

    let mut stream = crawler.crawl(["file:///schemas/order.json"]);
    stream.cancel();

    let mut seen = BTreeSet::new();
    while let Some(item) = stream.next().await {
        let plan = item?;
        assert!(seen.insert(plan.type_id.to_string()));
    }
    assert!(seen.len() < 5, "a cancelled crawl delivered every plan");
    Ok(())
}

#[tokio::test]
async fn anchored_roots_in_one_module_keep_distinct_inline_types() -> Result<()> {
    let (crawler, _) = crawler(
        vec![
            (
                "file:///schemas/widget.json",
                json!({
                    "$id": "pkg#Widget",
                    "type": "object",
                    "properties": {
                        "meta": { "type": "object", "properties": { "x": { "type": "string" } } }
                    }
                }),
            ),
            (
                "file:///schemas/gadget.json",
                json!({
                    "$id": "pkg#Gadget",
                    "type": "object",
                    "properties": {
                        "meta": { "type": "object", "properties": { "y": { "type": "integer" } } }
                    }
                }),
            ),
        ],
        CrawlOptions::default(),
    )?;

    let plans = crawler
        .collect([
            "file:///schemas/widget.json",
            "file:///schemas/gadget.json",
        ])
        .await?;

    assert_eq!(
        type_names(&plans),
        vec!["pkg.Gadget", "pkg.GadgetMeta", "pkg.Widget", "pkg.WidgetMeta"]
    );
    let gadget_meta = plans
        .iter()
        .find(|plan| plan.type_id == TypeId::named("pkg", "GadgetMeta"))
        .expect("gadget meta");
    let PlanKind::Record(record) = &gadget_meta.shape else {
        panic!("expected record, got {}", gadget_meta.shape.name());
    };
    assert_eq!(record.fields[0].name, "Y");
    Ok(())
}

#[tokio::test]
async fn identities_declared_by_two_documents_fail_the_load() -> Result<()> {
    let (crawler, _) = crawler(
        vec![
            (
                "file:///schemas/a.json",
                json!({ "$id": "shared.json", "type": "object" }),
            ),
            (
                "file:///schemas/b.json",
                json!({ "$id": "shared.json", "type": "object" }),
            ),
        ],
        CrawlOptions::default(),
    )?;

    let err = crawler
        .collect(["file:///schemas/a.json", "file:///schemas/b.json"])
        .await
        .expect_err("conflicting identities");
    assert!(matches!(
        err,
        CrawlError::Load {
            source: LoadError::Schema(_),
            ..
        }
    ));
    Ok(())
}
