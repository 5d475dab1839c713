//! Invoicing Example
//!
//! Items, invoices and invoice lines declared in code, users and roles
//! declared in `invoicing.yaml` together with their seed records. Every type
//! gets the same five routes under `/rest`.
//!
//! Pass a YAML path as the first argument to use another configuration.

use anyhow::Result;
use entity_rest::prelude::*;

const DEFAULT_CONFIG: &str = include_str!("invoicing.yaml");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,entity_rest=debug")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_yaml_file(path)?,
        None => AppConfig::from_yaml_str(DEFAULT_CONFIG)?,
    };
    let addr = config.server.bind.clone();

    let builder = ServerBuilder::new()
        .with_config(config)
        .register_entity(entity!(Item {
            name: text,
            code: text [unique, required],
            price: decimal,
        }))
        .register_entity(entity!(Line {
            quantity: integer,
            item: many_to_one(Item) [required],
        }))
        .register_entity(entity!(Invoice {
            number: text [unique],
            date: timestamp,
            lines: one_to_many(Line),
        }));

    println!("🚀 Starting entity-rest on http://{}", addr);
    println!("\n📚 Routes:");
    println!("    GET    /rest/{{entity}}          - List all records");
    println!("    POST   /rest/{{entity}}          - Create a record");
    println!("    GET    /rest/{{entity}}/{{uuid}}   - Get a record");
    println!("    PUT    /rest/{{entity}}/{{uuid}}   - Update a record");
    println!("    DELETE /rest/{{entity}}/{{uuid}}   - Delete a record");
    println!("    GET    /api-docs/entities       - Entity catalog");
    println!("    GET    /health                  - Liveness");
    println!("\n💡 Try:");
    println!(
        r#"    curl -X POST http://{}/rest/item -H 'Content-Type: application/json' -d '{{"name":"Widget","code":"W-1","price":9.99}}'"#,
        addr
    );

    builder.serve().await
}
