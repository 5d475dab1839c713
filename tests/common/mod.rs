//! Shared fixtures for the REST integration tests
//!
//! Builds the invoicing catalog used across suites and wraps the router
//! produced by `ServerBuilder` in an `axum_test::TestServer`.

#![allow(dead_code)]

use axum_test::TestServer;
use entity_rest::prelude::*;
use serde_json::{Value, json};

/// Items, invoice lines, invoices, and users with roles
pub fn invoicing_entities() -> Vec<EntityDescriptor> {
    vec![
        entity!(abstract Named {
            name: text,
        }),
        entity!(Item extends Named {
            code: text [unique],
            price: decimal,
        }),
        entity!(Line {
            quantity: integer,
            item: many_to_one(Item),
        }),
        entity!(Invoice {
            number: text,
            date: timestamp,
            lines: one_to_many(Line),
        }),
        entity!(Role {
            name: text [unique, required],
        }),
        entity!(User {
            login: text [unique, required],
            active: boolean,
            roles: many_to_many(Role),
        }),
    ]
}

pub async fn make_server() -> TestServer {
    let app = ServerBuilder::new()
        .register_entities(invoicing_entities())
        .build()
        .await
        .unwrap();
    TestServer::new(app)
}

pub async fn make_server_with(builder: ServerBuilder) -> TestServer {
    let app = builder
        .register_entities(invoicing_entities())
        .build()
        .await
        .unwrap();
    TestServer::new(app)
}

/// POST an item and return the created body
pub async fn create_item(server: &TestServer, code: &str) -> Value {
    let response = server
        .post("/rest/item")
        .json(&json!({
            "name": "Test Item",
            "code": code,
            "price": 100.00
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}

pub fn uuid_of(body: &Value) -> String {
    body["uuid"].as_str().unwrap().to_string()
}
