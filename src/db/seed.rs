//! Demo retail schema for fresh databases.
//!
//! A brand-new store has nothing to ask questions about, so startup can lay
//! down the small customers/orders/products schema the service has always
//! shipped for demos. Existing databases are never touched.

use thiserror::Error;
use tracing::info;

use crate::db::pool::DbPool;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("no database connection available: {0}")]
    PoolExhausted(String),

    #[error("seed statement failed: {0}")]
    Statement(String),

    #[error("seed worker failed: {0}")]
    Worker(String),
}

const DEMO_SCHEMA: &str = "
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    email VARCHAR,
    created_at TIMESTAMP
);

CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    price DOUBLE,
    category VARCHAR
);

CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER REFERENCES customers(id),
    amount DOUBLE,
    status VARCHAR,
    order_date DATE
);

CREATE TABLE order_items (
    id INTEGER PRIMARY KEY,
    order_id INTEGER REFERENCES orders(id),
    product_id INTEGER REFERENCES products(id),
    quantity INTEGER,
    price DOUBLE
);

INSERT INTO customers VALUES
    (1, 'John Doe', 'john@example.com', '2024-01-15 09:30:00'),
    (2, 'Jane Smith', 'jane@example.com', '2024-02-03 14:05:00'),
    (3, 'Ravi Patel', 'ravi@example.com', '2024-03-21 11:47:00');

INSERT INTO products VALUES
    (201, 'Laptop', 999.99, 'Electronics'),
    (202, 'Mouse', 24.99, 'Accessories'),
    (203, 'Monitor', 249.50, 'Electronics');

INSERT INTO orders VALUES
    (101, 1, 99.99, 'completed', '2024-03-01'),
    (102, 2, 149.99, 'pending', '2024-03-04'),
    (103, 1, 1024.98, 'completed', '2024-04-11');

INSERT INTO order_items VALUES
    (1, 101, 202, 4, 99.96),
    (2, 102, 203, 1, 249.50),
    (3, 103, 201, 1, 999.99),
    (4, 103, 202, 1, 24.99);
";

/// Creates the demo schema when the database has no tables yet. Returns
/// whether the seed ran.
pub async fn seed_if_empty(pool: &DbPool) -> Result<bool, SeedError> {
    let pool = pool.clone();
    let worker = tokio::task::spawn_blocking(move || -> Result<bool, SeedError> {
        let conn = pool
            .get()
            .map_err(|e| SeedError::PoolExhausted(e.to_string()))?;

        let table_count: i64 = conn
            .query_row(
                "SELECT count(*)
                 FROM information_schema.tables
                 WHERE table_schema = 'main' AND table_type = 'BASE TABLE'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| SeedError::Statement(e.to_string()))?;
        if table_count > 0 {
            return Ok(false);
        }

        conn.execute_batch(DEMO_SCHEMA)
            .map_err(|e| SeedError::Statement(e.to_string()))?;
        Ok(true)
    });

    let seeded = worker
        .await
        .map_err(|e| SeedError::Worker(e.to_string()))??;
    if seeded {
        info!("seeded demo retail schema (customers, orders, products, order_items)");
    }
    Ok(seeded)
}
