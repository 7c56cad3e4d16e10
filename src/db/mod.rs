pub mod executor;
pub mod guard;
pub mod introspect;
pub mod pool;
pub mod seed;
