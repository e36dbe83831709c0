pub mod entity;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod scope;
pub mod seed;
pub mod store;

pub use entity::{column_cast, EntityKind, Ownership, TENANT_COLUMN};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{Entity, GlobalEntity, Repository, TenantOwned};
pub use seed::{seed_catalog, SeedReport};
pub use scope::{apply_tenant_scope, scope_to_tenant, Operation, QueryArgs};
pub use store::{increment, Row, Store, StoreError, WriteBatch};
