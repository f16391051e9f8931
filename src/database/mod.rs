pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{
    AdminStore, CampaignStore, DataStore, NotificationStore, ProfileStore, ProposalStore,
    StoreError, TaskStore,
};
