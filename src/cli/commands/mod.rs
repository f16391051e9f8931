pub mod maintenance;
pub mod stats;
pub mod users;
