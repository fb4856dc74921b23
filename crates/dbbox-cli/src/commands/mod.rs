pub mod dispatch;
pub mod ping;
pub mod query;
pub mod shared;
pub mod status;
pub mod table;
