pub mod dispatcher;
pub mod notification_service;
pub mod store;

pub use dispatcher::*;
pub use notification_service::*;
pub use store::*;
