pub mod extraction;
pub mod order;
pub mod schema;
pub mod session;
