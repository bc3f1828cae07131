pub mod actor;
pub mod address;
pub mod courier;
pub mod ledger;
pub mod order;
pub mod subscription;
pub mod zone;
