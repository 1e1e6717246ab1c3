//! Find-or-create reconcilers, leaf first: address, party, product, order.
//!
//! Every reconciler takes the session it writes through, the Trading API
//! handle and the seller account explicitly. Committing is the caller's job.

pub mod address;
pub mod order;
pub mod party;
pub mod product;

pub use order::find_or_create_order;
pub use product::{export_catalog, export_inventory};
