//! Ticket corpus loading and the stratified train/test split.

pub mod loader;
pub mod split;

pub use loader::{load_tickets, read_tickets, write_tickets};
pub use split::{class_distribution, stratified_split};
