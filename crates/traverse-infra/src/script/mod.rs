//! Expression-engine adapters.

pub mod jexl;

pub use jexl::JexlEngine;
