//! Core library for Consilium.
//!
//! This crate provides the domain models, input validation, credential
//! handling and database operations for Consilium, independent of any
//! transport layer.
//!
//! # Usage
//!
//! ```no_run
//! use consilium_core::db::Database;
//! use consilium_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let account = db.create_account(
//!     CreateAccountInput {
//!         phone: "+998901234567".into(),
//!         name: "Dr. Karimova".into(),
//!         email: None,
//!         password: "correct horse battery".into(),
//!         is_staff: false,
//!     },
//!     600_000,
//! )?;
//! let page = db.list_analyses(account.id, &AnalysisFilter::default(), PageRequest::default())?;
//! # Ok::<(), consilium_core::StoreError>(())
//! ```

pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types at crate root
pub use db::Database;
pub use error::StoreError;
pub use validation::FieldErrors;
