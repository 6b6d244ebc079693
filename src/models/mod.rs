pub mod auth;
pub mod collection_sharing;
pub mod credit;
pub mod device;
pub mod oauth_state;
pub mod pricing;
pub mod token_balance;
pub mod token_blacklist;
pub mod transaction;
pub mod user;
pub mod vector_document;

pub use auth::*;
pub use collection_sharing::CollectionSharing;
pub use credit::Credit;
pub use device::{Device, DeviceError};
pub use oauth_state::OAuthState;
pub use pricing::{Pricing, PricingCategory};
pub use token_balance::TokenBalance;
pub use token_blacklist::TokenBlacklistEntry;
pub use transaction::{Transaction, TransactionType};
pub use user::*;
pub use vector_document::{CollectionType, EMBEDDING_DIMENSION};
