pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod notification;
pub mod pricing;

pub use catalog::Catalog;
pub use ledger::{BookingLedger, BookingRules};
pub use notification::Notifier;
pub use pricing::PriceBook;
