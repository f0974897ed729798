pub mod page;
pub mod page_guard;

pub use page::{MutRefPageData, Page, RefPageData};
pub use page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
