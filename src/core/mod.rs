pub mod compliance;
pub mod messages;
pub mod record_parser;
pub mod scheduler;
pub mod table_selector;
pub mod workflows;

pub use crate::domain::model::{GroupMember, Link, Maintainer, Period, Record, Table};
pub use crate::domain::ports::{ConfigProvider, DocumentStore, GroupDirectory, Messenger, RawRow};
pub use crate::utils::error::Result;
