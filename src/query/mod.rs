pub mod cursor;
pub mod page;
pub mod predicate;
pub mod server;

pub use cursor::{CursorError, PageCursor};
pub use page::{clamp_limit, LocateResponse, PhotoPage};
pub use predicate::{Boundary, PageDirection, QueryPlan};
pub use server::QueryServer;
