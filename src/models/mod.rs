pub mod book;
pub mod borrow_record;
pub mod genre;
pub mod session;

pub use book::Book;
pub use borrow_record::{BorrowRecord, BorrowRequest};
pub use genre::Genre;
pub use session::{Destination, Role, Session, SessionContext};
