pub mod alert;
pub mod budget;
pub mod codigo;
pub mod event;
pub mod goal;
pub mod physical_store;
pub mod transaction;
pub mod user;

pub use alert::*;
pub use budget::*;
pub use codigo::*;
pub use event::*;
pub use goal::*;
pub use physical_store::*;
pub use transaction::*;
pub use user::*;
