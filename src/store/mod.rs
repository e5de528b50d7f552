pub mod history;
pub mod info;

pub use history::BoundedHistory;
pub use info::InfoRegister;
