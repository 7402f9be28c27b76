pub mod chat;
pub mod followup;
pub mod health_data;
pub mod prescription;
pub mod user;

pub use chat::*;
pub use followup::*;
pub use health_data::*;
pub use prescription::*;
pub use user::*;
