pub mod health;
pub mod user;

pub use health::health;
pub use user::{create_user, login};
