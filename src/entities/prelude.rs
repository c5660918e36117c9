pub use super::images::Entity as Images;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
