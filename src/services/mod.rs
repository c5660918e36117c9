pub mod password;

pub mod session;
pub use session::{SessionRejection, SessionService, SessionValidation};

pub mod auth;
pub use auth::{AuthError, AuthService, LoginOutcome, Registration};

pub mod auth_impl;
pub use auth_impl::SeaOrmAuthService;

pub mod image;
pub use image::{ImageError, ImageService};
