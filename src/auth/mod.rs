pub mod identity;
pub mod password;
pub mod token;

pub use identity::{Identity, IdentityError};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{
    device_fingerprint, Clock, ManualClock, ShortTokenPayload, SystemClock, TokenError, TokenService,
};
