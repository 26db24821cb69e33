pub mod appointment;
pub mod enums;
pub mod prescription;
pub mod profile;
pub mod user;

pub use appointment::*;
pub use enums::*;
pub use prescription::*;
pub use profile::*;
pub use user::*;
