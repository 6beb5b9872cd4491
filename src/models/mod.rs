pub mod appointment;
pub mod clinical;
pub mod directory;
pub mod enums;
pub mod shift;
pub mod time;

pub use appointment::*;
pub use clinical::*;
pub use directory::*;
pub use shift::*;
