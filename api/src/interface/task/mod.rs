mod clone;
mod execve;
mod exit;
mod info;
mod resource;
mod spawn;
mod wait;

pub use self::clone::*;
pub use self::execve::*;
pub use self::exit::*;
pub use self::info::*;
pub use self::resource::*;
pub use self::spawn::*;
pub use self::wait::*;
