pub mod app;
pub mod fakes;

pub use app::spawn_app;
pub use fakes::CountingSender;
