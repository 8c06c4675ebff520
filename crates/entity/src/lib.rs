pub mod user;
pub mod device;
pub mod motion_event;

pub use user::Entity as User;
pub use device::Entity as Device;
pub use motion_event::Entity as MotionEvent;

pub use device::DeviceState;
