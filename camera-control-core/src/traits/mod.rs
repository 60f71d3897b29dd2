pub mod camera_delegate;
pub mod capture_device;
pub mod device_provider;
