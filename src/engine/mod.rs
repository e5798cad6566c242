pub mod image_store;
pub mod laptop_store;
pub mod rating_store;

pub use image_store::DiskImageStore;
pub use laptop_store::MemLaptopStore;
pub use rating_store::MemRatingStore;
