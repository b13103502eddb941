pub mod device;
pub mod error;
pub mod image;

pub use device::{BlockDevice, Chs, Disk, Geometry, SectorMedium, READ_ATTEMPTS, SECTOR_SIZE};
pub use error::BootFsError;
pub use image::ImageMedium;
