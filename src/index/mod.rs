pub mod library;
pub mod scan;

pub use library::{GalleryError, PhotoLibrary};
pub use scan::scan_roots;
