//! Port definitions for the collaborators the image engine talks to.

mod image_target_port;
mod image_transport_port;

pub use image_target_port::{ImageStack, ImageTarget};
pub use image_transport_port::ImageTransport;
