//! The samples the engine can run, looked up by name.

use crate::sample::FrameRenderer;

mod color_write_enable;
mod hello_triangle;

pub use color_write_enable::{ColorToggles, ColorWriteEnable};
pub use hello_triangle::HelloTriangle;

pub const COLOR_WRITE_ENABLE: &str = "color_write_enable";
pub const HELLO_TRIANGLE: &str = "hello_triangle";

pub const NAMES: &[&str] = &[COLOR_WRITE_ENABLE, HELLO_TRIANGLE];

pub fn create(name: &str) -> Option<Box<dyn FrameRenderer>> {
    match name {
        COLOR_WRITE_ENABLE => Some(Box::new(ColorWriteEnable::new())),
        HELLO_TRIANGLE => Some(Box::new(HelloTriangle::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_creates_its_sample() {
        for name in NAMES {
            let sample = create(name).unwrap();
            assert_eq!(sample.name(), *name);
        }
    }

    #[test]
    fn unknown_name() {
        assert!(create("barycentric").is_none());
    }
}
