//! UI overlay seam.
//!
//! Samples describe their settings through [`Drawer`] every frame and report
//! whether anything changed. The engine ships a keyboard driven drawer: the
//! widgets are numbered in the order they are declared and the digit keys
//! activate them.

use vulkanalia::{vk, Device};

pub trait Drawer {
    /// Starts a group of widgets. Returns whether the group is expanded.
    fn header(&mut self, caption: &str) -> bool;

    /// Returns `true` when `value` was changed.
    fn checkbox(&mut self, caption: &str, value: &mut bool) -> bool;

    /// Returns `true` when `value` was changed. `value` stays within `min..=max`.
    fn slider_float(&mut self, caption: &str, value: &mut f32, min: f32, max: f32) -> bool;
}

/// Draw hook invoked inside the last subpass of a sample's render pass.
pub trait UiOverlay {
    unsafe fn draw(&self, device: &Device, command_buffer: vk::CommandBuffer);
}

/// Overlay that records nothing, the widget state lives in the window title.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullOverlay;

impl UiOverlay for NullOverlay {
    unsafe fn draw(&self, _device: &Device, _command_buffer: vk::CommandBuffer) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

/// Number of steps a slider takes to cross its whole range.
const SLIDER_STEPS: f32 = 10.0;

/// [`Drawer`] fed by key presses.
///
/// Presses queued with [`KeyboardDrawer::press`] are consumed by the next
/// frame; `press(0, Step::Up)` activates the first widget declared.
#[derive(Debug, Default)]
pub struct KeyboardDrawer {
    pending: Vec<(usize, Step)>,
    next_widget: usize,
    entries: Vec<String>,
}

impl KeyboardDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, widget: usize, step: Step) {
        self.pending.push((widget, step));
    }

    pub fn begin_frame(&mut self) {
        self.next_widget = 0;
        self.entries.clear();
    }

    /// Drops presses that did not match a widget this frame.
    pub fn end_frame(&mut self) {
        for (widget, _) in self.pending.drain(..) {
            log::debug!("No widget bound to key {}", widget + 1);
        }
    }

    /// Widget state of the last frame, e.g. `1:Red=0.00 4:[x]Red bit`.
    pub fn summary(&self) -> String {
        self.entries.join("  ")
    }

    fn take_steps(&mut self) -> (usize, Vec<Step>) {
        let widget = self.next_widget;
        self.next_widget += 1;

        let mut steps = Vec::new();
        self.pending.retain(|&(index, step)| {
            if index == widget {
                steps.push(step);
                false
            } else {
                true
            }
        });
        (widget, steps)
    }
}

impl Drawer for KeyboardDrawer {
    fn header(&mut self, _caption: &str) -> bool {
        true
    }

    fn checkbox(&mut self, caption: &str, value: &mut bool) -> bool {
        let (widget, steps) = self.take_steps();
        let before = *value;
        for _ in &steps {
            *value = !*value;
        }

        let mark = if *value { 'x' } else { ' ' };
        self.entries.push(format!("{}:[{}]{}", widget + 1, mark, caption));

        if *value != before {
            log::info!("{} {}", caption, if *value { "enabled" } else { "disabled" });
        }
        *value != before
    }

    fn slider_float(&mut self, caption: &str, value: &mut f32, min: f32, max: f32) -> bool {
        let (widget, steps) = self.take_steps();
        let before = *value;
        let step = (max - min) / SLIDER_STEPS;
        for s in steps {
            let delta = match s {
                Step::Up => step,
                Step::Down => -step,
            };
            *value = (*value + delta).clamp(min, max);
        }

        self.entries.push(format!("{}:{}={:.2}", widget + 1, caption, value));

        if *value != before {
            log::info!("{} set to {:.2}", caption, value);
        }
        *value != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_toggles_matching_checkbox_only() {
        let mut drawer = KeyboardDrawer::new();
        let mut first = true;
        let mut second = true;

        drawer.press(1, Step::Up);
        drawer.begin_frame();
        assert!(!drawer.checkbox("First", &mut first));
        assert!(drawer.checkbox("Second", &mut second));
        drawer.end_frame();

        assert!(first);
        assert!(!second);
        assert_eq!(drawer.summary(), "1:[x]First  2:[ ]Second");
    }

    #[test]
    fn slider_steps_are_clamped() {
        let mut drawer = KeyboardDrawer::new();
        let mut value = 0.95;

        drawer.press(0, Step::Up);
        drawer.begin_frame();
        assert!(drawer.slider_float("Red", &mut value, 0.0, 1.0));
        drawer.end_frame();
        assert_eq!(value, 1.0);

        drawer.press(0, Step::Down);
        drawer.press(0, Step::Down);
        drawer.begin_frame();
        assert!(drawer.slider_float("Red", &mut value, 0.0, 1.0));
        drawer.end_frame();
        assert!((value - 0.8).abs() < 1e-6);
    }

    #[test]
    fn slider_at_bound_reports_no_change() {
        let mut drawer = KeyboardDrawer::new();
        let mut value = 0.0;

        drawer.press(0, Step::Down);
        drawer.begin_frame();
        assert!(!drawer.slider_float("Blue", &mut value, 0.0, 1.0));
        drawer.end_frame();
    }

    #[test]
    fn unmatched_presses_are_dropped() {
        let mut drawer = KeyboardDrawer::new();
        let mut value = true;

        drawer.press(5, Step::Up);
        drawer.begin_frame();
        drawer.checkbox("Only", &mut value);
        drawer.end_frame();

        drawer.begin_frame();
        assert!(!drawer.checkbox("Only", &mut value));
        drawer.end_frame();
        assert!(value);
    }
}
