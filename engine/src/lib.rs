use std::time::Instant;

use anyhow::Result;
use log::*;
use renderer::Renderer;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

pub mod config;
pub mod error;
mod renderer;
pub mod sample;
pub mod samples;
pub mod ui;
mod vulkan;

pub use config::{Config, ConfigError};
pub use error::SampleError;
pub use sample::{FeatureRequest, FrameRenderer, Requirements, SampleContext};
pub use ui::{Drawer, KeyboardDrawer, NullOverlay, Step, UiOverlay};
pub use vulkan::command_buffer::{CommandSink, DeviceCommands};
pub use vulkan::descriptor::InputAttachmentSet;
pub use vulkan::framebuffer::VulkanFramebuffer;
pub use vulkan::image::{FrameBufferAttachment, VulkanImage};
pub use vulkan::pipeline::{PipelineDesc, VulkanPipeline};
pub use vulkan::render_pass::VulkanRenderPass;
pub use vulkan::shader::ShaderLoader;

pub struct Engine {
    window: Window,
    renderer: Renderer,
    event_loop: EventLoop<()>,
    drawer: KeyboardDrawer,
    title: String,
}

impl Engine {
    pub fn new(config: &Config, sample: Box<dyn FrameRenderer>) -> Result<Engine> {
        // Window
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .with_resizable(config.window.resizable)
            .build(&event_loop)?;

        let renderer = unsafe { Renderer::create(&window, config, sample)? };
        window.set_title(&window_title(&config.window.title, renderer.sample_name(), ""));

        Ok(Engine {
            window,
            renderer,
            event_loop,
            drawer: KeyboardDrawer::new(),
            title: config.window.title.clone(),
        })
    }

    pub fn run(self) -> Result<()> {
        let Engine {
            window,
            mut renderer,
            event_loop,
            mut drawer,
            title,
        } = self;

        let mut shift = false;
        let mut last_frame = Instant::now();
        let mut summary = String::new();

        event_loop.run(move |event, elwt| {
            match event {
                // Request a redraw when all events were processed.
                Event::AboutToWait => window.request_redraw(),
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::RedrawRequested if !elwt.exiting() => {
                        let now = Instant::now();
                        let delta_time = now.duration_since(last_frame).as_secs_f32();
                        last_frame = now;

                        drawer.begin_frame();
                        let result = unsafe { renderer.render(&window, &mut drawer, delta_time) };
                        drawer.end_frame();

                        if let Err(error) = result {
                            error!("Rendering failed: {:#}", error);
                            elwt.exit();
                            return;
                        }

                        if drawer.summary() != summary {
                            summary = drawer.summary();
                            window.set_title(&window_title(&title, renderer.sample_name(), &summary));
                        }
                    }
                    WindowEvent::Resized(size) => {
                        debug!("Window resized to {}x{}.", size.width, size.height);
                        renderer.resized();
                    }
                    WindowEvent::ModifiersChanged(modifiers) => {
                        shift = modifiers.state().shift_key();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => {
                        if code == KeyCode::Escape {
                            elwt.exit();
                        } else if let Some(widget) = widget_for_key(code) {
                            drawer.press(widget, if shift { Step::Down } else { Step::Up });
                        }
                    }
                    WindowEvent::CloseRequested => elwt.exit(),
                    _ => {}
                },
                // Destroy our Vulkan app.
                Event::LoopExiting => unsafe { renderer.destroy() },
                _ => {}
            }
        })?;

        Ok(())
    }
}

/// Digit keys `1..=9` activate the widgets in declaration order.
pub fn widget_for_key(code: KeyCode) -> Option<usize> {
    let widget = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        _ => return None,
    };
    Some(widget)
}

fn window_title(title: &str, sample: &str, summary: &str) -> String {
    if summary.is_empty() {
        format!("{} - {}", title, sample)
    } else {
        format!("{} - {} | {}", title, sample, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_widgets() {
        assert_eq!(widget_for_key(KeyCode::Digit1), Some(0));
        assert_eq!(widget_for_key(KeyCode::Digit9), Some(8));
        assert_eq!(widget_for_key(KeyCode::Digit0), None);
        assert_eq!(widget_for_key(KeyCode::KeyA), None);
    }

    #[test]
    fn title_carries_widget_summary() {
        assert_eq!(window_title("Samples", "hello_triangle", ""), "Samples - hello_triangle");
        assert_eq!(
            window_title("Samples", "color_write_enable", "4:[x]Red bit"),
            "Samples - color_write_enable | 4:[x]Red bit"
        );
    }
}
