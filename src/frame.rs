//! The rendered guest frame.
//!
//! Mounting and styling the iframe is the embedding page's business; the
//! bridge only needs a frame it can resize and detach, plus a messenger
//! reaching the frame's window.

use std::rc::Rc;

use framebridge_shared::BridgeError;
use serde::{Deserialize, Serialize};

use crate::transport::Messenger;

/// One frame dimension: a number is a pixel count, a string is passed
/// through as a CSS length (`"100%"`, `"40rem"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(f64),
    Css(String),
}

impl Dimension {
    pub fn to_css(&self) -> String {
        match self {
            Dimension::Pixels(px) => format!("{}px", px),
            Dimension::Css(value) => value.clone(),
        }
    }
}

impl From<u32> for Dimension {
    fn from(px: u32) -> Self {
        Dimension::Pixels(px as f64)
    }
}

impl From<f64> for Dimension {
    fn from(px: f64) -> Self {
        Dimension::Pixels(px)
    }
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Self {
        Dimension::Css(value.to_string())
    }
}

impl From<String> for Dimension {
    fn from(value: String) -> Self {
        Dimension::Css(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
}

impl FrameSize {
    /// Overwrite the given dimensions, keeping the others.
    pub fn update(&mut self, width: Option<Dimension>, height: Option<Dimension>) {
        if width.is_some() {
            self.width = width;
        }
        if height.is_some() {
            self.height = height;
        }
    }
}

/// A frame that has been attached to the page.
pub trait Frame {
    fn set_width(&self, css: &str);

    fn set_height(&self, css: &str);

    /// Remove the frame from its container. Safe to call repeatedly.
    fn detach(&self);
}

/// Apply the present dimensions of `size` to `frame`.
pub fn apply_size(frame: &dyn Frame, width: Option<&Dimension>, height: Option<&Dimension>) {
    if let Some(width) = width {
        frame.set_width(&width.to_css());
    }
    if let Some(height) = height {
        frame.set_height(&height.to_css());
    }
}

/// What to render and where.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest<'a> {
    /// Container selector
    pub container: &'a str,
    pub src: &'a str,
    pub size: &'a FrameSize,
    /// Only messages from this origin reach the bridge
    pub allowed_origin: &'a str,
}

pub struct RenderedFrame {
    pub frame: Rc<dyn Frame>,
    pub messenger: Rc<dyn Messenger>,
}

/// Mounts guest frames into the page.
pub trait FrameHost {
    fn render(&self, request: FrameRequest<'_>) -> Result<RenderedFrame, BridgeError>;
}

#[cfg(target_arch = "wasm32")]
pub use dom::{DomFrame, DomFrameHost};

#[cfg(target_arch = "wasm32")]
mod dom {
    use std::rc::Rc;

    use framebridge_shared::BridgeError;
    use wasm_bindgen::JsCast;
    use web_sys::HtmlIFrameElement;

    use super::{apply_size, Frame, FrameHost, FrameRequest, RenderedFrame};
    use crate::transport::PostMessageMessenger;

    /// Renders into the current document.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DomFrameHost;

    pub struct DomFrame {
        element: HtmlIFrameElement,
    }

    impl Frame for DomFrame {
        fn set_width(&self, css: &str) {
            let _ = self.element.style().set_property("width", css);
        }

        fn set_height(&self, css: &str) {
            let _ = self.element.style().set_property("height", css);
        }

        fn detach(&self) {
            self.element.remove();
        }
    }

    fn dom_error(e: wasm_bindgen::JsValue) -> BridgeError {
        BridgeError::Transport(format!("{:?}", e))
    }

    impl FrameHost for DomFrameHost {
        fn render(&self, request: FrameRequest<'_>) -> Result<RenderedFrame, BridgeError> {
            let window = web_sys::window()
                .ok_or_else(|| BridgeError::Transport("no window".to_string()))?;
            let document = window
                .document()
                .ok_or_else(|| BridgeError::Transport("no document".to_string()))?;

            let container = document
                .query_selector(request.container)
                .ok()
                .flatten()
                .ok_or_else(|| BridgeError::ContainerNotFound(request.container.to_string()))?;

            let element: HtmlIFrameElement = document
                .create_element("iframe")
                .map_err(dom_error)?
                .dyn_into()
                .map_err(|_| BridgeError::Transport("not an iframe".to_string()))?;
            element.set_src(request.src);
            let _ = element.set_attribute("allow", "clipboard-write");
            let style = element.style();
            let _ = style.set_property("border", "none");
            let _ = style.set_property("width", "100%");
            let _ = style.set_property("height", "100%");

            let frame = DomFrame { element };
            apply_size(&frame, request.size.width.as_ref(), request.size.height.as_ref());

            container.append_child(&frame.element).map_err(dom_error)?;
            let target = frame
                .element
                .content_window()
                .ok_or_else(|| BridgeError::Transport("frame has no window".to_string()))?;

            Ok(RenderedFrame {
                frame: Rc::new(frame),
                messenger: Rc::new(PostMessageMessenger::new(
                    window,
                    target,
                    request.allowed_origin,
                )),
            })
        }
    }
}
