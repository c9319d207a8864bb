//! Element driver over `HtmlAudioElement` and the page's `AudioContext`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AudioContext, AudioContextState, HtmlAudioElement};

use crate::driver::{ElementDriver, ElementId};

#[derive(Default)]
pub struct WebAudioDriver {
    elements: RefCell<HashMap<u64, HtmlAudioElement>>,
    context: RefCell<Option<AudioContext>>,
    next_id: Cell<u64>,
}

impl WebAudioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn element(&self, id: ElementId) -> anyhow::Result<HtmlAudioElement> {
        self.elements
            .borrow()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no audio element {}", id.0))
    }
}

fn js_error(value: JsValue) -> anyhow::Error {
    match value.as_string() {
        Some(message) => anyhow::anyhow!(message),
        None => anyhow::anyhow!("{value:?}"),
    }
}

#[async_trait(?Send)]
impl ElementDriver for WebAudioDriver {
    fn create(&self, src: &str) -> anyhow::Result<ElementId> {
        let audio = HtmlAudioElement::new_with_src(src).map_err(js_error)?;
        audio.set_preload("auto");

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.elements.borrow_mut().insert(id, audio);
        Ok(ElementId(id))
    }

    fn set_looping(&self, id: ElementId, looping: bool) -> anyhow::Result<()> {
        self.element(id)?.set_loop(looping);
        Ok(())
    }

    fn set_volume(&self, id: ElementId, volume: f32) -> anyhow::Result<()> {
        self.element(id)?.set_volume(volume as f64);
        Ok(())
    }

    fn set_current_time(&self, id: ElementId, seconds: f64) -> anyhow::Result<()> {
        self.element(id)?.set_current_time(seconds);
        Ok(())
    }

    async fn play(&self, id: ElementId) -> anyhow::Result<()> {
        let promise = self.element(id)?.play().map_err(js_error)?;
        JsFuture::from(promise).await.map_err(js_error)?;
        Ok(())
    }

    fn pause(&self, id: ElementId) -> anyhow::Result<()> {
        self.element(id)?.pause().map_err(js_error)
    }

    fn release(&self, id: ElementId) {
        if let Some(audio) = self.elements.borrow_mut().remove(&id.0) {
            let _ = audio.pause();
            audio.set_src("");
        }
    }

    async fn resume_output(&self) -> anyhow::Result<()> {
        let context = {
            let mut slot = self.context.borrow_mut();
            match slot.as_ref() {
                Some(context) => context.clone(),
                None => {
                    let context = AudioContext::new().map_err(js_error)?;
                    *slot = Some(context.clone());
                    context
                }
            }
        };

        if context.state() == AudioContextState::Suspended {
            let promise = context.resume().map_err(js_error)?;
            JsFuture::from(promise).await.map_err(js_error)?;
        }
        Ok(())
    }
}
