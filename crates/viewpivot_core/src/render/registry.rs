//! In-process renderer registry with one active pointer.

use crate::model::view_state::ViewType;
use crate::render::renderer::Renderer;
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Registry lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    RendererNotFound(ViewType),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RendererNotFound(view_type) => {
                write!(f, "no renderer registered for view `{view_type}`")
            }
        }
    }
}

impl Error for RegistryError {}

/// Result of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Stored; the active pointer was not touched.
    Registered,
    /// Stored and made active because it draws the current view; the caller
    /// must restore that view's persisted state onto it.
    Activated,
    /// Replaced (and destroyed) a previous renderer of the same view. When
    /// that view is active the new renderer is now the active one.
    Replaced,
}

/// One renderer per view type.
#[derive(Default)]
pub struct ViewRegistry {
    renderers: BTreeMap<ViewType, Rc<dyn Renderer>>,
    active: Option<ViewType>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `renderer` for `view_type`.
    ///
    /// Auto-activates it when it draws `current_view` and nothing is active.
    pub fn register(
        &mut self,
        view_type: ViewType,
        renderer: Rc<dyn Renderer>,
        current_view: ViewType,
    ) -> RegisterOutcome {
        let replaced = self.renderers.insert(view_type, renderer);
        if let Some(previous) = &replaced {
            previous.destroy();
        }

        if view_type == current_view && self.active.is_none() {
            self.active = Some(view_type);
            info!("event=renderer_register module=render status=activated view={view_type}");
            return RegisterOutcome::Activated;
        }
        if replaced.is_some() {
            info!("event=renderer_register module=render status=replaced view={view_type}");
            return RegisterOutcome::Replaced;
        }

        info!("event=renderer_register module=render status=ok view={view_type}");
        RegisterOutcome::Registered
    }

    /// Removes and destroys the renderer of `view_type`.
    ///
    /// Returns whether one was registered.
    pub fn unregister(&mut self, view_type: ViewType) -> bool {
        let Some(renderer) = self.renderers.remove(&view_type) else {
            return false;
        };
        renderer.destroy();
        if self.active == Some(view_type) {
            self.active = None;
        }
        info!("event=renderer_unregister module=render status=ok view={view_type}");
        true
    }

    /// Points the active pointer at `view_type`'s renderer.
    pub fn set_active(&mut self, view_type: ViewType) -> Result<(), RegistryError> {
        if !self.renderers.contains_key(&view_type) {
            return Err(RegistryError::RendererNotFound(view_type));
        }
        if self.active != Some(view_type) {
            debug!(
                "event=renderer_activate module=render status=ok from={} to={view_type}",
                self.active.map_or("none", ViewType::as_str)
            );
        }
        self.active = Some(view_type);
        Ok(())
    }

    /// Restores a previously read active pointer.
    pub(crate) fn restore_active(&mut self, view_type: Option<ViewType>) {
        self.active = view_type.filter(|view_type| self.renderers.contains_key(view_type));
    }

    pub fn active_view(&self) -> Option<ViewType> {
        self.active
    }

    pub fn get_active(&self) -> Option<Rc<dyn Renderer>> {
        let view_type = self.active?;
        self.get(view_type)
    }

    pub fn get(&self, view_type: ViewType) -> Option<Rc<dyn Renderer>> {
        self.renderers.get(&view_type).cloned()
    }

    pub fn has(&self, view_type: ViewType) -> bool {
        self.renderers.contains_key(&view_type)
    }

    /// Registered view types in stable order.
    pub fn view_types(&self) -> Vec<ViewType> {
        self.renderers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Destroys and removes every renderer.
    pub fn destroy_all(&mut self) {
        for (_, renderer) in std::mem::take(&mut self.renderers) {
            renderer.destroy();
        }
        self.active = None;
    }
}
