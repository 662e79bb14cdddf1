//! Mock components shared by the test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::builtins::builtin_registry;
use crate::component::{Children, Component, ComponentRegistry, RenderOutput};
use crate::context::{RenderContext, ResolveContext};
use crate::deferred::display_value;
use crate::schema::Props;

/// Resolves to its `value` prop (or a fixed value) and counts resolve calls.
/// `fail="reason"` makes the resolver fail. Renders its `label` prop, if any.
pub struct Producer {
    pub fixed: Value,
    pub calls: Arc<AtomicUsize>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Producer {
    pub fn new(fixed: Value) -> Self {
        Self {
            fixed,
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Component for Producer {
    fn has_resolver(&self) -> bool {
        true
    }

    fn resolve(&self, props: &Props, _ctx: &mut ResolveContext) -> Result<Value, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = props.get("id") {
            self.log.lock().unwrap().push(display_value(Some(id)));
        }
        if let Some(reason) = props.get("fail") {
            return Err(display_value(Some(reason)));
        }
        Ok(props.get("value").cloned().unwrap_or_else(|| self.fixed.clone()))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        Ok(RenderOutput::Text(display_value(props.get("label"))))
    }
}

/// Renders its `value` prop as text.
pub struct Consumer;

impl Component for Consumer {
    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        Ok(RenderOutput::Text(display_value(props.get("value"))))
    }
}

/// Builtins plus `Producer` and `Consumer`. Returns the producer's call
/// counter and resolve log.
pub fn mock_registry(fixed: Value) -> (ComponentRegistry, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
    let producer = Producer::new(fixed);
    let calls = producer.calls.clone();
    let log = producer.log.clone();

    let mut registry = builtin_registry();
    registry.register("Producer", producer).register("Consumer", Consumer);
    (registry, calls, log)
}
