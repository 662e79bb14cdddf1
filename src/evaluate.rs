//! Tree evaluator
//!
//! Evaluation runs in two phases over a compiled unit:
//!
//! 1. **Resolve.** Every element whose component has a resolver is collected in
//!    document order (a hoisted element at its first reference). Edges run from
//!    each site to the resolver-bearing bindings its attribute expressions read.
//!    Sites are resolved in dependency waves; each wave runs on the rayon pool
//!    and its results are merged back in document order.
//! 2. **Assemble.** The tree is walked synchronously in document order. Props
//!    are settled against the resolution cache, validated and handed to
//!    `render`. Nothing in this phase waits on a resolver.
//!
//! Consumers therefore always observe settled producer values, whatever their
//! relative position in the source.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, trace};

use crate::component::{Children, Component, ComponentRegistry, RenderOutput};
use crate::context::{Action, RenderContext, ResolveContext};
use crate::deferred::{display_value, settle, ExprEnv, PropValue, ResolutionCache};
use crate::diagnostics::{Diagnostic, ElementTrace, RenderError};
use crate::ir::{AttributeValue, BindingId, CompiledUnit, Element, ElementId, Expression, Node};
use crate::schema::Props;
use crate::whitespace::collapse_inline;

#[derive(Debug)]
pub struct Evaluation {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
    pub actions: Vec<Action>,
    /// Rendered elements in pre-order, for whole-tree checks.
    pub trace: Vec<ElementTrace>,
}

/// A hard error plus whatever diagnostics were collected before it.
#[derive(Debug)]
pub struct EvaluationFailure {
    pub error: RenderError,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn evaluate(
    unit: &CompiledUnit,
    registry: &ComponentRegistry,
    inputs: &Props,
) -> Result<Evaluation, EvaluationFailure> {
    let mut evaluator = Evaluator::new(unit, registry, inputs);

    let result = evaluator
        .resolve_phase()
        .and_then(|_| evaluator.assemble_phase());

    match result {
        Ok(text) => {
            let (diagnostics, actions) = evaluator.ctx.into_parts();
            Ok(Evaluation {
                text,
                diagnostics,
                actions,
                trace: evaluator.trace,
            })
        }
        Err(error) => {
            let (diagnostics, _) = evaluator.ctx.into_parts();
            Err(EvaluationFailure { error, diagnostics })
        }
    }
}

fn element_label(element: &Element) -> String {
    format!("<{}>", element.tag)
}

/// Kahn's algorithm over site indices. Each wave holds the sites whose
/// dependencies all sit in earlier waves, in document order. On a cycle the
/// sites that can never become ready are returned instead.
fn plan_waves(depends_on: &[Vec<usize>]) -> Result<Vec<Vec<usize>>, Vec<usize>> {
    let mut done = vec![false; depends_on.len()];
    let mut remaining: Vec<usize> = (0..depends_on.len()).collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<usize>, Vec<usize>) = remaining
            .into_iter()
            .partition(|&i| depends_on[i].iter().all(|&d| done[d]));
        if ready.is_empty() {
            return Err(blocked);
        }
        for &i in &ready {
            done[i] = true;
        }
        waves.push(ready);
        remaining = blocked;
    }

    Ok(waves)
}

/// A resolver-bearing element waiting for its dependencies.
struct ResolveSite<'u> {
    element: &'u Element,
    component: Arc<dyn Component>,
    attributes: Vec<(String, PropValue)>,
    depends_on: Vec<ElementId>,
}

struct Evaluator<'u> {
    unit: &'u CompiledUnit,
    registry: &'u ComponentRegistry,
    inputs: &'u Props,
    names: HashMap<String, BindingId>,
    binding_elements: HashMap<BindingId, ElementId>,
    cache: ResolutionCache,
    validated: HashMap<ElementId, Props>,
    rendered_bindings: HashMap<BindingId, String>,
    rendering: HashSet<BindingId>,
    ctx: RenderContext,
    trace: Vec<ElementTrace>,
}

impl<'u> Evaluator<'u> {
    fn new(unit: &'u CompiledUnit, registry: &'u ComponentRegistry, inputs: &'u Props) -> Self {
        let names: HashMap<String, BindingId> = unit
            .bindings
            .iter()
            .map(|b| (b.name.clone(), b.id))
            .collect();
        let binding_elements: HashMap<BindingId, ElementId> = unit
            .bindings
            .iter()
            .map(|b| (b.id, b.element.id))
            .collect();

        Self {
            unit,
            registry,
            inputs,
            ctx: RenderContext::new(names.clone()),
            cache: ResolutionCache::new(binding_elements.clone()),
            names,
            binding_elements,
            validated: HashMap::new(),
            rendered_bindings: HashMap::new(),
            rendering: HashSet::new(),
            trace: Vec::new(),
        }
    }

    fn component(&self, element: &Element) -> Result<Arc<dyn Component>, RenderError> {
        self.registry
            .lookup(&element.tag, &self.unit.imports)
            .ok_or_else(|| RenderError::UnknownComponent {
                tag: element.tag.clone(),
            })
    }

    fn lower_expression(&self, expression: &Expression) -> Result<PropValue, RenderError> {
        let env = ExprEnv {
            bindings: &self.names,
            inputs: self.inputs,
        };
        PropValue::from_expr(&expression.ast, &env).map_err(|name| {
            RenderError::UnresolvedIdentifier {
                name,
                code: expression.code.clone(),
            }
        })
    }

    fn lower_attributes(&self, element: &Element) -> Result<Vec<(String, PropValue)>, RenderError> {
        element
            .attributes
            .iter()
            .map(|attr| {
                let value = match &attr.value {
                    AttributeValue::Static(s) => PropValue::Direct(Value::String(s.clone())),
                    AttributeValue::Dynamic(expr) => self.lower_expression(expr)?,
                };
                Ok((attr.name.clone(), value))
            })
            .collect()
    }

    /// Settle and validate. Undefined attributes are left out of the bag.
    fn build_props(
        &self,
        element: &Element,
        component: &dyn Component,
        attributes: &[(String, PropValue)],
    ) -> Result<Props, RenderError> {
        let mut props = Props::new();
        for (name, value) in attributes {
            if let Some(value) = settle(value, &self.cache) {
                props.insert(name.clone(), value);
            }
        }
        component
            .schema()
            .validate(props)
            .map_err(|violation| RenderError::Schema {
                element: element_label(element),
                attribute: violation.attribute,
                constraint: violation.constraint,
            })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PHASE 1: RESOLVE
    // ═══════════════════════════════════════════════════════════════════════════

    fn resolve_phase(&mut self) -> Result<(), RenderError> {
        let mut sites = Vec::new();
        let mut entered = HashSet::new();
        let unit = self.unit;
        self.collect_sites(&unit.body, &mut entered, &mut sites)?;

        // Bindings never reached from the body (inside raw children) do not resolve.
        let index: HashMap<ElementId, usize> = sites
            .iter()
            .enumerate()
            .map(|(i, site)| (site.element.id, i))
            .collect();
        let depends_on: Vec<Vec<usize>> = sites
            .iter()
            .map(|site| {
                site.depends_on
                    .iter()
                    .filter_map(|id| index.get(id).copied())
                    .collect()
            })
            .collect();

        let waves = plan_waves(&depends_on).map_err(|blocked| RenderError::DependencyCycle {
            elements: blocked.iter().map(|&i| element_label(sites[i].element)).collect(),
        })?;

        let mut slots: Vec<Option<ResolveSite<'u>>> = sites.into_iter().map(Some).collect();
        for (n, wave) in waves.iter().enumerate() {
            let ready: Vec<ResolveSite<'u>> = wave.iter().filter_map(|&i| slots[i].take()).collect();
            debug!(wave = n, sites = ready.len(), "resolving wave");
            self.resolve_wave(ready)?;
        }

        Ok(())
    }

    fn collect_sites(
        &self,
        nodes: &'u [Node],
        entered: &mut HashSet<BindingId>,
        sites: &mut Vec<ResolveSite<'u>>,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Element(el) => self.collect_element(el, entered, sites)?,
                Node::Reference(reference) => {
                    if !entered.insert(reference.binding) {
                        continue;
                    }
                    let unit = self.unit;
                    let binding = unit.binding(reference.binding).ok_or_else(|| {
                        RenderError::DanglingReference {
                            name: reference.name.clone(),
                        }
                    })?;
                    self.collect_element(&binding.element, entered, sites)?;
                }
                Node::Text(_) | Node::Literal(_) | Node::Expression(_) => {}
            }
        }
        Ok(())
    }

    fn collect_element(
        &self,
        element: &'u Element,
        entered: &mut HashSet<BindingId>,
        sites: &mut Vec<ResolveSite<'u>>,
    ) -> Result<(), RenderError> {
        let component = self.component(element)?;
        let attributes = self.lower_attributes(element)?;

        if component.has_resolver() {
            let mut bindings = Vec::new();
            for (_, value) in &attributes {
                value.dependencies(&mut bindings);
            }
            let depends_on = bindings
                .iter()
                .filter_map(|id| self.binding_elements.get(id).copied())
                .collect();
            sites.push(ResolveSite {
                element,
                component: component.clone(),
                attributes,
                depends_on,
            });
        }

        if !component.wants_raw_children() {
            self.collect_sites(&element.children, entered, sites)?;
        }
        Ok(())
    }

    fn resolve_wave(&mut self, ready: Vec<ResolveSite<'u>>) -> Result<(), RenderError> {
        let mut prepared = Vec::with_capacity(ready.len());
        for site in &ready {
            let props = self.build_props(site.element, site.component.as_ref(), &site.attributes)?;
            prepared.push((site.component.clone(), props));
        }

        let outcomes: Vec<(Result<Value, String>, ResolveContext)> = prepared
            .par_iter()
            .map(|(component, props)| {
                let mut rctx = ResolveContext::default();
                let result = component.resolve(props, &mut rctx);
                (result, rctx)
            })
            .collect();

        for ((site, (_, props)), (result, rctx)) in ready.iter().zip(prepared).zip(outcomes) {
            self.ctx.diagnostics.extend(rctx.diagnostics);
            let value = result.map_err(|message| RenderError::Resolve {
                element: element_label(site.element),
                message,
            })?;
            trace!(element = site.element.id.0, tag = %site.element.tag, "resolved");
            self.cache.insert(site.element.id, Some(value));
            self.validated.insert(site.element.id, props);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PHASE 2: ASSEMBLE
    // ═══════════════════════════════════════════════════════════════════════════

    fn assemble_phase(&mut self) -> Result<String, RenderError> {
        let unit = self.unit;
        let parts = self.render_nodes(&unit.body, 0, false)?;
        Ok(parts.concat())
    }

    fn render_nodes(
        &mut self,
        nodes: &[Node],
        depth: usize,
        detached: bool,
    ) -> Result<Vec<String>, RenderError> {
        nodes
            .iter()
            .map(|node| self.render_node(node, depth, detached))
            .collect()
    }

    fn render_node(
        &mut self,
        node: &Node,
        depth: usize,
        detached: bool,
    ) -> Result<String, RenderError> {
        match node {
            Node::Text(text) => Ok(collapse_inline(&text.value)),
            Node::Literal(literal) => Ok(literal.value.clone()),
            Node::Expression(expr) => {
                let value = self.lower_expression(&expr.expression)?;
                Ok(display_value(settle(&value, &self.cache).as_ref()))
            }
            Node::Reference(reference) => self.render_binding(reference.binding, &reference.name, depth),
            Node::Element(el) => self.render_element(el, depth, detached),
        }
    }

    /// A binding renders once; every later reference reuses the text.
    fn render_binding(
        &mut self,
        id: BindingId,
        name: &str,
        depth: usize,
    ) -> Result<String, RenderError> {
        if let Some(text) = self.rendered_bindings.get(&id) {
            return Ok(text.clone());
        }
        let unit = self.unit;
        let binding = unit
            .binding(id)
            .ok_or_else(|| RenderError::DanglingReference {
                name: name.to_string(),
            })?;
        if !self.rendering.insert(id) {
            return Err(RenderError::DependencyCycle {
                elements: vec![element_label(&binding.element)],
            });
        }
        let text = self.render_element(&binding.element, depth, false)?;
        self.rendering.remove(&id);
        self.rendered_bindings.insert(id, text.clone());
        Ok(text)
    }

    fn render_element(
        &mut self,
        element: &Element,
        depth: usize,
        detached: bool,
    ) -> Result<String, RenderError> {
        let component = self.component(element)?;

        let cached_props = if detached {
            None
        } else {
            self.validated.get(&element.id).cloned()
        };
        let props = match cached_props {
            Some(props) => props,
            None => {
                let attributes = self.lower_attributes(element)?;
                self.build_props(element, component.as_ref(), &attributes)?
            }
        };

        let resolved = if !component.has_resolver() {
            None
        } else if !detached && self.cache.contains(element.id) {
            self.cache.get(element.id).cloned()
        } else {
            // Detached markup and elements skipped by phase 1 resolve in place.
            let mut rctx = ResolveContext::default();
            let result = component.resolve(&props, &mut rctx);
            self.ctx.diagnostics.extend(rctx.diagnostics);
            Some(result.map_err(|message| RenderError::Resolve {
                element: element_label(element),
                message,
            })?)
        };

        self.trace.push(ElementTrace {
            tag: element.tag.clone(),
            props: props.clone(),
            depth,
        });

        let children = if component.wants_raw_children() {
            Children::Raw(&element.children)
        } else {
            Children::Rendered(self.render_nodes(&element.children, depth + 1, detached)?)
        };

        let output = component
            .render(&props, resolved.as_ref(), children, &mut self.ctx)
            .map_err(|message| RenderError::Render {
                element: element_label(element),
                message,
            })?;

        match output {
            RenderOutput::Empty => Ok(String::new()),
            RenderOutput::Text(text) => Ok(text),
            RenderOutput::Markup(nodes) => Ok(self.render_nodes(&nodes, depth + 1, true)?.concat()),
            RenderOutput::Value(value) => Ok(display_value(settle(&value, &self.cache).as_ref())),
        }
    }
}
