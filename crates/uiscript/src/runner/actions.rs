//! Built-in action commands.
//!
//! Each handler receives the resolved step parameters and returns the value a
//! `storeResult` variable should receive, if the command produces one.

use super::RunnerOptions;
use crate::automation::{AutomationBackend, ClickOptions, Selector};
use crate::error::{EngineError, EngineResult};
use crate::variables::ResolvedParams;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Elements located by `find_element` during one run, keyed by `elem_N`.
#[derive(Debug)]
pub struct ElementCache<E> {
    entries: HashMap<String, Arc<E>>,
}

impl<E> Default for ElementCache<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E> ElementCache<E> {
    /// Store an element under the next `elem_N` id and return that id.
    pub fn insert(&mut self, element: Arc<E>) -> String {
        let id = format!("elem_{}", self.entries.len());
        self.entries.insert(id.clone(), element);
        id
    }

    pub fn get(&self, id: &str) -> EngineResult<Arc<E>> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("Element not found in cache: {id}")))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Mutable run state handed to action and assertion handlers.
pub struct StepContext<'a, B: AutomationBackend> {
    pub backend: &'a mut B,
    pub elements: &'a mut ElementCache<B::Element>,
    pub options: &'a RunnerOptions,
    pub screenshots: &'a mut Vec<String>,
}

impl<B: AutomationBackend> StepContext<'_, B> {
    /// Look up the cached element named by the `elementId` param.
    pub fn cached_element(&self, params: &ResolvedParams) -> EngineResult<Arc<B::Element>> {
        self.elements.get(params.string("elementId"))
    }
}

pub type ActionHandler<B> = fn(&mut StepContext<'_, B>, &ResolvedParams) -> EngineResult<Option<String>>;

/// Selector from `automationId`, `name` or `className`, in that order of precedence.
#[must_use]
pub fn selector_from_params(params: &ResolvedParams) -> Option<Selector> {
    if let Some(id) = params.get("automationId") {
        Some(Selector::AutomationId(id.to_string()))
    } else if let Some(name) = params.get("name") {
        Some(Selector::Name(name.to_string()))
    } else {
        params
            .get("className")
            .map(|class| Selector::ClassName(class.to_string()))
    }
}

fn required_selector(params: &ResolvedParams, command: &str) -> EngineResult<Selector> {
    selector_from_params(params).ok_or_else(|| {
        EngineError::invalid_argument(format!(
            "{command} requires one of automationId, name or className"
        ))
    })
}

pub(crate) fn default_actions<B: AutomationBackend>() -> Vec<(&'static str, ActionHandler<B>)> {
    vec![
        ("launch_app", launch_app::<B>),
        ("find_element", find_element::<B>),
        ("click_element", click_element::<B>),
        ("type_text", type_text::<B>),
        ("set_value", set_value::<B>),
        ("wait_for_element", wait_for_element::<B>),
        ("take_screenshot", take_screenshot::<B>),
        ("close_app", close_app::<B>),
    ]
}

fn launch_app<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let pid = ctx
        .backend
        .launch_app(
            params.string("path"),
            params.string("arguments"),
            params.non_empty("workingDirectory"),
        )
        .map_err(|err| EngineError::capability(&err))?;
    Ok(Some(pid.to_string()))
}

fn find_element<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let Some(selector) = selector_from_params(params) else {
        return Ok(None);
    };
    let found = ctx
        .backend
        .find_element(&selector)
        .map_err(|err| EngineError::capability(&err))?;
    Ok(found.map(|element| {
        let id = ctx.elements.insert(element);
        debug!(%selector, element_id = %id, "cached element");
        id
    }))
}

fn click_element<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let element = ctx.cached_element(params)?;
    let options = ClickOptions {
        double_click: params.bool_or("doubleClick", false),
        right_click: params.bool_or("rightClick", false),
    };
    ctx.backend
        .click(&element, options)
        .map_err(|err| EngineError::capability(&err))?;
    Ok(None)
}

fn type_text<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let element = ctx.cached_element(params)?;
    ctx.backend
        .type_text(
            &element,
            params.string("text"),
            params.bool_or("clearFirst", false),
        )
        .map_err(|err| EngineError::capability(&err))?;
    Ok(None)
}

fn set_value<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let element = ctx.cached_element(params)?;
    ctx.backend
        .set_value(&element, params.string("value"))
        .map_err(|err| EngineError::capability(&err))?;
    Ok(None)
}

fn wait_for_element<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let selector = required_selector(params, "wait_for_element")?;
    let timeout_ms = params.u64_or("timeoutMs", ctx.options.element_timeout_ms);
    let found = ctx
        .backend
        .wait_for_element(&selector, timeout_ms)
        .map_err(|err| EngineError::capability(&err))?;
    Ok(Some(found.to_string()))
}

fn take_screenshot<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let output = params
        .non_empty("outputPath")
        .ok_or_else(|| EngineError::invalid_argument("take_screenshot requires outputPath"))?;
    let element = if params.contains("elementId") {
        Some(ctx.cached_element(params)?)
    } else {
        None
    };
    ctx.backend
        .take_screenshot(Path::new(output), element.as_deref())
        .map_err(|err| EngineError::capability(&err))?;
    ctx.screenshots.push(output.to_string());
    Ok(None)
}

fn close_app<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Option<String>> {
    let pid = params
        .get("pid")
        .and_then(|pid| pid.trim().parse::<u32>().ok())
        .ok_or_else(|| EngineError::invalid_argument("close_app requires a numeric pid"))?;
    ctx.backend
        .close_app(pid, params.bool_or("force", false))
        .map_err(|err| EngineError::capability(&err))?;
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ResolvedParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn selector_precedence_prefers_automation_id() {
        let all = params(&[("className", "Button"), ("name", "OK"), ("automationId", "ok")]);
        assert_eq!(selector_from_params(&all), Some(Selector::AutomationId("ok".into())));
        let two = params(&[("className", "Button"), ("name", "OK")]);
        assert_eq!(selector_from_params(&two), Some(Selector::Name("OK".into())));
        assert_eq!(selector_from_params(&params(&[])), None);
    }

    #[test]
    fn cache_ids_follow_cache_size() {
        let mut cache = ElementCache::default();
        assert_eq!(cache.insert(Arc::new(1_u8)), "elem_0");
        assert_eq!(cache.insert(Arc::new(2_u8)), "elem_1");
        assert_eq!(*cache.get("elem_1").unwrap(), 2);
        let err = cache.get("elem_9").unwrap_err();
        assert_eq!(err.message, "Element not found in cache: elem_9");
    }
}
