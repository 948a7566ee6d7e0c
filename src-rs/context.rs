use serde::Serialize;

use crate::geometry::{context_window, Rect, ScreenSize};
use crate::hierarchy::{ComponentSummary, UiElement};

/// Leaves overlapping the context window around `target`, in traversal
/// order. Any leaf whose rect equals the target's rect counts as the target.
pub fn nearby_elements<'a>(
    leaves: &[&'a UiElement],
    target: &UiElement,
    screen: ScreenSize,
) -> Vec<&'a UiElement> {
    let target_rect = target.rect();
    let window = context_window(&target_rect, screen);
    leaves
        .iter()
        .copied()
        .filter(|leaf| {
            let rect = leaf.rect();
            rect != target_rect && rect.overlaps(&window)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldContext {
    pub target: ComponentSummary,
    pub bounds: Rect,
    pub window: Rect,
    pub nearby: Vec<ComponentSummary>,
}

impl FieldContext {
    pub fn build(leaves: &[&UiElement], target: &UiElement, screen: ScreenSize) -> Self {
        let bounds = target.rect();
        Self {
            target: target.summary(),
            bounds,
            window: context_window(&bounds, screen),
            nearby: nearby_elements(leaves, target, screen)
                .into_iter()
                .map(UiElement::summary)
                .collect(),
        }
    }
}
