//! Coordinate Resolver
//!
//! Maps an [`ActionDescriptor`] to absolute viewport pixels. An element reference
//! wins over percentages; the result is always clamped into the viewport.

use super::descriptor::ActionDescriptor;
use crate::browser::{ElementRegistry, Point, Viewport};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("No usable target for {action}: element reference {element_ref:?} is not in the registry of {registry_len} elements and no percentage coordinates were given")]
    UnresolvableTarget {
        action: &'static str,
        element_ref: Option<i64>,
        registry_len: usize,
    },
}

/// Resolve the target point of `action` against this step's registry
pub fn resolve(
    action: &ActionDescriptor,
    registry: &ElementRegistry,
    viewport: Viewport,
) -> Result<Point, ResolveError> {
    let from_element = action
        .element_ref
        .and_then(|index| usize::try_from(index).ok())
        .and_then(|index| registry.get(index))
        .map(|record| {
            let (x, y) = record.center();
            Point::new(x, y)
        });

    if from_element.is_none() {
        if let Some(index) = action.element_ref {
            log::debug!(
                "Element reference {} outside registry of {} elements, trying percentages",
                index,
                registry.len()
            );
        }
    }

    let target = from_element.or_else(|| match (action.x, action.y) {
        (Some(px), Some(py)) => Some(Point::new(
            viewport.width as f64 * px / 100.0,
            viewport.height as f64 * py / 100.0,
        )),
        _ => None,
    });

    target
        .map(|point| viewport.clamp(point))
        .ok_or(ResolveError::UnresolvableTarget {
            action: action.kind.name(),
            element_ref: action.element_ref,
            registry_len: registry.len(),
        })
}
