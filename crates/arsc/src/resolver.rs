use std::cell::RefCell;

use log::warn;

use crate::errors::ArscError;
use crate::model::{ResSpec, ResourceId, ResourceTable, Value};

/// Framework resource package id (`android:`).
const FRAMEWORK_PACKAGE_ID: u8 = 0x01;

/// Reference chains (aliases, bag parents) are followed at most this deep;
/// anything longer is treated as a cycle.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Outcome of an id lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'t> {
    Spec {
        type_name: &'t str,
        spec: &'t ResSpec,
        package_id: u8,
        package_name: &'t str,
    },
    /// The table holds no spec for this id.
    Unresolved(ResourceId),
}

/// Read-only projection from numeric ids to specs and symbolic names.
///
/// This is the surface binary-XML decoding consults: the current package
/// selects which namespace is implicit, and non-fatal lookup failures are
/// collected so the caller can check [`Resolver::first_error`] after a pass.
pub struct Resolver<'t> {
    table: &'t ResourceTable,
    current_package: Option<u8>,
    first_error: RefCell<Option<ArscError>>,
}

impl<'t> Resolver<'t> {
    pub fn new(table: &'t ResourceTable) -> Resolver<'t> {
        Resolver {
            table,
            current_package: table.current_package().map(|p| p.id),
            first_error: RefCell::new(None),
        }
    }

    /// Select the package whose resources need no namespace prefix.
    pub fn set_current_package(&mut self, id: u8) {
        self.current_package = Some(id);
    }

    /// The first non-fatal lookup failure observed so far.
    pub fn first_error(&self) -> Option<ArscError> {
        self.first_error.borrow().clone()
    }

    fn record(&self, err: ArscError) {
        self.first_error.borrow_mut().get_or_insert(err);
    }

    /// Look up the spec owning `id` without following references.
    pub fn resolve(&self, id: ResourceId) -> Resolved<'t> {
        if !id.is_valid() {
            return Resolved::Unresolved(id);
        }

        let Some(package) = self.table.get_package_by_id(id.package_id()) else {
            return Resolved::Unresolved(id);
        };
        let Some(type_spec) = package.type_spec(id.type_id()) else {
            return Resolved::Unresolved(id);
        };
        match type_spec.spec(id.entry_id()) {
            Some(spec) => Resolved::Spec {
                type_name: &type_spec.name,
                spec,
                package_id: package.id,
                package_name: &package.name,
            },
            None => Resolved::Unresolved(id),
        }
    }

    /// Follow alias chains (`Value::Reference` pointing at another id) to
    /// the terminal spec. Cycles and over-deep chains come back unresolved.
    pub fn follow(&self, id: ResourceId) -> Resolved<'t> {
        let mut current = id;
        for _ in 0..MAX_REFERENCE_DEPTH {
            let resolved = self.resolve(current);
            let Resolved::Spec { spec, .. } = resolved else {
                return resolved;
            };

            match spec.default_resource() {
                Some(Value::Reference(next)) if next.is_valid() && *next != current => {
                    current = *next;
                }
                _ => return resolved,
            }
        }

        warn!("reference chain from {} exceeds depth limit", id);
        Resolved::Unresolved(current)
    }

    /// Render a reference as `@pkg:type/name` (or `?pkg:type/name` for
    /// attribute references). Unresolvable ids fall back to their hex form
    /// and are recorded as the pass's first error.
    pub fn decode_reference(&self, id: ResourceId, as_attribute: bool) -> String {
        let sigil = if as_attribute { '?' } else { '@' };

        if id.0 == 0 {
            return "@null".to_owned();
        }

        match self.resolve(id) {
            Resolved::Spec {
                type_name,
                spec,
                package_id,
                package_name,
            } => {
                let prefix = self.package_prefix(package_id, package_name);
                format!("{}{}{}/{}", sigil, prefix, type_name, spec.display_name())
            }
            Resolved::Unresolved(_) => {
                self.record(ArscError::UnknownResourceId(id.0));
                format!("{}{}", sigil, id)
            }
        }
    }

    /// Resolve an attribute id to the bare `pkg:name` form used in bag item
    /// names, hex on failure.
    pub fn attribute_name(&self, id: ResourceId) -> String {
        match self.resolve(id) {
            Resolved::Spec {
                spec,
                package_id,
                package_name,
                ..
            } => {
                let prefix = self.package_prefix(package_id, package_name);
                format!("{}{}", prefix, spec.display_name())
            }
            Resolved::Unresolved(_) => {
                self.record(ArscError::UnknownResourceId(id.0));
                id.to_string()
            }
        }
    }

    fn package_prefix(&self, package_id: u8, package_name: &'t str) -> String {
        if Some(package_id) == self.current_package {
            return String::new();
        }
        if package_id == FRAMEWORK_PACKAGE_ID {
            return "android:".to_owned();
        }
        format!("{}:", package_name)
    }
}
