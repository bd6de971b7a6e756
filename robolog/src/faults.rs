//! Fault aggregation.
//!
//! Suppliers are polled once per frame. The active set is rebuilt from
//! scratch on every [`FaultRegistry::update`]; the total set keeps every
//! fault seen since the last [`FaultRegistry::clear`]. Both sets are
//! published every frame, split by severity, under `faults/active` and
//! `faults/total`.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use robolog_common::keyexpr::{FAULTS_ACTIVE_PATH, FAULTS_TOTAL_PATH};
use robolog_common::{Fault, FaultSnapshot, FaultWidget, Severity, Value, ValueKind, join_path};
use tracing::{debug, warn};

use crate::error::{BoxError, guarded};
use crate::frame::{Frame, SinkHandle, SinkSpec, Tier};
use crate::loggable::Shared;
use crate::widget::WIDGET_TYPE_KEY;

/// Widget type advertised for the fault lists.
pub const FAULT_WIDGET_TYPE: &str = "Alerts";

type Supplier = Box<dyn FnMut() -> Result<Option<Fault>, BoxError>>;

/// One fault condition of a device kind.
pub struct FaultBit<D> {
    pub description: &'static str,
    pub severity: Severity,
    pub active: fn(&D) -> bool,
}

impl<D> Clone for FaultBit<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for FaultBit<D> {}

impl<D> FaultBit<D> {
    pub const fn new(description: &'static str, severity: Severity, active: fn(&D) -> bool) -> Self {
        Self {
            description,
            severity,
            active,
        }
    }
}

/// A device that reports a fixed set of fault conditions.
pub trait DeviceFaults: 'static {
    /// Name used for every fault the device raises, e.g. `"TalonFX [4]"`.
    fn identity(&self) -> String;

    /// Every fault condition this kind of device can raise.
    fn fault_bits() -> Vec<FaultBit<Self>>
    where
        Self: Sized;
}

struct RegisteredSupplier {
    label: String,
    poll: Supplier,
    failing: bool,
}

#[derive(Debug, Clone, Copy)]
struct FaultHandles {
    active: [SinkHandle; 3],
    total: [SinkHandle; 3],
}

/// Registry of fault suppliers and the sets they produce.
#[derive(Default)]
pub struct FaultRegistry {
    suppliers: Vec<RegisteredSupplier>,
    active: BTreeSet<Fault>,
    total: BTreeSet<Fault>,
    handles: Option<FaultHandles>,
}

impl std::fmt::Debug for FaultRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultRegistry")
            .field("suppliers", &self.suppliers.len())
            .field("active", &self.active)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl FaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a supplier returning the fault it currently sees, if any.
    pub fn register(&mut self, mut supplier: impl FnMut() -> Option<Fault> + 'static) {
        self.push("supplier", Box::new(move || Ok(supplier())));
    }

    /// Register a supplier whose evaluation may fail.
    pub fn register_fallible(
        &mut self,
        supplier: impl FnMut() -> Result<Option<Fault>, BoxError> + 'static,
    ) {
        self.push("supplier", Box::new(supplier));
    }

    /// Register a fault raised whenever `condition` holds.
    pub fn register_condition(
        &mut self,
        mut condition: impl FnMut() -> bool + 'static,
        name: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) {
        let fault = Fault::new(name, description, severity);
        let label = fault.display_line();
        self.push(
            label,
            Box::new(move || Ok(condition().then(|| fault.clone()))),
        );
    }

    /// Register one supplier per fault condition of `device`.
    pub fn register_device<D: DeviceFaults>(&mut self, device: &Shared<D>) {
        for bit in D::fault_bits() {
            let device = Rc::clone(device);
            self.push(
                bit.description,
                Box::new(move || -> Result<Option<Fault>, BoxError> {
                    let device = device
                        .try_borrow()
                        .map_err(|_| format!("device busy while checking '{}'", bit.description))?;
                    Ok((bit.active)(&*device)
                        .then(|| Fault::new(device.identity(), bit.description, bit.severity)))
                }),
            );
        }
    }

    /// Drop every supplier.
    pub fn unregister_all(&mut self) {
        debug!(count = self.suppliers.len(), "Unregistering fault suppliers");
        self.suppliers.clear();
    }

    /// Forget every fault seen so far.
    pub fn clear(&mut self) {
        self.total.clear();
    }

    /// Evaluate every supplier and publish both fault sets.
    pub fn update(&mut self, frame: &mut Frame<'_>) {
        self.evaluate();
        self.publish(frame);
    }

    /// Rebuild the active set and fold it into the total set.
    ///
    /// A supplier that fails or panics is logged and skipped; the rest
    /// still run.
    pub fn evaluate(&mut self) {
        self.active.clear();

        for supplier in &mut self.suppliers {
            let error = match guarded(|| (supplier.poll)()) {
                Ok(fault) => {
                    if supplier.failing {
                        debug!(supplier = %supplier.label, "Fault supplier recovered");
                        supplier.failing = false;
                    }
                    if let Some(fault) = fault {
                        self.active.insert(fault);
                    }
                    continue;
                }
                Err(e) => e.to_string(),
            };

            if supplier.failing {
                debug!(supplier = %supplier.label, error = %error, "Fault supplier still failing");
            } else {
                warn!(supplier = %supplier.label, error = %error, "Fault supplier failed");
                supplier.failing = true;
            }
        }

        self.total.extend(self.active.iter().cloned());
    }

    /// Currently active faults.
    pub fn active(&self) -> &BTreeSet<Fault> {
        &self.active
    }

    /// Every fault seen since the last clear.
    pub fn total(&self) -> &BTreeSet<Fault> {
        &self.total
    }

    pub fn has_active_errors(&self) -> bool {
        self.active.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn supplier_count(&self) -> usize {
        self.suppliers.len()
    }

    /// Both fault sets in their published form.
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            active: FaultWidget::from_faults(&self.active),
            total: FaultWidget::from_faults(&self.total),
        }
    }

    fn push(&mut self, label: impl Into<String>, poll: Supplier) {
        self.suppliers.push(RegisteredSupplier {
            label: label.into(),
            poll,
            failing: false,
        });
    }

    fn publish(&mut self, frame: &mut Frame<'_>) {
        let handles = match self.handles {
            Some(handles) => handles,
            None => {
                let handles = FaultHandles {
                    active: open_widget(frame, FAULTS_ACTIVE_PATH),
                    total: open_widget(frame, FAULTS_TOTAL_PATH),
                };
                self.handles = Some(handles);
                handles
            }
        };

        let snapshot = self.snapshot();
        write_widget(frame, FAULTS_ACTIVE_PATH, handles.active, snapshot.active);
        write_widget(frame, FAULTS_TOTAL_PATH, handles.total, snapshot.total);
    }
}

const SEVERITY_KEYS: [&str; 3] = ["errors", "warnings", "infos"];

fn open_widget(frame: &mut Frame<'_>, path: &str) -> [SinkHandle; 3] {
    let labels = BTreeMap::new();
    let type_path = join_path(Some(path), WIDGET_TYPE_KEY);
    let type_handle = frame.open(SinkSpec {
        path: &type_path,
        tier: Tier::Live,
        kind: ValueKind::Text,
        labels: &labels,
        writable: false,
    });
    frame.write(
        type_handle,
        &type_path,
        &Value::Text(FAULT_WIDGET_TYPE.to_string()),
    );

    SEVERITY_KEYS.map(|key| {
        frame.open(SinkSpec {
            path: &join_path(Some(path), key),
            tier: Tier::Live,
            kind: ValueKind::TextArray,
            labels: &labels,
            writable: false,
        })
    })
}

fn write_widget(frame: &mut Frame<'_>, path: &str, handles: [SinkHandle; 3], widget: FaultWidget) {
    let lists = [widget.errors, widget.warnings, widget.infos];
    for ((key, handle), lines) in SEVERITY_KEYS.iter().zip(handles).zip(lists) {
        frame.write(handle, &join_path(Some(path), key), &Value::TextArray(lines));
    }
}
