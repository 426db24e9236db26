//! # Host Console Model
//!
//! The diagnostic object belongs to the host page, not to us. The page may
//! reassign any method, harden a slot, or swap the whole object at any time,
//! and the engine has to cope with whatever it finds there on each pass.
//!
//! ## Slot attributes
//!
//! - `configurable = false` → [`HostConsole::define`] is rejected
//! - `writable = false` → [`HostConsole::assign`] is rejected
//!
//! Host-side operations ([`HostConsole::set`], [`HostConsole::replace_all`])
//! always succeed: the host owns the object.
//!
//! Engine wrappers are stored with a [`WrapperMeta`] naming their forwarding
//! target, so a wrapper left behind by a retired engine can be bypassed
//! instead of wrapped again.
//!
//! No lock is held while a slot function runs, so diagnostic functions may
//! call back into the console (the engine's wrappers do exactly that when
//! forwarding).

use consolecap_common::ConsoleMethod;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::{EngineId, InstallError};
use crate::event_data::ArgValue;

/// A callable occupying a console slot
pub type DiagnosticFn = Arc<dyn Fn(&[ArgValue]) + Send + Sync>;

/// Identifying metadata carried by an engine-installed wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrapperTag {
    pub engine: EngineId,
    pub method: ConsoleMethod,
}

/// Installation record kept alongside an engine wrapper
#[derive(Clone)]
pub struct WrapperMeta {
    pub tag: WrapperTag,
    /// Function the wrapper forwards to, if one was bound at install time
    pub target: Option<DiagnosticFn>,
    /// Cleared once the owning engine stops recording
    pub active: Arc<AtomicBool>,
}

impl WrapperMeta {
    fn is_retired(&self) -> bool {
        !self.active.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct Slot {
    func: DiagnosticFn,
    wrapper: Option<WrapperMeta>,
    configurable: bool,
    writable: bool,
}

impl Slot {
    fn host(func: DiagnosticFn) -> Self {
        Self { func, wrapper: None, configurable: true, writable: true }
    }

    fn wrapped(func: DiagnosticFn, meta: WrapperMeta) -> Self {
        Self { func, wrapper: Some(meta), configurable: true, writable: true }
    }
}

/// Shared, host-owned diagnostic object
#[derive(Default)]
pub struct HostConsole {
    slots: RwLock<HashMap<String, Slot>>,
}

impl fmt::Debug for HostConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = slots.keys().collect();
        names.sort();
        f.debug_struct("HostConsole").field("slots", &names).finish()
    }
}

impl HostConsole {
    /// Create an empty console
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console whose standard methods all route to `handler`
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(ConsoleMethod, &[ArgValue]) + Send + Sync + 'static,
    {
        let console = Self::new();
        let handler = Arc::new(handler);
        for method in ConsoleMethod::ALL {
            let handler = Arc::clone(&handler);
            console.set(method.name(), Arc::new(move |args: &[ArgValue]| handler(method, args)));
        }
        console
    }

    /// Invoke whatever currently occupies `name`.
    ///
    /// Returns `false` if the slot is empty.
    pub fn call(&self, name: &str, args: &[ArgValue]) -> bool {
        // Clone the function out so the lock is released before it runs
        let Some(func) = self.current(name) else {
            return false;
        };
        func(args);
        true
    }

    /// Host reassigns a method
    pub fn set(&self, name: &str, func: DiagnosticFn) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(name) {
            Some(slot) => {
                slot.func = func;
                slot.wrapper = None;
            }
            None => {
                slots.insert(name.to_string(), Slot::host(func));
            }
        }
    }

    /// Host replaces the whole object, discarding every slot and attribute
    pub fn replace_all<I>(&self, methods: I)
    where
        I: IntoIterator<Item = (String, DiagnosticFn)>,
    {
        let fresh: HashMap<String, Slot> =
            methods.into_iter().map(|(name, func)| (name, Slot::host(func))).collect();
        *self.slots.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Host hardens (or relaxes) a slot
    pub fn lock_slot(&self, name: &str, configurable: bool, writable: bool) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(name) {
            slot.configurable = configurable;
            slot.writable = writable;
        }
    }

    /// Preferred installation path: redefine the slot.
    ///
    /// # Errors
    /// Returns [`InstallError::DefineRejected`] if the slot is not configurable
    pub fn define(&self, name: &str, func: DiagnosticFn, meta: WrapperMeta) -> Result<(), InstallError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(name) {
            Some(slot) if !slot.configurable => Err(InstallError::DefineRejected(name.to_string())),
            Some(slot) => {
                slot.func = func;
                slot.wrapper = Some(meta);
                Ok(())
            }
            None => {
                slots.insert(name.to_string(), Slot::wrapped(func, meta));
                Ok(())
            }
        }
    }

    /// Fallback installation path: plain assignment.
    ///
    /// # Errors
    /// Returns [`InstallError::AssignRejected`] if the slot is not writable
    pub fn assign(&self, name: &str, func: DiagnosticFn, meta: WrapperMeta) -> Result<(), InstallError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(name) {
            Some(slot) if !slot.writable => Err(InstallError::AssignRejected(name.to_string())),
            Some(slot) => {
                slot.func = func;
                slot.wrapper = Some(meta);
                Ok(())
            }
            None => {
                slots.insert(name.to_string(), Slot::wrapped(func, meta));
                Ok(())
            }
        }
    }

    /// Wrapper tag of the function currently in `name`, if any
    #[must_use]
    pub fn tag_of(&self, name: &str) -> Option<WrapperTag> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).get(name).and_then(|s| s.wrapper.as_ref().map(|w| w.tag))
    }

    /// Function a new wrapper for `name` should forward to.
    ///
    /// A retired engine's wrapper is skipped in favor of its own target, so
    /// repeated activations on one console never stack wrappers.
    #[must_use]
    pub fn forwarding_target(&self, name: &str) -> Option<DiagnosticFn> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(name)?;
        match slot.wrapper {
            Some(ref meta) if meta.is_retired() => meta.target.clone(),
            _ => Some(Arc::clone(&slot.func)),
        }
    }

    /// Function currently occupying `name`
    #[must_use]
    pub fn current(&self, name: &str) -> Option<DiagnosticFn> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|slot| Arc::clone(&slot.func))
    }
}
