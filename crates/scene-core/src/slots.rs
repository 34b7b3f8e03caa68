use std::any::{type_name, Any};
use std::rc::Rc;

use serde_json::Value;

use crate::error::HookError;
use crate::hooks::{Deps, EffectCleanup};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotKind {
    Cell,
    State,
}

pub(crate) enum HookSlot {
    Cell(Rc<dyn Any>),
    State(Rc<dyn Any>),
    Effect(EffectSlot),
}

impl HookSlot {
    fn describe(&self) -> &'static str {
        match self {
            HookSlot::Cell(_) => "a cell hook",
            HookSlot::State(_) => "a state hook",
            HookSlot::Effect(_) => "an effect hook",
        }
    }

    fn shared(&self, kind: SlotKind) -> Option<Rc<dyn Any>> {
        match (self, kind) {
            (HookSlot::Cell(value), SlotKind::Cell) | (HookSlot::State(value), SlotKind::State) => {
                Some(Rc::clone(value))
            }
            _ => None,
        }
    }
}

#[derive(Default)]
pub(crate) struct EffectSlot {
    cleanup: EffectCleanup,
    deps: Option<Vec<Value>>,
    has_run: bool,
}

impl EffectSlot {
    pub(crate) fn should_run(&self, deps: &Deps) -> bool {
        if !self.has_run {
            return true;
        }
        match (deps, &self.deps) {
            (Deps::Always, _) | (_, None) => true,
            (Deps::Values(next), Some(previous)) => next != previous,
        }
    }

    /// Records `deps` as the latest run and hands back the previous cleanup.
    pub(crate) fn begin_run(&mut self, deps: &Deps) -> EffectCleanup {
        self.deps = match deps {
            Deps::Always => None,
            Deps::Values(values) => Some(values.clone()),
        };
        self.has_run = true;
        std::mem::take(&mut self.cleanup)
    }

    pub(crate) fn set_cleanup(&mut self, cleanup: EffectCleanup) {
        self.cleanup = cleanup;
    }
}

/// Positional hook storage for one component instance.
///
/// Slot `i` belongs to the `i`-th hook call of the component body; the
/// cursor is rewound before every invocation.
#[derive(Default)]
pub struct HookStore {
    slots: Vec<HookSlot>,
    cursor: usize,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the shared value stored at the cursor, allocating it with
    /// `init` on first use, and advances the cursor.
    pub(crate) fn shared<S: Any>(
        &mut self,
        kind: SlotKind,
        init: impl FnOnce() -> Rc<S>,
    ) -> Result<Rc<S>, HookError> {
        let index = self.cursor;
        let value = match self.slots.get(index) {
            Some(slot) => {
                let found = slot.describe();
                let mismatch = || HookError::SlotMismatch {
                    index,
                    expected: type_name::<S>(),
                    found,
                };
                slot.shared(kind)
                    .ok_or_else(mismatch)?
                    .downcast::<S>()
                    .map_err(|_| mismatch())?
            }
            None => {
                let value = init();
                let stored: Rc<dyn Any> = value.clone();
                self.slots.push(match kind {
                    SlotKind::Cell => HookSlot::Cell(stored),
                    SlotKind::State => HookSlot::State(stored),
                });
                value
            }
        };
        self.cursor += 1;
        Ok(value)
    }

    /// Claims the effect slot at the cursor and advances the cursor.
    pub(crate) fn effect(&mut self) -> Result<(usize, &mut EffectSlot), HookError> {
        let index = self.cursor;
        if index == self.slots.len() {
            self.slots.push(HookSlot::Effect(EffectSlot::default()));
        }
        match &mut self.slots[index] {
            HookSlot::Effect(slot) => {
                self.cursor += 1;
                Ok((index, slot))
            }
            other => Err(HookError::SlotMismatch {
                index,
                expected: "an effect hook",
                found: other.describe(),
            }),
        }
    }

    pub(crate) fn effect_at(&mut self, index: usize) -> Option<&mut EffectSlot> {
        match self.slots.get_mut(index) {
            Some(HookSlot::Effect(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Empties the store, returning pending effect cleanups in slot order.
    pub(crate) fn dispose(&mut self) -> Vec<EffectCleanup> {
        self.cursor = 0;
        self.slots
            .drain(..)
            .filter_map(|slot| match slot {
                HookSlot::Effect(mut effect) => Some(std::mem::take(&mut effect.cleanup)),
                _ => None,
            })
            .filter(EffectCleanup::is_set)
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/slots_tests.rs"]
mod tests;
