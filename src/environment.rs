//! Lexical environments.
//!
//! Every scope lives in an [`Environments`] arena owned by the interpreter and
//! is addressed by an [`EnvId`].  Function values hold an `EnvId` rather than
//! a pointer, so closures can never form reference cycles through the scopes
//! they capture.
//!
//! A scope is *captured* once a function value closes over it (directly or
//! through a descendant).  Uncaptured scopes are handed back to the arena when
//! their block or call exits; captured ones live as long as the arena.  The
//! arena therefore grows with every closure created, even one that is dropped
//! at once: a loop calling `makeCounter()` a million times keeps a million
//! scopes.

use std::collections::HashMap;

use log::trace;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Handle to a scope inside an [`Environments`] arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnvId(usize);

/// A single scope: its bindings and a link to the enclosing scope.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,
    captured: bool,
}

impl Environment {
    fn new(enclosing: Option<EnvId>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing,
            captured: false,
        }
    }
}

/// Arena of scopes.  Slot 0 is the global scope.
#[derive(Debug)]
pub struct Environments {
    slots: Vec<Option<Environment>>,
    free: Vec<usize>,
}

const GLOBALS: EnvId = EnvId(0);

impl Environments {
    pub fn new() -> Self {
        let mut root = Environment::new(None);
        root.captured = true;

        Environments {
            slots: vec![Some(root)],
            free: Vec::new(),
        }
    }

    /// The scope with no parent; it also hosts the builtins.
    pub fn globals(&self) -> EnvId {
        GLOBALS
    }

    /// Open a fresh, empty scope whose parent is `enclosing`.
    pub fn child(&mut self, enclosing: EnvId) -> EnvId {
        let env = Environment::new(Some(enclosing));

        let id = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(env);
                EnvId(index)
            }
            None => {
                self.slots.push(Some(env));
                EnvId(self.slots.len() - 1)
            }
        };

        trace!("Opened scope {:?} under {:?}", id, enclosing);

        id
    }

    /// Mark `env` and all its ancestors as referenced by a function value.
    pub fn capture(&mut self, env: EnvId) {
        let mut cursor = Some(env);

        while let Some(id) = cursor {
            match self.slot_mut(id) {
                Some(scope) if !scope.captured => {
                    scope.captured = true;
                    cursor = scope.enclosing;
                }
                // Ancestors of a captured scope are captured already.
                _ => break,
            }
        }
    }

    /// Give an exited scope back to the arena unless a closure holds it.
    pub fn release(&mut self, env: EnvId) {
        let reclaim = matches!(self.slot(env), Some(scope) if !scope.captured);

        if reclaim {
            trace!("Released scope {:?}", env);

            self.slots[env.0] = None;
            self.free.push(env.0);
        }
    }

    /// Number of scopes currently alive, globals included.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Bind `name` in `env`, replacing any previous binding there.
    pub fn define(&mut self, env: EnvId, name: &str, value: Value) {
        if let Some(scope) = self.slot_mut(env) {
            scope.values.insert(name.to_string(), value);
        }
    }

    /// Look `name` up in `env` and then its ancestors.
    pub fn get(&self, env: EnvId, name: &Token) -> Result<Value> {
        let mut cursor = Some(env);

        while let Some(id) = cursor {
            let Some(scope) = self.slot(id) else { break };

            if let Some(value) = scope.values.get(&name.lexeme) {
                return Ok(value.clone());
            }

            cursor = scope.enclosing;
        }

        Err(undefined(name))
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, env: EnvId, name: &Token, value: Value) -> Result<()> {
        let mut cursor = Some(env);

        while let Some(id) = cursor {
            let Some(scope) = self.slot_mut(id) else { break };

            if let Some(slot) = scope.values.get_mut(&name.lexeme) {
                *slot = value;
                return Ok(());
            }

            cursor = scope.enclosing;
        }

        Err(undefined(name))
    }

    /// The scope reached by walking `distance` parent links up from `env`.
    pub fn ancestor(&self, env: EnvId, distance: usize) -> Option<EnvId> {
        let mut id = env;

        for _ in 0..distance {
            id = self.slot(id)?.enclosing?;
        }

        Some(id)
    }

    /// Read `name` directly from the scope `distance` levels up.
    pub fn get_at(&self, env: EnvId, distance: usize, name: &Token) -> Result<Value> {
        self.ancestor(env, distance)
            .and_then(|id| self.slot(id))
            .and_then(|scope| scope.values.get(&name.lexeme))
            .cloned()
            .ok_or_else(|| undefined(name))
    }

    /// Write `name` directly into the scope `distance` levels up.
    pub fn assign_at(
        &mut self,
        env: EnvId,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<()> {
        let slot = match self.ancestor(env, distance) {
            Some(id) => self
                .slot_mut(id)
                .and_then(|scope| scope.values.get_mut(&name.lexeme)),
            None => None,
        };

        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }

    fn slot(&self, id: EnvId) -> Option<&Environment> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: EnvId) -> Option<&mut Environment> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}
