use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// One link in the lexical scope chain.
///
/// Environments are shared: a closure keeps its declaration-site
/// environment alive through the `Rc`, and interior mutability lets
/// every holder observe assignments to captured variables.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup, walking the chain outward. Used for globals,
    /// where the resolver recorded no distance.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Dynamic assignment, walking the chain outward. Assigning to a
    /// name with no declaration anywhere is an error.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// The environment exactly `distance` parent links out.
///
/// Panics if the chain is shorter than the recorded distance; the
/// resolver guarantees this cannot happen for a resolved program.
pub fn ancestor(
    env: &Rc<RefCell<Environment>>,
    distance: usize,
) -> Rc<RefCell<Environment>> {
    let mut current = Rc::clone(env);
    for _ in 0..distance {
        let next = current
            .borrow()
            .enclosing
            .as_ref()
            .map(Rc::clone)
            .expect("environment chain shorter than resolved distance");
        current = next;
    }
    current
}

/// Read a binding at the resolver-recorded distance. The binding must
/// exist there; a miss is an interpreter bug, not a user error.
pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Value {
    ancestor(env, distance)
        .borrow()
        .values
        .get(name)
        .cloned()
        .expect("resolved variable missing from environment")
}

/// Write a binding at the resolver-recorded distance.
pub fn assign_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str, value: Value) {
    ancestor(env, distance)
        .borrow_mut()
        .values
        .insert(name.to_string(), value);
}
