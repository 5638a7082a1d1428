//! Scope chain and frame layout for variable resolution during compilation.
//!
//! Every function activation owns a frame variable list; all blocks nested in
//! that function share it, so a local's slot is its position in the list.
//! Parameters live below the frame pointer:
//!
//! ```text
//! | arg 0 | arg 1 | saved fp | return ip | local 0 | local 1 | ...
//!    -4      -3       -2         -1     ^ fp
//! ```

use super::references::Label;
use crate::compiler::error::CompileError;
use crate::compiler::types::{self, TypeName};
use crate::runtime::{Environment, SymbolKind};
use rustc_hash::FxHashMap;

/// Where a name's value lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Offset from the frame pointer of the declaring frame
    Slot(i64),
    /// Entry point of a compiled function
    Entry(Label),
    /// Host binding, fetched by name at run time
    External,
}

/// Parameter and return types of a compiled function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeName>,
    pub returns: TypeName,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeObject {
    pub name: String,
    pub datatype: TypeName,
    pub kind: SymbolKind,
    pub location: Location,
    /// Function depth of the declaring frame (0 = top level)
    pub frame: usize,
    pub constant: bool,
    /// Present for compiled functions
    pub signature: Option<Signature>,
}

impl ScopeObject {
    /// Returns true for names that can be stored into.
    pub fn is_assignable(&self) -> bool {
        matches!(self.location, Location::Slot(_)) && !self.constant
    }
}

/// Ordered local names of one function activation.
#[derive(Debug, Default, Clone)]
pub struct FrameVariableList {
    names: Vec<String>,
}

impl FrameVariableList {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[derive(Debug)]
struct Scope {
    objects: FxHashMap<String, ScopeObject>,
    /// Index into the frame stack
    frame: usize,
}

impl Scope {
    fn new(frame: usize) -> Self {
        Self {
            objects: FxHashMap::default(),
            frame,
        }
    }
}

/// The chain of lexical scopes currently open.
#[derive(Debug)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
    frames: Vec<FrameVariableList>,
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeChain {
    /// Creates a chain holding only the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(0)],
            frames: vec![FrameVariableList::default()],
        }
    }

    /// Current function depth (0 = top level).
    pub fn function_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Number of open scopes, the global scope included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// The active frame's variable list.
    pub fn frame(&self) -> &FrameVariableList {
        &self.frames[self.function_depth()]
    }

    /// Opens a block scope in the current frame.
    pub fn begin_scope(&mut self) {
        let frame = self.function_depth();
        self.scopes.push(Scope::new(frame));
    }

    /// Closes the innermost block scope. The global scope is never closed.
    pub fn end_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Opens a function scope with a fresh frame variable list.
    pub fn begin_function(&mut self) {
        self.frames.push(FrameVariableList::default());
        let frame = self.function_depth();
        self.scopes.push(Scope::new(frame));
    }

    /// Closes a function scope and restores the caller's frame. Returns the
    /// closed frame's variable list.
    pub fn end_function(&mut self) -> FrameVariableList {
        let frame = self.function_depth();
        while self.scopes.len() > 1 && self.scopes.last().is_some_and(|s| s.frame == frame) {
            self.scopes.pop();
        }
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            FrameVariableList::default()
        }
    }

    fn current(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Fails if `name` is visible from an open block of the same function or
    /// already holds a slot in the active frame, even one from a closed block.
    fn check_unique(&self, name: &str) -> Result<(), CompileError> {
        let frame = self.function_depth();
        let in_scope = self
            .scopes
            .iter()
            .rev()
            .take_while(|scope| scope.frame == frame)
            .any(|scope| scope.objects.contains_key(name));
        let in_frame = self.frame().names.iter().any(|declared| declared == name);
        if in_scope || in_frame {
            return Err(CompileError::DuplicateDeclaration(name.to_string()));
        }
        Ok(())
    }

    /// Declares a local variable in the current scope and assigns it the
    /// next slot of the active frame.
    pub fn declare_local(
        &mut self,
        name: &str,
        constant: bool,
        datatype: TypeName,
    ) -> Result<ScopeObject, CompileError> {
        self.check_unique(name)?;
        let frame = self.function_depth();
        let list = &mut self.frames[frame];
        let slot = list.names.len() as i64;
        list.names.push(name.to_string());

        let object = ScopeObject {
            name: name.to_string(),
            datatype,
            kind: if constant {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            },
            location: Location::Slot(slot),
            frame,
            constant,
            signature: None,
        };
        self.current().objects.insert(name.to_string(), object.clone());
        Ok(object)
    }

    /// Declares parameter `index` of `count`. The caller pushes arguments in
    /// order, then the saved frame pointer and return address, so parameter
    /// `index` sits at `index - count - 2`.
    pub fn declare_parameter(
        &mut self,
        name: &str,
        index: usize,
        count: usize,
        datatype: TypeName,
    ) -> Result<ScopeObject, CompileError> {
        if self.current().objects.contains_key(name) {
            return Err(CompileError::DuplicateDeclaration(name.to_string()));
        }
        let object = ScopeObject {
            name: name.to_string(),
            datatype,
            kind: SymbolKind::Variable,
            location: Location::Slot(index as i64 - count as i64 - 2),
            frame: self.function_depth(),
            constant: false,
            signature: None,
        };
        self.current().objects.insert(name.to_string(), object.clone());
        Ok(object)
    }

    /// Declares a compiled function. Redeclaring the same name in the same
    /// scope is an error.
    pub fn declare_function(
        &mut self,
        name: &str,
        entry: Label,
        signature: Signature,
    ) -> Result<ScopeObject, CompileError> {
        if self.current().objects.contains_key(name) {
            return Err(CompileError::DuplicateDeclaration(name.to_string()));
        }
        let object = ScopeObject {
            name: name.to_string(),
            datatype: types::FUNCTION,
            kind: SymbolKind::Function,
            location: Location::Entry(entry),
            frame: self.function_depth(),
            constant: true,
            signature: Some(signature),
        };
        self.current().objects.insert(name.to_string(), object.clone());
        Ok(object)
    }

    /// Looks `name` up in the current scope only.
    pub fn lookup_current(&self, name: &str) -> Option<&ScopeObject> {
        self.scopes.last().and_then(|scope| scope.objects.get(name))
    }

    /// Resolves `name` through the scope chain, then the host environment.
    pub fn resolve(
        &self,
        name: &str,
        environment: &dyn Environment,
    ) -> Result<ScopeObject, CompileError> {
        if let Some(object) = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.objects.get(name))
        {
            return Ok(object.clone());
        }

        let symbol = environment
            .resolve(name)
            .ok_or_else(|| CompileError::UnknownIdentifier(name.to_string()))?;
        Ok(ScopeObject {
            name: name.to_string(),
            datatype: types::registry()
                .canonical(&symbol.datatype)
                .unwrap_or(types::ANY),
            kind: symbol.kind,
            location: Location::External,
            frame: 0,
            constant: true,
            signature: None,
        })
    }
}
