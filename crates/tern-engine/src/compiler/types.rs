//! Operator/type registry.
//!
//! Maps a static type plus an operation key (`"int+int"`, `"-float"`,
//! `"any++"`, `"load_local"`, ...) to the rule the code generator applies.
//! The registry is built once and shared read-only by every compilation.

use super::bytecode::OpCode;
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// A registry type name. Always one of the canonical names below.
pub type TypeName = &'static str;

pub const INT: TypeName = "int";
pub const FLOAT: TypeName = "float";
pub const STRING: TypeName = "string";
pub const BOOL: TypeName = "bool";
pub const NULL: TypeName = "null";
pub const ANY: TypeName = "any";
pub const ARRAY: TypeName = "array";
pub const OBJECT: TypeName = "object";
pub const SET: TypeName = "set";
pub const FUNCTION: TypeName = "function";
/// Type of an expression that leaves nothing on the stack.
pub const VOID: TypeName = "void";

/// In-place update applied to the last emitted load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Increment,
    Decrement,
}

/// What applying a rule does to the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Append one instruction
    Emit(OpCode),
    /// Rewrite the last emitted load into an increment or decrement
    Update(Update),
    /// Operands are combined by branches the compiler lays out itself
    ShortCircuit,
}

/// A code-generation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenRule {
    pub action: Action,
    /// Static type of the expression after the rule is applied
    pub result: TypeName,
    /// Whether the emitted instruction can later be rewritten into a store
    pub lvalue: bool,
}

impl CodegenRule {
    const fn emit(opcode: OpCode, result: TypeName) -> Self {
        Self {
            action: Action::Emit(opcode),
            result,
            lvalue: false,
        }
    }

    const fn load(opcode: OpCode, result: TypeName) -> Self {
        Self {
            action: Action::Emit(opcode),
            result,
            lvalue: true,
        }
    }

    const fn update(update: Update) -> Self {
        Self {
            action: Action::Update(update),
            result: VOID,
            lvalue: false,
        }
    }
}

/// Explicit conversion inserted after a declaration initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub opcode: OpCode,
    pub result: TypeName,
}

/// A registry entry.
#[derive(Debug, Clone)]
pub struct DType {
    pub id: TypeName,
    pub aliases: &'static [&'static str],
    member_ops: FxHashMap<&'static str, CodegenRule>,
    operations: FxHashMap<String, CodegenRule>,
    conversions: FxHashMap<TypeName, Conversion>,
}

impl DType {
    fn new(id: TypeName, aliases: &'static [&'static str]) -> Self {
        Self {
            id,
            aliases,
            member_ops: FxHashMap::default(),
            operations: FxHashMap::default(),
            conversions: FxHashMap::default(),
        }
    }

    fn op(mut self, key: impl Into<String>, rule: CodegenRule) -> Self {
        self.operations.insert(key.into(), rule);
        self
    }

    fn member(mut self, name: &'static str, rule: CodegenRule) -> Self {
        self.member_ops.insert(name, rule);
        self
    }

    fn convert(mut self, target: TypeName, opcode: OpCode) -> Self {
        self.conversions.insert(
            target,
            Conversion {
                opcode,
                result: target,
            },
        );
        self
    }

    /// Width-specific loads for locals, globals and the slot-based stores
    /// derived from them.
    fn slots(self, local: OpCode, global: OpCode) -> Self {
        let id = self.id;
        self.op("load_local", CodegenRule::load(local, id))
            .op("load_global", CodegenRule::load(global, id))
    }

    /// The `==`/`!=` pair.
    fn equality(self, eq: OpCode, ne: OpCode) -> Self {
        let id = self.id;
        self.op(format!("{id}=={id}"), CodegenRule::emit(eq, BOOL))
            .op(format!("{id}!={id}"), CodegenRule::emit(ne, BOOL))
    }

    /// Arithmetic, comparison, negation and increments for a numeric type.
    fn numeric(self, ops: &NumericOps) -> Self {
        let id = self.id;
        let arithmetic = [
            ("+", ops.add),
            ("-", ops.sub),
            ("*", ops.mul),
            ("/", ops.div),
            ("%", ops.rem),
            ("**", ops.pow),
        ];
        let comparison = [
            ("==", ops.eq),
            ("!=", ops.ne),
            ("<", ops.lt),
            ("<=", ops.le),
            (">", ops.gt),
            (">=", ops.ge),
        ];
        let mut dtype = self;
        for (operator, opcode) in arithmetic {
            dtype = dtype.op(format!("{id}{operator}{id}"), CodegenRule::emit(opcode, id));
        }
        for (operator, opcode) in comparison {
            dtype = dtype.op(format!("{id}{operator}{id}"), CodegenRule::emit(opcode, BOOL));
        }
        dtype
            .op(format!("-{id}"), CodegenRule::emit(ops.neg, id))
            .op(format!("++{id}"), CodegenRule::update(Update::Increment))
            .op(format!("{id}++"), CodegenRule::update(Update::Increment))
            .op(format!("--{id}"), CodegenRule::update(Update::Decrement))
            .op(format!("{id}--"), CodegenRule::update(Update::Decrement))
    }

    /// Looks up an operation rule by key.
    pub fn lookup(&self, key: &str) -> Option<&CodegenRule> {
        self.operations.get(key)
    }

    /// Looks up a statically typed member such as `length`.
    pub fn member_op(&self, name: &str) -> Option<&CodegenRule> {
        self.member_ops.get(name)
    }

    /// Conversion accepted when a declaration of type `target` is
    /// initialized with a value of this type.
    pub fn implicit_conversion(&self, target: &str) -> Option<Conversion> {
        self.conversions.get(target).copied()
    }
}

struct NumericOps {
    add: OpCode,
    sub: OpCode,
    mul: OpCode,
    div: OpCode,
    rem: OpCode,
    pow: OpCode,
    neg: OpCode,
    eq: OpCode,
    ne: OpCode,
    lt: OpCode,
    le: OpCode,
    gt: OpCode,
    ge: OpCode,
}

const INT_OPS: NumericOps = NumericOps {
    add: OpCode::AddInt,
    sub: OpCode::SubInt,
    mul: OpCode::MulInt,
    div: OpCode::DivInt,
    rem: OpCode::ModInt,
    pow: OpCode::PowInt,
    neg: OpCode::NegInt,
    eq: OpCode::EqInt,
    ne: OpCode::NeInt,
    lt: OpCode::LtInt,
    le: OpCode::LeInt,
    gt: OpCode::GtInt,
    ge: OpCode::GeInt,
};

const FLOAT_OPS: NumericOps = NumericOps {
    add: OpCode::AddFloat,
    sub: OpCode::SubFloat,
    mul: OpCode::MulFloat,
    div: OpCode::DivFloat,
    rem: OpCode::ModFloat,
    pow: OpCode::PowFloat,
    neg: OpCode::NegFloat,
    eq: OpCode::EqFloat,
    ne: OpCode::NeFloat,
    lt: OpCode::LtFloat,
    le: OpCode::LeFloat,
    gt: OpCode::GtFloat,
    ge: OpCode::GeFloat,
};

const ANY_OPS: NumericOps = NumericOps {
    add: OpCode::AddAny,
    sub: OpCode::SubAny,
    mul: OpCode::MulAny,
    div: OpCode::DivAny,
    rem: OpCode::ModAny,
    pow: OpCode::PowAny,
    neg: OpCode::NegAny,
    eq: OpCode::EqAny,
    ne: OpCode::NeAny,
    lt: OpCode::LtAny,
    le: OpCode::LeAny,
    gt: OpCode::GtAny,
    ge: OpCode::GeAny,
};

/// The set of known types.
#[derive(Debug)]
pub struct TypeRegistry {
    types: FxHashMap<TypeName, DType>,
    names: FxHashMap<&'static str, TypeName>,
}

static REGISTRY: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::new);

/// Returns the process-wide registry.
pub fn registry() -> &'static TypeRegistry {
    &REGISTRY
}

impl TypeRegistry {
    /// Builds the registry with every built-in type.
    pub fn new() -> Self {
        let int = DType::new(INT, &["integer", "i32"])
            .slots(OpCode::LoadLocal32, OpCode::LoadGlobal32)
            .numeric(&INT_OPS)
            .convert(FLOAT, OpCode::IntToFloat)
            .convert(STRING, OpCode::IntToString);

        let float = DType::new(FLOAT, &["double", "f64", "number"])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .numeric(&FLOAT_OPS)
            .convert(INT, OpCode::FloatToInt)
            .convert(STRING, OpCode::FloatToString);

        let string = DType::new(STRING, &["str"])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .equality(OpCode::EqString, OpCode::NeString)
            .op("string+string", CodegenRule::emit(OpCode::ConcatString, STRING))
            .op("load_element", CodegenRule::emit(OpCode::LoadElement64, STRING))
            .member("length", CodegenRule::emit(OpCode::LoadMember32, INT));

        let boolean = DType::new(BOOL, &["boolean"])
            .slots(OpCode::LoadLocal8, OpCode::LoadGlobal8)
            .equality(OpCode::EqBool, OpCode::NeBool)
            .op("!bool", CodegenRule::emit(OpCode::NotBool, BOOL))
            .op("bool&&bool", short_circuit(BOOL))
            .op("bool||bool", short_circuit(BOOL));

        let any = DType::new(ANY, &[])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .numeric(&ANY_OPS)
            .op("!any", CodegenRule::emit(OpCode::NotAny, BOOL))
            .op("any&&any", short_circuit(ANY))
            .op("any||any", short_circuit(ANY))
            .op("load_member", CodegenRule::load(OpCode::LoadMember64, ANY))
            .op("load_element", CodegenRule::load(OpCode::LoadElement64, ANY));

        let array = DType::new(ARRAY, &["list"])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .equality(OpCode::EqObject, OpCode::NeObject)
            .op("load_element", CodegenRule::load(OpCode::LoadElement64, ANY))
            .member("length", CodegenRule::emit(OpCode::LoadMember32, INT));

        let object = DType::new(OBJECT, &["map"])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .equality(OpCode::EqObject, OpCode::NeObject)
            .op("load_member", CodegenRule::load(OpCode::LoadMember64, ANY))
            .op("load_element", CodegenRule::load(OpCode::LoadElement64, ANY));

        let set = DType::new(SET, &[])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .equality(OpCode::EqObject, OpCode::NeObject)
            .op("load_element", CodegenRule::emit(OpCode::LoadElement8, BOOL))
            .member("size", CodegenRule::emit(OpCode::LoadMember32, INT));

        let null = DType::new(NULL, &[])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .equality(OpCode::EqObject, OpCode::NeObject);

        let function = DType::new(FUNCTION, &[])
            .slots(OpCode::LoadLocal64, OpCode::LoadGlobal64)
            .equality(OpCode::EqObject, OpCode::NeObject);

        let mut registry = Self {
            types: FxHashMap::default(),
            names: FxHashMap::default(),
        };
        for dtype in [int, float, string, boolean, any, array, object, set, null, function] {
            registry.insert(dtype);
        }
        registry
    }

    fn insert(&mut self, dtype: DType) {
        self.names.insert(dtype.id, dtype.id);
        for alias in dtype.aliases {
            self.names.insert(*alias, dtype.id);
        }
        self.types.insert(dtype.id, dtype);
    }

    /// Resolves a type name or alias to its canonical name.
    pub fn canonical(&self, name: &str) -> Option<TypeName> {
        self.names.get(name).copied()
    }

    /// Returns the entry for a canonical type name or alias.
    pub fn get(&self, name: &str) -> Option<&DType> {
        self.canonical(name).and_then(|id| self.types.get(id))
    }

    /// Looks up `key` on the entry for `datatype`.
    pub fn lookup(&self, datatype: &str, key: &str) -> Option<&CodegenRule> {
        self.get(datatype).and_then(|dtype| dtype.lookup(key))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const fn short_circuit(result: TypeName) -> CodegenRule {
    CodegenRule {
        action: Action::ShortCircuit,
        result,
        lvalue: false,
    }
}

/// Key for a binary operation, e.g. `int+int`.
pub fn binary_key(left: &str, operator: &str, right: &str) -> String {
    format!("{left}{operator}{right}")
}

/// Key for a unary operation: `-int` when prefix, `int++` when postfix.
pub fn unary_key(operator: &str, operand: &str, postfix: bool) -> String {
    if postfix {
        format!("{operand}{operator}")
    } else {
        format!("{operator}{operand}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve() {
        let registry = registry();
        assert_eq!(registry.canonical("integer"), Some(INT));
        assert_eq!(registry.canonical("double"), Some(FLOAT));
        assert_eq!(registry.canonical("boolean"), Some(BOOL));
        assert_eq!(registry.canonical("widget"), None);
    }

    #[test]
    fn test_binary_rules() {
        let rule = registry().lookup(INT, &binary_key(INT, "+", INT)).unwrap();
        assert_eq!(rule.action, Action::Emit(OpCode::AddInt));
        assert_eq!(rule.result, INT);
        assert!(!rule.lvalue);

        let rule = registry().lookup(FLOAT, "float<float").unwrap();
        assert_eq!(rule.result, BOOL);

        assert!(registry().lookup(STRING, "string-string").is_none());
    }

    #[test]
    fn test_load_widths() {
        let width = |name| match registry().lookup(name, "load_local").unwrap().action {
            Action::Emit(opcode) => opcode,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(width(BOOL), OpCode::LoadLocal8);
        assert_eq!(width(INT), OpCode::LoadLocal32);
        assert_eq!(width(FLOAT), OpCode::LoadLocal64);
        assert_eq!(width(ANY), OpCode::LoadLocal64);
    }

    #[test]
    fn test_unary_keys() {
        assert_eq!(unary_key("++", INT, true), "int++");
        assert_eq!(unary_key("-", FLOAT, false), "-float");
        let rule = registry().lookup(INT, "int++").unwrap();
        assert_eq!(rule.action, Action::Update(Update::Increment));
        assert_eq!(rule.result, VOID);
    }

    #[test]
    fn test_implicit_conversions() {
        let int = registry().get(INT).unwrap();
        assert_eq!(
            int.implicit_conversion(FLOAT).map(|c| c.opcode),
            Some(OpCode::IntToFloat)
        );
        assert!(int.implicit_conversion(BOOL).is_none());
        let float = registry().get(FLOAT).unwrap();
        assert_eq!(
            float.implicit_conversion(INT).map(|c| c.opcode),
            Some(OpCode::FloatToInt)
        );
    }

    #[test]
    fn test_member_ops() {
        let rule = registry().get(ARRAY).unwrap().member_op("length").unwrap();
        assert_eq!(rule.result, INT);
        assert!(registry().get(INT).unwrap().member_op("length").is_none());
    }
}
