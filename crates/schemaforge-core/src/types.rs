use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Primitive kind declared by (or inferred for) a schema node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Array,
    Object,
    #[default]
    Unknown,
}

impl PrimitiveKind {
    /// Parse a JSON Schema `type` keyword value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds that map directly onto a built-in value type.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Number | Self::Integer | Self::Boolean
        )
    }

    /// Kind used when checking union members for distinctness.
    ///
    /// Integer and number collapse into one class.
    pub fn union_class(&self) -> Self {
        match self {
            Self::Integer => Self::Number,
            other => *other,
        }
    }

    /// Built-in type backing a scalar kind.
    pub fn builtin(&self) -> Option<BuiltinKind> {
        match self {
            Self::String => Some(BuiltinKind::String),
            Self::Number => Some(BuiltinKind::Float),
            Self::Integer => Some(BuiltinKind::Int),
            Self::Boolean => Some(BuiltinKind::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in value types of the target language.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinKind {
    Bool,
    Int,
    Float,
    String,
    /// Open/untyped value.
    Any,
}

impl BuiltinKind {
    /// Parse a built-in name as written in explicit type configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" | "boolean" => Some(Self::Bool),
            "int" | "int64" | "integer" => Some(Self::Int),
            "float" | "float64" | "number" => Some(Self::Float),
            "string" => Some(Self::String),
            "any" | "interface{}" => Some(Self::Any),
            _ => None,
        }
    }

    /// Target-language spelling.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int64",
            Self::Float => "float64",
            Self::String => "string",
            Self::Any => "any",
        }
    }

    /// Whether values of this type support equality comparison.
    pub fn is_comparable(&self) -> bool {
        !matches!(self, Self::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// Resolved output type identity for a schema node.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeId {
    /// Built-in primitive; `optional` marks a boxed value that can be absent.
    Builtin { builtin: BuiltinKind, optional: bool },
    /// Type declared in a module of the generated output.
    Named { module: String, name: String },
}

impl TypeId {
    pub fn builtin(builtin: BuiltinKind) -> Self {
        Self::Builtin {
            builtin,
            optional: false,
        }
    }

    pub fn any() -> Self {
        Self::builtin(BuiltinKind::Any)
    }

    pub fn named(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Parse explicit type configuration: a built-in name or `module.Name`.
    ///
    /// The module part may itself contain dots (`github.com/acme/models.Widget`);
    /// the split happens at the last dot after the last slash.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim();
        if let Some(builtin) = BuiltinKind::from_name(path) {
            return Some(Self::builtin(builtin));
        }
        let tail_start = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
        let dot = path[tail_start..].rfind('.')? + tail_start;
        let (module, name) = (&path[..dot], &path[dot + 1..]);
        if module.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::named(module, name))
    }

    /// Mark a built-in as optional. Named types are returned unchanged.
    pub fn into_optional(self) -> Self {
        match self {
            Self::Builtin { builtin, .. } => Self::Builtin {
                builtin,
                optional: true,
            },
            named => named,
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named { .. })
    }

    pub fn is_any(&self) -> bool {
        matches!(
            self,
            Self::Builtin {
                builtin: BuiltinKind::Any,
                ..
            }
        )
    }

    pub fn builtin_kind(&self) -> Option<BuiltinKind> {
        match self {
            Self::Builtin { builtin, .. } => Some(*builtin),
            Self::Named { .. } => None,
        }
    }

    /// Module portion of a named type.
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::Named { module, .. } => Some(module),
            Self::Builtin { .. } => None,
        }
    }

    /// Short name without module qualification.
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name, .. } => name,
            Self::Builtin { builtin, .. } => builtin.name(),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin {
                builtin,
                optional: true,
            } => write!(f, "*{}", builtin.name()),
            Self::Builtin { builtin, .. } => f.write_str(builtin.name()),
            Self::Named { module, name } => write!(f, "{module}.{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_qualified_paths() {
        assert_eq!(
            TypeId::parse("github.com/acme/models.Widget"),
            Some(TypeId::named("github.com/acme/models", "Widget"))
        );
        assert_eq!(TypeId::parse("pkg.Widget"), Some(TypeId::named("pkg", "Widget")));
        assert_eq!(TypeId::parse("int64"), Some(TypeId::builtin(BuiltinKind::Int)));
        assert_eq!(TypeId::parse("github.com/acme"), None);
        assert_eq!(TypeId::parse("Widget"), None);
    }

    #[test]
    fn optional_only_applies_to_builtins() {
        let named = TypeId::named("pkg", "Widget");
        assert_eq!(named.clone().into_optional(), named);
        assert_eq!(
            TypeId::builtin(BuiltinKind::Int).into_optional().to_string(),
            "*int64"
        );
    }

    #[test]
    fn integer_and_number_share_a_union_class() {
        assert_eq!(
            PrimitiveKind::Integer.union_class(),
            PrimitiveKind::Number.union_class()
        );
        assert_ne!(
            PrimitiveKind::String.union_class(),
            PrimitiveKind::Number.union_class()
        );
    }
}
