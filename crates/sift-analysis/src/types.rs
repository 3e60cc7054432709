//! Representation of the Sift type system.
//!
//! A type is a primitive kind, a nullability flag, and an optional
//! structural refinement. Equality between types is structural: record
//! and table refinements compare field-for-field, while the members of
//! an any-union compare pairwise in order (callers that want set
//! equality canonicalize the member order first).

use std::fmt;

use indexmap::IndexMap;
use sift_syntax::PrimitiveTypeKind;

pub mod eval;

/// The primitive or structural kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// The type admits any value.
    Any,
    /// The type admits any value but null.
    AnyNonNull,
    /// A binary value.
    Binary,
    /// A date value.
    Date,
    /// A datetime value.
    DateTime,
    /// A datetimezone value.
    DateTimeZone,
    /// A duration value.
    Duration,
    /// A function value.
    Function,
    /// A list value.
    List,
    /// A logical value.
    Logical,
    /// The type admitting no values.
    None,
    /// The type of constructs that have no value.
    NotApplicable,
    /// The null value.
    Null,
    /// A numeric value.
    Number,
    /// A record value.
    Record,
    /// A table value.
    Table,
    /// A text value.
    Text,
    /// A time value.
    Time,
    /// A type value.
    Type,
    /// The type could not be determined.
    Unknown,
}

/// A parameter of a defined function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParameter {
    /// The parameter name.
    pub name: String,
    /// Whether the parameter was declared `optional`.
    pub is_optional: bool,
    /// Whether the parameter's declared type admits null.
    pub is_nullable: bool,
    /// The declared primitive kind, when one was declared.
    pub maybe_type: Option<TypeKind>,
}

/// The structural refinement of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedType {
    /// The type is any one of the member types.
    AnyUnion(Vec<Type>),
    /// A function with known parameters and return type.
    DefinedFunction {
        /// The function's parameters.
        parameters: Vec<FunctionParameter>,
        /// The function's return type.
        return_type: Box<Type>,
    },
    /// A list with known element types.
    DefinedList(Vec<Type>),
    /// A record with known fields.
    DefinedRecord {
        /// The record's fields and their types.
        fields: IndexMap<String, Type>,
        /// Whether the record may carry fields beyond the known ones.
        is_open: bool,
    },
    /// A table with known columns.
    DefinedTable {
        /// The table's columns and their types.
        fields: IndexMap<String, Type>,
        /// Whether the table may carry columns beyond the known ones.
        is_open: bool,
    },
    /// A type value with a known wrapped type.
    DefinedType(Box<Type>),
    /// A list type with a known item type.
    ListType(Box<Type>),
    /// A table type derived from a primary expression.
    PrimaryExpressionTable(Box<Type>),
}

/// A Sift type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    /// The primitive or structural kind of the type.
    pub kind: TypeKind,
    /// Whether the type admits null.
    pub is_nullable: bool,
    /// The structural refinement of the type, when known.
    pub extended: Option<ExtendedType>,
}

impl Type {
    /// Constructs the canonical primitive type of a kind.
    ///
    /// `null` and `any` are nullable; every other kind is not. There is
    /// one canonical value per `(kind, nullability)` pair, so primitive
    /// types always compare equal structurally.
    pub const fn primitive(kind: TypeKind) -> Self {
        Self {
            kind,
            is_nullable: matches!(kind, TypeKind::Null | TypeKind::Any),
            extended: None,
        }
    }

    /// Constructs the nullable primitive type of a kind.
    pub const fn nullable_primitive(kind: TypeKind) -> Self {
        Self {
            kind,
            is_nullable: true,
            extended: None,
        }
    }

    /// Constructs a primitive type with an explicit nullability.
    pub const fn with_nullability(kind: TypeKind, is_nullable: bool) -> Self {
        Self {
            kind,
            is_nullable,
            extended: None,
        }
    }

    /// Constructs a type from a primitive-type constant of the syntax.
    pub fn from_primitive_constant(kind: PrimitiveTypeKind) -> Self {
        Self::primitive(match kind {
            PrimitiveTypeKind::Any => TypeKind::Any,
            PrimitiveTypeKind::AnyNonNull => TypeKind::AnyNonNull,
            PrimitiveTypeKind::Binary => TypeKind::Binary,
            PrimitiveTypeKind::Date => TypeKind::Date,
            PrimitiveTypeKind::DateTime => TypeKind::DateTime,
            PrimitiveTypeKind::DateTimeZone => TypeKind::DateTimeZone,
            PrimitiveTypeKind::Duration => TypeKind::Duration,
            PrimitiveTypeKind::Function => TypeKind::Function,
            PrimitiveTypeKind::List => TypeKind::List,
            PrimitiveTypeKind::Logical => TypeKind::Logical,
            PrimitiveTypeKind::None => TypeKind::None,
            PrimitiveTypeKind::Null => TypeKind::Null,
            PrimitiveTypeKind::Number => TypeKind::Number,
            PrimitiveTypeKind::Record => TypeKind::Record,
            PrimitiveTypeKind::Table => TypeKind::Table,
            PrimitiveTypeKind::Text => TypeKind::Text,
            PrimitiveTypeKind::Time => TypeKind::Time,
            PrimitiveTypeKind::Type => TypeKind::Type,
        })
    }

    /// Determines if the type carries no structural refinement.
    pub fn is_primitive(&self) -> bool {
        self.extended.is_none()
    }

    /// Gets the union members of an any-union type.
    ///
    /// Returns `None` for any other type.
    pub fn union_members(&self) -> Option<&[Type]> {
        match &self.extended {
            Some(ExtendedType::AnyUnion(members)) => Some(members),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullable && !matches!(self.kind, TypeKind::Null | TypeKind::Any) {
            write!(f, "nullable ")?;
        }

        match &self.extended {
            None => f.write_str(kind_text(self.kind)),
            Some(ExtendedType::AnyUnion(members)) => {
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, " | ")?;
                    }
                    member.fmt(f)?;
                }
                Ok(())
            }
            Some(ExtendedType::DefinedFunction {
                parameters,
                return_type,
            }) => {
                write!(f, "(")?;
                for (index, parameter) in parameters.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    if parameter.is_optional {
                        write!(f, "optional ")?;
                    }
                    write!(f, "{name}", name = parameter.name)?;
                    if let Some(kind) = parameter.maybe_type {
                        write!(f, " as ")?;
                        if parameter.is_nullable {
                            write!(f, "nullable ")?;
                        }
                        f.write_str(kind_text(kind))?;
                    }
                }
                write!(f, ") => {return_type}")
            }
            Some(ExtendedType::DefinedList(elements)) => {
                write!(f, "{{")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    element.fmt(f)?;
                }
                write!(f, "}}")
            }
            Some(ExtendedType::DefinedRecord { fields, is_open }) => {
                write_fields(f, "[", fields, *is_open, "]")
            }
            Some(ExtendedType::DefinedTable { fields, is_open }) => {
                write!(f, "table ")?;
                write_fields(f, "[", fields, *is_open, "]")
            }
            Some(ExtendedType::DefinedType(inner)) => write!(f, "type {inner}"),
            Some(ExtendedType::ListType(item)) => write!(f, "type {{{item}}}"),
            Some(ExtendedType::PrimaryExpressionTable(inner)) => {
                write!(f, "table {inner}")
            }
        }
    }
}

/// Writes a bracketed field map.
fn write_fields(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    fields: &IndexMap<String, Type>,
    is_open: bool,
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (index, (name, ty)) in fields.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{name}: {ty}")?;
    }
    if is_open {
        if !fields.is_empty() {
            write!(f, ", ")?;
        }
        write!(f, "...")?;
    }
    f.write_str(close)
}

/// Gets the spelling of a type kind.
fn kind_text(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Any => "any",
        TypeKind::AnyNonNull => "anynonnull",
        TypeKind::Binary => "binary",
        TypeKind::Date => "date",
        TypeKind::DateTime => "datetime",
        TypeKind::DateTimeZone => "datetimezone",
        TypeKind::Duration => "duration",
        TypeKind::Function => "function",
        TypeKind::List => "list",
        TypeKind::Logical => "logical",
        TypeKind::None => "none",
        TypeKind::NotApplicable => "notapplicable",
        TypeKind::Null => "null",
        TypeKind::Number => "number",
        TypeKind::Record => "record",
        TypeKind::Table => "table",
        TypeKind::Text => "text",
        TypeKind::Time => "time",
        TypeKind::Type => "type",
        TypeKind::Unknown => "unknown",
    }
}

/// Flattens nested any-unions and removes structural duplicates.
///
/// The first occurrence of each distinct type is kept, so the result
/// preserves construction order. Deduping an already-deduped list is a
/// no-op.
pub fn dedupe(types: Vec<Type>) -> Vec<Type> {
    let mut result: Vec<Type> = Vec::with_capacity(types.len());
    flatten_into(types, &mut result);
    result
}

/// Recursively flattens union members into the result, skipping
/// duplicates.
fn flatten_into(types: Vec<Type>, result: &mut Vec<Type>) {
    for ty in types {
        match ty.extended {
            Some(ExtendedType::AnyUnion(members)) => flatten_into(members, result),
            _ => {
                if !result.contains(&ty) {
                    result.push(ty);
                }
            }
        }
    }
}

/// Unions the given types into a single type.
///
/// The members are deduped first; a single distinct member is returned
/// as itself. The union's nullability is the disjunction of its
/// members' nullability.
pub fn any_union(types: Vec<Type>) -> Type {
    let mut members = dedupe(types);
    match members.len() {
        0 => Type::primitive(TypeKind::Unknown),
        1 => members.swap_remove(0),
        _ => {
            let is_nullable = members.iter().any(|member| member.is_nullable);
            Type {
                kind: TypeKind::Any,
                is_nullable,
                extended: Some(ExtendedType::AnyUnion(members)),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn primitive_nullability() {
        assert!(Type::primitive(TypeKind::Null).is_nullable);
        assert!(Type::primitive(TypeKind::Any).is_nullable);
        assert!(!Type::primitive(TypeKind::Number).is_nullable);
        assert!(Type::nullable_primitive(TypeKind::Number).is_nullable);
    }

    #[test]
    fn equality_is_structural_and_reflexive() {
        let record = Type {
            kind: TypeKind::Record,
            is_nullable: false,
            extended: Some(ExtendedType::DefinedRecord {
                fields: IndexMap::from([
                    ("a".to_string(), Type::primitive(TypeKind::Text)),
                    ("b".to_string(), Type::primitive(TypeKind::Number)),
                ]),
                is_open: false,
            }),
        };

        assert_eq!(record, record.clone());
        assert_ne!(record, Type::primitive(TypeKind::Record));
    }

    #[test]
    fn dedupe_flattens_and_removes_duplicates() {
        let nested = any_union(vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Number),
        ]);
        let deduped = dedupe(vec![
            Type::primitive(TypeKind::Text),
            nested,
            Type::primitive(TypeKind::Number),
        ]);

        assert_eq!(deduped, vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Number),
        ]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let types = vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Text),
            Type::nullable_primitive(TypeKind::Number),
        ];
        let once = dedupe(types);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn single_member_unions_collapse() {
        let ty = any_union(vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Text),
        ]);
        assert_eq!(ty, Type::primitive(TypeKind::Text));
    }

    #[test]
    fn union_nullability_is_the_member_disjunction() {
        let ty = any_union(vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Null),
        ]);
        assert_eq!(ty.kind, TypeKind::Any);
        assert!(ty.is_nullable);

        let ty = any_union(vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Number),
        ]);
        assert!(!ty.is_nullable);
    }

    #[test]
    fn display_renders_the_type_syntax() {
        assert_eq!(Type::primitive(TypeKind::Text).to_string(), "text");
        assert_eq!(
            Type::nullable_primitive(TypeKind::Number).to_string(),
            "nullable number"
        );

        let record = Type {
            kind: TypeKind::Record,
            is_nullable: false,
            extended: Some(ExtendedType::DefinedRecord {
                fields: IndexMap::from([
                    ("a".to_string(), Type::primitive(TypeKind::Text)),
                ]),
                is_open: true,
            }),
        };
        assert_eq!(record.to_string(), "[a: text, ...]");

        let union = any_union(vec![
            Type::primitive(TypeKind::Text),
            Type::primitive(TypeKind::Number),
        ]);
        assert_eq!(union.to_string(), "text | number");
    }
}
