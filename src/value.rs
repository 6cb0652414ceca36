//! Dynamically typed values carried by XML-RPC payloads.
//!
//! [`Value`] mirrors the XML-RPC data model: scalars, arrays and structs.
//! Request parameters are built from it and replies decode into it, so the
//! client never needs to know the shape of a remote method's signature.

use std::{collections::BTreeMap, fmt};

/// A single XML-RPC value.
///
/// # Examples
///
/// ```
/// use gbxremote::Value;
///
/// let params = vec![Value::from("SuperAdmin"), Value::from(42)];
/// assert_eq!(params[0].as_str(), Some("SuperAdmin"));
/// assert_eq!(params[1].as_i64(), Some(42));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `<int>`, `<i4>` or `<i8>`.
    Int(i64),
    /// `<boolean>`.
    Bool(bool),
    /// `<string>` or untyped `<value>` text.
    String(String),
    /// `<double>`.
    Double(f64),
    /// `<dateTime.iso8601>`, kept in its textual form.
    DateTime(String),
    /// `<base64>`, decoded.
    Base64(Vec<u8>),
    /// `<array>`.
    Array(Vec<Value>),
    /// `<struct>`.
    Struct(BTreeMap<String, Value>),
    /// `<nil/>`.
    Nil,
}

impl Value {
    /// Return the boolean payload, if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the integer payload, if this is a [`Value::Int`].
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Return the floating point payload, if this is a [`Value::Double`].
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Return the string payload, if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the elements, if this is a [`Value::Array`].
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Return the members, if this is a [`Value::Struct`].
    #[must_use]
    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Look up a struct member by name.
    ///
    /// Returns `None` when the value is not a struct or has no such member.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    ///
    /// use gbxremote::Value;
    ///
    /// let version = Value::Struct(BTreeMap::from([(
    ///     "Name".to_owned(),
    ///     Value::from("TmForever"),
    /// )]));
    /// assert_eq!(version.get("Name").and_then(Value::as_str), Some("TmForever"));
    /// assert!(version.get("Build").is_none());
    /// ```
    #[must_use]
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.as_struct().and_then(|members| members.get(member))
    }

    /// Evaluate the value the way a loosely typed caller would test it.
    ///
    /// `false`, zero, empty strings and containers, and `nil` are falsy;
    /// everything else is truthy. Date-times are always truthy.
    ///
    /// # Examples
    ///
    /// ```
    /// use gbxremote::Value;
    ///
    /// assert!(Value::Bool(true).is_truthy());
    /// assert!(!Value::Int(0).is_truthy());
    /// assert!(!Value::String(String::new()).is_truthy());
    /// assert!(!Value::Nil.is_truthy());
    /// ```
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(i) => *i != 0,
            Self::Bool(b) => *b,
            Self::String(s) => !s.is_empty(),
            Self::Double(d) => *d != 0.0,
            Self::DateTime(_) => true,
            Self::Base64(bytes) => !bytes.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Struct(members) => !members.is_empty(),
            Self::Nil => false,
        }
    }

    /// Name of the XML-RPC type tag used to encode this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "boolean",
            Self::String(_) => "string",
            Self::Double(_) => "double",
            Self::DateTime(_) => "dateTime.iso8601",
            Self::Base64(_) => "base64",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Nil => "nil",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) | Self::DateTime(s) => write!(f, "{s:?}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Base64(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Struct(members) => {
                f.write_str("{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Nil => f.write_str("nil"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Self::Int(i64::from(value)) }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self { Self::Int(i64::from(value)) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Self::Double(value) }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Self::String(value.to_owned()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Self::String(value) }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self { Self::Array(value) }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self { Self::Struct(value) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self { value.map_or(Self::Nil, Into::into) }
}
