use std::collections::BTreeMap;
use std::fmt;

/// A value produced by a reporter, a literal input, or a dataflow port.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Number(f64),
    Boolean(bool),
    String(String),
    List(Vec<RuntimeValue>),
    Record(BTreeMap<String, RuntimeValue>),
    Unit,
}

impl RuntimeValue {
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_falsy(&self) -> bool {
        matches!(self, RuntimeValue::Boolean(false) | RuntimeValue::Unit)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeValue::Number(_) => "Number",
            RuntimeValue::Boolean(_) => "Boolean",
            RuntimeValue::String(_) => "String",
            RuntimeValue::List(_) => "List",
            RuntimeValue::Record(_) => "Record",
            RuntimeValue::Unit => "Unit",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuntimeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert back to JSON. Integral numbers become JSON integers;
    /// non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RuntimeValue::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            RuntimeValue::Boolean(b) => serde_json::Value::Bool(*b),
            RuntimeValue::String(s) => serde_json::Value::String(s.clone()),
            RuntimeValue::List(items) => {
                serde_json::Value::Array(items.iter().map(RuntimeValue::to_json).collect())
            }
            RuntimeValue::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            RuntimeValue::Unit => serde_json::Value::Null,
        }
    }
}

impl From<&serde_json::Value> for RuntimeValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RuntimeValue::Unit,
            serde_json::Value::Bool(b) => RuntimeValue::Boolean(*b),
            serde_json::Value::Number(n) => RuntimeValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => RuntimeValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                RuntimeValue::List(items.iter().map(RuntimeValue::from).collect())
            }
            serde_json::Value::Object(fields) => RuntimeValue::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), RuntimeValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for RuntimeValue {
    fn from(n: f64) -> Self {
        RuntimeValue::Number(n)
    }
}

impl From<bool> for RuntimeValue {
    fn from(b: bool) -> Self {
        RuntimeValue::Boolean(b)
    }
}

impl From<&str> for RuntimeValue {
    fn from(s: &str) -> Self {
        RuntimeValue::String(s.to_string())
    }
}

impl From<String> for RuntimeValue {
    fn from(s: String) -> Self {
        RuntimeValue::String(s)
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            RuntimeValue::Boolean(b) => write!(f, "{}", b),
            RuntimeValue::String(s) => write!(f, "{}", s),
            RuntimeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            RuntimeValue::Record(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            RuntimeValue::Unit => write!(f, "()"),
        }
    }
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeValue::Number(a), RuntimeValue::Number(b)) => a == b, // NaN != NaN per IEEE 754
            (RuntimeValue::Boolean(a), RuntimeValue::Boolean(b)) => a == b,
            (RuntimeValue::String(a), RuntimeValue::String(b)) => a == b,
            (RuntimeValue::List(a), RuntimeValue::List(b)) => a == b,
            (RuntimeValue::Record(a), RuntimeValue::Record(b)) => a == b,
            (RuntimeValue::Unit, RuntimeValue::Unit) => true,
            _ => false,
        }
    }
}
