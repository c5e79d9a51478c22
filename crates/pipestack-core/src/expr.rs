//! Template expressions: literals and intrinsic functions.

use serde::Serialize;

/// A value in a template that is either known at declaration time or
/// resolved by the provisioning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Expr {
    Literal(String),
    Ref {
        #[serde(rename = "Ref")]
        logical_id: String,
    },
    GetAtt {
        #[serde(rename = "Fn::GetAtt")]
        target: (String, String),
    },
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Expr::Ref {
            logical_id: logical_id.into(),
        }
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt {
            target: (logical_id.into(), attribute.into()),
        }
    }

    /// The literal value, if this expression is known at declaration time.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// The logical id this expression points at, if any.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Expr::Literal(_) => None,
            Expr::Ref { logical_id } => Some(logical_id),
            Expr::GetAtt { target } => Some(&target.0),
        }
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value)
    }
}
