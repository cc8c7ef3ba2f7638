use serde::{Deserialize, Serialize};

/// Who produced a turn of the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One entry of a connection's conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::model("hello").role, Role::Model);
        assert_eq!(Turn::model("hello").text, "hello");
    }

    #[test]
    fn turn_serializes_with_lowercase_role() {
        let json = serde_json::to_value(Turn::model("hey")).unwrap();
        assert_eq!(json["role"], "model");
        assert_eq!(json["text"], "hey");
        assert_eq!(Role::User.as_str(), "user");
    }
}
