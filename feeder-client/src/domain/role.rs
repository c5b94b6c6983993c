//! Actor roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// The three actor roles. Each role gets exactly one dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "RIDER",
            Role::Driver => "DRIVER",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RIDER" => Ok(Role::Rider),
            "DRIVER" => Ok(Role::Driver),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(DomainError::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("driver".parse::<Role>().unwrap(), Role::Driver);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("pilot".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Rider).unwrap(), "\"RIDER\"");
        let r: Role = serde_json::from_str("\"DRIVER\"").unwrap();
        assert_eq!(r, Role::Driver);
    }
}
