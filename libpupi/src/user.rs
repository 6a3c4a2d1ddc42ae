//! End users are never created by this application: they come from an external
//! identity provider and only live inside a login session.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The identifier assigned by the identity provider (the OpenID `sub` claim)
    pub id: String,
    /// Full name for display
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    /// Build a user from an identity provider profile. The first and last name
    /// are taken by splitting the full name at the first run of whitespace.
    pub fn from_profile(
        id: String,
        name: Option<String>,
        email: Option<String>,
        avatar: Option<String>,
    ) -> Self {
        let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
        let mut parts = name.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");
        Self {
            id,
            name,
            first_name,
            last_name,
            email,
            avatar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_profile_name_split() {
        let u = User::from_profile(
            "123".into(),
            Some("Maria  De Santis".into()),
            Some("maria@example.com".into()),
            None,
        );
        assert_eq!(u.first_name, "Maria");
        assert_eq!(u.last_name, "De Santis");
        assert_eq!(u.name, "Maria  De Santis");

        let u = User::from_profile("456".into(), Some("Cher".into()), None, None);
        assert_eq!(u.first_name, "Cher");
        assert_eq!(u.last_name, "");

        let u = User::from_profile("789".into(), None, None, None);
        assert_eq!(u.name, "");
        assert_eq!(u.first_name, "");
    }

    #[test]
    fn test_serialize_camel_case() {
        let u = User::from_profile("1".into(), Some("Anna Rossi".into()), None, None);
        let v = serde_json::to_value(&u).unwrap();
        assert_eq!(v["firstName"], "Anna");
        assert_eq!(v["lastName"], "Rossi");
        assert!(v.get("email").is_none());
    }
}
