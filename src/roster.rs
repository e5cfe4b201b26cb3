use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::metrics::normalize::{number_field, string_field};

pub const TECHNICIAN_ROLE: &str = "technician";
const USER_NODES: [&str; 2] = ["users", "Users"];
const ROLES_NODE: &str = "userRoles";
const NAME_FIELDS: [&str; 5] = ["name", "displayName", "fullName", "username", "email"];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9\- ]{7,20}$").expect("valid phone regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub role: String,
    /// Epoch milliseconds.
    pub created_at: Option<i64>,
    pub source_node: String,
}

impl Technician {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            role: TECHNICIAN_ROLE.to_string(),
            created_at: None,
            source_node: "users".to_string(),
        }
    }

    pub fn from_record(uid: &str, record: &Value, source_node: &str) -> Self {
        Self {
            uid: uid.to_string(),
            name: display_name(record, ""),
            email: string_field(record, &["email"]).unwrap_or_default(),
            phone: string_field(record, &["phone"]).unwrap_or_default(),
            address: string_field(record, &["address"]).unwrap_or_default(),
            role: string_field(record, &["role"])
                .unwrap_or_else(|| TECHNICIAN_ROLE.to_string()),
            created_at: number_field(record, &["createdAt"]).map(|v| v as i64),
            source_node: source_node.to_string(),
        }
    }

    pub fn display(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.email.is_empty() {
            &self.email
        } else {
            &self.uid
        }
    }

    pub fn profile(&self) -> TechnicianProfile {
        TechnicianProfile {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
        }
    }

    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        format!("{}{}{}{}", self.name, self.email, self.phone, self.address)
            .to_lowercase()
            .contains(&needle)
    }
}

/// First usable name field of a user record, else `uid`.
pub fn display_name(record: &Value, uid: &str) -> String {
    string_field(record, &NAME_FIELDS).unwrap_or_else(|| uid.to_string())
}

fn is_technician(record: &Value) -> bool {
    record
        .get("role")
        .and_then(Value::as_str)
        .map(|role| role.trim().eq_ignore_ascii_case(TECHNICIAN_ROLE))
        .unwrap_or(false)
}

/// Technicians from both user collections and the role map, one entry per
/// uid (newest `createdAt` wins), newest first.
pub fn load_technicians(root: &Value) -> Vec<Technician> {
    let mut combined = Vec::new();
    for node in USER_NODES {
        let Some(users) = root.get(node).and_then(Value::as_object) else {
            continue;
        };
        for (uid, record) in users {
            if is_technician(record) {
                combined.push(Technician::from_record(uid, record, node));
            }
        }
    }

    if let Some(roles) = root.get(ROLES_NODE).and_then(Value::as_object) {
        for (uid, role) in roles {
            let is_tech = role
                .as_str()
                .map(|r| r.trim().eq_ignore_ascii_case(TECHNICIAN_ROLE))
                .unwrap_or(false);
            if !is_tech || combined.iter().any(|t: &Technician| &t.uid == uid) {
                continue;
            }
            let profile = USER_NODES
                .iter()
                .find_map(|node| root.get(*node).and_then(|n| n.get(uid)).map(|p| (*node, p)));
            let tech = match profile {
                Some((node, record)) => {
                    let mut tech = Technician::from_record(uid, record, node);
                    tech.role = TECHNICIAN_ROLE.to_string();
                    tech
                }
                None => {
                    let mut tech = Technician::new(uid.clone());
                    tech.source_node = ROLES_NODE.to_string();
                    tech
                }
            };
            combined.push(tech);
        }
    }

    let mut deduped: BTreeMap<String, Technician> = BTreeMap::new();
    for tech in combined {
        let newer = deduped
            .get(&tech.uid)
            .map(|existing| tech.created_at.unwrap_or(0) > existing.created_at.unwrap_or(0))
            .unwrap_or(true);
        if newer {
            deduped.insert(tech.uid.clone(), tech);
        }
    }

    let mut list: Vec<Technician> = deduped.into_values().collect();
    list.sort_by(|a, b| b.created_at.unwrap_or(0).cmp(&a.created_at.unwrap_or(0)));
    list
}

pub fn sort_by_display_name(technicians: &mut [Technician]) {
    technicians.sort_by(|a, b| a.display().to_lowercase().cmp(&b.display().to_lowercase()));
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicianProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("name is required")]
    MissingName,
    #[error("email invalid: {0}")]
    InvalidEmail(String),
    #[error("phone invalid: {0}")]
    InvalidPhone(String),
}

pub fn validate_profile(profile: &TechnicianProfile) -> Result<(), ProfileError> {
    if profile.name.trim().is_empty() {
        return Err(ProfileError::MissingName);
    }
    let email = profile.email.trim();
    if !EMAIL_RE.is_match(email) {
        return Err(ProfileError::InvalidEmail(email.to_string()));
    }
    let phone = profile.phone.trim();
    if !PHONE_RE.is_match(phone) {
        return Err(ProfileError::InvalidPhone(phone.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::roster::{
        display_name, load_technicians, sort_by_display_name, validate_profile, ProfileError,
        TechnicianProfile,
    };

    #[test]
    fn merges_collections_and_prefers_newer_records() {
        let root = json!({
            "users": {
                "t1": { "name": "Old Ana", "role": "technician", "createdAt": 100 },
                "t2": { "name": "Ben", "role": "Technician", "createdAt": 300 },
                "a1": { "name": "Admin", "role": "admin" }
            },
            "Users": {
                "t1": { "name": "New Ana", "role": "TECHNICIAN", "createdAt": 200 }
            },
            "userRoles": { "t3": "technician", "a1": "admin", "t2": "technician" }
        });
        let techs = load_technicians(&root);
        let uids: Vec<&str> = techs.iter().map(|t| t.uid.as_str()).collect();
        assert_eq!(uids, vec!["t2", "t1", "t3"]);
        assert_eq!(techs[1].name, "New Ana");
        assert_eq!(techs[1].source_node, "Users");
        assert_eq!(techs[2].display(), "t3");
        assert_eq!(techs[2].source_node, "userRoles");
    }

    #[test]
    fn role_map_entries_pick_up_profiles() {
        let root = json!({
            "users": { "t9": { "email": "nine@shop.io" } },
            "userRoles": { "t9": "technician" }
        });
        let techs = load_technicians(&root);
        assert_eq!(techs.len(), 1);
        assert_eq!(techs[0].display(), "nine@shop.io");
    }

    #[test]
    fn display_name_walks_name_fields() {
        assert_eq!(display_name(&json!({ "fullName": "Cy" }), "uid"), "Cy");
        assert_eq!(display_name(&json!({ "name": "  " }), "uid"), "uid");
    }

    #[test]
    fn search_and_sort() {
        let root = json!({
            "users": {
                "1": { "name": "zed", "role": "technician", "phone": "555-0101" },
                "2": { "name": "Amy", "role": "technician", "address": "Elm St" }
            }
        });
        let mut techs = load_technicians(&root);
        sort_by_display_name(&mut techs);
        assert_eq!(techs[0].name, "Amy");
        assert!(techs[0].matches_search("elm"));
        assert!(techs[1].matches_search("0101"));
        assert!(!techs[1].matches_search("elm"));
        assert!(techs[1].matches_search(""));
    }

    #[test]
    fn validates_profiles() {
        let mut profile = TechnicianProfile {
            name: "Ana".to_string(),
            email: "ana@shop.io".to_string(),
            phone: "+60 12-345 6789".to_string(),
            address: String::new(),
        };
        assert_eq!(validate_profile(&profile), Ok(()));

        profile.phone = "12ab".to_string();
        assert_eq!(
            validate_profile(&profile),
            Err(ProfileError::InvalidPhone("12ab".to_string()))
        );
        profile.email = "ana@shop".to_string();
        assert!(matches!(
            validate_profile(&profile),
            Err(ProfileError::InvalidEmail(_))
        ));
        profile.name = " ".to_string();
        assert_eq!(validate_profile(&profile), Err(ProfileError::MissingName));
    }
}
