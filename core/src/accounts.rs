//! User and group records, kept as plain files inside the tree.
//!
//! ```text
//! /etc/passwd   name:primary_group:home
//! /etc/group    name:member,member
//! /etc/shadow   name:salt:sha256(salt:password)   (empty salt = no password)
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use sha2::{Digest, Sha256};
use vsh_sdk::{FsError, FsResult, Identity, SUPERUSER};

use crate::vfs::{VirtualFs, WriteMode};

pub const PASSWD_PATH: &str = "/etc/passwd";
pub const GROUP_PATH: &str = "/etc/group";
pub const SHADOW_PATH: &str = "/etc/shadow";
pub const DEFAULT_USER: &str = "guest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub primary_group: String,
    pub home: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credential {
    salt: String,
    digest: String,
}

#[derive(Debug, Clone, Default)]
pub struct Accounts {
    users: BTreeMap<String, UserRecord>,
    groups: BTreeMap<String, BTreeSet<String>>,
    credentials: BTreeMap<String, Credential>,
}

impl Accounts {
    /// Parse the account files; missing files read as empty.
    pub fn load(vfs: &VirtualFs) -> FsResult<Self> {
        let root = Identity::root();
        let read = |path: &str| match vfs.read_file(path, &root) {
            Ok(text) => Ok(text),
            Err(FsError::NotFound(_)) => Ok(String::new()),
            Err(e) => Err(e),
        };

        let mut accounts = Self::default();
        for line in read(PASSWD_PATH)?.lines().filter(|l| !l.trim().is_empty()) {
            let mut fields = line.splitn(3, ':');
            let (Some(name), Some(group), Some(home)) = (fields.next(), fields.next(), fields.next())
            else {
                tracing::warn!(line, "skipping malformed passwd entry");
                continue;
            };
            accounts.users.insert(
                name.to_string(),
                UserRecord {
                    name: name.to_string(),
                    primary_group: group.to_string(),
                    home: home.to_string(),
                },
            );
        }
        for line in read(GROUP_PATH)?.lines().filter(|l| !l.trim().is_empty()) {
            let (name, members) = line.split_once(':').unwrap_or((line, ""));
            let members = members
                .split(',')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            accounts.groups.insert(name.to_string(), members);
        }
        for line in read(SHADOW_PATH)?.lines().filter(|l| !l.trim().is_empty()) {
            let mut fields = line.splitn(3, ':');
            if let (Some(name), Some(salt), Some(digest)) = (fields.next(), fields.next(), fields.next()) {
                if !salt.is_empty() {
                    accounts.credentials.insert(
                        name.to_string(),
                        Credential {
                            salt: salt.to_string(),
                            digest: digest.to_string(),
                        },
                    );
                }
            }
        }
        Ok(accounts)
    }

    /// Write the account files back into the tree. The caller saves.
    pub fn persist(&self, vfs: &VirtualFs) -> FsResult<()> {
        let root = Identity::root();
        let passwd: String = self
            .users
            .values()
            .map(|u| format!("{}:{}:{}\n", u.name, u.primary_group, u.home))
            .collect();
        let group: String = self
            .groups
            .iter()
            .map(|(name, members)| {
                let members: Vec<&str> = members.iter().map(String::as_str).collect();
                format!("{name}:{}\n", members.join(","))
            })
            .collect();
        let shadow: String = self
            .users
            .keys()
            .map(|name| match self.credentials.get(name) {
                Some(c) => format!("{name}:{}:{}\n", c.salt, c.digest),
                None => format!("{name}::\n"),
            })
            .collect();

        vfs.write_file(PASSWD_PATH, &passwd, &root, WriteMode::Overwrite)?;
        vfs.write_file(GROUP_PATH, &group, &root, WriteMode::Overwrite)?;
        vfs.write_file(SHADOW_PATH, &shadow, &root, WriteMode::Overwrite)?;
        vfs.chmod(SHADOW_PATH, 0o600, &root)
    }

    /// Load the accounts, creating the superuser and the default user with
    /// their home directories when missing.
    pub fn ensure_defaults(vfs: &VirtualFs) -> FsResult<Self> {
        let mut accounts = Self::load(vfs)?;
        let mut changed = false;
        for name in [SUPERUSER, DEFAULT_USER] {
            if accounts.user(name).is_none() {
                accounts.add_user(name, None)?;
                changed = true;
            }
        }
        for user in accounts.users.values() {
            changed |= create_home(vfs, user)?;
        }
        if changed || vfs.stat(PASSWD_PATH, &Identity::root()).is_err() {
            accounts.persist(vfs)?;
        }
        Ok(accounts)
    }

    #[must_use]
    pub fn user(&self, name: &str) -> Option<&UserRecord> {
        self.users.get(name)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    #[must_use]
    pub fn group_exists(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Primary group first, then supplementary groups by name.
    #[must_use]
    pub fn groups_of(&self, user: &str) -> Vec<String> {
        let Some(record) = self.users.get(user) else {
            return Vec::new();
        };
        let mut groups = vec![record.primary_group.clone()];
        for (name, members) in &self.groups {
            if members.contains(user) && *name != record.primary_group {
                groups.push(name.clone());
            }
        }
        groups
    }

    #[must_use]
    pub fn identity(&self, name: &str) -> Option<Identity> {
        self.users
            .contains_key(name)
            .then(|| Identity::new(name, self.groups_of(name)))
    }

    /// Add a user with a same-named primary group and a home directory
    /// path. The directory itself is created by [`create_home`].
    pub fn add_user(&mut self, name: &str, password: Option<&str>) -> FsResult<UserRecord> {
        validate_name(name)?;
        if self.users.contains_key(name) {
            return Err(FsError::invalid_argument(format!("user '{name}' already exists")));
        }
        self.groups.entry(name.to_string()).or_default();
        let home = if name == SUPERUSER {
            "/root".to_string()
        } else {
            format!("/home/{name}")
        };
        let record = UserRecord {
            name: name.to_string(),
            primary_group: name.to_string(),
            home,
        };
        self.users.insert(name.to_string(), record.clone());
        self.set_password(name, password)?;
        Ok(record)
    }

    pub fn add_group(&mut self, name: &str) -> FsResult<()> {
        validate_name(name)?;
        if self.groups.contains_key(name) {
            return Err(FsError::invalid_argument(format!("group '{name}' already exists")));
        }
        self.groups.insert(name.to_string(), BTreeSet::new());
        Ok(())
    }

    pub fn add_to_group(&mut self, user: &str, group: &str) -> FsResult<()> {
        if !self.users.contains_key(user) {
            return Err(FsError::invalid_argument(format!("user '{user}' does not exist")));
        }
        let members = self
            .groups
            .get_mut(group)
            .ok_or_else(|| FsError::invalid_argument(format!("group '{group}' does not exist")))?;
        members.insert(user.to_string());
        Ok(())
    }

    /// `None` clears the password.
    pub fn set_password(&mut self, user: &str, password: Option<&str>) -> FsResult<()> {
        if !self.users.contains_key(user) {
            return Err(FsError::invalid_argument(format!("user '{user}' does not exist")));
        }
        match password {
            Some(password) => {
                let salt = fresh_salt(user);
                let digest = digest(&salt, password);
                self.credentials
                    .insert(user.to_string(), Credential { salt, digest });
            }
            None => {
                self.credentials.remove(user);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn has_password(&self, user: &str) -> bool {
        self.credentials.contains_key(user)
    }

    /// Users without a password accept any input.
    #[must_use]
    pub fn verify_password(&self, user: &str, password: &str) -> bool {
        if !self.users.contains_key(user) {
            return false;
        }
        self.credentials
            .get(user)
            .map_or(true, |c| digest(&c.salt, password) == c.digest)
    }
}

/// Create `user`'s home directory when missing. Returns whether it did.
pub fn create_home(vfs: &VirtualFs, user: &UserRecord) -> FsResult<bool> {
    let root = Identity::root();
    if vfs.stat(&user.home, &root).is_ok() {
        return Ok(false);
    }
    vfs.create_directory(&user.home, &root, true)?;
    vfs.chown(&user.home, &user.name, &root)?;
    vfs.chgrp(&user.home, &user.primary_group, &root)?;
    Ok(true)
}

fn validate_name(name: &str) -> FsResult<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        && name.len() <= 32;
    if valid {
        Ok(())
    } else {
        Err(FsError::invalid_argument(format!("invalid name '{name}'")))
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn fresh_salt(user: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    digest(user, &nanos.to_string())[..16].to_string()
}
