use ethers::types::Address;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Logical contract roles the keeper resolves from deployment artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractRole {
    Sequencer,
    OracleJob,
    Jug,
    Vow,
    Vat,
    LitePsm,
}

impl ContractRole {
    /// Key used in the artifact files
    pub fn key(self) -> &'static str {
        match self {
            ContractRole::Sequencer => "sequencer",
            ContractRole::OracleJob => "oracleJob",
            ContractRole::Jug => "jug",
            ContractRole::Vow => "vow",
            ContractRole::Vat => "vat",
            ContractRole::LitePsm => "litePsm",
        }
    }
}

impl fmt::Display for ContractRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error)]
pub enum AddressBookError {
    #[error("artifact directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("no artifact files found in {0}")]
    NoArtifacts(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {source_name}: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not a JSON object of role names to addresses")]
    NotAnObject(String),

    #[error("role `{role}` maps to both {first:?} and {second:?}")]
    Conflict {
        role: String,
        first: Address,
        second: Address,
    },

    #[error("no `{role}` address for chain {chain_id}")]
    MissingRole { role: ContractRole, chain_id: u64 },
}

/// Role name to deployed address, for one chain.
///
/// Built once at startup from the deployment artifacts and shared by
/// reference afterwards.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    chain_id: u64,
    entries: BTreeMap<String, Address>,
}

impl AddressBook {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            entries: BTreeMap::new(),
        }
    }

    /// Load every `*.json` artifact under `<dir>/<chain_id>/`
    pub fn load(artifacts_dir: &Path, chain_id: u64) -> Result<Self, AddressBookError> {
        let dir = artifacts_dir.join(chain_id.to_string());
        if !dir.is_dir() {
            return Err(AddressBookError::MissingDirectory(dir));
        }

        let read_dir = std::fs::read_dir(&dir).map_err(|source| AddressBookError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| AddressBookError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
        // Stable merge order regardless of directory iteration order.
        files.sort();

        if files.is_empty() {
            return Err(AddressBookError::NoArtifacts(dir));
        }

        let mut book = Self::new(chain_id);
        for path in files {
            let json = std::fs::read_to_string(&path).map_err(|source| AddressBookError::Io {
                path: path.clone(),
                source,
            })?;
            book.merge_json(&path.display().to_string(), &json)?;
        }

        info!(
            chain_id,
            entries = book.entries.len(),
            "Loaded address book from {}",
            dir.display()
        );

        Ok(book)
    }

    /// Merge one artifact document. Values that are not addresses are ignored.
    pub fn merge_json(&mut self, source_name: &str, json: &str) -> Result<(), AddressBookError> {
        let value: Value =
            serde_json::from_str(json).map_err(|source| AddressBookError::Parse {
                source_name: source_name.to_string(),
                source,
            })?;

        let Value::Object(map) = value else {
            return Err(AddressBookError::NotAnObject(source_name.to_string()));
        };

        for (role, value) in map {
            let Some(address) = value.as_str().and_then(|s| s.parse::<Address>().ok()) else {
                debug!(role = %role, "Skipping non-address artifact entry in {}", source_name);
                continue;
            };
            self.insert(role, address)?;
        }

        Ok(())
    }

    fn insert(&mut self, role: String, address: Address) -> Result<(), AddressBookError> {
        match self.entries.get(&role) {
            Some(existing) if *existing != address => Err(AddressBookError::Conflict {
                role,
                first: *existing,
                second: address,
            }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert(role, address);
                Ok(())
            }
        }
    }

    pub fn with(mut self, role: ContractRole, address: Address) -> Self {
        self.entries.insert(role.key().to_string(), address);
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn get(&self, role: ContractRole) -> Option<Address> {
        self.entries.get(role.key()).copied()
    }

    pub fn require(&self, role: ContractRole) -> Result<Address, AddressBookError> {
        self.get(role).ok_or(AddressBookError::MissingRole {
            role,
            chain_id: self.chain_id,
        })
    }
}
