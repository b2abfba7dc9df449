//! Shared chain plumbing for the DSS keeper: data model, contract bindings,
//! address resolution and the gateway seam the keeper drives.

pub mod addresses;
pub mod contracts;
pub mod error;
pub mod types;

pub use addresses::{AddressBook, AddressBookError, ContractRole};
pub use contracts::{ChainGateway, Client, EthersGateway, GatewayTimeouts};
pub use error::GatewayError;
pub use types::{
    Action, DebtSnapshot, Ilk, JobDescriptor, JobKind, LabelError, NetworkId, PsmSnapshot,
    TxOutcome, WorkableJob,
};
