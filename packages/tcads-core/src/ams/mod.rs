pub mod addr;
pub mod error;
pub mod net_id;

pub use addr::{AmsAddr, AmsPort};
pub use error::{AddrError, NetIdError};
pub use net_id::{AmsNetId, NETID_LEN};
