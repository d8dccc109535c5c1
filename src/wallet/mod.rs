//! Transaction assembly and signing.
//!
//! # Data Flow
//! ```text
//! AssembleRequest (payload, fee policy, broadcast flag)
//!     → assembler.rs
//!         1. provider.get_unspent_outputs → largest output
//!         2. explicit fee, or provider.get_estimated_fee × assumed size
//!         3. [OP_RETURN payload (0), change (floored to sats)]
//!     → SigningStrategy::sign_input
//!         signer.rs        (LocalSigner: key in memory)
//!         remote_signer.rs (RemoteSigner: unlock → key lookup → raw sign)
//!     → script.rs (validate signature against the spent output, finalize)
//!     → txid, hex, optional provider.broadcast_transaction
//! ```

pub mod assembler;
pub mod remote_signer;
pub mod script;
pub mod signer;

pub use assembler::{AssembleRequest, AssembledTransaction, FeePolicy, TransactionAssembler};
pub use remote_signer::RemoteSigner;
pub use signer::{AddressKind, InputSignature, LocalSigner, SigningRequest, SigningStrategy};
