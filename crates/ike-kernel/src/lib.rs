//! Kernel abstraction: SA/policy installation and ipsec-interface lifecycle
//! (spec §4.8, §6, §9). The routing engine talks to the kernel only through
//! [`KernelInterface`]; nothing else in this workspace is allowed to.

pub mod ipsec_interface;
pub mod kernel;
pub mod mock;

pub use ipsec_interface::{IpsecInterface, IpsecInterfaceDriver, IpsecInterfaceError, IpsecInterfaceRegistry, REMAPPED_ZERO_IF_ID};
pub use kernel::{EncapType, EsaRequest, KernelError, KernelInterface, KernelOp, Lifetime, SaInfo, UpdownEvent};
pub use mock::{MockKernel, RecordedCall};
