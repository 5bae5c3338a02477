// ========== Core Modules ==========
pub mod operation; // Requested and primitive operation enums
pub mod report; // Verification report (never transmitted)
pub mod request; // Computation request + JSON loader
pub mod role; // Operand roles and parties

// Export from operation module
pub use operation::{Operation, PrimitiveOperation};

// Export from request module
pub use request::{ComputationRequest, RequestError, RequestFile};

// Export from role module
pub use role::{OperandRole, OperandSlot, Party};

// Export from report module
pub use report::VerificationReport;

/// Neutral placeholder supplied for an operand a party does not own.
pub const PLACEHOLDER_VALUE: f64 = 1.0;
