pub mod acceptor;
pub mod completion;
pub mod coordinator;
pub mod records;
pub mod registry;
pub mod request_id;

pub use acceptor::ResultAcceptor;
pub use completion::{CompletionHub, RequestOutcome};
pub use coordinator::RequestCoordinator;
pub use records::{
    EncryptedSet, PsiRequest, PsiResult, RequestStatus, ResultPayload, SetId,
};
pub use registry::SetRegistry;
pub use request_id::RequestId;
