pub mod control_plane;
pub mod process;
pub mod queue;
pub mod storage;

pub use control_plane::ControlPlaneClient;
pub use process::ProcessRunner;
pub use queue::JobQueue;
pub use storage::ObjectStore;
