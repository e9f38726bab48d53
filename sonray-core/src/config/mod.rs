mod session_desc;

pub use session_desc::{AcousticSessionDesc, ConvergencePolicy, RealtimeDesc, ReferenceDesc};
