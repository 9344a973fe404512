pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::SimObject;
pub use crate::sim_if::TimeUnit;
pub use crate::testbench::{clock, Scoreboard};
pub use crate::trigger::{EdgeKind, Trigger};
pub use crate::utils::clock_cycles;
pub use crate::{fail_test, pass_test, TbError, TbObj, TbResult, Val};
pub use futures::future::FutureExt;
